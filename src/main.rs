//! CLI entry point. Ported from `main.cpp`: load a scene file, render every
//! camera it declares, report elapsed time. `num_threads` defaults to 1,
//! matching the source's `argc > 2` check; everything else (output format,
//! logging) follows the teacher's `clap`/`log` conventions rather than the
//! source's raw argv parsing.

use std::time::Instant;

use clap::Parser;
use raywright::{render, scene_io};

/// Offline physically-based ray tracer.
#[derive(Parser, Debug)]
#[command(name = "raywright", about = "Renders an XML scene description to one image per declared camera.")]
struct Args {
    /// Path to the scene XML file.
    scene: String,
    /// Number of worker threads; defaults to 1 to match a single-threaded render.
    #[arg(default_value_t = 1)]
    num_threads: usize,
    /// Seed for the per-thread PRNGs; fixed for reproducible renders.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let loaded = match scene_io::load_scene(&args.scene) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("failed to load `{}`: {e}", args.scene);
            std::process::exit(1);
        }
    };

    for camera in &loaded.cameras {
        let start = Instant::now();
        let pixels = render::render_camera(&loaded.scene, &camera.camera, args.num_threads, args.seed);
        let bytes = render::finalize_pixels(&pixels, camera.tone_mapper.as_ref());
        let elapsed = start.elapsed();
        log::info!("{}: {} ms", camera.camera.image_name, elapsed.as_millis());

        let (width, height) = camera.camera.image_resolution;
        match image::save_buffer(&camera.camera.image_name, &bytes, width, height, image::ColorType::Rgba8) {
            Ok(()) => {}
            Err(e) => log::error!("failed to write `{}`: {e}", camera.camera.image_name),
        }
    }
}
