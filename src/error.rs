//! Error taxonomy: config/resource errors are fatal at load time, invariant
//! errors guard numerics that must never reach the tracer. See spec §7.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("scene file `{path}` could not be read: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed scene XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("missing required element `{element}` under `{parent}`")]
    MissingElement { parent: String, element: String },
    #[error("unknown `{attribute}` value `{value}` on `{element}`")]
    UnknownEnumValue {
        element: String,
        attribute: String,
        value: String,
    },
    #[error("`{element}` references undefined id {id}")]
    DanglingReference { element: String, id: i64 },
    #[error("`{element}.{field}` could not be parsed as a number: `{text}`")]
    NumericParse {
        element: String,
        field: String,
        text: String,
    },
}

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("failed to load image `{path}`: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to load mesh `{path}`: {reason}")]
    Mesh { path: String, reason: String },
}

#[derive(Error, Debug)]
pub enum InvariantError {
    #[error("non-finite value encountered in {context}")]
    NonFinite { context: &'static str },
    #[error("zero-length direction vector in {context}")]
    ZeroDirection { context: &'static str },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
