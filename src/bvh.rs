//! Generic bounding-volume hierarchy over any indexed primitive set. Ported
//! from `object.cpp`'s free `Build`/`Split` functions and `BVH::Hit`: a
//! recursive top-down median-split tree with round-robin axis choice, kept
//! here as one index-based type shared by per-mesh and top-level BVHs
//! (SPEC_FULL §2) rather than one Rust type per owner.
//!
//! Traversal is closure-driven: callers supply a per-primitive intersection
//! test so this module doesn't need to know about `Face`/`Object` shapes.

use crate::aabb::Aabb;
use crate::ray::Ray;

pub trait BvhPrimitive {
    fn aabb(&self) -> Aabb;
}

enum Node {
    Leaf(usize),
    Internal { aabb: Aabb, left: Box<Node>, right: Box<Node> },
}

pub struct Bvh {
    root: Node,
    pub aabb: Aabb,
}

impl Bvh {
    pub fn build<P: BvhPrimitive>(prims: &[P]) -> Self {
        assert!(!prims.is_empty(), "BVH requires at least one primitive");
        let mut indices: Vec<usize> = (0..prims.len()).collect();
        let aabb = union_aabb(prims, &indices);
        let root = build_node(prims, &mut indices, 0);
        Self { root, aabb }
    }

    /// Closest-hit query. Tests both subtrees unconditionally per spec
    /// §4.1 ("no early exit is required... both subtrees may contain the
    /// closer primitive"); `test` returns `(t, value)` for a primitive hit.
    pub fn hit_closest<H>(&self, ray: &Ray, test: &impl Fn(usize, &Ray) -> Option<(f32, H)>) -> Option<(f32, H)> {
        Self::hit_closest_node(&self.root, ray, test)
    }

    fn hit_closest_node<H>(node: &Node, ray: &Ray, test: &impl Fn(usize, &Ray) -> Option<(f32, H)>) -> Option<(f32, H)> {
        match node {
            Node::Leaf(idx) => test(*idx, ray),
            Node::Internal { aabb, left, right } => {
                if !aabb.hit(ray) {
                    return None;
                }
                let lh = Self::hit_closest_node(left, ray, test);
                let rh = Self::hit_closest_node(right, ray, test);
                match (lh, rh) {
                    (Some(l), Some(r)) => Some(if l.0 < r.0 { l } else { r }),
                    (Some(l), None) => Some(l),
                    (None, Some(r)) => Some(r),
                    (None, None) => None,
                }
            }
        }
    }

    /// Any-hit query for shadow rays: returns true as soon as a hit with
    /// `t < max_t` is found, per spec §4.1's `closest=false` traversal.
    pub fn hit_any(&self, ray: &Ray, max_t: f32, test: &impl Fn(usize, &Ray, f32) -> Option<f32>) -> bool {
        Self::hit_any_node(&self.root, ray, max_t, test)
    }

    fn hit_any_node(node: &Node, ray: &Ray, max_t: f32, test: &impl Fn(usize, &Ray, f32) -> Option<f32>) -> bool {
        match node {
            Node::Leaf(idx) => test(*idx, ray, max_t).map(|t| t < max_t).unwrap_or(false),
            Node::Internal { aabb, left, right } => {
                if !aabb.hit_before(ray, max_t) {
                    return false;
                }
                Self::hit_any_node(left, ray, max_t, test) || Self::hit_any_node(right, ray, max_t, test)
            }
        }
    }
}

fn union_aabb<P: BvhPrimitive>(prims: &[P], indices: &[usize]) -> Aabb {
    let mut result = prims[indices[0]].aabb();
    for &i in &indices[1..] {
        result = result.union(&prims[i].aabb());
    }
    result
}

/// Partition `indices` so that primitives with center-axis value strictly
/// below `pivot` end up in the front. Ties go right — matches the source's
/// `Split` (`hs[i]->aabb.Center(axis) < p` is the only swap condition).
/// Falls back to a midpoint-count split when the pivot empties one side.
fn partition<P: BvhPrimitive>(prims: &[P], indices: &mut [usize], pivot: f32, axis: usize) -> usize {
    let mut mid = 0;
    for i in 0..indices.len() {
        let center = prims[indices[i]].aabb().center;
        let v = match axis {
            0 => center.x,
            1 => center.y,
            _ => center.z,
        };
        if v < pivot {
            indices.swap(i, mid);
            mid += 1;
        }
    }
    if mid == 0 || mid == indices.len() {
        mid = indices.len() / 2;
    }
    mid
}

fn build_node<P: BvhPrimitive>(prims: &[P], indices: &mut [usize], axis: usize) -> Node {
    if indices.len() == 1 {
        return Node::Leaf(indices[0]);
    }
    if indices.len() == 2 {
        let aabb = prims[indices[0]].aabb().union(&prims[indices[1]].aabb());
        return Node::Internal {
            aabb,
            left: Box::new(Node::Leaf(indices[0])),
            right: Box::new(Node::Leaf(indices[1])),
        };
    }
    let aabb = union_aabb(prims, indices);
    let pivot = match axis {
        0 => aabb.center.x,
        1 => aabb.center.y,
        _ => aabb.center.z,
    };
    let mid = partition(prims, indices, pivot, axis);
    let (left_idx, right_idx) = indices.split_at_mut(mid);
    let next_axis = (axis + 1) % 3;
    let left = Box::new(build_node(prims, left_idx, next_axis));
    let right = Box::new(build_node(prims, right_idx, next_axis));
    Node::Internal { aabb, left, right }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    struct Pt(Vec3);
    impl BvhPrimitive for Pt {
        fn aabb(&self) -> Aabb {
            Aabb::new(self.0 - Vec3::splat(0.05), self.0 + Vec3::splat(0.05))
        }
    }

    #[test]
    fn bvh_matches_brute_force_on_random_rays() {
        let prims: Vec<Pt> = (0..200)
            .map(|i| {
                let f = i as f32;
                Pt(Vec3::new((f * 0.37).sin() * 10.0, (f * 0.91).cos() * 10.0, (f * 1.7).sin() * 10.0))
            })
            .collect();
        let bvh = Bvh::build(&prims);

        let test = |idx: usize, ray: &Ray| -> Option<(f32, usize)> {
            let aabb = prims[idx].aabb();
            if aabb.hit(ray) {
                let t = (aabb.center - ray.origin).dot(ray.direction);
                if t > 0.0 {
                    return Some((t, idx));
                }
            }
            None
        };

        let mut seed = 12345u64;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let rx = ((seed >> 33) as f32 / u32::MAX as f32) * 20.0 - 10.0;
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let ry = ((seed >> 33) as f32 / u32::MAX as f32) * 20.0 - 10.0;
            let origin = Vec3::new(rx, ry, -20.0);
            let ray = Ray::new(origin, Vec3::Z);

            let bvh_hit = bvh.hit_closest(&ray, &test);
            let brute = (0..prims.len())
                .filter_map(|i| test(i, &ray))
                .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

            match (bvh_hit, brute) {
                (Some(a), Some(b)) => assert!((a.0 - b.0).abs() < 1e-3),
                (None, None) => {}
                (a, b) => panic!("mismatch: {:?} vs {:?}", a.map(|x| x.0), b.map(|x| x.0)),
            }
        }
    }
}
