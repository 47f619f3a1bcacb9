//! Test-time augmentation: the 8 dihedral transforms of a tile tensor.
//!
//! Each element pairs an `apply` with an exact inverse, so results from all
//! augmented passes can be brought back into one coordinate frame and
//! averaged. Transforms act on the spatial axes of `[1, C, H, W]` arrays;
//! rotations swap H and W.

use ndarray::{s, Array4};

/// One element of the dihedral group: rotate, then optionally mirror
/// horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    Rot90,
    Rot180,
    Rot270,
    FlipH,
    Rot90FlipH,
    Rot180FlipH,
    Rot270FlipH,
}

impl Transform {
    pub const ALL: [Transform; 8] = [
        Transform::Identity,
        Transform::Rot90,
        Transform::Rot180,
        Transform::Rot270,
        Transform::FlipH,
        Transform::Rot90FlipH,
        Transform::Rot180FlipH,
        Transform::Rot270FlipH,
    ];

    pub fn apply(&self, a: &Array4<f32>) -> Array4<f32> {
        match self {
            Transform::Identity => a.clone(),
            Transform::Rot90 => rot90(a),
            Transform::Rot180 => rot180(a),
            Transform::Rot270 => rot270(a),
            Transform::FlipH => flip_h(a),
            Transform::Rot90FlipH => flip_h(&rot90(a)),
            Transform::Rot180FlipH => flip_h(&rot180(a)),
            Transform::Rot270FlipH => flip_h(&rot270(a)),
        }
    }

    /// Exact inverse of [`apply`](Self::apply): un-mirror, then un-rotate.
    pub fn invert(&self, a: &Array4<f32>) -> Array4<f32> {
        match self {
            Transform::Identity => a.clone(),
            Transform::Rot90 => rot270(a),
            Transform::Rot180 => rot180(a),
            Transform::Rot270 => rot90(a),
            Transform::FlipH => flip_h(a),
            Transform::Rot90FlipH => rot270(&flip_h(a)),
            Transform::Rot180FlipH => rot180(&flip_h(a)),
            Transform::Rot270FlipH => rot90(&flip_h(a)),
        }
    }
}

/// 90° clockwise: output spatial shape is `(W, H)`.
fn rot90(a: &Array4<f32>) -> Array4<f32> {
    let transposed = a.view().permuted_axes([0, 1, 3, 2]);
    transposed.slice(s![.., .., .., ..;-1]).to_owned()
}

fn rot180(a: &Array4<f32>) -> Array4<f32> {
    a.slice(s![.., .., ..;-1, ..;-1]).to_owned()
}

/// 90° counter-clockwise: output spatial shape is `(W, H)`.
fn rot270(a: &Array4<f32>) -> Array4<f32> {
    let transposed = a.view().permuted_axes([0, 1, 3, 2]);
    transposed.slice(s![.., .., ..;-1, ..]).to_owned()
}

fn flip_h(a: &Array4<f32>) -> Array4<f32> {
    a.slice(s![.., .., .., ..;-1]).to_owned()
}

/// Arithmetic mean of aligned augmentation outputs. All arrays must share a
/// shape; summation order is fixed by the slice order.
pub fn average(outputs: &[Array4<f32>]) -> Array4<f32> {
    assert!(!outputs.is_empty(), "cannot average zero outputs");
    let mut acc = outputs[0].clone();
    for out in &outputs[1..] {
        acc += out;
    }
    acc /= outputs.len() as f32;
    acc
}
