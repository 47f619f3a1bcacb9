//! Core crate for pixlift: tiled super-resolution with bounded GPU memory.
//!
//! The engine splits an image into prepadded tiles, runs each through a
//! loaded network capability (optionally with 8-way test-time augmentation),
//! and stitches the cropped interiors back into a caller-owned output buffer.

pub mod backend;
pub mod convert;
pub mod device;
pub mod engine;
pub mod error;
pub mod network;
pub mod stitch;
pub mod tile;
pub mod tta;

pub use engine::Engine;
pub use error::{Error, Result};
