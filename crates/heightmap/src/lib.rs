//! Height sources: scalar sample grids derived from heightmap images.
//!
//! # Invariants
//! - A `Heightmap` never has a zero dimension.
//! - Samples are normalized to `[0, 1]` when decoded from pixels.
//!
//! The same source feeds two consumers: the mesher (triangulated render mesh)
//! and the physics collaborator (`Heightfield`, no triangulation).

mod heightfield;
mod source;

pub use heightfield::Heightfield;
pub use source::{HeightSource, Heightmap};

/// Errors from building a height source.
#[derive(Debug, thiserror::Error)]
pub enum HeightmapError {
    #[error("heightmap must not be empty (got {width}x{height})")]
    EmptyDimensions { width: usize, height: usize },
    #[error("sample buffer has {actual} elements, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),
}

pub fn crate_info() -> &'static str {
    concat!("relief-heightmap v", env!("CARGO_PKG_VERSION"))
}
