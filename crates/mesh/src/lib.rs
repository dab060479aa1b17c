//! Terrain meshing: height grid in, vertex/index buffers out.
//!
//! # Invariants
//! - `indices.len() % 3 == 0` and every index is below the vertex count.
//! - Indices are 16-bit whenever the vertex count allows it.
//! - Normals are never NaN: a zero-length cross product falls back to +Y.
//!
//! Two topologies are produced. Diffuse (smooth) shares one vertex per grid
//! sample and carries a tangent frame for normal mapping; flat duplicates
//! vertices per triangle so each face gets its own normal.

mod cancel;
mod mesh;
mod mesher;
mod options;
mod vertex;

pub use cancel::CancelToken;
pub use mesh::{IndexBuffer, Indices, MAX_U16_VERTICES, Mesh, MeshMeta};
pub use mesher::{GridMesher, generate};
pub use options::{MeshOptions, Shading};
pub use vertex::{FlatVertex, SmoothVertex};

/// Errors from mesh generation and validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("height source is empty ({width}x{height})")]
    EmptySource { width: usize, height: usize },
    #[error("mesh generation was cancelled")]
    Cancelled,
    #[error("index {index} out of range for {vertex_count} vertices")]
    InvalidIndex { index: u32, vertex_count: usize },
    #[error("index count {len} is not a multiple of 3")]
    IncompleteTriangle { len: usize },
}

pub fn crate_info() -> &'static str {
    concat!("relief-mesh v", env!("CARGO_PKG_VERSION"))
}
