//! The terrain consumer: adopts a generated mesh, places it in the world,
//! and answers height queries against the source grid.
//!
//! # Invariants
//! - Initialization happens at most once; a ready terrain never goes back.
//! - The model matrix centres the grid on the placement origin.

mod placement;
mod terrain;

pub use placement::TerrainPlacement;
pub use terrain::Terrain;

use relief_mesh::MeshError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TerrainError {
    #[error("terrain is already initialized")]
    AlreadyInitialized,
    #[error("height source is empty")]
    EmptySource,
    #[error("mesh failed validation: {0}")]
    InvalidMesh(#[from] MeshError),
    #[error("mesh extent {mesh:?} does not match grid extent {grid:?}")]
    ExtentMismatch {
        mesh: (f32, f32),
        grid: (f32, f32),
    },
}

pub fn crate_info() -> &'static str {
    concat!("relief-terrain v", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("terrain"));
    }
}
