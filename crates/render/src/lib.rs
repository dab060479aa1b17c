//! Rendering adapter: renderer-agnostic mesh upload and inspection.
//!
//! # Invariants
//! - Renderers read terrain state; they never mutate it.
//! - Attribute offsets and strides match the `#[repr(C)]` vertex structs of
//!   `relief-mesh` byte for byte.
//!
//! There is no GPU backend here. `MeshUploader` is the seam a backend plugs
//! into; `CpuUploader` and `DebugTextRenderer` stand in for it in the CLI
//! and in tests.

mod layout;
mod renderer;
mod upload;

pub use layout::{IndexFormat, VertexAttribute, VertexFormat, VertexLayout, vertex_layout};
pub use renderer::{DebugTextRenderer, RenderView, Renderer};
pub use upload::{CpuUploader, MeshHandle, MeshUploader, UploadedMesh};

pub fn crate_info() -> &'static str {
    concat!("relief-render v", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
