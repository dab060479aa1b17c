use relief_mesh::Mesh;

use crate::layout::{IndexFormat, VertexLayout};

/// Hands mesh buffers to a rendering backend.
///
/// A GPU backend would create vertex and index buffers here; the handle is
/// whatever the backend uses to draw them later.
pub trait MeshUploader {
    type Handle;

    fn upload(&mut self, mesh: &Mesh) -> Self::Handle;
}

/// Handle into a [`CpuUploader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub usize);

/// Byte copies of an uploaded mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMesh {
    pub vertex_bytes: Vec<u8>,
    pub index_bytes: Vec<u8>,
    /// `None` when the stride is not one the mesher emits.
    pub layout: Option<VertexLayout>,
    pub index_format: IndexFormat,
    pub vertex_count: usize,
    pub index_count: usize,
}

/// Uploader that keeps the buffers in memory.
#[derive(Debug, Default)]
pub struct CpuUploader {
    meshes: Vec<UploadedMesh>,
}

impl CpuUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&UploadedMesh> {
        self.meshes.get(handle.0)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Bytes held across all uploads.
    pub fn total_bytes(&self) -> usize {
        self.meshes
            .iter()
            .map(|m| m.vertex_bytes.len() + m.index_bytes.len())
            .sum()
    }
}

impl MeshUploader for CpuUploader {
    type Handle = MeshHandle;

    fn upload(&mut self, mesh: &Mesh) -> MeshHandle {
        let layout = VertexLayout::for_stride(mesh.vertex_stride);
        if layout.is_none() {
            tracing::warn!(stride = mesh.vertex_stride, "uploading mesh with unknown vertex layout");
        }
        let uploaded = UploadedMesh {
            vertex_bytes: mesh.vertex_bytes().to_vec(),
            index_bytes: mesh.indices.as_bytes().to_vec(),
            layout,
            index_format: IndexFormat::of(&mesh.indices),
            vertex_count: mesh.vertex_count(),
            index_count: mesh.indices.len(),
        };
        tracing::debug!(
            vertex_bytes = uploaded.vertex_bytes.len(),
            index_bytes = uploaded.index_bytes.len(),
            index_format = ?uploaded.index_format,
            "mesh uploaded"
        );
        self.meshes.push(uploaded);
        MeshHandle(self.meshes.len() - 1)
    }
}
