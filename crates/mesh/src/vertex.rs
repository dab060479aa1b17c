use bytemuck::{Pod, Zeroable};

/// Vertex of the shared-vertex (smooth) terrain mesh.
///
/// Layout matches the terrain shader: 14 floats, 56 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SmoothVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl SmoothVertex {
    pub const FLOATS: usize = 14;
    pub const STRIDE: u32 = (Self::FLOATS * 4) as u32;
}

/// Vertex of the per-face (flat) terrain mesh. No tangent frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct FlatVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl FlatVertex {
    pub const FLOATS: usize = 8;
    pub const STRIDE: u32 = (Self::FLOATS * 4) as u32;
}
