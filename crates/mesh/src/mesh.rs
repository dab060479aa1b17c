use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::MeshError;

/// Largest vertex count whose indices all fit in 16 bits.
pub const MAX_U16_VERTICES: usize = u16::MAX as usize + 1;

/// Placement data the terrain needs to center the mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshMeta {
    /// Grid extent along X after scale: `(width - 1) * sx`.
    pub terrain_width: f32,
    /// Grid extent along Z after scale: `(height - 1) * sz`.
    pub terrain_length: f32,
    pub nudge_x: f32,
    pub nudge_z: f32,
}

/// Index buffer whose element width follows the vertex count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexBuffer {
    /// Empty buffer, 16-bit when `vertex_count <= MAX_U16_VERTICES`.
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        if vertex_count <= MAX_U16_VERTICES {
            Self::U16(Vec::with_capacity(index_count))
        } else {
            Self::U32(Vec::with_capacity(index_count))
        }
    }

    /// Append one index. A 16-bit buffer widens to 32 bits on the first
    /// index that does not fit.
    pub fn push(&mut self, index: u32) {
        match self {
            Self::U16(v) => match u16::try_from(index) {
                Ok(small) => v.push(small),
                Err(_) => {
                    let mut wide: Vec<u32> = Vec::with_capacity(v.capacity().max(v.len() + 1));
                    wide.extend(v.iter().map(|&x| x as u32));
                    wide.push(index);
                    *self = Self::U32(wide);
                }
            },
            Self::U32(v) => v.push(index),
        }
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.push(a);
        self.push(b);
        self.push(c);
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_u32(&self) -> bool {
        matches!(self, Self::U32(_))
    }

    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            Self::U16(_) => 2,
            Self::U32(_) => 4,
        }
    }

    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            Self::U16(v) => v.get(i).map(|&x| x as u32),
            Self::U32(v) => v.get(i).copied(),
        }
    }

    /// Iterate indices widened to `u32`.
    pub fn iter(&self) -> Indices<'_> {
        match self {
            Self::U16(v) => Indices::U16(v.iter()),
            Self::U32(v) => Indices::U32(v.iter()),
        }
    }

    /// Raw bytes for GPU upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Iterator over an `IndexBuffer`.
pub enum Indices<'a> {
    U16(std::slice::Iter<'a, u16>),
    U32(std::slice::Iter<'a, u32>),
}

impl Iterator for Indices<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match self {
            Indices::U16(it) => it.next().map(|&x| x as u32),
            Indices::U32(it) => it.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Indices::U16(it) => it.size_hint(),
            Indices::U32(it) => it.size_hint(),
        }
    }
}

/// In-memory terrain mesh, ready for GPU upload.
///
/// `vertices` is a flat float buffer; each vertex spans `vertex_stride / 4`
/// floats and starts with position (3) and normal (3).
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: IndexBuffer,
    /// Bytes per vertex.
    pub vertex_stride: u32,
    pub meta: MeshMeta,
}

impl Mesh {
    /// Floats per vertex.
    pub fn vertex_floats(&self) -> usize {
        self.vertex_stride as usize / 4
    }

    pub fn vertex_count(&self) -> usize {
        let floats = self.vertex_floats();
        if floats == 0 {
            0
        } else {
            self.vertices.len() / floats
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, vertex: usize) -> Vec3 {
        let o = vertex * self.vertex_floats();
        Vec3::from_slice(&self.vertices[o..o + 3])
    }

    pub fn normal(&self, vertex: usize) -> Vec3 {
        let o = vertex * self.vertex_floats() + 3;
        Vec3::from_slice(&self.vertices[o..o + 3])
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices
            .chunks_exact(self.vertex_floats().max(1))
            .map(|v| Vec3::from_slice(&v[..3]))
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Check the buffer invariants: whole triangles, every index in range.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::IncompleteTriangle {
                len: self.indices.len(),
            });
        }
        let vertex_count = self.vertex_count();
        if let Some(index) = self.indices.iter().find(|&i| i as usize >= vertex_count) {
            return Err(MeshError::InvalidIndex {
                index,
                vertex_count,
            });
        }
        Ok(())
    }
}
