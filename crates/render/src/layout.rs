use relief_mesh::{FlatVertex, IndexBuffer, Shading, SmoothVertex};

/// Scalar layout of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
}

impl VertexFormat {
    pub const fn size(self) -> u32 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub format: VertexFormat,
    /// Byte offset inside the vertex.
    pub offset: u32,
    pub location: u32,
}

/// Byte layout of an interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: &'static [VertexAttribute],
}

const SMOOTH_ATTRIBUTES: &[VertexAttribute] = &[
    VertexAttribute {
        name: "position",
        format: VertexFormat::Float32x3,
        offset: 0,
        location: 0,
    },
    VertexAttribute {
        name: "normal",
        format: VertexFormat::Float32x3,
        offset: 12,
        location: 1,
    },
    VertexAttribute {
        name: "uv",
        format: VertexFormat::Float32x2,
        offset: 24,
        location: 2,
    },
    VertexAttribute {
        name: "tangent",
        format: VertexFormat::Float32x3,
        offset: 32,
        location: 3,
    },
    VertexAttribute {
        name: "bitangent",
        format: VertexFormat::Float32x3,
        offset: 44,
        location: 4,
    },
];

const FLAT_ATTRIBUTES: &[VertexAttribute] = &[
    VertexAttribute {
        name: "position",
        format: VertexFormat::Float32x3,
        offset: 0,
        location: 0,
    },
    VertexAttribute {
        name: "normal",
        format: VertexFormat::Float32x3,
        offset: 12,
        location: 1,
    },
    VertexAttribute {
        name: "uv",
        format: VertexFormat::Float32x2,
        offset: 24,
        location: 2,
    },
];

/// Vertex layout the mesher emits for `shading`.
pub fn vertex_layout(shading: Shading) -> VertexLayout {
    match shading {
        Shading::Diffuse => VertexLayout {
            stride: SmoothVertex::STRIDE,
            attributes: SMOOTH_ATTRIBUTES,
        },
        Shading::Flat => VertexLayout {
            stride: FlatVertex::STRIDE,
            attributes: FLAT_ATTRIBUTES,
        },
    }
}

impl VertexLayout {
    /// Layout matching a mesh's vertex stride, if it is one the mesher emits.
    pub fn for_stride(stride: u32) -> Option<Self> {
        [Shading::Diffuse, Shading::Flat]
            .into_iter()
            .map(vertex_layout)
            .find(|layout| layout.stride == stride)
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Index element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub fn of(indices: &IndexBuffer) -> Self {
        match indices {
            IndexBuffer::U16(_) => Self::Uint16,
            IndexBuffer::U32(_) => Self::Uint32,
        }
    }

    pub const fn size(self) -> u32 {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}
