//! Common types shared between backends

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(u32);

impl BufferUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const INDEX: Self = Self(1 << 2);
    pub const VERTEX: Self = Self(1 << 3);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// Vertex attribute description
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Vertex buffer layout
#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

/// Interleaved vertex: position, colour and normal, 9 tightly packed floats.
///
/// This is the layout every shared vertex buffer is built from; shaders bind
/// position at location 0, colour at 1 and normal at 2.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub colour: Vec3,
    pub normal: Vec3,
}

impl Vertex {
    /// Size of one vertex in bytes
    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(position: Vec3, colour: Vec3, normal: Vec3) -> Self {
        Self {
            position,
            colour,
            normal,
        }
    }

    /// Position, colour and normal, each packed right after the previous one
    pub fn layout() -> VertexBufferLayout {
        let mut offset = 0;
        let attributes = (0..3)
            .map(|location| {
                let format = VertexFormat::Float32x3;
                let attribute = VertexAttribute {
                    location,
                    format,
                    offset,
                };
                offset += format.size();
                attribute
            })
            .collect();
        VertexBufferLayout {
            array_stride: Self::STRIDE,
            attributes,
        }
    }

    /// Flatten to the 9-float upload order
    pub fn to_array(&self) -> [f32; 9] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.colour.x,
            self.colour.y,
            self.colour.z,
            self.normal.x,
            self.normal.y,
            self.normal.z,
        ]
    }
}

/// Primitive topology
///
/// Mirrors the classic GL draw modes one to one. Backends that lack a mode
/// report it through `GraphicsBackend::supports_topology` and receive lowered
/// indices instead (see [`PrimitiveTopology::lower`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    LineLoop,
    #[default]
    TriangleList,
    TriangleFan,
}

impl PrimitiveTopology {
    pub fn is_point(&self) -> bool {
        matches!(self, PrimitiveTopology::PointList)
    }

    pub fn is_line(&self) -> bool {
        matches!(
            self,
            PrimitiveTopology::LineList | PrimitiveTopology::LineStrip | PrimitiveTopology::LineLoop
        )
    }

    /// Rewrite indices of a mode into an equivalent universally supported one.
    ///
    /// Line loops become strips closed by repeating the first index, fans
    /// become triangle lists. Other modes are returned unchanged.
    pub fn lower(self, indices: &[u32]) -> (PrimitiveTopology, Vec<u32>) {
        match self {
            PrimitiveTopology::LineLoop => {
                let mut lowered = indices.to_vec();
                if let Some(&first) = indices.first() {
                    lowered.push(first);
                }
                (PrimitiveTopology::LineStrip, lowered)
            }
            PrimitiveTopology::TriangleFan => {
                let mut lowered = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
                if let Some((&hub, rest)) = indices.split_first() {
                    for pair in rest.windows(2) {
                        lowered.extend_from_slice(&[hub, pair[0], pair[1]]);
                    }
                }
                (PrimitiveTopology::TriangleList, lowered)
            }
            other => (other, indices.to_vec()),
        }
    }
}

/// Index format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub fn size(&self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}
