//! Shape: a primitive topology with its vertices and indices

use crate::backend::types::{PrimitiveTopology, Vertex};
use glam::{Mat3, Mat4, Quat, Vec3};
use thiserror::Error;

/// Structural problems detected when building or combining shapes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Index {index} out of bounds for {vertex_count} vertices")]
    IndexOutOfBounds { index: u32, vertex_count: usize },
    #[error("Cannot combine {left:?} shape with {right:?} shape")]
    TopologyMismatch {
        left: PrimitiveTopology,
        right: PrimitiveTopology,
    },
}

/// Vertices and indices drawn with a single topology.
///
/// Every index is checked against the vertex count on construction, so a
/// `Shape` is always safe to upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Shape {
    topology: PrimitiveTopology,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Shape {
    pub fn new(
        topology: PrimitiveTopology,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
    ) -> Result<Self, GeometryError> {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(GeometryError::IndexOutOfBounds {
                index,
                vertex_count: vertices.len(),
            });
        }
        Ok(Self {
            topology,
            vertices,
            indices,
        })
    }

    /// A shape with no geometry
    pub fn empty(topology: PrimitiveTopology) -> Self {
        Self {
            topology,
            ..Default::default()
        }
    }

    /// Build from vertices drawn in order, indices `0..n`
    pub fn sequential(topology: PrimitiveTopology, vertices: Vec<Vertex>) -> Self {
        let indices = (0..vertices.len() as u32).collect();
        Self {
            topology,
            vertices,
            indices,
        }
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Vertex data as bytes, in upload order
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.iter().map(|v| v.position)
    }

    /// Concatenate two shapes of the same topology, re-basing `b`'s indices.
    pub fn combine(a: &Shape, b: &Shape) -> Result<Shape, GeometryError> {
        let mut out = a.clone();
        out.append(b)?;
        Ok(out)
    }

    /// Append `other` in place, re-basing its indices past our vertices
    pub fn append(&mut self, other: &Shape) -> Result<&mut Self, GeometryError> {
        if self.topology != other.topology {
            return Err(GeometryError::TopologyMismatch {
                left: self.topology,
                right: other.topology,
            });
        }
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
        Ok(self)
    }

    /// Transform positions and normals in place.
    ///
    /// `rotate` holds Euler angles in radians applied X, then Y, then Z.
    /// Normals go through the inverse transpose of the linear part and are
    /// re-normalized.
    pub fn transform(&mut self, translate: Vec3, rotate: Vec3, scale: Vec3) -> &mut Self {
        if translate == Vec3::ZERO && rotate == Vec3::ZERO && scale == Vec3::ONE {
            return self;
        }
        let rotation = Quat::from_euler(glam::EulerRot::ZYX, rotate.z, rotate.y, rotate.x);
        let model = Mat4::from_scale_rotation_translation(scale, rotation, translate);
        self.apply_matrix(&model)
    }

    /// Transform by an arbitrary affine matrix
    pub fn apply_matrix(&mut self, model: &Mat4) -> &mut Self {
        let normal_matrix = normal_matrix(model);
        for v in &mut self.vertices {
            v.position = model.transform_point3(v.position);
            v.normal = (normal_matrix * v.normal).try_normalize().unwrap_or(Vec3::Z);
        }
        self
    }

    /// Indices rewritten for a backend that cannot draw this topology natively
    pub fn lowered_indices(&self) -> (PrimitiveTopology, Vec<u32>) {
        self.topology.lower(&self.indices)
    }
}

/// Inverse transpose of the linear part, or the linear part itself when singular
pub(crate) fn normal_matrix(model: &Mat4) -> Mat3 {
    let linear = Mat3::from_mat4(*model);
    if linear.determinant().abs() < 1e-12 {
        linear
    } else {
        linear.inverse().transpose()
    }
}
