//! Shader contract and the library that owns the registered programs
//!
//! The engine never sees shader source or uniform locations. It calls the
//! narrow [`Shader`] contract when the active program changes and per drawn
//! object.

use crate::backend::types::PrimitiveTopology;
use crate::scene::LightUniform;
use glam::{Mat4, Vec3};
use std::cell::RefCell;
use std::rc::Rc;

pub use crate::backend::traits::ShaderId;

/// How a point primitive is rasterized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum PointShape {
    #[default]
    Circle = 0,
    Square = 1,
    Triangle = 2,
}

/// Uniform-level operations the engine needs from a shader program
pub trait Shader {
    /// Make this program current
    fn use_program(&mut self);
    fn set_model_matrix(&mut self, model: &Mat4);
    fn set_view_matrix(&mut self, view: &Mat4);
    fn set_projection_matrix(&mut self, projection: &Mat4);
    fn set_view_position(&mut self, position: Vec3);
    fn set_light_uniforms(&mut self, lights: &[LightUniform]);
    fn set_alpha(&mut self, alpha: f32);
    /// Only called for point batches
    fn set_point_shape(&mut self, shape: PointShape);
}

/// Registered shaders plus the defaults used when an object names none
#[derive(Default)]
pub struct ShaderLibrary {
    shaders: Vec<Box<dyn Shader>>,
    default_shader: Option<ShaderId>,
    point_shader: Option<ShaderId>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shader. The first one registered becomes the default.
    pub fn register(&mut self, shader: Box<dyn Shader>) -> ShaderId {
        let id = ShaderId(self.shaders.len() as u32);
        self.shaders.push(shader);
        if self.default_shader.is_none() {
            self.default_shader = Some(id);
        }
        id
    }

    /// Shader used for objects without an explicit one
    pub fn set_default(&mut self, id: ShaderId) {
        if self.contains(id) {
            self.default_shader = Some(id);
        } else {
            log::warn!("Ignoring unknown default shader {:?}", id);
        }
    }

    /// Shader used for point primitives without an explicit one
    pub fn set_point_default(&mut self, id: ShaderId) {
        if self.contains(id) {
            self.point_shader = Some(id);
        } else {
            log::warn!("Ignoring unknown point shader {:?}", id);
        }
    }

    pub fn contains(&self, id: ShaderId) -> bool {
        id.index() < self.shaders.len()
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn get_mut(&mut self, id: ShaderId) -> Option<&mut (dyn Shader + 'static)> {
        self.shaders.get_mut(id.index()).map(|s| s.as_mut())
    }

    /// Pick the shader for a draw: an explicit valid choice wins, then the
    /// point default for points, then the general default.
    pub fn resolve(&self, requested: Option<ShaderId>, topology: PrimitiveTopology) -> Option<ShaderId> {
        if let Some(id) = requested {
            if self.contains(id) {
                return Some(id);
            }
            log::warn!("Unknown shader {:?}, falling back to default", id);
        }
        if topology.is_point() {
            if let Some(id) = self.point_shader {
                return Some(id);
            }
        }
        self.default_shader
    }
}

/// Counters kept by [`RecordingShader`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderCalls {
    pub uses: usize,
    pub view_uploads: usize,
    pub projection_uploads: usize,
    pub view_position_uploads: usize,
    pub light_uploads: usize,
    pub lights_last_uploaded: usize,
    pub model_matrices: Vec<Mat4>,
    pub alphas: Vec<f32>,
    pub point_shapes: Vec<PointShape>,
}

/// Shader that only records the calls it receives.
///
/// Stands in for a real program in headless runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingShader {
    calls: Rc<RefCell<ShaderCalls>>,
}

impl RecordingShader {
    /// A shader and a handle to its call log
    pub fn new() -> (Self, Rc<RefCell<ShaderCalls>>) {
        let shader = Self::default();
        let calls = shader.calls.clone();
        (shader, calls)
    }
}

impl Shader for RecordingShader {
    fn use_program(&mut self) {
        self.calls.borrow_mut().uses += 1;
    }

    fn set_model_matrix(&mut self, model: &Mat4) {
        self.calls.borrow_mut().model_matrices.push(*model);
    }

    fn set_view_matrix(&mut self, _view: &Mat4) {
        self.calls.borrow_mut().view_uploads += 1;
    }

    fn set_projection_matrix(&mut self, _projection: &Mat4) {
        self.calls.borrow_mut().projection_uploads += 1;
    }

    fn set_view_position(&mut self, _position: Vec3) {
        self.calls.borrow_mut().view_position_uploads += 1;
    }

    fn set_light_uniforms(&mut self, lights: &[LightUniform]) {
        let mut calls = self.calls.borrow_mut();
        calls.light_uploads += 1;
        calls.lights_last_uploaded = lights.len();
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.calls.borrow_mut().alphas.push(alpha);
    }

    fn set_point_shape(&mut self, shape: PointShape) {
        self.calls.borrow_mut().point_shapes.push(shape);
    }
}
