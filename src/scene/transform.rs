//! Object transform

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Translate, Euler rotate and scale of an object.
///
/// Rotation angles are in radians and applied X first, then Y, then Z;
/// the model matrix applies scale, then rotation, then translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translate: Vec3,
    pub rotate: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translate: Vec3::ZERO,
            rotate: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new(translate: Vec3, rotate: Vec3, scale: Vec3) -> Self {
        Self {
            translate,
            rotate,
            scale,
        }
    }

    pub fn from_translate(translate: Vec3) -> Self {
        Self {
            translate,
            ..Default::default()
        }
    }

    pub fn with_rotate(mut self, rotate: Vec3) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::ZYX, self.rotate.z, self.rotate.y, self.rotate.x)
    }

    /// Get the model matrix for this transform
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation(), self.translate)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.matrix().transform_point3(point)
    }
}
