//! Light sources passed to shaders

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Uniform base illumination, no position or direction
    Ambient,
    /// Parallel rays, like the sun
    Directional,
    Point,
    Spot,
}

impl LightKind {
    fn gpu_id(self) -> f32 {
        match self {
            LightKind::Ambient => 0.0,
            LightKind::Directional => 1.0,
            LightKind::Point => 2.0,
            LightKind::Spot => 3.0,
        }
    }
}

/// A light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Option<Vec3>,
    pub direction: Option<Vec3>,
    pub colour: Vec3,
    pub intensity: f32,
    /// Constant, linear and quadratic falloff
    pub attenuation: Vec3,
    /// Spot cone angle in degrees
    pub cutoff: Option<f32>,
}

impl Light {
    pub fn new(kind: LightKind, colour: Vec3, intensity: f32) -> Self {
        Self {
            kind,
            position: None,
            direction: None,
            colour,
            intensity,
            attenuation: Vec3::new(1.0, 0.0, 0.0),
            cutoff: None,
        }
    }

    pub fn ambient(colour: Vec3, intensity: f32) -> Self {
        Self::new(LightKind::Ambient, colour, intensity)
    }

    /// Directional light shining from `position` towards `target`
    pub fn directional(position: Vec3, target: Vec3, colour: Vec3, intensity: f32) -> Self {
        Self::new(LightKind::Directional, colour, intensity).aimed(position, target)
    }

    pub fn point(position: Vec3, colour: Vec3, intensity: f32) -> Self {
        let mut light = Self::new(LightKind::Point, colour, intensity);
        light.position = Some(position);
        light
    }

    pub fn spot(position: Vec3, target: Vec3, cutoff: f32, colour: Vec3, intensity: f32) -> Self {
        let mut light = Self::new(LightKind::Spot, colour, intensity).aimed(position, target);
        light.cutoff = Some(cutoff);
        light
    }

    pub fn with_attenuation(mut self, constant: f32, linear: f32, quadratic: f32) -> Self {
        self.attenuation = Vec3::new(constant, linear, quadratic);
        self
    }

    /// Place the light and derive its direction from `position` to `target`
    pub fn aimed(mut self, position: Vec3, target: Vec3) -> Self {
        self.position = Some(position);
        if self.kind != LightKind::Ambient {
            self.direction = (target - position).try_normalize();
        }
        self
    }

    /// Pack for upload
    pub fn uniform(&self) -> LightUniform {
        let position = self.position.unwrap_or(Vec3::ZERO);
        let direction = self.direction.unwrap_or(Vec3::ZERO);
        let cutoff = self.cutoff.map_or(-1.0, |deg| deg.to_radians().cos());
        LightUniform {
            position_type: position.extend(self.kind.gpu_id()),
            direction_cutoff: direction.extend(cutoff),
            colour_intensity: self.colour.extend(self.intensity),
            attenuation: self.attenuation.extend(0.0),
        }
    }
}

/// GPU-friendly light data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    /// xyz = position, w = kind (0 ambient, 1 directional, 2 point, 3 spot)
    pub position_type: Vec4,
    /// xyz = direction, w = cos(cutoff) or -1 without a cone
    pub direction_cutoff: Vec4,
    /// xyz = colour, w = intensity
    pub colour_intensity: Vec4,
    /// xyz = constant, linear, quadratic
    pub attenuation: Vec4,
}

/// Main light from the top right, ambient base and a cool fill from the opposite side
pub fn default_lighting() -> Vec<Light> {
    vec![
        Light::directional(
            Vec3::new(10.0, 10.0, 10.0),
            Vec3::ZERO,
            Vec3::new(1.0, 0.95, 0.8),
            0.4,
        ),
        Light::ambient(Vec3::ONE, 0.7),
        Light::directional(
            Vec3::new(-5.0, 5.0, -5.0),
            Vec3::ZERO,
            Vec3::new(0.8, 0.9, 1.0),
            0.3,
        ),
    ]
}
