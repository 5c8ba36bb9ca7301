//! Per-frame camera input

use glam::{Mat4, Vec3};

/// View and projection for one frame, produced by the host's camera.
///
/// The engine never derives these itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl Default for CameraFrame {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

impl CameraFrame {
    pub fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        Self {
            view,
            projection,
            position,
        }
    }

    /// Right-handed perspective camera looking at `target`
    pub fn look_at(position: Vec3, target: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(position, target, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, 0.1, 1000.0),
            position,
        }
    }

    /// Top-down orthographic camera over the XY plane
    pub fn top_down(centre: Vec3, width: f32, height: f32) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        let position = centre + Vec3::Z * 100.0;
        Self {
            view: Mat4::look_at_rh(position, centre, Vec3::Y),
            projection: Mat4::orthographic_rh(-hw, hw, -hh, hh, 0.1, 1000.0),
            position,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_down_maps_extent_to_clip_edges() {
        let camera = CameraFrame::top_down(Vec3::ZERO, 12.0, 8.0);
        let vp = camera.view_projection();

        let centre = vp.project_point3(Vec3::ZERO);
        assert!(centre.x.abs() < 1e-6 && centre.y.abs() < 1e-6);
        let corner = vp.project_point3(Vec3::new(6.0, 4.0, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
    }
}
