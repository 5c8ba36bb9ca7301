//! Cursor picking against cached object bounds

use crate::scene::{Bounds, Object};
use glam::Vec3;

/// Screen-to-world scale for one pick query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickParams {
    /// World units covered by one screen pixel
    pub world_per_pixel: f32,
    /// Tolerance around every object, in pixels
    pub margin_pixels: f32,
}

impl PickParams {
    pub fn new(world_per_pixel: f32, margin_pixels: f32) -> Self {
        Self {
            world_per_pixel,
            margin_pixels,
        }
    }

    /// Margin in world units
    pub fn margin(&self) -> f32 {
        self.world_per_pixel * self.margin_pixels
    }
}

/// World bounds grown by the pick margin, plus half the point footprint for
/// point objects. `None` for objects without geometry.
pub fn inflated_bounds(object: &Object, params: &PickParams) -> Option<Bounds> {
    let bounds = object.get_bounds()?;
    let mut pad = params.margin();
    if object.is_point() {
        pad += params.world_per_pixel * object.attributes().point_size / 2.0;
    }
    Some(bounds.inflate(Vec3::splat(pad)))
}

/// The selectable object under `cursor`, tested in XY only.
///
/// Overlapping hits resolve to the one whose bounds midpoint is nearest.
pub fn pick<'a, K>(
    candidates: impl IntoIterator<Item = (K, &'a Object)>,
    cursor: Vec3,
    params: &PickParams,
) -> Option<K> {
    candidates
        .into_iter()
        .filter(|(_, object)| object.is_selectable())
        .filter_map(|(key, object)| {
            let bounds = inflated_bounds(object, params)?;
            bounds
                .contains_xy(cursor)
                .then(|| (key, cursor.distance(bounds.midpoint())))
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(key, _)| key)
}
