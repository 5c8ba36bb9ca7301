//! Renderable objects and their cached world bounds

use crate::backend::traits::ShaderId;
use crate::backend::types::PrimitiveTopology;
use crate::geometry::Shape;
use crate::render::shader::PointShape;
use crate::scene::transform::Transform;
use glam::{Mat4, Vec3};
use slotmap::new_key_type;
use std::cell::Cell;

new_key_type! {
    /// Generation-checked handle to an object inside a render buffer
    pub struct ObjectId;
}

/// A reservation inside the shared vertex and index buffers.
///
/// Offsets and capacities are counted in vertices and indices, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSegment {
    pub vertex_offset: u32,
    pub index_offset: u32,
    pub vertex_capacity: u32,
    pub index_capacity: u32,
}

impl BufferSegment {
    pub fn fits(&self, vertex_count: usize, index_count: usize) -> bool {
        vertex_count <= self.vertex_capacity as usize && index_count <= self.index_capacity as usize
    }
}

/// One shape of an object and where it lives in the shared buffers
#[derive(Debug, Clone, Default)]
pub struct ShapeSlot {
    pub shape: Option<Shape>,
    pub segment: Option<BufferSegment>,
    /// Topology actually uploaded, after any lowering for the backend
    pub draw_topology: PrimitiveTopology,
    /// Number of indices uploaded for the current shape
    pub draw_index_count: u32,
}

impl ShapeSlot {
    /// Whether this slot has something to draw
    pub fn is_drawable(&self) -> bool {
        self.segment.is_some()
            && self.draw_index_count > 0
            && self.shape.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// Per-object draw state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawAttributes {
    pub line_width: f32,
    pub point_size: f32,
    pub point_shape: PointShape,
    pub alpha: f32,
    /// Shader override; `None` picks the library default for the topology
    pub shader: Option<ShaderId>,
}

impl Default for DrawAttributes {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            point_size: 1.0,
            point_shape: PointShape::Circle,
            alpha: 1.0,
            shader: None,
        }
    }
}

/// Axis-aligned bounds in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tightest bounds around a set of points, `None` when empty
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Bounds::new(p, p),
                Some(b) => Bounds::new(b.min.min(p), b.max.max(p)),
            })
        })
    }

    pub fn midpoint(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Grow by `amount` on every side
    pub fn inflate(&self, amount: Vec3) -> Self {
        Self::new(self.min - amount, self.max + amount)
    }

    /// 2-D containment test; z is ignored
    pub fn contains_xy(&self, point: Vec3) -> bool {
        self.min.x <= point.x && point.x <= self.max.x && self.min.y <= point.y && point.y <= self.max.y
    }

    /// Transform both corners and re-sort them per axis
    pub fn transformed(&self, model: &Mat4) -> Self {
        let a = model.transform_point3(self.min);
        let b = model.transform_point3(self.max);
        Self::new(a.min(b), a.max(b))
    }
}

/// A renderable unit: shapes, a transform and draw attributes
#[derive(Debug)]
pub struct Object {
    name: String,
    slots: Vec<ShapeSlot>,
    transform: Transform,
    model: Mat4,
    attributes: DrawAttributes,
    selectable: bool,
    selected: bool,

    bounds: Cell<Option<Bounds>>,
    bounds_dirty: Cell<bool>,
}

impl Object {
    pub fn new(name: impl Into<String>, transform: Transform, attributes: DrawAttributes) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            model: transform.matrix(),
            transform,
            attributes,
            selectable: true,
            selected: false,
            bounds: Cell::new(None),
            bounds_dirty: Cell::new(true),
        }
    }

    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn translate(&self) -> Vec3 {
        self.transform.translate
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.model
    }

    /// Replace translate, rotate and scale
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.model = transform.matrix();
        self.bounds_dirty.set(true);
    }

    /// Move without recomputing rotation and scale
    pub fn set_translate(&mut self, translate: Vec3) {
        self.transform.translate = translate;
        self.model.w_axis = translate.extend(1.0);
        self.bounds_dirty.set(true);
    }

    pub fn attributes(&self) -> &DrawAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut DrawAttributes {
        &mut self.attributes
    }

    pub fn slots(&self) -> &[ShapeSlot] {
        &self.slots
    }

    /// Mutable slots; any change may move the bounds
    pub(crate) fn slots_mut(&mut self) -> &mut Vec<ShapeSlot> {
        self.bounds_dirty.set(true);
        &mut self.slots
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.slots.iter().filter_map(|slot| slot.shape.as_ref())
    }

    /// True when at least one slot holds vertex data
    pub fn has_geometry(&self) -> bool {
        self.shapes().any(|s| s.vertex_count() > 0)
    }

    /// World-space bounds of all shapes, `None` without any vertex data.
    ///
    /// Cached until the next transform or shape change.
    pub fn get_bounds(&self) -> Option<Bounds> {
        if self.bounds_dirty.get() {
            let local = Bounds::from_points(self.shapes().flat_map(Shape::positions));
            self.bounds.set(local.map(|b| b.transformed(&self.model)));
            self.bounds_dirty.set(false);
        }
        self.bounds.get()
    }

    pub fn get_midpoint(&self) -> Option<Vec3> {
        self.get_bounds().map(|b| b.midpoint())
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
        if !selectable {
            self.selected = false;
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn select(&mut self) {
        if self.selectable {
            self.selected = true;
        }
    }

    pub fn deselect(&mut self) {
        if self.selectable {
            self.selected = false;
        }
    }

    pub fn toggle_select(&mut self) {
        if self.selectable {
            self.selected = !self.selected;
        }
    }

    /// True if any shape is drawn as points
    pub fn is_point(&self) -> bool {
        self.shapes().any(|s| s.topology().is_point())
    }
}
