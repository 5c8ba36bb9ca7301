//! Scene-side types: objects, transforms, lights and camera input

mod camera;
mod light;
pub mod object;
mod transform;

pub use camera::*;
pub use light::*;
pub use object::{Bounds, BufferSegment, DrawAttributes, Object, ObjectId, ShapeSlot};
pub use transform::*;
