//! Vertex and shape model

pub mod shape;
pub mod shapes;

pub use shape::{GeometryError, Shape};
