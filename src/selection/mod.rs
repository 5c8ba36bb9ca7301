//! Picking, selection and dragging in top-down views

mod controller;
mod drag;
mod pick;

pub use controller::{
    PointerInput, SelectionController, SelectionEvent, SelectionPhase, CURSOR_POINT, SELECTION_TARGETS,
};
pub use drag::DragSession;
pub use pick::{inflated_bounds, pick, PickParams};
