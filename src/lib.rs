//! Viewer Engine - the geometry and draw core of a real-time 3D viewer
//!
//! The engine packs many small objects into shared GPU vertex and index
//! buffers, groups them into as few state changes as possible per frame and
//! answers cursor picking queries against the same objects.
//!
//! Two backends implement the GPU contract:
//! - **wgpu**: buffers and copies on a real device, draws replayed into a host render pass
//! - **Headless**: CPU memory with a command log, for tools and tests
//!
//! # Features
//! - Bump-allocated buffer segments with in-place reuse and GPU-side growth
//! - Per-frame batching by shader, primitive and line/point state
//! - Cached world-space bounds per object
//! - Top-down picking, multi-select and dragging with selection overlays

pub mod backend;
pub mod geometry;
pub mod render;
pub mod scene;
pub mod selection;

pub use backend::{GraphicsBackend, HeadlessBackend, PrimitiveTopology, Vertex, WgpuBackend};
pub use geometry::{shapes, GeometryError, Shape};
pub use render::{BufferKind, RenderError, RenderParams, Renderer, ShaderLibrary};
pub use scene::{CameraFrame, Light, Object, Transform};
pub use selection::{PointerInput, SelectionController, SelectionEvent};

/// Initial capacity of one render buffer, in elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Vertices the buffer holds before it first grows
    pub max_vertices: u32,
    /// Indices the buffer holds before it first grows
    pub max_indices: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_vertices: 100_000,
            max_indices: 300_000,
        }
    }
}

/// Selection and overlay behaviour
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSettings {
    /// Clicking toggles object selection
    pub select_objects: bool,
    /// Holding the button on a selection drags it
    pub drag_objects: bool,
    /// Draw a point under the cursor
    pub show_cursor_point: bool,
    /// Draw corner brackets around selected objects
    pub show_targets: bool,
    /// Pick tolerance around every object, in pixels
    pub margin_pixels: f32,
    /// Gap between an object and its brackets, in pixels
    pub target_offset_pixels: f32,
    /// Bracket edge length as a fraction of camera distance
    pub target_edge_length: f32,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            select_objects: true,
            drag_objects: true,
            show_cursor_point: true,
            show_targets: true,
            margin_pixels: 2.0,
            target_offset_pixels: 10.0,
            target_edge_length: 0.02,
        }
    }
}

/// Configuration for initializing the viewer engine
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Buffer for objects that rarely change
    pub static_buffer: BufferConfig,
    /// Buffer for objects rewritten every frame
    pub dynamic_buffer: BufferConfig,
    /// Capacity multiplier applied when a buffer grows
    pub growth_factor: f32,
    /// Clear colour for the host's render pass
    pub background_colour: [f32; 3],
    pub selection: SelectionSettings,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            static_buffer: BufferConfig::default(),
            dynamic_buffer: BufferConfig {
                max_vertices: 10_000,
                max_indices: 30_000,
            },
            growth_factor: 1.5,
            background_colour: [0.21987, 0.34362, 0.40084],
            selection: SelectionSettings::default(),
        }
    }
}
