//! Core backend abstraction traits
//!
//! The geometry engine talks to the GPU only through [`GraphicsBackend`]:
//! buffer creation, sub-range writes, GPU-side copies and indexed draws.

use crate::backend::types::*;
use std::ops::Range;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Buffer copy failed: {0}")]
    CopyFailed(String),
    #[error("Invalid buffer handle {0:?}")]
    InvalidBuffer(BufferHandle),
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a shader program registered with a [`ShaderLibrary`](crate::render::ShaderLibrary)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub(crate) u32);

impl ShaderId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Narrow GPU contract used by the buffer allocator and the batch renderer.
pub trait GraphicsBackend {
    /// Create a buffer. Contents are undefined until written.
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Write data to a sub-range of a buffer
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Copy `size` bytes between buffers on the GPU timeline
    fn copy_buffer_to_buffer(
        &mut self,
        src: BufferHandle,
        src_offset: u64,
        dst: BufferHandle,
        dst_offset: u64,
        size: u64,
    ) -> BackendResult<()>;

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Whether the topology can be drawn natively
    fn supports_topology(&self, _topology: PrimitiveTopology) -> bool {
        true
    }

    // Command recording

    /// Start recording a new frame, dropping anything recorded for the last one
    fn begin_frame(&mut self) {}

    /// Bind the shared vertex and index buffers for the following draws
    fn bind_geometry(
        &mut self,
        vertex_buffer: BufferHandle,
        layout: &VertexBufferLayout,
        index_buffer: BufferHandle,
        format: IndexFormat,
    );

    /// Unbind whatever [`bind_geometry`](Self::bind_geometry) bound
    fn unbind_geometry(&mut self) {}

    /// Make a shader program current on the backend side
    fn bind_shader(&mut self, _shader: ShaderId) {}

    /// Rasterized line width for line topologies
    fn set_line_width(&mut self, width: f32);

    /// Rasterized point size for point topologies
    fn set_point_size(&mut self, size: f32);

    /// Draw indexed primitives from the bound index buffer
    fn draw_indexed(&mut self, topology: PrimitiveTopology, indices: Range<u32>, base_vertex: i32);
}
