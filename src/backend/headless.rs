//! Headless backend keeping buffer contents in CPU memory
//!
//! Used by tests and tools that need the engine without a GPU. Buffers are
//! plain byte vectors, copies are real copies, and every recorded command is
//! kept in a log that callers can inspect.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::ops::Range;

/// A command recorded by [`HeadlessBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BindGeometry {
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        stride: u64,
    },
    UnbindGeometry,
    BindShader(ShaderId),
    SetLineWidth(f32),
    SetPointSize(f32),
    DrawIndexed {
        topology: PrimitiveTopology,
        indices: Range<u32>,
        base_vertex: i32,
    },
}

/// CPU-memory implementation of [`GraphicsBackend`]
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    buffers: HashMap<u64, Vec<u8>>,
    next_buffer_id: u64,
    memory_budget: Option<u64>,
    native_loops_and_fans: bool,
    commands: Vec<Command>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            native_loops_and_fans: true,
            ..Default::default()
        }
    }

    /// Fail buffer creation with `OutOfMemory` once live buffers would exceed `bytes`
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Behave like a backend without line-loop and triangle-fan support
    pub fn without_loops_and_fans(mut self) -> Self {
        self.native_loops_and_fans = false;
        self
    }

    pub fn set_memory_budget(&mut self, bytes: Option<u64>) {
        self.memory_budget = bytes;
    }

    /// Current contents of a buffer
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(Vec::as_slice)
    }

    /// Number of live buffers
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Bytes held by live buffers
    pub fn allocated_bytes(&self) -> u64 {
        self.buffers.values().map(|b| b.len() as u64).sum()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .count()
    }

    pub fn shader_bind_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::BindShader(_)))
            .count()
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        if let Some(budget) = self.memory_budget {
            if self.allocated_bytes() + desc.size > budget {
                log::warn!(
                    "Headless budget exhausted creating {:?} ({} bytes)",
                    desc.label,
                    desc.size
                );
                return Err(BackendError::OutOfMemory);
            }
        }

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.buffers.insert(id, vec![0; desc.size as usize]);

        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let Some(buf) = self.buffers.get_mut(&buffer.0) else {
            log::warn!("Write to unknown buffer {:?}", buffer);
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= buf.len(),
            "write of {} bytes at {} overruns buffer of {} bytes",
            data.len(),
            offset,
            buf.len()
        );
        buf[start..end].copy_from_slice(data);
    }

    fn copy_buffer_to_buffer(
        &mut self,
        src: BufferHandle,
        src_offset: u64,
        dst: BufferHandle,
        dst_offset: u64,
        size: u64,
    ) -> BackendResult<()> {
        let source = self
            .buffers
            .get(&src.0)
            .ok_or(BackendError::InvalidBuffer(src))?;
        let (start, end) = (src_offset as usize, (src_offset + size) as usize);
        if end > source.len() {
            return Err(BackendError::CopyFailed(format!(
                "source range {start}..{end} exceeds {} bytes",
                source.len()
            )));
        }
        let bytes = source[start..end].to_vec();

        let target = self
            .buffers
            .get_mut(&dst.0)
            .ok_or(BackendError::InvalidBuffer(dst))?;
        let (start, end) = (dst_offset as usize, (dst_offset + size) as usize);
        if end > target.len() {
            return Err(BackendError::CopyFailed(format!(
                "destination range {start}..{end} exceeds {} bytes",
                target.len()
            )));
        }
        target[start..end].copy_from_slice(&bytes);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn supports_topology(&self, topology: PrimitiveTopology) -> bool {
        self.native_loops_and_fans
            || !matches!(
                topology,
                PrimitiveTopology::LineLoop | PrimitiveTopology::TriangleFan
            )
    }

    fn bind_geometry(
        &mut self,
        vertex_buffer: BufferHandle,
        layout: &VertexBufferLayout,
        index_buffer: BufferHandle,
        _format: IndexFormat,
    ) {
        self.commands.push(Command::BindGeometry {
            vertex_buffer,
            index_buffer,
            stride: layout.array_stride,
        });
    }

    fn begin_frame(&mut self) {
        self.commands.clear();
    }

    fn unbind_geometry(&mut self) {
        self.commands.push(Command::UnbindGeometry);
    }

    fn bind_shader(&mut self, shader: ShaderId) {
        self.commands.push(Command::BindShader(shader));
    }

    fn set_line_width(&mut self, width: f32) {
        self.commands.push(Command::SetLineWidth(width));
    }

    fn set_point_size(&mut self, size: f32) {
        self.commands.push(Command::SetPointSize(size));
    }

    fn draw_indexed(&mut self, topology: PrimitiveTopology, indices: Range<u32>, base_vertex: i32) {
        self.commands.push(Command::DrawIndexed {
            topology,
            indices,
            base_vertex,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(size: u64) -> BufferDescriptor {
        BufferDescriptor {
            label: Some("test".into()),
            size,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
        }
    }

    #[test]
    fn copy_moves_bytes_between_buffers() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_buffer(&desc(8)).unwrap();
        let b = backend.create_buffer(&desc(16)).unwrap();
        backend.write_buffer(a, 0, &[1, 2, 3, 4, 5, 6, 7, 8]);
        backend.copy_buffer_to_buffer(a, 0, b, 4, 8).unwrap();
        assert_eq!(
            backend.buffer_data(b).unwrap(),
            &[0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0]
        );
    }

    #[test]
    fn budget_rejects_oversized_buffers() {
        let mut backend = HeadlessBackend::new().with_memory_budget(32);
        assert!(backend.create_buffer(&desc(24)).is_ok());
        assert!(matches!(
            backend.create_buffer(&desc(16)),
            Err(BackendError::OutOfMemory)
        ));
        assert_eq!(backend.buffer_count(), 1);
    }

    #[test]
    #[should_panic(expected = "overruns buffer")]
    fn overrunning_write_panics() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_buffer(&desc(4)).unwrap();
        backend.write_buffer(a, 2, &[0; 4]);
    }
}
