//! wgpu backend implementation
//!
//! Buffers live on the device, writes go through the queue and copies are
//! submitted immediately. Draw commands are buffered and replayed into a
//! render pass owned by the caller, which also owns the pipelines.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::ops::Range;

/// Buffered draw command
#[derive(Clone, Debug)]
enum RenderCommand {
    SetGeometry {
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        format: IndexFormat,
    },
    ClearGeometry,
    SetShader(ShaderId),
    DrawIndexed {
        topology: PrimitiveTopology,
        indices: Range<u32>,
        base_vertex: i32,
    },
}

/// wgpu backend implementation
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    buffers: HashMap<u64, wgpu::Buffer>,
    next_buffer_id: u64,

    commands: Vec<RenderCommand>,
}

impl WgpuBackend {
    fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
        let mut result = wgpu::BufferUsages::empty();
        if usage.contains(BufferUsage::COPY_SRC) {
            result |= wgpu::BufferUsages::COPY_SRC;
        }
        if usage.contains(BufferUsage::COPY_DST) {
            result |= wgpu::BufferUsages::COPY_DST;
        }
        if usage.contains(BufferUsage::INDEX) {
            result |= wgpu::BufferUsages::INDEX;
        }
        if usage.contains(BufferUsage::VERTEX) {
            result |= wgpu::BufferUsages::VERTEX;
        }
        result
    }

    fn convert_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
        match format {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }

    fn convert_index_format(format: IndexFormat) -> wgpu::IndexFormat {
        match format {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }

    /// Map a topology to the wgpu one. Loops and fans have no wgpu
    /// counterpart and must be lowered before they get here.
    pub fn convert_topology(topology: PrimitiveTopology) -> Option<wgpu::PrimitiveTopology> {
        match topology {
            PrimitiveTopology::PointList => Some(wgpu::PrimitiveTopology::PointList),
            PrimitiveTopology::LineList => Some(wgpu::PrimitiveTopology::LineList),
            PrimitiveTopology::LineStrip => Some(wgpu::PrimitiveTopology::LineStrip),
            PrimitiveTopology::TriangleList => Some(wgpu::PrimitiveTopology::TriangleList),
            PrimitiveTopology::LineLoop | PrimitiveTopology::TriangleFan => None,
        }
    }

    /// Vertex attributes for building pipelines against [`Vertex::layout`]
    pub fn vertex_attributes(layout: &VertexBufferLayout) -> Vec<wgpu::VertexAttribute> {
        layout
            .attributes
            .iter()
            .map(|attr| wgpu::VertexAttribute {
                format: Self::convert_vertex_format(attr.format),
                offset: attr.offset,
                shader_location: attr.location,
            })
            .collect()
    }

    /// Create a backend on an adapter with no surface attached
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new_headless() -> BackendResult<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        Ok(Self::from_device(device, queue))
    }

    /// Wrap a device and queue created elsewhere, e.g. by a windowing layer
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: HashMap::new(),
            next_buffer_id: 0,
            commands: Vec::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Look up the wgpu buffer behind a handle
    pub fn buffer(&self, handle: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&handle.0)
    }

    /// Number of buffered draw commands
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Replay buffered commands into a render pass.
    ///
    /// `pipeline_for` maps a shader and topology to the pipeline to use;
    /// draws without a pipeline are skipped.
    pub fn replay<'a, F>(&'a self, pass: &mut wgpu::RenderPass<'a>, pipeline_for: F)
    where
        F: Fn(ShaderId, PrimitiveTopology) -> Option<&'a wgpu::RenderPipeline>,
    {
        let mut shader = None;
        let mut bound_pipeline: Option<(ShaderId, PrimitiveTopology)> = None;

        for cmd in &self.commands {
            match cmd {
                RenderCommand::SetGeometry {
                    vertex_buffer,
                    index_buffer,
                    format,
                } => {
                    if let (Some(vb), Some(ib)) = (
                        self.buffers.get(&vertex_buffer.0),
                        self.buffers.get(&index_buffer.0),
                    ) {
                        pass.set_vertex_buffer(0, vb.slice(..));
                        pass.set_index_buffer(ib.slice(..), Self::convert_index_format(*format));
                    }
                }
                RenderCommand::ClearGeometry => {}
                RenderCommand::SetShader(id) => shader = Some(*id),
                RenderCommand::DrawIndexed {
                    topology,
                    indices,
                    base_vertex,
                } => {
                    let Some(id) = shader else {
                        log::warn!("Draw replayed with no shader bound");
                        continue;
                    };
                    if bound_pipeline != Some((id, *topology)) {
                        let Some(pipeline) = pipeline_for(id, *topology) else {
                            log::warn!("No pipeline for {:?} with {:?}", id, topology);
                            continue;
                        };
                        pass.set_pipeline(pipeline);
                        bound_pipeline = Some((id, *topology));
                    }
                    pass.draw_indexed(indices.clone(), *base_vertex, 0..1);
                }
            }
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: Self::convert_buffer_usage(desc.usage),
            mapped_at_creation: false,
        });

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!("Buffer {:?} allocation failed: {}", desc.label, err);
            buffer.destroy();
            return Err(BackendError::OutOfMemory);
        }
        #[cfg(target_arch = "wasm32")]
        drop(self.device.pop_error_scope());

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.buffers.insert(id, buffer);

        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(buf) = self.buffers.get(&buffer.0) {
            assert!(
                offset + data.len() as u64 <= buf.size(),
                "write of {} bytes at {} overruns buffer of {} bytes",
                data.len(),
                offset,
                buf.size()
            );
            self.queue.write_buffer(buf, offset, data);
        }
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
        let target = self
            .buffers
            .get(&dst.0)
            .ok_or(BackendError::InvalidBuffer(dst))?;

        if src_offset + size > source.size() || dst_offset + size > target.size() {
            return Err(BackendError::CopyFailed(format!(
                "{} bytes do not fit {}..{} -> {}..{}",
                size,
                src_offset,
                source.size(),
                dst_offset,
                target.size()
            )));
        }
        if size == 0 {
            return Ok(());
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Buffer Growth Copy"),
            });
        encoder.copy_buffer_to_buffer(source, src_offset, target, dst_offset, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buf) = self.buffers.remove(&buffer.0) {
            buf.destroy();
        }
    }

    fn supports_topology(&self, topology: PrimitiveTopology) -> bool {
        Self::convert_topology(topology).is_some()
    }

    fn bind_geometry(
        &mut self,
        vertex_buffer: BufferHandle,
        _layout: &VertexBufferLayout,
        index_buffer: BufferHandle,
        format: IndexFormat,
    ) {
        self.commands.push(RenderCommand::SetGeometry {
            vertex_buffer,
            index_buffer,
            format,
        });
    }

    fn begin_frame(&mut self) {
        self.commands.clear();
    }

    fn unbind_geometry(&mut self) {
        self.commands.push(RenderCommand::ClearGeometry);
    }

    fn bind_shader(&mut self, shader: ShaderId) {
        self.commands.push(RenderCommand::SetShader(shader));
    }

    fn set_line_width(&mut self, width: f32) {
        // wgpu rasterizes lines one pixel wide
        if width != 1.0 {
            log::debug!("Line width {} ignored by wgpu backend", width);
        }
    }

    fn set_point_size(&mut self, size: f32) {
        if size != 1.0 {
            log::debug!("Point size {} ignored by wgpu backend", size);
        }
    }

    fn draw_indexed(&mut self, topology: PrimitiveTopology, indices: Range<u32>, base_vertex: i32) {
        self.commands.push(RenderCommand::DrawIndexed {
            topology,
            indices,
            base_vertex,
        });
    }
}
