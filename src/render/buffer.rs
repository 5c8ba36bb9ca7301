//! Shared vertex/index buffers and the segment allocator over them
//!
//! A [`RenderBuffer`] owns one GPU vertex buffer and one GPU index buffer and
//! hands out contiguous segments to the shapes of its objects. Allocation is
//! a watermark bump; when a request does not fit, both buffers grow and the
//! used range is copied across on the GPU. Segments freed by shape growth or
//! object removal go to a dangling list and are not reclaimed.

use crate::backend::traits::{BufferHandle, GraphicsBackend};
use crate::backend::types::{BufferDescriptor, BufferUsage, IndexFormat, PrimitiveTopology, Vertex};
use crate::geometry::Shape;
use crate::render::RenderError;
use crate::scene::{BufferSegment, Object, ObjectId, ShapeSlot};
use crate::BufferConfig;
use slotmap::SlotMap;
use std::fmt;

const INDEX_FORMAT: IndexFormat = IndexFormat::Uint32;

/// Which of the renderer's buffers an object lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferKind {
    /// Objects that rarely change
    #[default]
    Static,
    /// Objects rewritten most frames
    Dynamic,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferKind::Static => write!(f, "static"),
            BufferKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Segment allocator over a pair of shared GPU buffers
pub struct RenderBuffer {
    kind: BufferKind,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    max_vertices: u32,
    max_indices: u32,
    current_vertex: u32,
    current_index: u32,
    growth_factor: f32,

    objects: SlotMap<ObjectId, Object>,
    dangling: Vec<BufferSegment>,
    last_draw_calls: usize,
}

/// A shape with its segment reserved but not yet written
struct Placement {
    shape: Shape,
    draw_topology: PrimitiveTopology,
    indices: Vec<u32>,
    segment: Option<BufferSegment>,
    /// Segment was taken from the watermark rather than reused
    fresh: bool,
}

impl RenderBuffer {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        kind: BufferKind,
        config: &BufferConfig,
        growth_factor: f32,
    ) -> Result<Self, RenderError> {
        let max_vertices = config.max_vertices.max(1);
        let max_indices = config.max_indices.max(1);
        let (vertex_buffer, index_buffer) =
            Self::create_buffers(backend, kind, max_vertices, max_indices)?;

        log::debug!(
            "Created {} buffer: {} vertices, {} indices",
            kind,
            max_vertices,
            max_indices
        );

        Ok(Self {
            kind,
            vertex_buffer,
            index_buffer,
            max_vertices,
            max_indices,
            current_vertex: 0,
            current_index: 0,
            growth_factor: growth_factor.max(1.0),
            objects: SlotMap::with_key(),
            dangling: Vec::new(),
            last_draw_calls: 0,
        })
    }

    /// Create a vertex/index buffer pair, destroying the first if the second fails
    fn create_buffers(
        backend: &mut dyn GraphicsBackend,
        kind: BufferKind,
        vertices: u32,
        indices: u32,
    ) -> Result<(BufferHandle, BufferHandle), RenderError> {
        let vertex_buffer = backend.create_buffer(&BufferDescriptor {
            label: Some(format!("{kind} vertex buffer")),
            size: vertices as u64 * Vertex::STRIDE,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
        })?;

        let index_buffer = backend.create_buffer(&BufferDescriptor {
            label: Some(format!("{kind} index buffer")),
            size: indices as u64 * INDEX_FORMAT.size(),
            usage: BufferUsage::INDEX | BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
        });

        match index_buffer {
            Ok(index_buffer) => Ok((vertex_buffer, index_buffer)),
            Err(e) => {
                backend.destroy_buffer(vertex_buffer);
                Err(e.into())
            }
        }
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> BufferHandle {
        self.index_buffer
    }

    pub fn index_format(&self) -> IndexFormat {
        INDEX_FORMAT
    }

    /// Vertex and index capacity
    pub fn capacity(&self) -> (u32, u32) {
        (self.max_vertices, self.max_indices)
    }

    /// Vertex and index watermarks
    pub fn watermark(&self) -> (u32, u32) {
        (self.current_vertex, self.current_index)
    }

    /// Segments released and not reused
    pub fn dangling(&self) -> &[BufferSegment] {
        &self.dangling
    }

    pub fn add_object(&mut self, object: Object) -> ObjectId {
        let id = self.objects.insert(object);
        log::debug!("Added object {:?} to {} buffer", id, self.kind);
        id
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut Object)> {
        self.objects.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop an object and move its segments to the dangling list
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Object> {
        let object = self.objects.remove(id)?;
        let freed: Vec<BufferSegment> = object.slots().iter().filter_map(|s| s.segment).collect();
        log::debug!(
            "Removed object {:?} from {} buffer, {} segments dangling",
            id,
            self.kind,
            freed.len()
        );
        self.dangling.extend(freed);
        Some(object)
    }

    /// Reserve room for `vertex_count` vertices and `index_count` indices at
    /// the watermark, growing both buffers first if they are too small.
    pub fn allocate_segment(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        vertex_count: u32,
        index_count: u32,
    ) -> Result<BufferSegment, RenderError> {
        let needed_vertices = self.current_vertex as u64 + vertex_count as u64;
        let needed_indices = self.current_index as u64 + index_count as u64;

        if needed_vertices > self.max_vertices as u64 || needed_indices > self.max_indices as u64 {
            let grown = |needed: u64, capacity: u32| -> Result<u32, RenderError> {
                let target = (needed as f64 * self.growth_factor as f64).ceil() as u64;
                u32::try_from(target.max(capacity as u64)).map_err(|_| RenderError::CapacityExceeded)
            };
            let new_vertices = grown(needed_vertices, self.max_vertices)?;
            let new_indices = grown(needed_indices, self.max_indices)?;
            self.grow(backend, new_vertices, new_indices)?;
        }

        let segment = BufferSegment {
            vertex_offset: self.current_vertex,
            index_offset: self.current_index,
            vertex_capacity: vertex_count,
            index_capacity: index_count,
        };
        self.current_vertex += vertex_count;
        self.current_index += index_count;

        log::debug!("Allocated {:?} in {} buffer", segment, self.kind);
        Ok(segment)
    }

    /// Replace both buffers with larger ones, copying the used range across.
    ///
    /// The old buffers stay in place until the new ones exist and hold the
    /// copied data.
    fn grow(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        new_vertices: u32,
        new_indices: u32,
    ) -> Result<(), RenderError> {
        let (vertex_buffer, index_buffer) =
            Self::create_buffers(backend, self.kind, new_vertices, new_indices)?;

        let copied = backend
            .copy_buffer_to_buffer(
                self.vertex_buffer,
                0,
                vertex_buffer,
                0,
                self.current_vertex as u64 * Vertex::STRIDE,
            )
            .and_then(|_| {
                backend.copy_buffer_to_buffer(
                    self.index_buffer,
                    0,
                    index_buffer,
                    0,
                    self.current_index as u64 * INDEX_FORMAT.size(),
                )
            });

        if let Err(e) = copied {
            backend.destroy_buffer(vertex_buffer);
            backend.destroy_buffer(index_buffer);
            return Err(e.into());
        }

        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);

        log::info!(
            "Grew {} buffer: vertices {} -> {}, indices {} -> {}",
            self.kind,
            self.max_vertices,
            new_vertices,
            self.max_indices,
            new_indices
        );

        self.vertex_buffer = vertex_buffer;
        self.index_buffer = index_buffer;
        self.max_vertices = new_vertices;
        self.max_indices = new_indices;
        Ok(())
    }

    /// Attach `shapes` to an object, one slot per shape.
    ///
    /// A slot keeps its segment when the new shape fits in it and gets a new
    /// one otherwise. Slots beyond the new shape count are released.
    ///
    /// Every segment is reserved before anything is written, so a failed
    /// reservation leaves the object's slots and their buffer contents as
    /// they were.
    pub fn set_object_shapes(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        id: ObjectId,
        shapes: Vec<Shape>,
    ) -> Result<(), RenderError> {
        let old_segments: Vec<Option<BufferSegment>> = self
            .objects
            .get(id)
            .ok_or(RenderError::UnknownObject(id))?
            .slots()
            .iter()
            .map(|slot| slot.segment)
            .collect();

        let mut placements = Vec::with_capacity(shapes.len());
        for (i, shape) in shapes.into_iter().enumerate() {
            let old_segment = old_segments.get(i).copied().flatten();
            match self.reserve(backend, old_segment, shape) {
                Ok(placement) => placements.push(placement),
                Err(e) => {
                    // Nothing was written into the fresh segments; the watermark
                    // already moved past them.
                    self.dangling
                        .extend(placements.iter().filter(|p| p.fresh).filter_map(|p| p.segment));
                    return Err(e);
                }
            }
        }

        let mut slots = Vec::with_capacity(placements.len());
        for (i, placement) in placements.into_iter().enumerate() {
            if placement.fresh {
                if let Some(stale) = old_segments.get(i).copied().flatten() {
                    self.dangling.push(stale);
                }
            }

            let draw_index_count = match placement.segment {
                Some(segment) if placement.shape.vertex_count() > 0 && !placement.indices.is_empty() => {
                    self.upload(backend, &segment, &placement.shape, &placement.indices);
                    placement.indices.len() as u32
                }
                _ => 0,
            };

            slots.push(ShapeSlot {
                shape: Some(placement.shape),
                segment: placement.segment,
                draw_topology: placement.draw_topology,
                draw_index_count,
            });
        }

        for released in old_segments.iter().skip(slots.len()).flatten() {
            log::debug!("Released {:?} from {} buffer", released, self.kind);
            self.dangling.push(*released);
        }

        if let Some(object) = self.objects.get_mut(id) {
            *object.slots_mut() = slots;
        }
        Ok(())
    }

    /// Lower one shape and pick its segment: the old one when it is big
    /// enough, a fresh one from the watermark otherwise
    fn reserve(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        old_segment: Option<BufferSegment>,
        shape: Shape,
    ) -> Result<Placement, RenderError> {
        let (draw_topology, indices) = if backend.supports_topology(shape.topology()) {
            (shape.topology(), shape.indices().to_vec())
        } else {
            shape.lowered_indices()
        };
        let vertex_count = shape.vertex_count();
        let index_count = indices.len();

        let (segment, fresh) = match old_segment {
            Some(segment) if segment.fits(vertex_count, index_count) => (Some(segment), false),
            _ if vertex_count == 0 || index_count == 0 => (old_segment, false),
            _ => {
                let segment =
                    self.allocate_segment(backend, vertex_count as u32, index_count as u32)?;
                (Some(segment), true)
            }
        };

        Ok(Placement {
            shape,
            draw_topology,
            indices,
            segment,
            fresh,
        })
    }

    /// Write vertices and rebased indices into a segment
    fn upload(
        &self,
        backend: &mut dyn GraphicsBackend,
        segment: &BufferSegment,
        shape: &Shape,
        indices: &[u32],
    ) {
        assert!(
            segment.fits(shape.vertex_count(), indices.len()),
            "shape of {} vertices / {} indices overflows segment {:?}",
            shape.vertex_count(),
            indices.len(),
            segment
        );

        backend.write_buffer(
            self.vertex_buffer,
            segment.vertex_offset as u64 * Vertex::STRIDE,
            shape.vertex_bytes(),
        );

        let rebased: Vec<u32> = indices.iter().map(|i| i + segment.vertex_offset).collect();
        backend.write_buffer(
            self.index_buffer,
            segment.index_offset as u64 * INDEX_FORMAT.size(),
            bytemuck::cast_slice(&rebased),
        );
    }

    pub(crate) fn set_last_draw_calls(&mut self, draw_calls: usize) {
        self.last_draw_calls = draw_calls;
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            kind: self.kind,
            draw_calls: self.last_draw_calls,
            objects: self.objects.len(),
            shapes: self
                .objects
                .values()
                .map(|o| o.slots().iter().filter(|s| s.is_drawable()).count())
                .sum(),
            vertices_used: self.current_vertex,
            vertex_capacity: self.max_vertices,
            indices_used: self.current_index,
            index_capacity: self.max_indices,
            dangling_vertices: self.dangling.iter().map(|s| s.vertex_capacity as u64).sum(),
            dangling_indices: self.dangling.iter().map(|s| s.index_capacity as u64).sum(),
        }
    }

    /// Release both GPU buffers
    pub fn shutdown(self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}

/// Snapshot of a buffer's usage
#[derive(Debug, Clone, PartialEq)]
pub struct BufferStats {
    pub kind: BufferKind,
    pub draw_calls: usize,
    pub objects: usize,
    /// Shapes that issue a draw; blank slots are not counted
    pub shapes: usize,
    pub vertices_used: u32,
    pub vertex_capacity: u32,
    pub indices_used: u32,
    pub index_capacity: u32,
    pub dangling_vertices: u64,
    pub dangling_indices: u64,
}

fn usage(used: u32, capacity: u32) -> String {
    let pct = if capacity == 0 {
        0.0
    } else {
        used as f64 / capacity as f64 * 100.0
    };
    format!("{used}/{capacity} ({pct:.1}%)")
}

impl fmt::Display for BufferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buffer: {} objects, {} shapes, {} draw calls | vertices {} | indices {} | dangling {} vertices, {} indices",
            self.kind,
            self.objects,
            self.shapes,
            self.draw_calls,
            usage(self.vertices_used, self.vertex_capacity),
            usage(self.indices_used, self.index_capacity),
            self.dangling_vertices,
            self.dangling_indices
        )
    }
}
