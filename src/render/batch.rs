//! Per-frame grouping of draws by shared draw state
//!
//! Batches are rebuilt from the live objects every frame. Draws with the same
//! [`BatchKey`] are issued back to back, and keys sharing a shader are kept
//! together so each shader is bound at most once per frame.

use crate::backend::traits::{GraphicsBackend, ShaderId};
use crate::backend::types::{PrimitiveTopology, Vertex};
use crate::render::buffer::RenderBuffer;
use crate::render::shader::{PointShape, ShaderLibrary};
use crate::scene::{CameraFrame, DrawAttributes, LightUniform, ObjectId};
use std::collections::HashMap;

/// Rasterization state that differs between primitive kinds.
///
/// Sizes are stored as bit patterns so the key stays hashable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawState {
    Fill,
    Line { width_bits: u32 },
    Point { size_bits: u32, shape: PointShape },
}

impl DrawState {
    pub fn for_draw(topology: PrimitiveTopology, attributes: &DrawAttributes) -> Self {
        if topology.is_point() {
            DrawState::Point {
                size_bits: attributes.point_size.to_bits(),
                shape: attributes.point_shape,
            }
        } else if topology.is_line() {
            DrawState::Line {
                width_bits: attributes.line_width.to_bits(),
            }
        } else {
            DrawState::Fill
        }
    }

    pub fn line_width(&self) -> Option<f32> {
        match self {
            DrawState::Line { width_bits } => Some(f32::from_bits(*width_bits)),
            _ => None,
        }
    }

    pub fn point_size(&self) -> Option<f32> {
        match self {
            DrawState::Point { size_bits, .. } => Some(f32::from_bits(*size_bits)),
            _ => None,
        }
    }
}

/// Everything that must match for two draws to share state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub shader: ShaderId,
    pub topology: PrimitiveTopology,
    pub state: DrawState,
}

/// One draw: an object and the index of its shape slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawItem {
    pub object: ObjectId,
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub key: BatchKey,
    pub items: Vec<DrawItem>,
}

/// Draws of one buffer grouped by key
#[derive(Debug, Clone, Default)]
pub struct Batches {
    batches: Vec<Batch>,
}

impl Batches {
    /// Group every drawable slot of `buffer`.
    ///
    /// Keys appear in first-seen order, except that keys sharing a shader are
    /// moved next to each other. Items keep traversal order within a key.
    pub fn build(buffer: &RenderBuffer, shaders: &ShaderLibrary) -> Self {
        let mut batches: Vec<Batch> = Vec::new();
        let mut index: HashMap<BatchKey, usize> = HashMap::new();

        for (id, object) in buffer.objects() {
            for (slot_index, slot) in object.slots().iter().enumerate() {
                if !slot.is_drawable() {
                    continue;
                }
                let attributes = object.attributes();
                let Some(shader) = shaders.resolve(attributes.shader, slot.draw_topology) else {
                    log::warn!("No shader for {:?} in object {}", slot.draw_topology, object.name());
                    continue;
                };
                let key = BatchKey {
                    shader,
                    topology: slot.draw_topology,
                    state: DrawState::for_draw(slot.draw_topology, attributes),
                };
                let item = DrawItem {
                    object: id,
                    slot: slot_index,
                };
                let at = *index.entry(key).or_insert_with(|| {
                    batches.push(Batch {
                        key,
                        items: Vec::new(),
                    });
                    batches.len() - 1
                });
                batches[at].items.push(item);
            }
        }

        let mut shader_order: Vec<ShaderId> = Vec::new();
        for batch in &batches {
            if !shader_order.contains(&batch.key.shader) {
                shader_order.push(batch.key.shader);
            }
        }
        // Stable sort keeps first-seen order within each shader
        batches.sort_by_key(|b| shader_order.iter().position(|s| *s == b.key.shader));

        Self { batches }
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn draw_count(&self) -> usize {
        self.batches.iter().map(|b| b.items.len()).sum()
    }

    /// Shaders in the order they are first used
    pub fn shaders(&self) -> Vec<ShaderId> {
        let mut out: Vec<ShaderId> = Vec::new();
        for batch in &self.batches {
            if out.last() != Some(&batch.key.shader) {
                out.push(batch.key.shader);
            }
        }
        out
    }
}

/// Counts for one rendered frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub shader_binds: usize,
    pub batches: usize,
    pub draw_calls: usize,
}

/// Issues the state changes and draws for a frame
#[derive(Debug, Default)]
pub struct BatchRenderer {
    last_frame: FrameStats,
}

impl BatchRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame
    }

    /// Draw the batches of each buffer.
    ///
    /// Work is ordered shader by shader across all buffers; camera and light
    /// uniforms are uploaded once per shader bind.
    pub fn render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        shaders: &mut ShaderLibrary,
        camera: &CameraFrame,
        lights: &[LightUniform],
        passes: &[(&RenderBuffer, &Batches)],
    ) -> FrameStats {
        let mut stats = FrameStats::default();

        let mut shader_order: Vec<ShaderId> = Vec::new();
        for (_, batches) in passes {
            for id in batches.shaders() {
                if !shader_order.contains(&id) {
                    shader_order.push(id);
                }
            }
        }

        let layout = Vertex::layout();
        let mut bound_buffer: Option<usize> = None;

        for shader_id in shader_order {
            let Some(shader) = shaders.get_mut(shader_id) else {
                log::warn!("Skipping batches for unknown shader {:?}", shader_id);
                continue;
            };
            shader.use_program();
            backend.bind_shader(shader_id);
            shader.set_view_matrix(&camera.view);
            shader.set_projection_matrix(&camera.projection);
            shader.set_view_position(camera.position);
            shader.set_light_uniforms(lights);
            stats.shader_binds += 1;

            for (pass_index, (buffer, batches)) in passes.iter().enumerate() {
                for batch in batches.batches().iter().filter(|b| b.key.shader == shader_id) {
                    if bound_buffer != Some(pass_index) {
                        backend.bind_geometry(
                            buffer.vertex_buffer(),
                            &layout,
                            buffer.index_buffer(),
                            buffer.index_format(),
                        );
                        bound_buffer = Some(pass_index);
                    }

                    match batch.key.state {
                        DrawState::Fill => {}
                        DrawState::Line { width_bits } => {
                            backend.set_line_width(f32::from_bits(width_bits));
                        }
                        DrawState::Point { size_bits, shape } => {
                            backend.set_point_size(f32::from_bits(size_bits));
                            shader.set_point_shape(shape);
                        }
                    }
                    stats.batches += 1;

                    for item in &batch.items {
                        let Some(object) = buffer.object(item.object) else {
                            continue;
                        };
                        let Some(slot) = object.slots().get(item.slot) else {
                            continue;
                        };
                        let Some(segment) = slot.segment else {
                            continue;
                        };
                        shader.set_model_matrix(&object.model_matrix());
                        shader.set_alpha(object.attributes().alpha);
                        let start = segment.index_offset;
                        backend.draw_indexed(batch.key.topology, start..start + slot.draw_index_count, 0);
                        stats.draw_calls += 1;
                    }
                }
            }
        }

        if bound_buffer.is_some() {
            backend.unbind_geometry();
        }

        log::debug!(
            "Frame: {} shader binds, {} batches, {} draw calls",
            stats.shader_binds,
            stats.batches,
            stats.draw_calls
        );
        self.last_frame = stats;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{Command, HeadlessBackend};
    use crate::geometry::shapes;
    use crate::render::buffer::BufferKind;
    use crate::render::shader::RecordingShader;
    use crate::scene::{Object, Transform};
    use crate::BufferConfig;
    use glam::Vec3;

    struct Fixture {
        backend: HeadlessBackend,
        buffer: RenderBuffer,
        shaders: ShaderLibrary,
        lit: ShaderId,
        flat: ShaderId,
    }

    fn fixture() -> Fixture {
        let mut backend = HeadlessBackend::new();
        let buffer = RenderBuffer::new(
            &mut backend,
            BufferKind::Static,
            &BufferConfig::default(),
            1.5,
        )
        .unwrap();
        let mut shaders = ShaderLibrary::new();
        let lit = shaders.register(Box::new(RecordingShader::default()));
        let flat = shaders.register(Box::new(RecordingShader::default()));
        Fixture {
            backend,
            buffer,
            shaders,
            lit,
            flat,
        }
    }

    fn add(f: &mut Fixture, attributes: DrawAttributes, shape: crate::geometry::Shape) -> ObjectId {
        let id = f
            .buffer
            .add_object(Object::new("o", Transform::default(), attributes));
        f.buffer
            .set_object_shapes(&mut f.backend, id, vec![shape])
            .unwrap();
        id
    }

    #[test]
    fn equal_keys_share_a_batch() {
        let mut f = fixture();
        for x in 0..3 {
            add(
                &mut f,
                DrawAttributes::default(),
                shapes::cube(Vec3::new(x as f32, 0.0, 0.0), 1.0, Vec3::ONE),
            );
        }
        let batches = Batches::build(&f.buffer, &f.shaders);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches.draw_count(), 3);
    }

    #[test]
    fn line_width_and_point_size_split_batches() {
        let mut f = fixture();
        let thin = DrawAttributes::default();
        let thick = DrawAttributes {
            line_width: 3.0,
            ..Default::default()
        };
        add(&mut f, thin, shapes::line(Vec3::ZERO, Vec3::X, Vec3::ONE));
        add(&mut f, thick, shapes::line(Vec3::ZERO, Vec3::Y, Vec3::ONE));
        add(&mut f, thin, shapes::line(Vec3::ZERO, Vec3::Z, Vec3::ONE));
        add(&mut f, thin, shapes::point(Vec3::ZERO, Vec3::ONE));

        let batches = Batches::build(&f.buffer, &f.shaders);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches.batches()[0].items.len(), 2);
        assert_eq!(batches.batches()[1].key.state.line_width(), Some(3.0));
        assert_eq!(batches.batches()[2].key.state.point_size(), Some(1.0));
    }

    #[test]
    fn shaders_are_bound_once_each() {
        let mut f = fixture();
        let lit = f.lit;
        let flat = DrawAttributes {
            shader: Some(f.flat),
            ..Default::default()
        };
        add(&mut f, DrawAttributes::default(), shapes::cube(Vec3::ZERO, 1.0, Vec3::ONE));
        add(&mut f, flat, shapes::line(Vec3::ZERO, Vec3::X, Vec3::ONE));
        add(&mut f, DrawAttributes::default(), shapes::line(Vec3::ZERO, Vec3::Y, Vec3::ONE));

        let batches = Batches::build(&f.buffer, &f.shaders);
        assert_eq!(batches.shaders(), vec![lit, f.flat]);

        let mut renderer = BatchRenderer::new();
        let stats = renderer.render(
            &mut f.backend,
            &mut f.shaders,
            &CameraFrame::default(),
            &[],
            &[(&f.buffer, &batches)],
        );
        assert_eq!(stats.shader_binds, 2);
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(f.backend.shader_bind_count(), 2);
        assert_eq!(f.backend.draw_count(), 3);
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let mut f = fixture();
        add(&mut f, DrawAttributes::default(), shapes::cube(Vec3::ZERO, 1.0, Vec3::ONE));
        add(&mut f, DrawAttributes::default(), shapes::point(Vec3::ZERO, Vec3::ONE));
        add(&mut f, DrawAttributes::default(), shapes::grid(4.0, 1.0, Vec3::ONE));

        let mut renderer = BatchRenderer::new();
        let first = Batches::build(&f.buffer, &f.shaders);
        let a = renderer.render(&mut f.backend, &mut f.shaders, &CameraFrame::default(), &[], &[(&f.buffer, &first)]);
        let second = Batches::build(&f.buffer, &f.shaders);
        let b = renderer.render(&mut f.backend, &mut f.shaders, &CameraFrame::default(), &[], &[(&f.buffer, &second)]);
        assert_eq!(a, b);
        assert_eq!(first.batches().len(), second.batches().len());
    }

    #[test]
    fn draws_use_segment_offsets_and_shape_counts() {
        let mut f = fixture();
        add(&mut f, DrawAttributes::default(), shapes::cube(Vec3::ZERO, 1.0, Vec3::ONE));
        add(&mut f, DrawAttributes::default(), shapes::triangle(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE));

        let batches = Batches::build(&f.buffer, &f.shaders);
        BatchRenderer::new().render(&mut f.backend, &mut f.shaders, &CameraFrame::default(), &[], &[(&f.buffer, &batches)]);

        let draws: Vec<_> = f
            .backend
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::DrawIndexed { indices, base_vertex, .. } => Some((indices.clone(), *base_vertex)),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![(0..36, 0), (36..39, 0)]);
    }

    #[test]
    fn unset_and_empty_slots_are_skipped() {
        let mut f = fixture();
        f.buffer
            .add_object(Object::new("pending", Transform::default(), DrawAttributes::default()));
        add(&mut f, DrawAttributes::default(), shapes::blank());

        let batches = Batches::build(&f.buffer, &f.shaders);
        assert!(batches.is_empty());
        let stats = BatchRenderer::new().render(
            &mut f.backend,
            &mut f.shaders,
            &CameraFrame::default(),
            &[],
            &[(&f.buffer, &batches)],
        );
        assert_eq!(stats, FrameStats::default());
        assert!(f.backend.commands().is_empty());
    }
}
