//! Renderer facade over the static and dynamic buffers
//!
//! Objects are addressed by unique name. A frame is one call to
//! [`Renderer::draw`] after the host has applied its scene updates.

use crate::backend::traits::GraphicsBackend;
use crate::geometry::Shape;
use crate::render::batch::{BatchRenderer, Batches, FrameStats};
use crate::render::buffer::{BufferKind, BufferStats, RenderBuffer};
use crate::render::shader::{PointShape, ShaderId, ShaderLibrary};
use crate::render::{RenderError, RenderResult};
use crate::scene::{default_lighting, CameraFrame, DrawAttributes, Light, LightUniform, Object, ObjectId, Transform};
use crate::ViewerConfig;
use std::collections::HashMap;

/// How an object is drawn and where it lives
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub line_width: f32,
    pub point_size: f32,
    pub point_shape: PointShape,
    pub kind: BufferKind,
    pub selectable: bool,
    pub shader: Option<ShaderId>,
    pub alpha: f32,
    pub transform: Transform,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            point_size: 1.0,
            point_shape: PointShape::Circle,
            kind: BufferKind::Static,
            selectable: true,
            shader: None,
            alpha: 1.0,
            transform: Transform::default(),
        }
    }
}

impl RenderParams {
    /// Dynamic, non-selectable params for per-frame overlays
    pub fn overlay() -> Self {
        Self {
            kind: BufferKind::Dynamic,
            selectable: false,
            ..Default::default()
        }
    }

    pub fn attributes(&self) -> DrawAttributes {
        DrawAttributes {
            line_width: self.line_width,
            point_size: self.point_size,
            point_shape: self.point_shape,
            alpha: self.alpha,
            shader: self.shader,
        }
    }
}

/// Where a named object lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: BufferKind,
    pub id: ObjectId,
}

/// Owns both render buffers, the shaders and the lights
pub struct Renderer {
    static_buffer: RenderBuffer,
    dynamic_buffer: RenderBuffer,
    names: HashMap<String, ObjectRef>,
    shaders: ShaderLibrary,
    lights: Vec<Light>,
    batcher: BatchRenderer,
    background_colour: [f32; 3],
}

impl Renderer {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        config: &ViewerConfig,
        shaders: ShaderLibrary,
    ) -> RenderResult<Self> {
        let static_buffer = RenderBuffer::new(
            backend,
            BufferKind::Static,
            &config.static_buffer,
            config.growth_factor,
        )?;
        let dynamic_buffer = match RenderBuffer::new(
            backend,
            BufferKind::Dynamic,
            &config.dynamic_buffer,
            config.growth_factor,
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                static_buffer.shutdown(backend);
                return Err(e);
            }
        };

        log::info!("Renderer ready with {} shaders", shaders.len());

        Ok(Self {
            static_buffer,
            dynamic_buffer,
            names: HashMap::new(),
            shaders,
            lights: Vec::new(),
            batcher: BatchRenderer::new(),
            background_colour: config.background_colour,
        })
    }

    pub fn buffer(&self, kind: BufferKind) -> &RenderBuffer {
        match kind {
            BufferKind::Static => &self.static_buffer,
            BufferKind::Dynamic => &self.dynamic_buffer,
        }
    }

    fn buffer_mut(&mut self, kind: BufferKind) -> &mut RenderBuffer {
        match kind {
            BufferKind::Static => &mut self.static_buffer,
            BufferKind::Dynamic => &mut self.dynamic_buffer,
        }
    }

    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    pub fn background_colour(&self) -> [f32; 3] {
        self.background_colour
    }

    /// Register an empty object under a unique name
    pub fn add_object(&mut self, name: &str, params: &RenderParams) -> RenderResult<ObjectRef> {
        if self.names.contains_key(name) {
            log::warn!("Object '{}' already exists", name);
            return Err(RenderError::DuplicateName(name.to_string()));
        }
        let object = Object::new(name, params.transform, params.attributes())
            .with_selectable(params.selectable);
        let id = self.buffer_mut(params.kind).add_object(object);
        let object_ref = ObjectRef {
            kind: params.kind,
            id,
        };
        self.names.insert(name.to_string(), object_ref);
        Ok(object_ref)
    }

    pub fn lookup(&self, name: &str) -> Option<ObjectRef> {
        self.names.get(name).copied()
    }

    fn resolve(&self, name: &str) -> RenderResult<ObjectRef> {
        self.lookup(name)
            .ok_or_else(|| RenderError::UnknownName(name.to_string()))
    }

    /// Replace the shapes of a named object
    pub fn set_object_shapes(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: &str,
        shapes: Vec<Shape>,
    ) -> RenderResult<()> {
        let object_ref = self.resolve(name)?;
        self.buffer_mut(object_ref.kind)
            .set_object_shapes(backend, object_ref.id, shapes)
    }

    /// Create or update a named object in one call.
    ///
    /// An existing object takes the new transform and attributes; if it lives
    /// in the other buffer it is moved there.
    pub fn update_object(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: &str,
        params: &RenderParams,
        shapes: Vec<Shape>,
    ) -> RenderResult<ObjectRef> {
        let object_ref = match self.lookup(name) {
            Some(existing) if existing.kind == params.kind => {
                if let Some(object) = self.buffer_mut(existing.kind).object_mut(existing.id) {
                    object.set_transform(params.transform);
                    *object.attributes_mut() = params.attributes();
                    object.set_selectable(params.selectable);
                }
                existing
            }
            Some(_) => {
                self.remove_object(name)?;
                self.add_object(name, params)?
            }
            None => self.add_object(name, params)?,
        };
        self.buffer_mut(object_ref.kind)
            .set_object_shapes(backend, object_ref.id, shapes)?;
        Ok(object_ref)
    }

    /// Remove a named object; its segments stay allocated as dangling
    pub fn remove_object(&mut self, name: &str) -> RenderResult<Object> {
        let object_ref = self
            .names
            .remove(name)
            .ok_or_else(|| RenderError::UnknownName(name.to_string()))?;
        self.buffer_mut(object_ref.kind)
            .remove_object(object_ref.id)
            .ok_or(RenderError::UnknownObject(object_ref.id))
    }

    pub fn object(&self, name: &str) -> Option<&Object> {
        let object_ref = self.lookup(name)?;
        self.get(object_ref)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut Object> {
        let object_ref = self.lookup(name)?;
        self.get_mut(object_ref)
    }

    pub fn get(&self, object_ref: ObjectRef) -> Option<&Object> {
        self.buffer(object_ref.kind).object(object_ref.id)
    }

    pub fn get_mut(&mut self, object_ref: ObjectRef) -> Option<&mut Object> {
        self.buffer_mut(object_ref.kind).object_mut(object_ref.id)
    }

    /// All objects, static buffer first
    pub fn objects(&self) -> impl Iterator<Item = (ObjectRef, &Object)> {
        let statics = self.static_buffer.objects().map(|(id, object)| {
            let kind = BufferKind::Static;
            (ObjectRef { kind, id }, object)
        });
        let dynamics = self.dynamic_buffer.objects().map(|(id, object)| {
            let kind = BufferKind::Dynamic;
            (ObjectRef { kind, id }, object)
        });
        statics.chain(dynamics)
    }

    pub fn selected_objects(&self) -> impl Iterator<Item = (ObjectRef, &Object)> {
        self.objects().filter(|(_, object)| object.is_selected())
    }

    pub fn deselect_all(&mut self) {
        for buffer in [&mut self.static_buffer, &mut self.dynamic_buffer] {
            for (_, object) in buffer.objects_mut() {
                object.deselect();
            }
        }
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn clear_lights(&mut self) {
        self.lights.clear();
    }

    /// Active lights, or the default rig when none were added
    pub fn lights(&self) -> Vec<Light> {
        if self.lights.is_empty() {
            default_lighting()
        } else {
            self.lights.clone()
        }
    }

    /// Draw phase of a frame: batch both buffers and issue the draws.
    ///
    /// The backend's command log is reset first, so afterwards it holds
    /// exactly this frame's commands.
    pub fn draw(&mut self, backend: &mut dyn GraphicsBackend, camera: &CameraFrame) -> FrameStats {
        backend.begin_frame();
        let lights: Vec<LightUniform> = self.lights().iter().map(Light::uniform).collect();

        let static_batches = Batches::build(&self.static_buffer, &self.shaders);
        let dynamic_batches = Batches::build(&self.dynamic_buffer, &self.shaders);

        let stats = self.batcher.render(
            backend,
            &mut self.shaders,
            camera,
            &lights,
            &[
                (&self.static_buffer, &static_batches),
                (&self.dynamic_buffer, &dynamic_batches),
            ],
        );

        self.static_buffer
            .set_last_draw_calls(static_batches.draw_count());
        self.dynamic_buffer
            .set_last_draw_calls(dynamic_batches.draw_count());
        stats
    }

    pub fn last_frame(&self) -> FrameStats {
        self.batcher.last_frame()
    }

    pub fn stats(&self) -> [BufferStats; 2] {
        [self.static_buffer.stats(), self.dynamic_buffer.stats()]
    }

    /// Release all GPU buffers
    pub fn shutdown(self, backend: &mut dyn GraphicsBackend) {
        self.static_buffer.shutdown(backend);
        self.dynamic_buffer.shutdown(backend);
    }
}
