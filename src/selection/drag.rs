//! Dragging objects from snapshotted start positions

use crate::render::{ObjectRef, Renderer};
use crate::scene::Object;
use glam::Vec3;

/// One drag gesture over a fixed set of objects.
///
/// Every update places each object at its start translation plus the total
/// offset, so moves never compound across frames.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    starts: Vec<(ObjectRef, Vec3)>,
    offset: Vec3,
}

impl DragSession {
    /// Snapshot the translation of every object with geometry
    pub fn begin<'a>(objects: impl IntoIterator<Item = (ObjectRef, &'a Object)>) -> Self {
        let starts: Vec<_> = objects
            .into_iter()
            .filter(|(_, object)| object.has_geometry())
            .map(|(object_ref, object)| (object_ref, object.translate()))
            .collect();
        log::debug!("Drag started with {} objects", starts.len());
        Self {
            starts,
            offset: Vec3::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Total offset from the start positions
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn objects(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.starts.iter().map(|(object_ref, _)| *object_ref)
    }

    /// Set the total offset and move every object
    pub fn drag_to(&mut self, renderer: &mut Renderer, offset: Vec3) {
        self.offset = offset;
        self.apply(renderer);
    }

    /// Add `delta` to the total offset and move every object
    pub fn move_by(&mut self, renderer: &mut Renderer, delta: Vec3) {
        self.offset += delta;
        self.apply(renderer);
    }

    fn apply(&self, renderer: &mut Renderer) {
        for (object_ref, start) in &self.starts {
            match renderer.get_mut(*object_ref) {
                Some(object) => object.set_translate(*start + self.offset),
                None => log::warn!("Dragged object {:?} no longer exists", object_ref),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::geometry::shapes;
    use crate::render::{RecordingShader, RenderParams, ShaderLibrary};
    use crate::scene::Transform;
    use crate::ViewerConfig;

    fn scene(backend: &mut HeadlessBackend) -> Renderer {
        let mut shaders = ShaderLibrary::new();
        shaders.register(Box::new(RecordingShader::default()));
        let mut renderer = Renderer::new(backend, &ViewerConfig::default(), shaders).unwrap();
        let params = RenderParams {
            transform: Transform::from_translate(Vec3::new(0.3, -1.7, 0.25)),
            ..Default::default()
        };
        renderer
            .update_object(backend, "box", &params, vec![shapes::rectangle(Vec3::ZERO, 1.0, 1.0, Vec3::ONE)])
            .unwrap();
        renderer.add_object("empty", &RenderParams::default()).unwrap();
        renderer
    }

    #[test]
    fn there_and_back_restores_start() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let start = renderer.object("box").unwrap().translate();

        let mut session = DragSession::begin(renderer.objects());
        session.move_by(&mut renderer, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(renderer.object("box").unwrap().translate(), start + Vec3::X);
        session.move_by(&mut renderer, Vec3::new(-1.0, 0.0, 0.0));

        assert_eq!(renderer.object("box").unwrap().translate(), start);
    }

    #[test]
    fn repeated_offsets_do_not_compound() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let start = renderer.object("box").unwrap().translate();

        let mut session = DragSession::begin(renderer.objects());
        for _ in 0..3 {
            session.drag_to(&mut renderer, Vec3::new(2.0, 1.0, 0.0));
        }
        assert_eq!(renderer.object("box").unwrap().translate(), start + Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn objects_without_geometry_are_skipped() {
        let mut backend = HeadlessBackend::new();
        let renderer = scene(&mut backend);
        let session = DragSession::begin(renderer.objects());
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn bounds_follow_the_drag() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let before = renderer.object("box").unwrap().get_midpoint().unwrap();

        let mut session = DragSession::begin(renderer.objects());
        session.drag_to(&mut renderer, Vec3::new(0.0, 3.0, 0.0));

        let after = renderer.object("box").unwrap().get_midpoint().unwrap();
        assert!((after - before - Vec3::new(0.0, 3.0, 0.0)).length() < 1e-5);
    }
}
