//! Mouse-driven selection state machine and its overlays

use crate::backend::traits::GraphicsBackend;
use crate::backend::types::PrimitiveTopology;
use crate::geometry::{shapes, Shape};
use crate::render::{RenderParams, RenderResult, Renderer};
use crate::selection::drag::DragSession;
use crate::selection::pick::{pick, PickParams};
use crate::SelectionSettings;
use glam::Vec3;

/// Name of the overlay point drawn under the cursor
pub const CURSOR_POINT: &str = "cursor_point";
/// Name of the overlay holding corner brackets around selected objects
pub const SELECTION_TARGETS: &str = "selection_targets";

const OVERLAY_COLOUR: Vec3 = Vec3::ONE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPhase {
    #[default]
    Idle,
    /// Button went down over a selectable object
    Selecting,
    /// Button held and the pointer has moved
    Dragging,
}

/// Pointer state for one frame, already projected to world space by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    /// Primary button is held
    pub button_down: bool,
    /// Multi-select modifier is held
    pub multi_select: bool,
    pub cursor_world: Vec3,
    /// World units covered by one screen pixel
    pub world_per_pixel: f32,
    /// Distance from the camera to its target
    pub camera_distance: f32,
    /// Camera is in top-down mode; picking only runs there
    pub top_down: bool,
    /// Camera is panning or rotating
    pub camera_busy: bool,
}

impl Default for PointerInput {
    fn default() -> Self {
        Self {
            button_down: false,
            multi_select: false,
            cursor_world: Vec3::ZERO,
            world_per_pixel: 1.0,
            camera_distance: 1.0,
            top_down: true,
            camera_busy: false,
        }
    }
}

/// What changed during an update, for the host to react to
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    Selected { name: String, selected: bool },
    Dragged { names: Vec<String>, offset: Vec3 },
}

/// Turns pointer edges into selection changes and drags
#[derive(Debug, Default)]
pub struct SelectionController {
    settings: SelectionSettings,
    phase: SelectionPhase,
    button_was_down: bool,
    click_position: Vec3,
    drag: Option<DragSession>,
}

impl SelectionController {
    pub fn new(settings: SelectionSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &SelectionSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SelectionSettings {
        &mut self.settings
    }

    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    /// Advance the state machine by one frame of input
    pub fn update(&mut self, renderer: &mut Renderer, input: &PointerInput) -> Vec<SelectionEvent> {
        let pressed = input.button_down && !self.button_was_down;
        self.button_was_down = input.button_down;

        if !input.button_down {
            self.cancel();
            return Vec::new();
        }

        if pressed {
            return self.press(renderer, input);
        }

        self.drag_selection(renderer, input)
    }

    /// Return to idle and drop any drag snapshot
    pub fn cancel(&mut self) {
        if self.phase != SelectionPhase::Idle {
            log::debug!("Selection {:?} -> Idle", self.phase);
        }
        self.phase = SelectionPhase::Idle;
        self.drag = None;
    }

    fn press(&mut self, renderer: &mut Renderer, input: &PointerInput) -> Vec<SelectionEvent> {
        if !self.settings.select_objects || !input.top_down {
            return Vec::new();
        }

        let before = selected_names(renderer);
        if !input.multi_select {
            renderer.deselect_all();
        }

        let params = PickParams::new(input.world_per_pixel, self.settings.margin_pixels);
        let hit = pick(renderer.objects(), input.cursor_world, &params);
        if let Some(object) = hit.and_then(|hit| renderer.get_mut(hit)) {
            object.toggle_select();
            log::debug!("Picked '{}', selected: {}", object.name(), object.is_selected());
        }
        let after = selected_names(renderer);

        let mut events: Vec<SelectionEvent> = before
            .iter()
            .filter(|name| !after.contains(name))
            .map(|name| SelectionEvent::Selected {
                name: name.clone(),
                selected: false,
            })
            .collect();
        events.extend(
            after
                .iter()
                .filter(|name| !before.contains(name))
                .map(|name| SelectionEvent::Selected {
                    name: name.clone(),
                    selected: true,
                }),
        );

        if hit.is_some() {
            self.phase = SelectionPhase::Selecting;
            self.click_position = input.cursor_world;
            self.drag = self
                .settings
                .drag_objects
                .then(|| DragSession::begin(renderer.selected_objects()));
        }
        events
    }

    fn drag_selection(&mut self, renderer: &mut Renderer, input: &PointerInput) -> Vec<SelectionEvent> {
        if input.camera_busy || self.phase == SelectionPhase::Idle {
            return Vec::new();
        }
        let Some(session) = self.drag.as_mut() else {
            return Vec::new();
        };
        if session.is_empty() {
            return Vec::new();
        }

        let mut offset = input.cursor_world - self.click_position;
        offset.z = 0.0;
        if offset == session.offset() && self.phase == SelectionPhase::Dragging {
            return Vec::new();
        }
        if offset == Vec3::ZERO && self.phase == SelectionPhase::Selecting {
            return Vec::new();
        }

        session.drag_to(renderer, offset);
        self.phase = SelectionPhase::Dragging;

        let names = session
            .objects()
            .filter_map(|object_ref| renderer.get(object_ref))
            .map(|object| object.name().to_string())
            .collect();
        vec![SelectionEvent::Dragged { names, offset }]
    }

    /// Rewrite the cursor point and selection bracket overlays.
    ///
    /// Both live in the dynamic buffer and are never selectable.
    pub fn update_overlays(
        &self,
        backend: &mut dyn GraphicsBackend,
        renderer: &mut Renderer,
        input: &PointerInput,
    ) -> RenderResult<()> {
        if self.settings.show_cursor_point {
            let cursor = Vec3::new(input.cursor_world.x, input.cursor_world.y, 0.0);
            let params = RenderParams {
                point_size: 5.0,
                ..RenderParams::overlay()
            };
            renderer.update_object(backend, CURSOR_POINT, &params, vec![shapes::point(cursor, OVERLAY_COLOUR)])?;
        } else if renderer.lookup(CURSOR_POINT).is_some() {
            renderer.set_object_shapes(backend, CURSOR_POINT, Vec::new())?;
        }

        let targets = if self.settings.show_targets {
            self.selection_targets(renderer, input)
        } else {
            Shape::empty(PrimitiveTopology::LineList)
        };
        renderer.update_object(backend, SELECTION_TARGETS, &RenderParams::overlay(), vec![targets])?;
        Ok(())
    }

    fn selection_targets(&self, renderer: &Renderer, input: &PointerInput) -> Shape {
        let mut targets = Shape::empty(PrimitiveTopology::LineList);
        let edge_length = input.camera_distance * self.settings.target_edge_length;

        for (_, object) in renderer.selected_objects() {
            let Some(bounds) = object.get_bounds() else {
                continue;
            };
            let mut offset = self.settings.target_offset_pixels * input.world_per_pixel;
            if object.is_point() {
                offset += object.attributes().point_size * input.world_per_pixel;
            }
            let size = bounds.size() + Vec3::splat(offset);
            let target = shapes::rectangle_target(bounds.midpoint(), size.x, size.y, edge_length, OVERLAY_COLOUR);
            if let Err(e) = targets.append(&target) {
                log::warn!("Skipping selection target for '{}': {}", object.name(), e);
            }
        }
        targets
    }
}

fn selected_names(renderer: &Renderer) -> Vec<String> {
    renderer
        .selected_objects()
        .map(|(_, object)| object.name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::render::{BufferKind, RecordingShader, ShaderLibrary};
    use crate::scene::Transform;
    use crate::ViewerConfig;

    fn scene(backend: &mut HeadlessBackend) -> Renderer {
        let mut shaders = ShaderLibrary::new();
        shaders.register(Box::new(RecordingShader::default()));
        let mut renderer = Renderer::new(backend, &ViewerConfig::default(), shaders).unwrap();
        for (name, x) in [("left", -2.0), ("right", 2.0)] {
            let params = RenderParams {
                transform: Transform::from_translate(Vec3::new(x, 0.0, 0.0)),
                ..Default::default()
            };
            renderer
                .update_object(backend, name, &params, vec![shapes::rectangle(Vec3::ZERO, 1.0, 1.0, Vec3::ONE)])
                .unwrap();
        }
        renderer
    }

    fn at(x: f32, y: f32, button_down: bool) -> PointerInput {
        PointerInput {
            button_down,
            cursor_world: Vec3::new(x, y, 0.0),
            world_per_pixel: 0.01,
            camera_distance: 10.0,
            ..Default::default()
        }
    }

    fn selected(renderer: &Renderer) -> Vec<String> {
        let mut names = selected_names(renderer);
        names.sort();
        names
    }

    #[test]
    fn click_selects_and_replaces_selection() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let mut controller = SelectionController::default();

        let events = controller.update(&mut renderer, &at(-2.0, 0.0, true));
        assert_eq!(
            events,
            vec![SelectionEvent::Selected {
                name: "left".into(),
                selected: true
            }]
        );
        assert_eq!(controller.phase(), SelectionPhase::Selecting);
        controller.update(&mut renderer, &at(-2.0, 0.0, false));
        assert_eq!(controller.phase(), SelectionPhase::Idle);

        let events = controller.update(&mut renderer, &at(2.0, 0.0, true));
        assert_eq!(events.len(), 2);
        assert_eq!(selected(&renderer), vec!["right".to_string()]);
    }

    #[test]
    fn multi_select_keeps_previous_selection() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let mut controller = SelectionController::default();

        controller.update(&mut renderer, &at(-2.0, 0.0, true));
        controller.update(&mut renderer, &at(-2.0, 0.0, false));
        let input = PointerInput {
            multi_select: true,
            ..at(2.0, 0.0, true)
        };
        controller.update(&mut renderer, &input);

        assert_eq!(selected(&renderer), vec!["left".to_string(), "right".to_string()]);
    }

    #[test]
    fn clicking_empty_space_clears() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let mut controller = SelectionController::default();

        controller.update(&mut renderer, &at(-2.0, 0.0, true));
        controller.update(&mut renderer, &at(-2.0, 0.0, false));
        controller.update(&mut renderer, &at(0.0, 5.0, true));

        assert!(selected(&renderer).is_empty());
        assert_eq!(controller.phase(), SelectionPhase::Idle);
    }

    #[test]
    fn held_button_drags_selection_in_plane() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let mut controller = SelectionController::default();

        controller.update(&mut renderer, &at(-2.0, 0.0, true));
        let mut input = at(-1.0, 0.5, true);
        input.cursor_world.z = 4.0;
        let events = controller.update(&mut renderer, &input);

        assert_eq!(controller.phase(), SelectionPhase::Dragging);
        assert_eq!(
            events,
            vec![SelectionEvent::Dragged {
                names: vec!["left".into()],
                offset: Vec3::new(1.0, 0.5, 0.0)
            }]
        );
        assert_eq!(renderer.object("left").unwrap().translate(), Vec3::new(-1.0, 0.5, 0.0));

        // Back to the click position restores the start translation
        controller.update(&mut renderer, &at(-2.0, 0.0, true));
        assert_eq!(renderer.object("left").unwrap().translate(), Vec3::new(-2.0, 0.0, 0.0));
    }

    #[test]
    fn busy_camera_blocks_drag() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let mut controller = SelectionController::default();

        controller.update(&mut renderer, &at(-2.0, 0.0, true));
        let input = PointerInput {
            camera_busy: true,
            ..at(0.0, 0.0, true)
        };
        assert!(controller.update(&mut renderer, &input).is_empty());
        assert_eq!(renderer.object("left").unwrap().translate(), Vec3::new(-2.0, 0.0, 0.0));
    }

    #[test]
    fn perspective_mode_does_not_pick() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let mut controller = SelectionController::default();

        let input = PointerInput {
            top_down: false,
            ..at(-2.0, 0.0, true)
        };
        assert!(controller.update(&mut renderer, &input).is_empty());
        assert!(selected(&renderer).is_empty());
    }

    #[test]
    fn overlays_track_cursor_and_selection() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let mut controller = SelectionController::default();

        let input = at(-2.0, 0.0, true);
        controller.update(&mut renderer, &input);
        controller.update_overlays(&mut backend, &mut renderer, &input).unwrap();

        let cursor = renderer.object(CURSOR_POINT).unwrap();
        assert!(!cursor.is_selectable());
        assert_eq!(cursor.attributes().point_size, 5.0);
        assert_eq!(renderer.lookup(CURSOR_POINT).unwrap().kind, BufferKind::Dynamic);

        let targets = renderer.object(SELECTION_TARGETS).unwrap();
        let shape = targets.shapes().next().unwrap();
        assert_eq!(shape.index_count(), 16);
        // 1.0 wide plus 10 pixels at 0.01
        let bounds = targets.get_bounds().unwrap();
        assert!((bounds.size().x - 1.1).abs() < 1e-5);
        assert!((bounds.midpoint() - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-5);

        // Deselect by clicking away; brackets vanish
        controller.update(&mut renderer, &at(0.0, 5.0, false));
        controller.update(&mut renderer, &at(0.0, 5.0, true));
        controller.update_overlays(&mut backend, &mut renderer, &input).unwrap();
        assert!(renderer.object(SELECTION_TARGETS).unwrap().get_bounds().is_none());
    }

    #[test]
    fn overlays_are_never_picked() {
        let mut backend = HeadlessBackend::new();
        let mut renderer = scene(&mut backend);
        let mut controller = SelectionController::default();

        let idle = at(0.0, 3.0, false);
        controller.update_overlays(&mut backend, &mut renderer, &idle).unwrap();
        controller.update(&mut renderer, &at(0.0, 3.0, true));

        assert!(selected(&renderer).is_empty());
    }
}
