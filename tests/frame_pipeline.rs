//! End-to-end frames against the headless backend

use glam::Vec3;
use viewer_engine::backend::headless::Command;
use viewer_engine::backend::{BackendError, PrimitiveTopology, Vertex};
use viewer_engine::render::{BufferKind, RecordingShader, RenderParams, ShaderCalls};
use viewer_engine::scene::{CameraFrame, Transform};
use viewer_engine::{
    shapes, BufferConfig, HeadlessBackend, PointerInput, RenderError, Renderer, SelectionController, SelectionEvent,
    SelectionSettings, Shape, ShaderLibrary, ViewerConfig,
};
use std::cell::RefCell;
use std::rc::Rc;

fn small_config() -> ViewerConfig {
    ViewerConfig {
        static_buffer: BufferConfig {
            max_vertices: 8,
            max_indices: 8,
        },
        dynamic_buffer: BufferConfig {
            max_vertices: 8,
            max_indices: 8,
        },
        ..Default::default()
    }
}

fn renderer_with(backend: &mut HeadlessBackend, config: &ViewerConfig) -> (Renderer, Rc<RefCell<ShaderCalls>>) {
    let (shader, calls) = RecordingShader::new();
    let mut shaders = ShaderLibrary::new();
    shaders.register(Box::new(shader));
    (Renderer::new(backend, config, shaders).unwrap(), calls)
}

fn triangle(offset: f32) -> Shape {
    shapes::triangle(
        Vec3::new(offset, 0.0, 0.0),
        Vec3::new(offset + 1.0, 0.0, 0.0),
        Vec3::new(offset, 1.0, 0.0),
        Vec3::ONE,
    )
}

fn read_indices(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn growth_keeps_previously_uploaded_bytes() {
    let mut backend = HeadlessBackend::new();
    let (mut renderer, _) = renderer_with(&mut backend, &small_config());

    renderer
        .update_object(&mut backend, "tri", &RenderParams::default(), vec![triangle(0.0)])
        .unwrap();
    let buffer = renderer.buffer(BufferKind::Static);
    let vertex_bytes = 3 * Vertex::STRIDE as usize;
    let before_vertices = backend.buffer_data(buffer.vertex_buffer()).unwrap()[..vertex_bytes].to_vec();
    let before_indices = backend.buffer_data(buffer.index_buffer()).unwrap()[..12].to_vec();

    renderer
        .update_object(
            &mut backend,
            "cube",
            &RenderParams::default(),
            vec![shapes::cube(Vec3::ZERO, 1.0, Vec3::ONE)],
        )
        .unwrap();

    let buffer = renderer.buffer(BufferKind::Static);
    // ceil(27 * 1.5) vertices, ceil(39 * 1.5) indices
    assert_eq!(buffer.capacity(), (41, 59));
    assert_eq!(
        &backend.buffer_data(buffer.vertex_buffer()).unwrap()[..vertex_bytes],
        before_vertices.as_slice()
    );
    assert_eq!(
        &backend.buffer_data(buffer.index_buffer()).unwrap()[..12],
        before_indices.as_slice()
    );
    // Old pair destroyed, new pair live, dynamic pair untouched
    assert_eq!(backend.buffer_count(), 4);
}

#[test]
fn indices_are_rebased_into_shared_buffer() {
    let mut backend = HeadlessBackend::new();
    let (mut renderer, _) = renderer_with(&mut backend, &ViewerConfig::default());

    renderer
        .update_object(&mut backend, "a", &RenderParams::default(), vec![triangle(0.0)])
        .unwrap();
    renderer
        .update_object(&mut backend, "b", &RenderParams::default(), vec![triangle(5.0)])
        .unwrap();

    let data = backend
        .buffer_data(renderer.buffer(BufferKind::Static).index_buffer())
        .unwrap();
    assert_eq!(read_indices(&data[..24]), vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn failed_growth_leaves_buffers_in_place() {
    let mut backend = HeadlessBackend::new();
    let (mut renderer, _) = renderer_with(&mut backend, &small_config());
    renderer
        .update_object(&mut backend, "tri", &RenderParams::default(), vec![triangle(0.0)])
        .unwrap();

    let handles = {
        let buffer = renderer.buffer(BufferKind::Static);
        (buffer.vertex_buffer(), buffer.index_buffer())
    };
    backend.set_memory_budget(Some(backend.allocated_bytes() + 100));

    let result = renderer.update_object(
        &mut backend,
        "cube",
        &RenderParams::default(),
        vec![shapes::cube(Vec3::ZERO, 1.0, Vec3::ONE)],
    );
    assert!(matches!(
        result,
        Err(RenderError::Backend(BackendError::OutOfMemory))
    ));

    let buffer = renderer.buffer(BufferKind::Static);
    assert_eq!((buffer.vertex_buffer(), buffer.index_buffer()), handles);
    assert_eq!(buffer.capacity(), (8, 8));
    assert_eq!(backend.buffer_count(), 4);

    let stats = renderer.draw(&mut backend, &CameraFrame::default());
    assert_eq!(stats.draw_calls, 1);
}

#[test]
fn one_draw_per_non_empty_shape() {
    let mut backend = HeadlessBackend::new();
    let (mut renderer, calls) = renderer_with(&mut backend, &ViewerConfig::default());

    renderer
        .update_object(
            &mut backend,
            "cube",
            &RenderParams::default(),
            vec![
                shapes::cube(Vec3::ZERO, 1.0, Vec3::ONE),
                shapes::blank(),
                shapes::cube_wireframe(Vec3::ZERO, 1.0, Vec3::ONE),
            ],
        )
        .unwrap();
    renderer.add_object("pending", &RenderParams::default()).unwrap();
    renderer
        .update_object(
            &mut backend,
            "marker",
            &RenderParams {
                kind: BufferKind::Dynamic,
                point_size: 4.0,
                ..Default::default()
            },
            vec![shapes::point(Vec3::ONE, Vec3::ONE)],
        )
        .unwrap();

    let stats = renderer.draw(&mut backend, &CameraFrame::default());
    assert_eq!(stats.draw_calls, 3);
    assert_eq!(backend.draw_count(), 3);
    assert_eq!(calls.borrow().model_matrices.len(), 3);
    assert!(backend.commands().contains(&Command::SetPointSize(4.0)));
}

#[test]
fn each_shader_bound_once_per_frame() {
    let mut backend = HeadlessBackend::new();
    let (lit, lit_calls) = RecordingShader::new();
    let (flat, flat_calls) = RecordingShader::new();
    let mut shaders = ShaderLibrary::new();
    shaders.register(Box::new(lit));
    let flat_id = shaders.register(Box::new(flat));
    let mut renderer = Renderer::new(&mut backend, &ViewerConfig::default(), shaders).unwrap();

    for i in 0..6 {
        let params = RenderParams {
            kind: if i % 2 == 0 {
                BufferKind::Static
            } else {
                BufferKind::Dynamic
            },
            shader: (i % 3 == 0).then_some(flat_id),
            ..Default::default()
        };
        renderer
            .update_object(&mut backend, &format!("tri{i}"), &params, vec![triangle(i as f32)])
            .unwrap();
    }

    let stats = renderer.draw(&mut backend, &CameraFrame::default());
    assert_eq!(stats.shader_binds, 2);
    assert_eq!(stats.draw_calls, 6);
    assert_eq!(backend.shader_bind_count(), 2);

    for calls in [&lit_calls, &flat_calls] {
        let calls = calls.borrow();
        assert_eq!(calls.uses, 1);
        assert_eq!(calls.view_uploads, 1);
        assert_eq!(calls.projection_uploads, 1);
        assert_eq!(calls.light_uploads, 1);
        assert_eq!(calls.lights_last_uploaded, 3);
    }
    assert_eq!(flat_calls.borrow().model_matrices.len(), 2);
    assert_eq!(lit_calls.borrow().model_matrices.len(), 4);
}

#[test]
fn repeated_frames_issue_identical_commands() {
    let mut backend = HeadlessBackend::new();
    let (mut renderer, _) = renderer_with(&mut backend, &ViewerConfig::default());
    for (i, width) in [1.0, 2.0, 1.0, 3.0].into_iter().enumerate() {
        let params = RenderParams {
            line_width: width,
            ..Default::default()
        };
        renderer
            .update_object(
                &mut backend,
                &format!("line{i}"),
                &params,
                vec![shapes::line(Vec3::ZERO, Vec3::new(i as f32, 1.0, 0.0), Vec3::ONE)],
            )
            .unwrap();
    }

    let camera = CameraFrame::default();
    let first = renderer.draw(&mut backend, &camera);
    let first_commands = backend.commands().to_vec();
    let second = renderer.draw(&mut backend, &camera);

    assert_eq!(first, second);
    assert_eq!(first.batches, 3);
    assert_eq!(backend.commands(), first_commands.as_slice());
}

#[test]
fn command_log_holds_only_the_latest_frame() {
    let mut backend = HeadlessBackend::new();
    let (mut renderer, _) = renderer_with(&mut backend, &ViewerConfig::default());
    renderer
        .update_object(&mut backend, "tri", &RenderParams::default(), vec![triangle(0.0)])
        .unwrap();

    let camera = CameraFrame::default();
    renderer.draw(&mut backend, &camera);
    let per_frame = backend.commands().len();
    assert!(per_frame > 0);

    for _ in 0..100 {
        renderer.draw(&mut backend, &camera);
    }
    assert_eq!(backend.commands().len(), per_frame);
    assert_eq!(backend.draw_count(), 1);
    assert_eq!(backend.shader_bind_count(), 1);
}

#[test]
fn loops_are_lowered_for_backends_without_them() {
    let mut backend = HeadlessBackend::new().without_loops_and_fans();
    let (mut renderer, _) = renderer_with(&mut backend, &ViewerConfig::default());

    let square: Vec<Vertex> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
        .into_iter()
        .map(|(x, y)| Vertex::new(Vec3::new(x, y, 0.0), Vec3::ONE, Vec3::Z))
        .collect();
    renderer
        .update_object(
            &mut backend,
            "outline",
            &RenderParams::default(),
            vec![Shape::sequential(PrimitiveTopology::LineLoop, square)],
        )
        .unwrap();

    renderer.draw(&mut backend, &CameraFrame::default());
    let draws: Vec<_> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::DrawIndexed { topology, indices, .. } => Some((*topology, indices.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(draws, vec![(PrimitiveTopology::LineStrip, 0..5)]);

    let data = backend
        .buffer_data(renderer.buffer(BufferKind::Static).index_buffer())
        .unwrap();
    assert_eq!(read_indices(&data[..20]), vec![0, 1, 2, 3, 0]);
}

#[test]
fn point_is_picked_over_unselectable_rectangle() {
    let mut backend = HeadlessBackend::new();
    let (mut renderer, _) = renderer_with(&mut backend, &ViewerConfig::default());
    renderer
        .update_object(
            &mut backend,
            "point",
            &RenderParams::default(),
            vec![shapes::point(Vec3::ZERO, Vec3::ONE)],
        )
        .unwrap();
    renderer
        .update_object(
            &mut backend,
            "floor",
            &RenderParams {
                selectable: false,
                ..Default::default()
            },
            vec![shapes::rectangle(Vec3::ZERO, 4.0, 4.0, Vec3::ONE)],
        )
        .unwrap();

    // 2 pixels at 0.05 world units each is a 0.1 margin
    let mut controller = SelectionController::new(SelectionSettings {
        margin_pixels: 2.0,
        ..Default::default()
    });
    let click = |x: f32, y: f32| PointerInput {
        button_down: true,
        cursor_world: Vec3::new(x, y, 0.0),
        world_per_pixel: 0.05,
        ..Default::default()
    };
    let release = PointerInput::default();

    let events = controller.update(&mut renderer, &click(0.05, 0.05));
    assert_eq!(
        events,
        vec![SelectionEvent::Selected {
            name: "point".into(),
            selected: true
        }]
    );
    controller.update(&mut renderer, &release);

    controller.update(&mut renderer, &click(10.0, 10.0));
    assert_eq!(renderer.selected_objects().count(), 0);
    assert!(!renderer.object("floor").unwrap().is_selected());
}

#[test]
fn drag_there_and_back_is_exact() {
    let mut backend = HeadlessBackend::new();
    let (mut renderer, _) = renderer_with(&mut backend, &ViewerConfig::default());
    let start = Vec3::new(0.1, 0.7, 0.3);
    renderer
        .update_object(
            &mut backend,
            "box",
            &RenderParams {
                transform: Transform::from_translate(start),
                ..Default::default()
            },
            vec![shapes::rectangle(Vec3::ZERO, 1.0, 1.0, Vec3::ONE)],
        )
        .unwrap();

    let mut controller = SelectionController::default();
    let at = |x: f32, y: f32| PointerInput {
        button_down: true,
        cursor_world: Vec3::new(x, y, 0.0),
        world_per_pixel: 0.01,
        ..Default::default()
    };
    controller.update(&mut renderer, &at(start.x, start.y));
    controller.update(&mut renderer, &at(start.x + 1.0, start.y));
    assert!((renderer.object("box").unwrap().translate() - (start + Vec3::X)).length() < 1e-6);
    controller.update(&mut renderer, &at(start.x, start.y));

    assert_eq!(renderer.object("box").unwrap().translate(), start);
}

#[test]
fn shapes_shrinking_in_place_keep_their_segment() {
    let mut backend = HeadlessBackend::new();
    let (mut renderer, _) = renderer_with(&mut backend, &ViewerConfig::default());
    renderer
        .update_object(
            &mut backend,
            "body",
            &RenderParams::default(),
            vec![shapes::cube(Vec3::ZERO, 1.0, Vec3::ONE)],
        )
        .unwrap();
    let before = renderer.object("body").unwrap().slots()[0].segment.unwrap();

    renderer
        .set_object_shapes(&mut backend, "body", vec![shapes::rectangle(Vec3::ZERO, 1.0, 1.0, Vec3::ONE)])
        .unwrap();
    let after = renderer.object("body").unwrap().slots()[0].segment.unwrap();

    assert_eq!(before.vertex_offset, after.vertex_offset);
    assert_eq!(renderer.buffer(BufferKind::Static).watermark(), (24, 36));
    renderer.draw(&mut backend, &CameraFrame::default());
    assert!(backend
        .commands()
        .iter()
        .any(|c| matches!(c, Command::DrawIndexed { indices, .. } if *indices == (0..6))));
}
