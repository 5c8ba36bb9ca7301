//! Headless viewer demo
//!
//! Builds a small top-down scene, runs a few frames with a scripted pointer
//! that selects and drags an object, and prints buffer statistics.
//!
//! ```text
//! cargo run --example headless -- --frames 30
//! cargo run --example headless -- --gpu
//! ```

use clap::Parser;
use glam::Vec3;
use viewer_engine::backend::{GraphicsBackend, PrimitiveTopology, Vertex};
use viewer_engine::render::{BufferKind, PointShape, RecordingShader, RenderParams};
use viewer_engine::scene::{CameraFrame, Light, Transform};
use viewer_engine::{
    shapes, HeadlessBackend, PointerInput, RenderError, Renderer, SelectionController, SelectionEvent, ShaderLibrary,
    ViewerConfig, WgpuBackend,
};

/// Headless run of the viewer engine.
#[derive(Parser, Debug)]
#[command(name = "headless", about = "Run the viewer engine without a window", version)]
struct Args {
    /// Use a wgpu device instead of the CPU backend.
    #[arg(long)]
    gpu: bool,

    /// Number of frames to run.
    #[arg(long, default_value = "20")]
    frames: u32,

    /// Extra points added to force the static buffer to grow.
    #[arg(long, default_value = "2000")]
    points: u32,

    /// Initial static buffer vertex capacity.
    #[arg(long, default_value = "1024")]
    static_vertices: u32,

    /// Offscreen target size in pixels for --gpu.
    #[arg(long, default_value = "512")]
    size: u32,
}

const FLAT_SHADER: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
};
@group(0) @binding(0) var<uniform> camera: Camera;

struct VertexOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) colour: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) colour: vec3<f32>) -> VertexOut {
    var out: VertexOut;
    out.clip = camera.view_proj * vec4<f32>(position, 1.0);
    out.colour = colour;
    return out;
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    return vec4<f32>(in.colour, 1.0);
}
"#;

/// Colour target plus one flat-colour pipeline per drawable topology
struct OffscreenTarget {
    view: wgpu::TextureView,
    camera: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipelines: Vec<(PrimitiveTopology, wgpu::RenderPipeline)>,
    clear: wgpu::Color,
}

impl OffscreenTarget {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    fn new(device: &wgpu::Device, size: u32, background: [f32; 3]) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Target"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let camera = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform"),
            size: std::mem::size_of::<[f32; 16]>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera.as_entire_binding(),
            }],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flat Shader"),
            source: wgpu::ShaderSource::Wgsl(FLAT_SHADER.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flat Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let vertex_layout = Vertex::layout();
        let attributes = WgpuBackend::vertex_attributes(&vertex_layout);
        let pipelines = [
            PrimitiveTopology::PointList,
            PrimitiveTopology::LineList,
            PrimitiveTopology::LineStrip,
            PrimitiveTopology::TriangleList,
        ]
        .into_iter()
        .filter_map(|topology| {
            let native = WgpuBackend::convert_topology(topology)?;
            let strip_index_format = native.is_strip().then_some(wgpu::IndexFormat::Uint32);
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Flat Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_main",
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: vertex_layout.array_stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: native,
                    strip_index_format,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: Self::FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            });
            Some((topology, pipeline))
        })
        .collect();

        let [r, g, b] = background;
        Self {
            view,
            camera,
            bind_group,
            pipelines,
            clear: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
        }
    }

    fn pipeline(&self, topology: PrimitiveTopology) -> Option<&wgpu::RenderPipeline> {
        self.pipelines
            .iter()
            .find(|(t, _)| *t == topology)
            .map(|(_, pipeline)| pipeline)
    }

    /// Replay the frame the renderer just recorded into the target
    fn present(&self, backend: &WgpuBackend, camera: &CameraFrame) {
        let view_proj = camera.view_projection().to_cols_array();
        backend
            .queue()
            .write_buffer(&self.camera, 0, bytemuck::cast_slice(&view_proj));

        let mut encoder = backend
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Offscreen Frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Offscreen Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.bind_group, &[]);
            backend.replay(&mut pass, |_, topology| self.pipeline(topology));
        }
        backend.queue().submit(Some(encoder.finish()));
    }
}

fn build_scene(backend: &mut dyn GraphicsBackend, renderer: &mut Renderer, points: u32) -> Result<(), RenderError> {
    let grey = Vec3::splat(0.6);
    renderer.update_object(
        backend,
        "grid",
        &RenderParams {
            selectable: false,
            ..Default::default()
        },
        vec![shapes::grid(10.0, 1.0, grey)],
    )?;

    renderer.update_object(
        backend,
        "cube",
        &RenderParams {
            line_width: 2.0,
            transform: Transform::from_translate(Vec3::new(-2.0, 0.0, 0.0)),
            ..Default::default()
        },
        vec![
            shapes::cube(Vec3::ZERO, 1.0, Vec3::new(0.8, 0.2, 0.2)),
            shapes::cube_wireframe(Vec3::ZERO, 1.0, Vec3::ONE),
        ],
    )?;

    renderer.update_object(
        backend,
        "beam",
        &RenderParams::default(),
        shapes::beam(
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(3.0, 1.0, 0.0),
            0.2,
            0.2,
            Vec3::new(0.2, 0.6, 0.9),
            Vec3::ONE,
        )
        .into(),
    )?;

    renderer.update_object(
        backend,
        "ring",
        &RenderParams::default(),
        vec![
            shapes::circle(Vec3::new(0.0, 3.0, 0.0), 0.75, 32, Vec3::new(0.3, 0.8, 0.3)),
            shapes::circle_wireframe(Vec3::new(0.0, 3.0, 0.0), 0.75, 32, Vec3::ONE),
        ],
    )?;

    let cloud: Vec<Vec3> = (0..points)
        .map(|i| {
            let t = i as f32 * 0.37;
            Vec3::new(t.cos() * 4.0, t.sin() * 4.0, 0.0)
        })
        .collect();
    renderer.update_object(
        backend,
        "cloud",
        &RenderParams {
            point_size: 3.0,
            point_shape: PointShape::Square,
            selectable: false,
            ..Default::default()
        },
        vec![shapes::points(&cloud, Vec3::new(1.0, 0.8, 0.2))],
    )?;

    renderer.add_light(Light::ambient(Vec3::ONE, 0.2));
    renderer.add_light(Light::directional(Vec3::new(5.0, 5.0, 10.0), Vec3::ZERO, Vec3::ONE, 0.8));
    Ok(())
}

/// Pointer script: click on the cube, drag it two units right, release
fn pointer_at(frame: u32) -> PointerInput {
    let start = Vec3::new(-2.0, 0.0, 0.0);
    let cursor = match frame {
        0..=1 => start,
        2..=11 => start + Vec3::new((frame - 1) as f32 * 0.2, 0.0, 0.0),
        _ => start + Vec3::new(2.0, 0.0, 0.0),
    };
    PointerInput {
        button_down: (1..=11).contains(&frame),
        cursor_world: cursor,
        world_per_pixel: 0.01,
        camera_distance: 12.0,
        ..Default::default()
    }
}

/// Drive the scripted frames; `present` runs after each frame is recorded
fn run<B: GraphicsBackend>(
    backend: &mut B,
    args: &Args,
    mut present: impl FnMut(&B, &CameraFrame),
) -> Result<(), RenderError> {
    let config = ViewerConfig {
        static_buffer: viewer_engine::BufferConfig {
            max_vertices: args.static_vertices,
            max_indices: args.static_vertices * 3,
        },
        ..Default::default()
    };

    let (point_shader, _) = RecordingShader::new();
    let (surface_shader, calls) = RecordingShader::new();
    let mut shaders = ShaderLibrary::new();
    let points = shaders.register(Box::new(point_shader));
    let surfaces = shaders.register(Box::new(surface_shader));
    shaders.set_default(surfaces);
    shaders.set_point_default(points);

    let mut renderer = Renderer::new(backend, &config, shaders)?;
    let mut selection = SelectionController::new(config.selection.clone());
    build_scene(backend, &mut renderer, args.points)?;

    let camera = CameraFrame::top_down(Vec3::ZERO, 12.0, 12.0);
    for frame in 0..args.frames {
        let input = pointer_at(frame);
        for event in selection.update(&mut renderer, &input) {
            match event {
                SelectionEvent::Selected { name, selected } => {
                    log::info!("frame {frame}: '{name}' selected = {selected}");
                }
                SelectionEvent::Dragged { names, offset } => {
                    log::debug!("frame {frame}: dragged {names:?} by {offset}");
                }
            }
        }
        selection.update_overlays(backend, &mut renderer, &input)?;

        let stats = renderer.draw(backend, &camera);
        present(backend, &camera);
        log::debug!(
            "frame {frame}: {} shader binds, {} batches, {} draw calls",
            stats.shader_binds,
            stats.batches,
            stats.draw_calls
        );
    }

    if let Some(cube) = renderer.object("cube") {
        println!("cube translate: {}", cube.translate());
    }
    for stats in renderer.stats() {
        println!("{stats}");
    }
    println!("frame: {:?}", renderer.last_frame());
    println!("model uploads: {}", calls.borrow().model_matrices.len());
    println!(
        "dynamic objects: {}",
        renderer.buffer(BufferKind::Dynamic).len()
    );

    renderer.shutdown(backend);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = if args.gpu {
        match WgpuBackend::new_headless() {
            Ok(mut backend) => {
                log::info!("Using wgpu backend");
                let target = OffscreenTarget::new(
                    backend.device(),
                    args.size.max(1),
                    ViewerConfig::default().background_colour,
                );
                run(&mut backend, &args, |backend, camera| target.present(backend, camera))
            }
            Err(e) => {
                log::error!("Failed to create wgpu backend: {e}");
                std::process::exit(1);
            }
        }
    } else {
        log::info!("Using headless backend");
        run(&mut HeadlessBackend::new(), &args, |backend, _| {
            log::trace!("frame recorded {} commands", backend.commands().len());
        })
    };

    if let Err(e) = result {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}
