/*
 * Renderer Module
 *
 * This module draws the render attributes written by the last step into a
 * render target sized to the surface. The attributes buffer is bound as the
 * vertex buffer, the camera is applied in the vertex stage, and every draw
 * issues exactly `entity_count * vertices_per_entity` vertices. The window
 * presents the target each frame; headless runs can read it back.
 *
 * Surface size changes are recorded as requests and applied right before the
 * next draw, only when the clamped dimensions really differ. Applying one
 * recreates the render target at the new size.
 */

use bytemuck::{Pod, Zeroable};
use nannou::wgpu;

use crate::camera::Camera;
use crate::device::{Buffer, Device};
use crate::entity::{Variant, VERTEX_STRIDE};
use crate::error::{SimResult, SimulationError};

/// Pixel format of the render target.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x4,
    offset: 0,
    shader_location: 0,
}];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
}

impl SurfaceConfig {
    // Clamp to what the device can present
    pub fn clamped(width: u32, height: u32, max_dimension: u32) -> Self {
        let max_dimension = max_dimension.max(1);
        Self {
            width: width.clamp(1, max_dimension),
            height: height.clamp(1, max_dimension),
        }
    }
}

// Vertex stage uniform, laid out like `Camera` in render.wgsl
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct CameraUniform {
    position: [f32; 2],
    half_size: [f32; 2],
    zoom: f32,
    _pad: [f32; 3],
    color: [f32; 4],
}

/// What the last draw covered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRecord {
    pub vertex_count: u32,
    pub surface: SurfaceConfig,
}

pub struct Renderer {
    vertices_per_entity: u32,
    color: [f32; 4],
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    camera_buffer: Buffer,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    config: SurfaceConfig,
    pending: Option<SurfaceConfig>,
    max_dimension: u32,
    reconfigurations: u64,
    draws: u64,
    last_draw: DrawRecord,
}

fn create_target(device: &Device, config: SurfaceConfig) -> (wgpu::Texture, wgpu::TextureView) {
    let target = wgpu::TextureBuilder::new()
        .size([config.width, config.height])
        .format(TARGET_FORMAT)
        .usage(
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        )
        .sample_count(1)
        .build(device.raw());
    let view = target.view().build();
    (target, view)
}

impl Renderer {
    pub fn new(device: &Device, variant: Variant, size: (u32, u32)) -> SimResult<Self> {
        let raw = device.raw();
        let shader = raw.create_shader_module(&wgpu::include_wgsl!("shaders/render.wgsl"));

        let camera_buffer = device.create_buffer(
            "camera buffer",
            std::mem::size_of::<CameraUniform>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;
        let bind_group_layout = wgpu::BindGroupLayoutBuilder::new()
            .uniform_buffer(wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT, false)
            .build(raw);
        let bind_group = wgpu::BindGroupBuilder::new()
            .buffer_bytes(camera_buffer.raw(), 0, None)
            .build(raw, &bind_group_layout);
        let pipeline_layout =
            wgpu::create_pipeline_layout(raw, Some("render pipeline layout"), &[&bind_group_layout], &[]);

        let pipeline = wgpu::RenderPipelineBuilder::from_layout(&pipeline_layout, &shader)
            .vertex_entry_point("vs_main")
            .fragment_shader(&shader)
            .fragment_entry_point("fs_main")
            .color_format(TARGET_FORMAT)
            .add_vertex_buffer_layout(wgpu::VertexBufferLayout {
                array_stride: VERTEX_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &VERTEX_ATTRIBUTES,
            })
            .primitive_topology(wgpu::PrimitiveTopology::TriangleList)
            .cull_mode(None)
            .sample_count(1)
            .build(raw);
        device.take_error()?;

        let max_dimension = device.limits().max_texture_dimension_2d;
        let config = SurfaceConfig::clamped(size.0, size.1, max_dimension);
        let (target, target_view) = create_target(device, config);

        let color = match variant {
            Variant::Flock => [0.86, 0.86, 0.86, 1.0],
            Variant::Life => [0.47, 0.78, 0.47, 1.0],
        };

        Ok(Self {
            vertices_per_entity: variant.vertices_per_entity(),
            color,
            pipeline,
            bind_group,
            camera_buffer,
            target,
            target_view,
            config,
            pending: None,
            max_dimension,
            reconfigurations: 0,
            draws: 0,
            last_draw: DrawRecord {
                vertex_count: 0,
                surface: config,
            },
        })
    }

    // Record a surface size; applied before the next draw
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending = Some(SurfaceConfig::clamped(width, height, self.max_dimension));
    }

    fn apply_pending_resize(&mut self, device: &Device) {
        if let Some(requested) = self.pending.take() {
            if requested != self.config {
                log::debug!(
                    "reconfiguring surface {}x{} -> {}x{}",
                    self.config.width,
                    self.config.height,
                    requested.width,
                    requested.height
                );
                let (target, target_view) = create_target(device, requested);
                self.target = target;
                self.target_view = target_view;
                self.config = requested;
                self.reconfigurations += 1;
            }
        }
    }

    pub fn render(
        &mut self,
        device: &Device,
        entity_count: u32,
        attributes: &Buffer,
        camera: &Camera,
    ) -> SimResult<&DrawRecord> {
        self.apply_pending_resize(device);

        let vertex_count = entity_count * self.vertices_per_entity;
        let needed = vertex_count as u64 * VERTEX_STRIDE;
        if !attributes.usage().contains(wgpu::BufferUsages::VERTEX) {
            return Err(SimulationError::Binding(format!(
                "buffer '{}' was not created with VERTEX usage",
                attributes.label()
            )));
        }
        if attributes.size() < needed {
            return Err(SimulationError::Binding(format!(
                "draw of {} vertices needs {} bytes, '{}' holds {}",
                vertex_count,
                needed,
                attributes.label(),
                attributes.size()
            )));
        }

        let uniform = CameraUniform {
            position: camera.position.to_array(),
            half_size: [self.config.width as f32 / 2.0, self.config.height as f32 / 2.0],
            zoom: camera.zoom,
            _pad: [0.0; 3],
            color: self.color,
        };
        device.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform))?;

        let mut encoder = device.create_command_encoder("render encoder");
        {
            let mut pass = wgpu::RenderPassBuilder::new()
                .color_attachment(&self.target_view, |color| {
                    color.load_op(wgpu::LoadOp::Clear(wgpu::Color::BLACK))
                })
                .begin(&mut encoder);
            if vertex_count > 0 {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &self.bind_group, &[]);
                pass.set_vertex_buffer(0, attributes.raw().slice(..needed));
                pass.draw(0..vertex_count, 0..1);
            }
        }
        device.submit(encoder);
        device.on_submitted_work_done().wait()?;

        self.draws += 1;
        self.last_draw = DrawRecord {
            vertex_count,
            surface: self.config,
        };
        Ok(&self.last_draw)
    }

    pub fn last_draw(&self) -> &DrawRecord {
        &self.last_draw
    }

    // Texture the last draw landed in
    pub fn target(&self) -> &wgpu::Texture {
        &self.target
    }

    pub fn target_view(&self) -> &wgpu::TextureView {
        &self.target_view
    }

    pub fn config(&self) -> SurfaceConfig {
        self.config
    }

    pub fn reconfiguration_count(&self) -> u64 {
        self.reconfigurations
    }

    pub fn draw_count(&self) -> u64 {
        self.draws
    }
}
