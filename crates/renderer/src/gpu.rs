//! Viewer GPU state: surface + depth + mesh pipeline + camera UBO.
//! wgpu = 26.x, winit = 0.30.x

use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use thiserror::Error;
use wgpu::{
    BindGroup, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BlendState, Buffer,
    BufferBindingType, BufferUsages, ColorTargetState, ColorWrites, CommandEncoderDescriptor,
    DepthBiasState, DepthStencilState, DeviceDescriptor, Extent3d, Features, FragmentState,
    Instance, InstanceDescriptor, Limits, LoadOp, Operations, PipelineLayoutDescriptor,
    PowerPreference, PresentMode, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor, ShaderSource, ShaderStages,
    StoreOp, Surface, SurfaceConfiguration, SurfaceError, TextureDescriptor, TextureDimension,
    TextureFormat, TextureUsages, TextureView, TextureViewDescriptor, VertexBufferLayout,
    VertexState, VertexStepMode, util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    context::{AttributeFormat, GraphicsError},
    draw::draw_mesh,
    upload::{GpuMesh, NORMAL_SLOT, POSITION_SLOT},
    wgpu_context::WgpuContext,
};

/// Formats of vertex-buffer slots 0.. consumed by the mesh pipeline.
const MESH_SLOT_FORMATS: [AttributeFormat; 2] = [AttributeFormat::Float32x3, AttributeFormat::Float32x3];

const POSITION_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: AttributeFormat::Float32x3.size() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![POSITION_SLOT => Float32x3],
};

const NORMAL_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: AttributeFormat::Float32x3.size() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![NORMAL_SLOT => Float32x3],
};

/// Camera UBO (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    mvp: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
}

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    IncompatibleSurface,
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue + binding model
    context: WgpuContext,

    // Pipeline
    pipeline: RenderPipeline,

    // Camera
    camera_bg: BindGroup,
    camera_buf: Buffer,
    start: Instant,

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, backends: wgpu::Backends) -> Result<Self, RendererError> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Mesh Viewer Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RendererError::IncompatibleSurface)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);

        // ==== Shader ====
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Mesh WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        // ==== Camera BGL/BG ====
        let camera_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Camera BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<CameraUniform>() as u64),
                },
                count: None,
            }],
        });

        let camera_init = CameraUniform {
            mvp: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
        };
        let camera_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera UBO"),
            contents: bytemuck::bytes_of(&camera_init),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let camera_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera BG"),
            layout: &camera_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buf.as_entire_binding(),
            }],
        });

        // ==== Pipeline ====
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Mesh PipelineLayout"),
            bind_group_layouts: &[&camera_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[POSITION_LAYOUT, NORMAL_LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            // No culling: OBJ winding is whatever the exporter wrote.
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            surface_config,
            context: WgpuContext::new(device, queue),
            pipeline,
            camera_bg,
            camera_buf,
            start: Instant::now(),
            depth_view,
            width,
            height,
        })
    }

    /// Context to upload meshes into and release them from.
    #[inline]
    pub fn context_mut(&mut self) -> &mut WgpuContext {
        &mut self.context
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(self.context.device(), &self.surface_config);
        self.depth_view = create_depth_view(self.context.device(), &self.surface_config);
    }

    /// Render one frame: update MVP + clear + draw the mesh, slowly spinning.
    pub fn render(&mut self, mesh: &GpuMesh) -> Result<(), RendererError> {
        // --- update MVP
        let t = self.start.elapsed().as_secs_f32();
        let aspect = self.width as f32 / self.height as f32;
        let proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.8, 3.2), Vec3::ZERO, Vec3::Y);
        let model = Mat4::from_rotation_y(0.6 * t) * fit_to_unit(mesh.mesh().bounds());
        let cam = CameraUniform {
            mvp: (proj * view * model).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
        };
        self.context
            .queue()
            .write_buffer(&self.camera_buf, 0, bytemuck::bytes_of(&cam));

        // --- frame & pass
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        self.context.begin_frame();
        draw_mesh(&mut self.context, mesh)?;

        let mut encoder = self
            .context
            .device()
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.08,
                            a: 1.0,
                        }),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.camera_bg, &[]);
            self.context.replay(&mut rpass, &MESH_SLOT_FORMATS);
        }

        self.context.queue().submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &RendererError) -> bool {
        matches!(
            err,
            RendererError::Surface(SurfaceError::Lost | SurfaceError::Outdated)
        )
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

/// Model transform that centers `bounds` at the origin and scales its largest
/// half-extent to 1.
pub fn fit_to_unit(bounds: Option<([f32; 3], [f32; 3])>) -> Mat4 {
    let Some((min, max)) = bounds else {
        return Mat4::IDENTITY;
    };
    let (min, max) = (Vec3::from(min), Vec3::from(max));
    let center = (min + max) * 0.5;
    let half = ((max - min) * 0.5).max_element();
    let scale = if half > f32::EPSILON { 1.0 / half } else { 1.0 };
    Mat4::from_scale(Vec3::splat(scale)) * Mat4::from_translation(-center)
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &wgpu::Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_maps_bounds_into_unit_cube() {
        let m = fit_to_unit(Some(([0.0, 0.0, 0.0], [4.0, 2.0, 2.0])));
        let lo = m.transform_point3(Vec3::ZERO);
        let hi = m.transform_point3(Vec3::new(4.0, 2.0, 2.0));
        assert!((lo - Vec3::new(-1.0, -0.5, -0.5)).length() < 1e-6);
        assert!((hi - Vec3::new(1.0, 0.5, 0.5)).length() < 1e-6);
    }

    #[test]
    fn fit_handles_empty_and_degenerate_bounds() {
        assert_eq!(fit_to_unit(None), Mat4::IDENTITY);
        let m = fit_to_unit(Some(([1.0; 3], [1.0; 3])));
        assert!(m.transform_point3(Vec3::ONE).length() < 1e-6);
    }

    #[test]
    fn camera_uniform_is_aligned() {
        assert_eq!(std::mem::size_of::<CameraUniform>() % 16, 0);
    }
}
