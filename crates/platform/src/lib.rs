//! Platform layer: windowing & event loop for the mesh viewer.
//!
//! The mesh is built and uploaded once the window and GPU exist, drawn every
//! frame, and released on the same context before the event loop returns.

use std::sync::Arc;

use anyhow::{Context, Result};
use asset::MeshSource;
use renderer::{GpuMesh, GpuState, RendererError, upload_mesh};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

/// Everything the viewer needs to start.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub backends: wgpu::Backends,
    pub width: u32,
    pub height: u32,
    pub source: MeshSource,
}

/// Open a window showing `config.source`. Returns when the window is closed.
pub fn run_viewer(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp {
        config,
        window: None,
        gpu: None,
        mesh: None,
        failure: None,
    };
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow::anyhow!("Event loop error: {e:?}"))?;

    app.release_mesh();
    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct ViewerApp {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    mesh: Option<GpuMesh>,
    failure: Option<anyhow::Error>,
}

impl ViewerApp {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(format!("Svarog3D mesh viewer - {}", self.config.source))
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let mut gpu = pollster::block_on(GpuState::new(window.clone(), self.config.backends))
            .context("Failed to initialize GPU")?;

        let mesh = self
            .config
            .source
            .build()
            .with_context(|| format!("Failed to build mesh from {}", self.config.source))?;
        let mesh = upload_mesh(gpu.context_mut(), mesh).context("Failed to upload mesh")?;
        log::info!(
            "Mesh ready ({}): count={}, indexed={}",
            self.config.source,
            mesh.count(),
            mesh.mesh().is_indexed()
        );

        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        self.mesh = Some(mesh);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(gpu), Some(mesh)) = (self.gpu.as_mut(), self.mesh.as_ref()) else {
            return;
        };
        match gpu.render(mesh) {
            Ok(()) => {}
            Err(err) if GpuState::is_surface_lost(&err) => {
                log::warn!("Surface lost/outdated, reconfiguring");
                gpu.recreate_surface();
            }
            Err(RendererError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("Out of GPU memory, exiting");
                event_loop.exit();
            }
            Err(err) => log::warn!("Frame skipped: {err}"),
        }
    }

    fn release_mesh(&mut self) {
        if let (Some(gpu), Some(mesh)) = (self.gpu.as_mut(), self.mesh.take()) {
            mesh.destroy(gpu.context_mut());
            log::info!("Mesh released");
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            log::error!("{err:#}");
            self.failure = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                self.release_mesh();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::info!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::info!("Scale factor changed: {:.3}", scale_factor);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}
