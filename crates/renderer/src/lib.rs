//! Renderer: mesh upload and draw through an explicit graphics context.
//!
//! - [`context`]: the context trait and typed object handles.
//! - [`upload`] / [`draw`]: backend-independent mesh upload, release and draw.
//! - [`recording`]: headless backend that logs commands.
//! - [`wgpu_context`] + [`gpu`]: wgpu backend and the viewer's frame loop state.

pub mod context;
pub mod draw;
pub mod gpu;
pub mod recording;
pub mod state;
pub mod upload;
pub mod wgpu_context;

pub use context::{GraphicsContext, GraphicsError, GraphicsResult};
pub use draw::draw_mesh;
pub use gpu::{GpuState, RendererError};
pub use recording::RecordingContext;
pub use upload::{GpuHandles, GpuMesh, upload_mesh};
pub use wgpu_context::WgpuContext;
