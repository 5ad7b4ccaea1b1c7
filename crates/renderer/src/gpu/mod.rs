//! GPU side of the background surface.
//!
//! - `context` owns wgpu instance/device/surface wiring and knows how to
//!   rebuild swapchain state when the window resizes.
//! - `pipeline` compiles wrapped GLSL into render pipelines with a single
//!   uniform bind group layout.
//! - `state` glues everything together and implements
//!   [`crate::surface::SurfaceBackend`] for the winit host.

mod context;
mod pipeline;
mod state;

pub(crate) use state::GpuState;
