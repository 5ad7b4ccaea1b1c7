//! Renderer crate for Backdrop, an animated full-screen shader background.
//!
//! The crate glues a winit window, the `wgpu` pipeline and a WebGL-style
//! fragment program together. The overall flow is:
//!
//! ```text
//!   backdrop CLI
//!        │ RendererConfig + shader source
//!        ▼
//!   Renderer::run ──▶ Surface::attach ──▶ scene::assemble_on ──▶ AnimationLoop
//!                          ▲                                         │ tick
//!      winit Resized ──▶ ResizeSynchronizer                          ▼
//!                          └──▶ UniformState ◀── u_time ── Surface::draw
//! ```
//!
//! Everything runs on the event loop thread. The surface, uniform state and
//! loop driver share state through `Rc<RefCell<_>>`, and every platform
//! capability (host, backend, viewport source, frame scheduler) sits behind a
//! trait so the pipeline can be driven without a GPU in tests.

mod compile;
pub mod driver;
pub mod error;
mod gpu;
pub mod program;
pub mod resize;
pub mod runtime;
pub mod scene;
pub mod still;
pub mod surface;
mod types;
pub mod uniforms;
mod window;

use anyhow::Result;

pub use compile::{wrap_fragment, NagaCompiler, ProgramCompiler};
pub use driver::{AnimationLoop, ErrorSink, FrameScheduler, LogSink, LoopState};
pub use error::RenderError;
pub use program::{Blob, FragmentProgram, Grain, ProgramPreset, ProgramTuning, WaveTerm};
pub use resize::{
    ResizeSynchronizer, SharedSurface, SubscriptionId, ViewportListeners, ViewportSource,
};
pub use scene::{
    assemble, assemble_on, assemble_on_with, assemble_with, Camera, Material, QuadGeometry, Scene,
};
pub use still::{export_png, render_still};
pub use surface::{Attachment, FrameRequest, Surface, SurfaceBackend, SurfaceHost};
pub use types::{Antialiasing, RendererConfig};
pub use uniforms::{UniformChange, UniformHandle, UniformSnapshot, UniformState};
pub use window::{list_outputs, OutputInfo};

pub use wgpu::naga::ShaderStage;

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    /// Builds a renderer for the supplied configuration.
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Attaches the surface, waits for the program source, then animates until
    /// the window closes.
    ///
    /// `SurfaceUnavailable` and `ShaderCompile` failures abort startup and are
    /// returned before any frame is drawn.
    pub fn run<F>(self, load_source: F) -> Result<()>
    where
        F: FnOnce() -> Result<String>,
    {
        window::run(self.config, load_source)
    }
}
