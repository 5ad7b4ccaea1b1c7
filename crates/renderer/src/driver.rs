use std::time::Duration;

use crate::error::RenderError;
use crate::resize::SharedSurface;
use crate::scene::Scene;
use crate::surface::SurfaceBackend;
use crate::uniforms::UniformHandle;

/// Frame-synchronised callback primitive (one callback per display refresh).
pub trait FrameScheduler {
    /// Asks the host to call [`AnimationLoop::tick`] on the next refresh.
    fn request_frame(&mut self);
}

/// Receives recoverable per-frame failures.
pub trait ErrorSink {
    fn report(&mut self, error: &RenderError);
}

impl<F> ErrorSink for F
where
    F: FnMut(&RenderError),
{
    fn report(&mut self, error: &RenderError) {
        self(error)
    }
}

/// Default sink: logs and moves on.
///
/// Consecutive identical failures are collapsed: after the first warning only
/// the 1st, 2nd, 4th, 8th, ... repeat is logged.
#[derive(Debug, Default, Clone)]
pub struct LogSink {
    last: Option<String>,
    repeats: u64,
    warnings: u64,
}

impl LogSink {
    /// Number of warnings actually emitted.
    pub fn warnings_logged(&self) -> u64 {
        self.warnings
    }
}

impl ErrorSink for LogSink {
    fn report(&mut self, error: &RenderError) {
        let message = error.to_string();
        if self.last.as_deref() == Some(message.as_str()) {
            self.repeats += 1;
            if self.repeats.is_power_of_two() {
                self.warnings += 1;
                tracing::warn!(%error, repeats = self.repeats, "background frames still failing");
            }
            return;
        }

        if self.repeats > 0 {
            tracing::debug!(repeats = self.repeats, "previous frame failure stopped repeating");
        }
        self.last = Some(message);
        self.repeats = 0;
        self.warnings += 1;
        tracing::warn!(%error, "skipped background frame");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

/// Rolling frame-rate counter reported at debug level once per second.
#[derive(Debug, Default)]
struct FrameStats {
    window_start: Option<Duration>,
    frames: u32,
}

impl FrameStats {
    fn record(&mut self, timestamp: Duration, time: f64, total: u64) {
        let start = *self.window_start.get_or_insert(timestamp);
        self.frames += 1;
        let elapsed = timestamp.saturating_sub(start);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames as f32 / elapsed.as_secs_f32();
            tracing::debug!(fps = fps.round(), frame_count = total, time, "render stats");
            self.window_start = Some(timestamp);
            self.frames = 0;
        }
    }
}

/// Perpetual per-frame update/redraw cycle.
///
/// `Idle → Running → Stopped`. Production never calls [`AnimationLoop::stop`];
/// it exists so tests terminate deterministically and so a host can tear the
/// loop down later.
pub struct AnimationLoop<B, S> {
    state: LoopState,
    scene: Scene,
    uniforms: UniformHandle,
    surface: SharedSurface<B>,
    scheduler: S,
    sink: Box<dyn ErrorSink>,
    frames_drawn: u64,
    frames_skipped: u64,
    stats: FrameStats,
}

impl<B, S> AnimationLoop<B, S>
where
    B: SurfaceBackend,
    S: FrameScheduler,
{
    pub fn new(scene: Scene, uniforms: UniformHandle, surface: SharedSurface<B>, scheduler: S) -> Self {
        Self {
            state: LoopState::Idle,
            scene,
            uniforms,
            surface,
            scheduler,
            sink: Box::new(LogSink::default()),
            frames_drawn: 0,
            frames_skipped: 0,
            stats: FrameStats::default(),
        }
    }

    pub fn with_error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Moves Idle → Running and schedules the first tick.
    pub fn start(&mut self) {
        if self.state != LoopState::Idle {
            tracing::warn!(state = ?self.state, "animation loop already started");
            return;
        }
        self.state = LoopState::Running;
        tracing::info!("background animation loop running");
        self.scheduler.request_frame();
    }

    /// Runs one frame. `timestamp` is the monotonic time since loop start.
    pub fn tick(&mut self, timestamp: Duration) {
        if self.state != LoopState::Running {
            return;
        }

        let seconds = timestamp.as_secs_f64();
        if let Err(err) = self.uniforms.set_time(seconds) {
            // Keep the last valid time and still present a frame.
            tracing::warn!(error = %err, "time uniform update rejected");
        }

        let camera = *self.scene.camera();
        let result = self.surface.borrow_mut().draw(&self.scene, &camera);
        match result {
            Ok(()) => {
                self.frames_drawn += 1;
                self.stats.record(timestamp, seconds, self.frames_drawn);
            }
            Err(err) => {
                self.frames_skipped += 1;
                self.sink.report(&err);
            }
        }

        self.scheduler.request_frame();
    }

    /// Moves to Stopped; pending callbacks become no-ops.
    pub fn stop(&mut self) {
        if self.state == LoopState::Running {
            tracing::info!(frames = self.frames_drawn, "background animation loop stopped");
        }
        self.state = LoopState::Stopped;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}
