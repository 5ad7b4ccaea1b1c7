use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::monitor::MonitorHandle;
use winit::window::{Fullscreen, Window, WindowBuilder};

use crate::driver::{AnimationLoop, FrameScheduler};
use crate::error::RenderError;
use crate::gpu::GpuState;
use crate::resize::{ResizeSynchronizer, ViewportListeners};
use crate::runtime::{SystemTimeSource, TimeSource};
use crate::scene::assemble_on;
use crate::surface::{Attachment, Surface, SurfaceHost};
use crate::types::RendererConfig;

const FALLBACK_VIEWPORT: LogicalSize<u32> = LogicalSize::new(1280, 720);
const FALLBACK_REFRESH: Duration = Duration::from_micros(16_667);

/// Monitor output that can host the background.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputInfo {
    pub name: String,
    pub size: PhysicalSize<u32>,
    pub scale_factor: f64,
    pub refresh_millihertz: Option<u32>,
    pub primary: bool,
}

/// Enumerates monitor outputs usable as containers.
pub fn list_outputs() -> Result<Vec<OutputInfo>> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let primary = event_loop.primary_monitor();
    let outputs = event_loop
        .available_monitors()
        .map(|monitor| OutputInfo {
            name: monitor_name(&monitor),
            size: monitor.size(),
            scale_factor: monitor.scale_factor(),
            refresh_millihertz: monitor.refresh_rate_millihertz(),
            primary: primary.as_ref() == Some(&monitor),
        })
        .collect();
    Ok(outputs)
}

fn monitor_name(monitor: &MonitorHandle) -> String {
    monitor.name().unwrap_or_else(|| "unknown".to_string())
}

/// [`SurfaceHost`] over winit monitors; creates the window on attach.
struct WinitHost<'a> {
    target: &'a EventLoopWindowTarget<()>,
    config: &'a RendererConfig,
    window: RefCell<Option<Arc<Window>>>,
}

impl<'a> WinitHost<'a> {
    fn new(target: &'a EventLoopWindowTarget<()>, config: &'a RendererConfig) -> Self {
        Self {
            target,
            config,
            window: RefCell::new(None),
        }
    }

    fn find_monitor(&self, name: &str) -> Option<MonitorHandle> {
        self.target
            .available_monitors()
            .find(|monitor| monitor.name().as_deref() == Some(name))
    }

    fn default_monitor(&self) -> Option<MonitorHandle> {
        self.target
            .primary_monitor()
            .or_else(|| self.target.available_monitors().next())
    }

    fn monitor_for(&self, attachment: &Attachment) -> Option<MonitorHandle> {
        match attachment {
            Attachment::Container(name) => self.find_monitor(name),
            Attachment::DefaultRoot | Attachment::Detached { .. } => self.default_monitor(),
        }
    }

    fn take_window(&self) -> Option<Arc<Window>> {
        self.window.borrow_mut().take()
    }
}

impl SurfaceHost for WinitHost<'_> {
    type Backend = GpuState;

    fn has_container(&self, name: &str) -> bool {
        self.find_monitor(name).is_some()
    }

    fn viewport(&self, attachment: &Attachment) -> LogicalSize<u32> {
        if let Some((width, height)) = self.config.requested_size {
            return LogicalSize::new(width, height);
        }
        match self.monitor_for(attachment) {
            Some(monitor) => monitor.size().to_logical(monitor.scale_factor()),
            None => FALLBACK_VIEWPORT,
        }
    }

    fn device_pixel_ratio(&self, attachment: &Attachment) -> f64 {
        self.monitor_for(attachment)
            .map(|monitor| monitor.scale_factor())
            .unwrap_or(1.0)
    }

    fn create_backend(
        &self,
        attachment: &Attachment,
        physical: PhysicalSize<u32>,
    ) -> Result<GpuState, RenderError> {
        let mut builder = WindowBuilder::new()
            .with_title(self.config.title.clone())
            .with_inner_size(physical)
            .with_decorations(false);

        match attachment {
            Attachment::Detached { .. } => {
                builder = builder.with_visible(false);
            }
            _ if self.config.requested_size.is_some() => {}
            _ => {
                let monitor = self.monitor_for(attachment);
                builder = builder.with_fullscreen(Some(Fullscreen::Borderless(monitor)));
            }
        }

        let window = builder.build(self.target).map_err(|err| {
            RenderError::SurfaceUnavailable(format!("failed to create background window: {err}"))
        })?;
        let window = Arc::new(window);
        let gpu = GpuState::new(window.clone(), physical, self.config.antialiasing)?;
        *self.window.borrow_mut() = Some(window);
        Ok(gpu)
    }
}

/// Turns frame requests into winit redraws.
///
/// Hidden windows may never receive `RedrawRequested`, so detached surfaces
/// are ticked from a timer at the monitor refresh interval instead.
struct RedrawScheduler {
    window: Arc<Window>,
    pending: Rc<Cell<bool>>,
    detached: bool,
}

impl FrameScheduler for RedrawScheduler {
    fn request_frame(&mut self) {
        self.pending.set(true);
        if !self.detached {
            self.window.request_redraw();
        }
    }
}

/// Runs the background until the window is closed.
///
/// The surface is attached before `load_source` is awaited. Attach and
/// assembly failures are fatal and returned before any frame is drawn.
pub(crate) fn run<F>(config: RendererConfig, load_source: F) -> Result<()>
where
    F: FnOnce() -> Result<String>,
{
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let (surface, window, refresh) = {
        let host = WinitHost::new(&event_loop, &config);
        let surface = Surface::attach(&host, config.container.as_deref())?;
        let window = host
            .take_window()
            .ok_or_else(|| anyhow!("surface attached without a window"))?;
        let refresh = host
            .monitor_for(surface.attachment())
            .and_then(|monitor| monitor.refresh_rate_millihertz())
            .filter(|millihertz| *millihertz > 0)
            .map(|millihertz| Duration::from_secs_f64(1000.0 / millihertz as f64))
            .unwrap_or(FALLBACK_REFRESH);
        (Rc::new(RefCell::new(surface)), window, refresh)
    };

    let source = load_source().context("failed to load fragment program")?;
    let (scene, uniforms) = assemble_on(&mut surface.borrow_mut(), &source)?;

    let detached = !surface.borrow().is_attached();
    if detached {
        tracing::warn!(
            attachment = ?surface.borrow().attachment(),
            "rendering into a hidden window"
        );
    }

    let mut listeners = ViewportListeners::new();
    let _resize = ResizeSynchronizer::start(surface.clone(), uniforms.clone(), &mut listeners);

    let pending = Rc::new(Cell::new(false));
    let scheduler = RedrawScheduler {
        window: window.clone(),
        pending: pending.clone(),
        detached,
    };
    let mut driver = AnimationLoop::new(scene, uniforms, surface.clone(), scheduler);
    let mut clock = SystemTimeSource::new();
    clock.reset();
    driver.start();

    let mut next_timer_frame = Instant::now();
    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                driver.stop();
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                let ratio = surface.borrow().pixel_ratio();
                listeners.notify(new_size.to_logical(ratio));
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                tracing::debug!(scale_factor, "ignoring scale factor change after startup");
            }
            WindowEvent::RedrawRequested => {
                if pending.replace(false) {
                    driver.tick(clock.sample());
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if detached && pending.get() {
                let now = Instant::now();
                if now >= next_timer_frame {
                    pending.set(false);
                    driver.tick(clock.sample());
                    next_timer_frame = now + refresh;
                }
                elwt.set_control_flow(ControlFlow::WaitUntil(next_timer_frame));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
