use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use winit::dpi::LogicalSize;

use crate::surface::{Surface, SurfaceBackend};
use crate::uniforms::UniformHandle;

/// Surface shared between the resize synchronizer and the loop driver.
pub type SharedSurface<B> = Rc<RefCell<Surface<B>>>;

/// Callback invoked with the new logical viewport size.
pub type ViewportListener = Box<dyn FnMut(LogicalSize<u32>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Source of "viewport size changed" notifications.
pub trait ViewportSource {
    fn subscribe(&mut self, listener: ViewportListener) -> SubscriptionId;
    /// Returns false when the id was not subscribed.
    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;
}

/// Plain listener list; hosts call [`ViewportListeners::notify`] when the
/// platform reports a new size.
#[derive(Default)]
pub struct ViewportListeners {
    next_id: u64,
    listeners: Vec<(SubscriptionId, ViewportListener)>,
}

impl ViewportListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, size: LogicalSize<u32>) {
        for (_, listener) in &mut self.listeners {
            listener(size);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for ViewportListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportListeners")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ViewportSource for ViewportListeners {
    fn subscribe(&mut self, listener: ViewportListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }
}

/// Keeps the surface size and the resolution uniform in lockstep.
///
/// Each notification resizes the surface first and only then publishes the
/// resolution, inside the same callback, so no draw ever pairs a new
/// resolution with a stale backing buffer.
#[derive(Debug)]
pub struct ResizeSynchronizer {
    subscription: Option<SubscriptionId>,
}

impl ResizeSynchronizer {
    pub fn start<B, V>(surface: SharedSurface<B>, uniforms: UniformHandle, source: &mut V) -> Self
    where
        B: SurfaceBackend + 'static,
        V: ViewportSource + ?Sized,
    {
        let id = source.subscribe(Box::new(move |size| {
            apply_resize(&surface, &uniforms, size);
        }));
        Self {
            subscription: Some(id),
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Drops the subscription. Production keeps it for the process lifetime.
    pub fn stop<V>(&mut self, source: &mut V) -> bool
    where
        V: ViewportSource + ?Sized,
    {
        match self.subscription.take() {
            Some(id) => source.unsubscribe(id),
            None => false,
        }
    }
}

fn apply_resize<B: SurfaceBackend>(
    surface: &SharedSurface<B>,
    uniforms: &UniformHandle,
    size: LogicalSize<u32>,
) {
    if size.width == 0 || size.height == 0 {
        tracing::debug!(
            width = size.width,
            height = size.height,
            "ignoring zero-sized viewport"
        );
        return;
    }
    surface.borrow_mut().resize(size.width, size.height);
    if let Err(err) = uniforms.set_resolution(size.width, size.height) {
        tracing::warn!(error = %err, "resolution update rejected after resize");
        return;
    }
    tracing::debug!(
        width = size.width,
        height = size.height,
        "synchronised surface and resolution"
    );
}
