use winit::dpi::{LogicalSize, PhysicalSize};

use crate::error::RenderError;
use crate::scene::{Camera, Material, Scene};
use crate::uniforms::UniformSnapshot;

/// Where a surface ended up in the host tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Inserted into the named container.
    Container(String),
    /// No container was requested; the host's default root was used.
    DefaultRoot,
    /// The requested container does not exist. The surface still renders but
    /// is not reachable from the host tree.
    Detached { requested: String },
}

impl Attachment {
    pub fn is_attached(&self) -> bool {
        !matches!(self, Attachment::Detached { .. })
    }
}

/// Everything a backend needs to render one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub uniforms: UniformSnapshot,
    pub physical: PhysicalSize<u32>,
}

/// GPU side of a surface.
pub trait SurfaceBackend {
    /// Reallocates the backing buffer. Compiled pipelines must survive.
    fn configure(&mut self, physical: PhysicalSize<u32>);
    /// Builds whatever the material needs before the first frame.
    ///
    /// A program the target pipeline refuses is reported as
    /// [`RenderError::ShaderCompile`].
    fn prepare(&mut self, _material: &Material) -> Result<(), RenderError> {
        Ok(())
    }
    /// Renders one frame synchronously.
    fn render(&mut self, frame: &FrameRequest<'_>) -> Result<(), RenderError>;
}

/// Platform capabilities needed to create a surface.
pub trait SurfaceHost {
    type Backend: SurfaceBackend;

    fn has_container(&self, name: &str) -> bool;
    /// Logical viewport size for the given attachment.
    fn viewport(&self, attachment: &Attachment) -> LogicalSize<u32>;
    /// Read once at attach time.
    fn device_pixel_ratio(&self, attachment: &Attachment) -> f64;
    /// Fails with [`RenderError::SurfaceUnavailable`] when no rendering context exists.
    fn create_backend(
        &self,
        attachment: &Attachment,
        physical: PhysicalSize<u32>,
    ) -> Result<Self::Backend, RenderError>;
}

/// Drawing surface scaled by the device pixel ratio and sized to the viewport.
#[derive(Debug)]
pub struct Surface<B> {
    backend: B,
    logical: LogicalSize<u32>,
    pixel_ratio: f64,
    attachment: Attachment,
}

impl<B: SurfaceBackend> Surface<B> {
    /// Creates the surface and attaches it to `container`.
    ///
    /// `None` uses the default root. A container that does not exist is
    /// tolerated: the surface is returned detached.
    pub fn attach<H>(host: &H, container: Option<&str>) -> Result<Self, RenderError>
    where
        H: SurfaceHost<Backend = B>,
    {
        let attachment = match container {
            None => Attachment::DefaultRoot,
            Some(name) if host.has_container(name) => Attachment::Container(name.to_string()),
            Some(name) => {
                tracing::debug!(container = name, "container not found; surface stays detached");
                Attachment::Detached {
                    requested: name.to_string(),
                }
            }
        };

        let viewport = host.viewport(&attachment);
        let logical = LogicalSize::new(viewport.width.max(1), viewport.height.max(1));
        let pixel_ratio = sanitize_ratio(host.device_pixel_ratio(&attachment));
        let physical = physical_size(logical, pixel_ratio);
        let backend = host.create_backend(&attachment, physical)?;

        tracing::info!(
            ?attachment,
            width = logical.width,
            height = logical.height,
            pixel_ratio,
            "attached background surface"
        );

        Ok(Self {
            backend,
            logical,
            pixel_ratio,
            attachment,
        })
    }

    /// Resizes the backing buffer. Zero dimensions are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.logical = LogicalSize::new(width, height);
        let physical = self.physical_size();
        self.backend.configure(physical);
    }

    /// Compiles the scene's material against this surface's pipeline.
    pub fn prepare(&mut self, scene: &Scene) -> Result<(), RenderError> {
        self.backend.prepare(scene.material())
    }

    /// Renders one frame with the uniforms currently bound to the scene's material.
    pub fn draw(&mut self, scene: &Scene, camera: &Camera) -> Result<(), RenderError> {
        let frame = FrameRequest {
            scene,
            camera,
            uniforms: scene.material().uniforms().snapshot(),
            physical: self.physical_size(),
        };
        self.backend.render(&frame)
    }

    pub fn logical_size(&self) -> LogicalSize<u32> {
        self.logical
    }

    pub fn physical_size(&self) -> PhysicalSize<u32> {
        physical_size(self.logical, self.pixel_ratio)
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_attached()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

fn physical_size(logical: LogicalSize<u32>, pixel_ratio: f64) -> PhysicalSize<u32> {
    let width = (logical.width as f64 * pixel_ratio).round().max(1.0) as u32;
    let height = (logical.height as f64 * pixel_ratio).round().max(1.0) as u32;
    PhysicalSize::new(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct NullBackend {
        configured: Vec<PhysicalSize<u32>>,
    }

    impl SurfaceBackend for NullBackend {
        fn configure(&mut self, physical: PhysicalSize<u32>) {
            self.configured.push(physical);
        }

        fn render(&mut self, _frame: &FrameRequest<'_>) -> Result<(), RenderError> {
            Ok(())
        }
    }

    struct Desk {
        ratio: f64,
        available: bool,
    }

    impl SurfaceHost for Desk {
        type Backend = NullBackend;

        fn has_container(&self, name: &str) -> bool {
            name == "DP-1"
        }

        fn viewport(&self, _attachment: &Attachment) -> LogicalSize<u32> {
            LogicalSize::new(800, 600)
        }

        fn device_pixel_ratio(&self, _attachment: &Attachment) -> f64 {
            self.ratio
        }

        fn create_backend(
            &self,
            _attachment: &Attachment,
            physical: PhysicalSize<u32>,
        ) -> Result<NullBackend, RenderError> {
            if !self.available {
                return Err(RenderError::SurfaceUnavailable("no adapter".into()));
            }
            Ok(NullBackend {
                configured: vec![physical],
            })
        }
    }

    #[test]
    fn backing_buffer_scales_with_pixel_ratio() {
        let desk = Desk {
            ratio: 2.0,
            available: true,
        };
        let mut surface = Surface::attach(&desk, Some("DP-1")).unwrap();
        assert_eq!(surface.attachment(), &Attachment::Container("DP-1".into()));
        assert_eq!(surface.logical_size(), LogicalSize::new(800, 600));
        assert_eq!(surface.physical_size(), PhysicalSize::new(1600, 1200));

        surface.resize(1024, 768);
        assert_eq!(surface.logical_size(), LogicalSize::new(1024, 768));
        assert_eq!(
            surface.backend().configured.last(),
            Some(&PhysicalSize::new(2048, 1536))
        );
    }

    #[test]
    fn missing_container_yields_detached_surface() {
        let desk = Desk {
            ratio: 1.0,
            available: true,
        };
        let surface = Surface::attach(&desk, Some("nonexistent")).unwrap();
        assert!(!surface.is_attached());
        assert_eq!(
            surface.attachment(),
            &Attachment::Detached {
                requested: "nonexistent".into()
            }
        );

        let root = Surface::attach(&desk, None).unwrap();
        assert_eq!(root.attachment(), &Attachment::DefaultRoot);
        assert!(root.is_attached());
    }

    #[test]
    fn zero_resize_is_ignored() {
        let desk = Desk {
            ratio: 1.0,
            available: true,
        };
        let mut surface = Surface::attach(&desk, None).unwrap();
        surface.resize(0, 100);
        assert_eq!(surface.logical_size(), LogicalSize::new(800, 600));
        assert_eq!(surface.backend().configured.len(), 1);
    }

    #[test]
    fn invalid_pixel_ratio_falls_back_to_one() {
        let desk = Desk {
            ratio: f64::NAN,
            available: true,
        };
        let surface = Surface::attach(&desk, None).unwrap();
        assert_eq!(surface.pixel_ratio(), 1.0);
    }

    #[test]
    fn missing_context_is_fatal() {
        let desk = Desk {
            ratio: 1.0,
            available: false,
        };
        let err = Surface::attach(&desk, None).unwrap_err();
        assert!(matches!(err, RenderError::SurfaceUnavailable(_)));
    }
}
