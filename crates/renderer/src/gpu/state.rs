use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::RenderError;
use crate::scene::{Material, QuadGeometry};
use crate::surface::{FrameRequest, SurfaceBackend};
use crate::types::Antialiasing;
use crate::uniforms::FrameUniforms;

use super::context::GpuContext;
use super::pipeline::{MaterialPipeline, PipelineKey, PipelineLayouts};

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// wgpu-backed surface: swapchain, frame uniform buffer and compiled pipelines.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    quad: wgpu::Buffer,
    pipelines: HashMap<PipelineKey, Result<MaterialPipeline, String>>,
    multisample_target: Option<MultisampleTarget>,
    /// Last size asked for; the swapchain itself may be clamped to device limits.
    requested: PhysicalSize<u32>,
}

impl GpuState {
    pub(crate) fn new(
        window: Arc<Window>,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
    ) -> Result<Self, RenderError> {
        let context = GpuContext::new(window, initial_size, antialiasing)?;
        let layouts = PipelineLayouts::new(&context.device);

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniform buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("frame uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let geometry = QuadGeometry::full_screen();
        let quad = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("full-screen quad"),
                contents: bytemuck::cast_slice(&geometry.vertices()[..]),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let multisample_target = Self::multisample_target_for(&context);

        Ok(Self {
            context,
            layouts,
            uniform_buffer,
            uniform_bind_group,
            quad,
            pipelines: HashMap::new(),
            multisample_target,
            requested: initial_size,
        })
    }

    fn multisample_target_for(context: &GpuContext) -> Option<MultisampleTarget> {
        (context.sample_count > 1).then(|| {
            MultisampleTarget::new(
                &context.device,
                context.surface_format,
                context.size,
                context.sample_count,
            )
        })
    }

    /// Compiles the material's pipeline once; later frames and resizes reuse it.
    /// A device rejection is cached so the pipeline is not rebuilt every frame.
    fn pipeline_for(&mut self, material: &Material) -> Result<&MaterialPipeline, String> {
        let key = PipelineKey {
            fingerprint: material.fingerprint(),
            surface_format: self.context.surface_format,
            sample_count: self.context.sample_count,
        };

        if !self.pipelines.contains_key(&key) {
            let device = &self.context.device;
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let pipeline = MaterialPipeline::new(
                device,
                &self.layouts,
                material,
                self.context.surface_format,
                self.context.sample_count,
            );
            let built = match pollster::block_on(device.pop_error_scope()) {
                None => {
                    tracing::debug!(fingerprint = key.fingerprint, "compiled material pipeline");
                    Ok(pipeline)
                }
                Some(err) => {
                    tracing::error!(error = %err, "material pipeline rejected by the device");
                    Err(err.to_string())
                }
            };
            self.pipelines.insert(key, built);
        }

        match self.pipelines.get(&key) {
            Some(Ok(pipeline)) => Ok(pipeline),
            Some(Err(message)) => Err(message.clone()),
            None => Err("material pipeline missing".into()),
        }
    }

    fn acquire_frame(&mut self) -> Result<wgpu::SurfaceTexture, RenderError> {
        match self.context.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.context.reconfigure();
                Err(RenderError::DrawFailure(format!(
                    "swapchain {err}; reconfigured for next frame"
                )))
            }
            Err(err) => Err(RenderError::DrawFailure(format!("surface error: {err}"))),
        }
    }
}

impl SurfaceBackend for GpuState {
    fn configure(&mut self, physical: PhysicalSize<u32>) {
        if physical == self.requested {
            return;
        }
        self.requested = physical;
        self.context.resize(physical);
        self.multisample_target = Self::multisample_target_for(&self.context);
        tracing::debug!(
            width = self.context.size.width,
            height = self.context.size.height,
            "reconfigured swapchain"
        );
    }

    fn prepare(&mut self, material: &Material) -> Result<(), RenderError> {
        self.pipeline_for(material)
            .map(|_| ())
            .map_err(RenderError::ShaderCompile)
    }

    fn render(&mut self, frame: &FrameRequest<'_>) -> Result<(), RenderError> {
        self.configure(frame.physical);

        let material = frame.scene.material();
        let vertex_count = frame.scene.geometry().vertex_count();
        self.pipeline_for(material).map_err(RenderError::DrawFailure)?;

        let surface_texture = self.acquire_frame()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniforms = FrameUniforms::new(frame.camera, &frame.uniforms, self.context.size);
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("backdrop encoder"),
                });

        let (attachment_view, resolve_target) = match self.multisample_target.as_ref() {
            Some(msaa) => (&msaa.view, Some(&view)),
            None => (&view, None),
        };

        let key = PipelineKey {
            fingerprint: material.fingerprint(),
            surface_format: self.context.surface_format,
            sample_count: self.context.sample_count,
        };
        let Some(Ok(pipeline)) = self.pipelines.get(&key) else {
            return Err(RenderError::DrawFailure("material pipeline missing".into()));
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("backdrop pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&pipeline.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.quad.slice(..));
            render_pass.draw(0..vertex_count, 0..1);
        }

        self.context.queue.submit(Some(encoder.finish()));
        surface_texture.present();
        Ok(())
    }
}
