use log::{info, warn};

use crate::config::RendererConfig;
use crate::error::{RendererError, Result};
use crate::frame::{DrawRange, PassKind, PassRecorder};
use crate::geometry::{GeometryBuffers, PackedGeometry};
use crate::uniforms::{
    UniformSink, UniformSlot, MODEL_UNIFORM_SIZE, ROTATION_UNIFORM_SIZE, SCENE_UNIFORM_SIZE,
};

use super::pipeline::{DepthBuffer, PipelineBuilder, Pipelines, ShadowMap};

/// wgpu backend owning every GPU object of the viewer.
///
/// Dropping the renderer releases all buffers, textures and pipelines.
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    shadow_map: ShadowMap,
    pipelines: Pipelines,
    geometry: GeometryBuffers,
    scene_buffer: wgpu::Buffer,
    model_buffer: wgpu::Buffer,
    rotation_buffer: wgpu::Buffer,
    shadow_scene_bind_group: wgpu::BindGroup,
    color_scene_bind_group: wgpu::BindGroup,
    model_bind_group: wgpu::BindGroup,
    rotation_bind_group: wgpu::BindGroup,
    clear_color: wgpu::Color,
    in_flight: Option<InFlightFrame>,
}

struct InFlightFrame {
    encoder: wgpu::CommandEncoder,
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

impl Renderer {
    /// Acquires adapter and device, configures the surface and builds all GPU state.
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        geometry: &PackedGeometry,
        settings: &RendererConfig,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RendererError::Setup("surface has zero area".into()));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance
            .create_surface(target)
            .map_err(|err| RendererError::Setup(format!("failed to create surface: {err}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| RendererError::Setup(format!("no compatible GPU adapter: {err}")))?;
        info!("using adapter {:?}", adapter.get_info().name);

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("shadow-viewer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                .using_resolution(adapter.limits()),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .map_err(|err| RendererError::Setup(format!("failed to create GPU device: {err}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .first()
            .copied()
            .ok_or_else(|| RendererError::Setup("surface reports no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::CompositeAlphaMode::PreMultiplied)
            .or_else(|| surface_caps.alpha_modes.first().copied())
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, width, height);
        let shadow_map = ShadowMap::create(&device, settings.shadow_map_size);
        let pipelines =
            PipelineBuilder::new(&device, surface_format, settings.shadow_map_size).build();
        let geometry = GeometryBuffers::upload(&device, geometry, "mesh");

        let uniform_buffer = |label: &str, size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let scene_buffer = uniform_buffer("scene-uniform", SCENE_UNIFORM_SIZE);
        let model_buffer = uniform_buffer("model-uniform", MODEL_UNIFORM_SIZE);
        let rotation_buffer = uniform_buffer("rotation-uniform", ROTATION_UNIFORM_SIZE);

        let uniform_bind_group = |label: &str, buffer: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipelines.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        };
        let shadow_scene_bind_group = uniform_bind_group("shadow-scene-bind-group", &scene_buffer);
        let model_bind_group = uniform_bind_group("model-bind-group", &model_buffer);
        let rotation_bind_group = uniform_bind_group("rotation-bind-group", &rotation_buffer);
        let color_scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("color-scene-bind-group"),
            layout: &pipelines.scene_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: scene_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
                },
            ],
        });

        let [r, g, b, a] = settings.clear_color;
        info!(
            "renderer ready: {width}x{height} {surface_format:?}, {} indices",
            geometry.index_count
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth,
            shadow_map,
            pipelines,
            geometry,
            scene_buffer,
            model_buffer,
            rotation_buffer,
            shadow_scene_bind_group,
            color_scene_bind_group,
            model_bind_group,
            rotation_bind_group,
            clear_color: wgpu::Color { r, g, b, a },
            in_flight: None,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    pub fn draw_range(&self) -> DrawRange {
        DrawRange {
            index_count: self.geometry.index_count,
        }
    }

    pub fn shadow_map_size(&self) -> u32 {
        self.shadow_map.size
    }

    /// Reconfigures the surface and depth buffer. The shadow map keeps its size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, width, height);
    }

    fn buffer(&self, slot: UniformSlot) -> &wgpu::Buffer {
        match slot {
            UniformSlot::Scene => &self.scene_buffer,
            UniformSlot::Model => &self.model_buffer,
            UniformSlot::Rotation => &self.rotation_buffer,
        }
    }
}

impl UniformSink for Renderer {
    fn write_uniform(&mut self, slot: UniformSlot, offset: u64, bytes: &[u8]) {
        self.queue.write_buffer(self.buffer(slot), offset, bytes);
    }
}

impl PassRecorder for Renderer {
    fn begin_frame(&mut self) -> Result<bool> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("surface lost or outdated; reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(false);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; skipping frame");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        self.in_flight = Some(InFlightFrame {
            encoder,
            output,
            view,
        });
        Ok(true)
    }

    fn record_pass(&mut self, pass: PassKind, draw: DrawRange) -> Result<()> {
        let frame = self
            .in_flight
            .as_mut()
            .ok_or(RendererError::FrameNotStarted)?;

        match pass {
            PassKind::Shadow => {
                let mut render_pass =
                    frame
                        .encoder
                        .begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("shadow-pass"),
                            color_attachments: &[],
                            depth_stencil_attachment: Some(
                                wgpu::RenderPassDepthStencilAttachment {
                                    view: &self.shadow_map.view,
                                    depth_ops: Some(wgpu::Operations {
                                        load: wgpu::LoadOp::Clear(1.0),
                                        store: wgpu::StoreOp::Store,
                                    }),
                                    stencil_ops: None,
                                },
                            ),
                            timestamp_writes: None,
                            occlusion_query_set: None,
                        });
                render_pass.set_pipeline(&self.pipelines.shadow);
                render_pass.set_bind_group(0, &self.shadow_scene_bind_group, &[]);
                render_pass.set_bind_group(1, &self.model_bind_group, &[]);
                if draw.index_count > 0 {
                    self.geometry.draw(&mut render_pass, draw.index_count);
                }
            }
            PassKind::Color => {
                let mut render_pass =
                    frame
                        .encoder
                        .begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("color-pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: &frame.view,
                                depth_slice: None,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(self.clear_color),
                                    store: wgpu::StoreOp::Store,
                                },
                            })],
                            depth_stencil_attachment: Some(
                                wgpu::RenderPassDepthStencilAttachment {
                                    view: &self.depth.view,
                                    depth_ops: Some(wgpu::Operations {
                                        load: wgpu::LoadOp::Clear(1.0),
                                        store: wgpu::StoreOp::Store,
                                    }),
                                    stencil_ops: Some(wgpu::Operations {
                                        load: wgpu::LoadOp::Clear(0),
                                        store: wgpu::StoreOp::Store,
                                    }),
                                },
                            ),
                            timestamp_writes: None,
                            occlusion_query_set: None,
                        });
                render_pass.set_pipeline(&self.pipelines.color);
                render_pass.set_bind_group(0, &self.color_scene_bind_group, &[]);
                render_pass.set_bind_group(1, &self.model_bind_group, &[]);
                render_pass.set_bind_group(2, &self.rotation_bind_group, &[]);
                if draw.index_count > 0 {
                    self.geometry.draw(&mut render_pass, draw.index_count);
                }
            }
        }
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        let frame = self.in_flight.take().ok_or(RendererError::FrameNotStarted)?;
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.output.present();
        Ok(())
    }
}
