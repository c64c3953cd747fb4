//! Surface-bound engine
//!
//! Owns the window surface, the GPU device and the headless simulation, and
//! drives the per-frame sequence: drain queued commands, step the physics,
//! composite the dye field over the configured background color. All GPU
//! setup happens once in [`FluidEngine::new`]; a setup failure is reported
//! upward so the host can fall back to a non-simulated visual.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::ThreadRng;
use rand::Rng;
use wgpu::{BindGroupLayout, Device, Queue, RenderPipeline, Sampler};
use winit::window::Window;

use crate::config::SimulationConfig;
use crate::error::{EngineError, EngineResult};
use crate::input::{CommandQueue, EngineCommand};
use crate::sim::passes::{build_pipeline, create_field_sampler};
use crate::sim::{clamp_delta_time, FluidSimulation, GpuCapabilities, AMBIENT_SPLAT_CHANCE};

pub struct FluidEngine {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    device: Arc<Device>,
    queue: Arc<Queue>,
    simulation: FluidSimulation,
    display_pipeline: RenderPipeline,
    display_layout: BindGroupLayout,
    display_sampler: Sampler,
    commands: CommandQueue,
    rng: ThreadRng,
    last_frame: Instant,
}

impl FluidEngine {
    /// Bring up the GPU, negotiate capabilities, allocate fields and seed the
    /// dye with a startup burst.
    pub async fn new(window: Arc<Window>, config: SimulationConfig) -> EngineResult<Self> {
        log::info!("[FluidEngine] Initializing GPU");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| EngineError::SurfaceCreation { error: e.to_string() })?;

        let adapter = request_adapter(&instance, &surface).await?;
        let info = adapter.get_info();
        log::info!("[FluidEngine] Adapter: {} ({:?})", info.name, info.backend);

        // Capability policy is decided on the adapter, before the device
        // exists, so the device request never asks for unsupported features.
        let caps = GpuCapabilities::detect(&adapter);
        let config = caps.negotiate(&config);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Fluid Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| EngineError::backend(format!("device request failed: {e}")))?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &surface_config);
        log::info!(
            "[FluidEngine] Surface configured: {}x{} {:?}",
            width,
            height,
            surface_format
        );

        let mut simulation =
            FluidSimulation::new(device.clone(), queue.clone(), config, caps, width, height).await?;

        let display_layout = create_display_layout(&device, caps.filterable);
        let display_sampler = create_field_sampler(&device, caps.filterable);
        let display_pipeline = build_pipeline(
            &device,
            "display",
            include_str!("sim/shaders/display.wgsl"),
            &display_layout,
            surface_format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        )
        .await?;

        let mut rng = rand::thread_rng();
        let burst: u32 = rng.gen_range(5..25);
        simulation.splat_burst(&mut rng, burst);

        Ok(Self {
            window,
            surface,
            surface_config,
            device,
            queue,
            simulation,
            display_pipeline,
            display_layout,
            display_sampler,
            commands: CommandQueue::new(),
            rng,
            last_frame: Instant::now(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn simulation(&self) -> &FluidSimulation {
        &self.simulation
    }

    /// Queue a command for the next frame. Input handlers call this instead
    /// of touching the simulation directly.
    pub fn enqueue(&mut self, command: EngineCommand) {
        self.commands.push_back(command);
    }

    /// Run one frame: drain commands, step, render.
    pub fn frame(&mut self) -> EngineResult<()> {
        let dt = clamp_delta_time(self.last_frame.elapsed().as_secs_f32());
        self.last_frame = Instant::now();

        self.drain_commands();

        // Pause gates only the physics step; ambient and queued splats keep
        // landing so the field stays visually alive.
        if self.rng.gen::<f32>() < AMBIENT_SPLAT_CHANCE {
            self.simulation.ambient_splat(&mut self.rng);
        }
        if !self.simulation.config().paused {
            self.simulation.step(dt);
        }

        self.render()
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.pop_front() {
            match command {
                EngineCommand::Splat(splat) => {
                    self.simulation.splat(splat.position, splat.force, splat.color);
                }
                EngineCommand::Resize { width, height } => {
                    if width == 0 || height == 0 {
                        continue;
                    }
                    self.surface_config.width = width;
                    self.surface_config.height = height;
                    self.surface.configure(&self.device, &self.surface_config);
                    if self.simulation.resize_surface(width, height) {
                        log::info!("[FluidEngine] Fields reallocated for {}x{}", width, height);
                    }
                }
            }
        }
    }

    fn render(&mut self) -> EngineResult<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                // Reconfigure and draw again next frame
                self.surface.configure(&self.device, &self.surface_config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => return Ok(()),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(EngineError::OutOfMemory),
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Display Bind Group"),
            layout: &self.display_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(self.simulation.dye_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.display_sampler),
                },
            ],
        });

        let [r, g, b] = self.simulation.config().back_color;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Display Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Display Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.display_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

async fn request_adapter(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
) -> EngineResult<wgpu::Adapter> {
    // Discrete GPU first, then integrated, then whatever software fallback
    // the platform offers.
    for (power, fallback) in [
        (wgpu::PowerPreference::HighPerformance, false),
        (wgpu::PowerPreference::LowPower, false),
        (wgpu::PowerPreference::LowPower, true),
    ] {
        if let Some(adapter) = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power,
                force_fallback_adapter: fallback,
                compatible_surface: Some(surface),
            })
            .await
        {
            return Ok(adapter);
        }
    }
    Err(EngineError::backend("no compatible GPU adapter found"))
}

fn create_display_layout(device: &Device, filterable: bool) -> BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Display Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(if filterable {
                    wgpu::SamplerBindingType::Filtering
                } else {
                    wgpu::SamplerBindingType::NonFiltering
                }),
                count: None,
            },
        ],
    })
}
