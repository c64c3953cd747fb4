//! Headless simulation core
//!
//! Owns the fields and stage pipelines and executes the physics step in
//! strict order: curl, vorticity confinement, divergence, pressure clear,
//! pressure solve, gradient subtraction, velocity advection, dye advection.
//! Every writing pass targets a double field's write buffer and swaps
//! afterwards, so no pass ever samples the texture it renders to.

use std::sync::Arc;

use glam::Vec2;
use rand::Rng;
use wgpu::{BindGroup, CommandEncoder, Device, Queue, RenderPipeline, TextureView};

use crate::color::generate_color;
use crate::config::SimulationConfig;
use crate::error::{EngineError, EngineResult};
use crate::sim::fields::Field;
use crate::sim::passes::{
    AdvectionUniforms, ClearUniforms, GpuCapabilities, SplatUniforms, StagePipelines, StageUniforms, VorticityUniforms,
};
use crate::sim::resolution::Resolution;
use crate::sim::storage::FieldStorage;

/// Per-step bookkeeping, mainly for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStats {
    /// Jacobi iterations executed by the pressure solve
    pub pressure_iterations: u32,
}

pub struct FluidSimulation {
    device: Arc<Device>,
    queue: Arc<Queue>,
    config: SimulationConfig,
    pipelines: StagePipelines,
    storage: FieldStorage,
    surface_width: u32,
    surface_height: u32,
}

impl FluidSimulation {
    /// Build the simulation core for a surface of the given pixel size.
    /// `config` should already reflect capability negotiation.
    pub async fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        config: SimulationConfig,
        caps: GpuCapabilities,
        surface_width: u32,
        surface_height: u32,
    ) -> EngineResult<Self> {
        let pipelines = StagePipelines::new(&device, &caps).await?;

        let sim_res = Resolution::derive(config.sim_resolution, surface_width, surface_height);
        let dye_res = Resolution::derive(config.dye_resolution, surface_width, surface_height);
        log::info!(
            "[FluidSimulation] Fields allocated: sim {}x{}, dye {}x{}, format {:?}",
            sim_res.width,
            sim_res.height,
            dye_res.width,
            dye_res.height,
            caps.field_format
        );
        let storage = FieldStorage::new(&device, &queue, sim_res, dye_res, caps.field_format);

        Ok(Self {
            device,
            queue,
            config,
            pipelines,
            storage,
            surface_width,
            surface_height,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn storage(&self) -> &FieldStorage {
        &self.storage
    }

    /// View of the dye field's current read buffer, for the display pass.
    pub fn dye_view(&self) -> &TextureView {
        &self.storage.dye.read().view
    }

    /// Recompute resolution descriptors for a new surface size and
    /// reallocate whichever fields changed. Returns whether anything was
    /// reallocated.
    pub fn resize_surface(&mut self, width: u32, height: u32) -> bool {
        self.surface_width = width;
        self.surface_height = height;
        let sim_res = Resolution::derive(self.config.sim_resolution, width, height);
        let dye_res = Resolution::derive(self.config.dye_resolution, width, height);
        self.storage
            .resize_if_needed(&self.device, &self.queue, sim_res, dye_res)
    }

    /// Inject a localized force and color at a normalized position.
    ///
    /// Non-finite input is rejected outright: a single NaN texel would
    /// spread through every later pass with no in-band recovery.
    pub fn splat(&mut self, position: Vec2, force: Vec2, color: [f32; 3]) {
        if !position.is_finite() || !force.is_finite() || color.iter().any(|c| !c.is_finite()) {
            log::warn!(
                "[FluidSimulation] Rejecting non-finite splat: position {:?}, force {:?}, color {:?}",
                position,
                force,
                color
            );
            return;
        }

        let radius = self.corrected_splat_radius();
        let aspect_ratio = self.surface_width as f32 / self.surface_height.max(1) as f32;

        self.queue.write_buffer(
            &self.pipelines.splat_velocity_uniforms,
            0,
            bytemuck::bytes_of(&SplatUniforms {
                point: position.to_array(),
                radius,
                aspect_ratio,
                color: [force.x, force.y, 0.0],
                _pad: 0.0,
            }),
        );
        self.queue.write_buffer(
            &self.pipelines.splat_dye_uniforms,
            0,
            bytemuck::bytes_of(&SplatUniforms {
                point: position.to_array(),
                radius,
                aspect_ratio,
                color,
                _pad: 0.0,
            }),
        );

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Splat Encoder"),
        });

        let velocity_group = self.pipelines.single_group(
            &self.device,
            &self.pipelines.splat_velocity_uniforms,
            &self.storage.velocity.read().view,
        );
        blit(
            &mut encoder,
            &self.pipelines.splat,
            &velocity_group,
            &self.storage.velocity.write().view,
        );

        let dye_group = self.pipelines.single_group(
            &self.device,
            &self.pipelines.splat_dye_uniforms,
            &self.storage.dye.read().view,
        );
        blit(&mut encoder, &self.pipelines.splat, &dye_group, &self.storage.dye.write().view);

        self.queue.submit(Some(encoder.finish()));
        self.storage.velocity.swap();
        self.storage.dye.swap();
    }

    /// Initial burst: a handful of random splats so the field is alive
    /// before any input arrives.
    pub fn splat_burst<R: Rng>(&mut self, rng: &mut R, count: u32) {
        log::info!("[FluidSimulation] Startup burst of {} splats", count);
        for _ in 0..count {
            let color = generate_color(rng).map(|c| c * 10.0);
            self.random_splat(rng, color);
        }
    }

    /// Reduced-intensity splat keeping the field visually alive absent input.
    pub fn ambient_splat<R: Rng>(&mut self, rng: &mut R) {
        let color = generate_color(rng).map(|c| c * 0.3);
        self.random_splat(rng, color);
    }

    fn random_splat<R: Rng>(&mut self, rng: &mut R, color: [f32; 3]) {
        let position = Vec2::new(rng.gen(), rng.gen());
        let force = Vec2::new(
            1000.0 * (rng.gen::<f32>() - 0.5),
            1000.0 * (rng.gen::<f32>() - 0.5),
        );
        self.splat(position, force, color);
    }

    /// Advance the simulation by `dt` seconds (already clamped by the
    /// frame scheduler).
    pub fn step(&mut self, dt: f32) -> StepStats {
        let texel_size = self.storage.velocity.texel_size();
        let stage = StageUniforms {
            texel_size,
            _pad: [0.0; 2],
        };
        self.queue
            .write_buffer(&self.pipelines.curl_uniforms, 0, bytemuck::bytes_of(&stage));
        self.queue.write_buffer(
            &self.pipelines.vorticity_uniforms,
            0,
            bytemuck::bytes_of(&VorticityUniforms {
                texel_size,
                curl_strength: self.config.curl,
                dt,
            }),
        );
        self.queue
            .write_buffer(&self.pipelines.divergence_uniforms, 0, bytemuck::bytes_of(&stage));
        self.queue.write_buffer(
            &self.pipelines.clear_uniforms,
            0,
            bytemuck::bytes_of(&ClearUniforms {
                value: self.config.pressure,
                _pad: [0.0; 3],
            }),
        );
        self.queue
            .write_buffer(&self.pipelines.pressure_uniforms, 0, bytemuck::bytes_of(&stage));
        self.queue
            .write_buffer(&self.pipelines.gradient_uniforms, 0, bytemuck::bytes_of(&stage));
        self.queue.write_buffer(
            &self.pipelines.advect_velocity_uniforms,
            0,
            bytemuck::bytes_of(&AdvectionUniforms {
                texel_size,
                dt,
                dissipation: self.config.velocity_dissipation,
            }),
        );
        self.queue.write_buffer(
            &self.pipelines.advect_dye_uniforms,
            0,
            bytemuck::bytes_of(&AdvectionUniforms {
                texel_size,
                dt,
                dissipation: self.config.density_dissipation,
            }),
        );

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Physics Step Encoder"),
        });

        // Curl
        let group = self.pipelines.single_group(
            &self.device,
            &self.pipelines.curl_uniforms,
            &self.storage.velocity.read().view,
        );
        blit(&mut encoder, &self.pipelines.curl, &group, &self.storage.curl.view);

        // Vorticity confinement
        let group = self.pipelines.pair_group(
            &self.device,
            &self.pipelines.vorticity_uniforms,
            &self.storage.velocity.read().view,
            &self.storage.curl.view,
        );
        blit(
            &mut encoder,
            &self.pipelines.vorticity,
            &group,
            &self.storage.velocity.write().view,
        );
        self.storage.velocity.swap();

        // Divergence
        let group = self.pipelines.single_group(
            &self.device,
            &self.pipelines.divergence_uniforms,
            &self.storage.velocity.read().view,
        );
        blit(&mut encoder, &self.pipelines.divergence, &group, &self.storage.divergence.view);

        // Pressure clear: keep a fraction of last frame's solution as seed
        let group = self.pipelines.single_group(
            &self.device,
            &self.pipelines.clear_uniforms,
            &self.storage.pressure.read().view,
        );
        blit(&mut encoder, &self.pipelines.clear, &group, &self.storage.pressure.write().view);
        self.storage.pressure.swap();

        // Pressure solve: fixed Jacobi iteration count
        let mut pressure_iterations = 0;
        for _ in 0..self.config.pressure_iterations {
            let group = self.pipelines.pair_group(
                &self.device,
                &self.pipelines.pressure_uniforms,
                &self.storage.pressure.read().view,
                &self.storage.divergence.view,
            );
            blit(&mut encoder, &self.pipelines.pressure, &group, &self.storage.pressure.write().view);
            self.storage.pressure.swap();
            pressure_iterations += 1;
        }

        // Gradient subtraction
        let group = self.pipelines.pair_group(
            &self.device,
            &self.pipelines.gradient_uniforms,
            &self.storage.pressure.read().view,
            &self.storage.velocity.read().view,
        );
        blit(
            &mut encoder,
            &self.pipelines.gradient_subtract,
            &group,
            &self.storage.velocity.write().view,
        );
        self.storage.velocity.swap();

        // Advect velocity along itself
        let group = self.pipelines.pair_group(
            &self.device,
            &self.pipelines.advect_velocity_uniforms,
            &self.storage.velocity.read().view,
            &self.storage.velocity.read().view,
        );
        blit(
            &mut encoder,
            &self.pipelines.advection,
            &group,
            &self.storage.velocity.write().view,
        );
        self.storage.velocity.swap();

        // Advect dye along the projected velocity
        let group = self.pipelines.pair_group(
            &self.device,
            &self.pipelines.advect_dye_uniforms,
            &self.storage.velocity.read().view,
            &self.storage.dye.read().view,
        );
        blit(&mut encoder, &self.pipelines.advection, &group, &self.storage.dye.write().view);
        self.storage.dye.swap();

        self.queue.submit(Some(encoder.finish()));

        StepStats { pressure_iterations }
    }

    /// Splat radius scaled so splats stay circular on non-square surfaces.
    fn corrected_splat_radius(&self) -> f32 {
        let mut radius = self.config.splat_radius / 100.0;
        let aspect_ratio = self.surface_width as f32 / self.surface_height.max(1) as f32;
        if aspect_ratio > 1.0 {
            radius *= aspect_ratio;
        }
        radius
    }

    /// Copy a field back to the CPU as RGBA f32 texels. Readback support for
    /// tests and diagnostics; stalls the queue.
    pub fn read_field(&self, field: &Field) -> EngineResult<Vec<[f32; 4]>> {
        let bytes_per_texel = match self.storage.format() {
            wgpu::TextureFormat::Rgba32Float => 16,
            _ => 8,
        };
        let unpadded_bytes_per_row = field.width * bytes_per_texel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Readback Buffer"),
            size: (padded_bytes_per_row * field.height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Field Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: field.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(field.height),
                },
            },
            wgpu::Extent3d {
                width: field.width,
                height: field.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| EngineError::Readback {
                error: "map_async callback dropped".to_string(),
            })?
            .map_err(|e| EngineError::Readback { error: e.to_string() })?;

        let data = slice.get_mapped_range();
        let mut texels = Vec::with_capacity((field.width * field.height) as usize);
        for row in 0..field.height {
            let start = (row * padded_bytes_per_row) as usize;
            let row_bytes = &data[start..start + unpadded_bytes_per_row as usize];
            match self.storage.format() {
                wgpu::TextureFormat::Rgba32Float => {
                    for texel in bytemuck::cast_slice::<u8, [f32; 4]>(row_bytes) {
                        texels.push(*texel);
                    }
                }
                _ => {
                    for texel in bytemuck::cast_slice::<u8, [u16; 4]>(row_bytes) {
                        texels.push(texel.map(half_to_f32));
                    }
                }
            }
        }
        drop(data);
        buffer.unmap();
        Ok(texels)
    }
}

/// Record one full-screen pass into `target`.
fn blit(encoder: &mut CommandEncoder, pipeline: &RenderPipeline, bind_group: &BindGroup, target: &TextureView) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Stage Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

/// Decode an IEEE 754 half-float for field readback.
fn half_to_f32(bits: u16) -> f32 {
    let sign = (bits as u32 >> 15) & 1;
    let exponent = (bits as u32 >> 10) & 0x1f;
    let mantissa = bits as u32 & 0x3ff;

    let out = if exponent == 0 {
        if mantissa == 0 {
            sign << 31
        } else {
            // Subnormal half: renormalize into f32 range
            let mut exponent = 127 - 15 + 1;
            let mut mantissa = mantissa;
            while mantissa & 0x400 == 0 {
                mantissa <<= 1;
                exponent -= 1;
            }
            (sign << 31) | ((exponent as u32) << 23) | ((mantissa & 0x3ff) << 13)
        }
    } else if exponent == 0x1f {
        (sign << 31) | 0x7f80_0000 | (mantissa << 13)
    } else {
        (sign << 31) | ((exponent + 112) << 23) | (mantissa << 13)
    };
    f32::from_bits(out)
}
