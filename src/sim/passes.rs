//! Shader stage pipelines
//!
//! Every numerical stage is a full-screen render pass. Pipelines, bind group
//! layouts, the field sampler and the per-stage uniform buffers are all
//! created once at startup; per-frame work only writes uniform values and
//! records draws. Shader or pipeline validation failures abort setup, a
//! compile failure is a static defect rather than a transient condition.

use wgpu::{Adapter, BindGroup, BindGroupLayout, Buffer, Device, RenderPipeline, Sampler, TextureFormat, TextureView};

use crate::config::SimulationConfig;
use crate::error::{EngineError, EngineResult};

/// Outcome of the one-shot capability negotiation that runs before any field
/// is allocated. Never re-checked mid-session.
#[derive(Debug, Clone, Copy)]
pub struct GpuCapabilities {
    /// Texture format used for every simulation field
    pub field_format: TextureFormat,
    /// Whether the format supports linear filtering
    pub filterable: bool,
}

impl GpuCapabilities {
    /// Query half-float texture support on the adapter.
    ///
    /// Preference order: filterable `Rgba16Float`, then `Rgba16Float` with
    /// nearest sampling, then a full-float `Rgba32Float` fallback when the
    /// half-float format can not be rendered to at all.
    pub fn detect(adapter: &Adapter) -> Self {
        let required = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let half = adapter.get_texture_format_features(TextureFormat::Rgba16Float);
        let renderable = half.allowed_usages.contains(required);
        let filterable = half
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE);

        if renderable && filterable {
            Self {
                field_format: TextureFormat::Rgba16Float,
                filterable: true,
            }
        } else if renderable {
            log::warn!("[GpuCapabilities] Rgba16Float not filterable, degrading to nearest sampling");
            Self {
                field_format: TextureFormat::Rgba16Float,
                filterable: false,
            }
        } else {
            log::warn!("[GpuCapabilities] Rgba16Float not renderable, falling back to Rgba32Float");
            Self {
                field_format: TextureFormat::Rgba32Float,
                filterable: false,
            }
        }
    }

    /// Apply the capability policy to a configuration, producing a new value.
    /// Without linear filtering the dye resolution drops and the post effects
    /// are disabled.
    pub fn negotiate(&self, config: &SimulationConfig) -> SimulationConfig {
        if self.filterable {
            config.clone()
        } else {
            log::warn!(
                "[GpuCapabilities] Linear filtering unavailable, dye resolution capped at {}",
                SimulationConfig::DEGRADED_DYE_RESOLUTION
            );
            config.degraded()
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SplatUniforms {
    pub point: [f32; 2],
    pub radius: f32,
    pub aspect_ratio: f32,
    pub color: [f32; 3],
    pub _pad: f32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StageUniforms {
    pub texel_size: [f32; 2],
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VorticityUniforms {
    pub texel_size: [f32; 2],
    pub curl_strength: f32,
    pub dt: f32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClearUniforms {
    pub value: f32,
    pub _pad: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AdvectionUniforms {
    pub texel_size: [f32; 2],
    pub dt: f32,
    pub dissipation: f32,
}

/// Cached pipelines and uniform buffers for the fixed stage sequence.
pub struct StagePipelines {
    pub splat: RenderPipeline,
    pub curl: RenderPipeline,
    pub vorticity: RenderPipeline,
    pub divergence: RenderPipeline,
    pub clear: RenderPipeline,
    pub pressure: RenderPipeline,
    pub gradient_subtract: RenderPipeline,
    pub advection: RenderPipeline,

    single_layout: BindGroupLayout,
    pair_layout: BindGroupLayout,
    pub sampler: Sampler,

    pub splat_velocity_uniforms: Buffer,
    pub splat_dye_uniforms: Buffer,
    pub curl_uniforms: Buffer,
    pub vorticity_uniforms: Buffer,
    pub divergence_uniforms: Buffer,
    pub clear_uniforms: Buffer,
    pub pressure_uniforms: Buffer,
    pub gradient_uniforms: Buffer,
    pub advect_velocity_uniforms: Buffer,
    pub advect_dye_uniforms: Buffer,
}

impl StagePipelines {
    pub async fn new(device: &Device, caps: &GpuCapabilities) -> EngineResult<Self> {
        let single_layout = create_stage_layout(device, "Single Field Stage Layout", 1, caps.filterable);
        let pair_layout = create_stage_layout(device, "Paired Field Stage Layout", 2, caps.filterable);
        let sampler = create_field_sampler(device, caps.filterable);

        let format = caps.field_format;
        let splat = build_pipeline(device, "splat", include_str!("shaders/splat.wgsl"), &single_layout, format, None).await?;
        let curl = build_pipeline(device, "curl", include_str!("shaders/curl.wgsl"), &single_layout, format, None).await?;
        let vorticity = build_pipeline(device, "vorticity", include_str!("shaders/vorticity.wgsl"), &pair_layout, format, None).await?;
        let divergence = build_pipeline(device, "divergence", include_str!("shaders/divergence.wgsl"), &single_layout, format, None).await?;
        let clear = build_pipeline(device, "clear", include_str!("shaders/clear.wgsl"), &single_layout, format, None).await?;
        let pressure = build_pipeline(device, "pressure", include_str!("shaders/pressure.wgsl"), &pair_layout, format, None).await?;
        let gradient_subtract = build_pipeline(
            device,
            "gradient_subtract",
            include_str!("shaders/gradient_subtract.wgsl"),
            &pair_layout,
            format,
            None,
        )
        .await?;
        let advection = build_pipeline(device, "advection", include_str!("shaders/advection.wgsl"), &pair_layout, format, None).await?;

        Ok(Self {
            splat,
            curl,
            vorticity,
            divergence,
            clear,
            pressure,
            gradient_subtract,
            advection,
            splat_velocity_uniforms: uniform_buffer::<SplatUniforms>(device, "Splat Velocity Uniforms"),
            splat_dye_uniforms: uniform_buffer::<SplatUniforms>(device, "Splat Dye Uniforms"),
            curl_uniforms: uniform_buffer::<StageUniforms>(device, "Curl Uniforms"),
            vorticity_uniforms: uniform_buffer::<VorticityUniforms>(device, "Vorticity Uniforms"),
            divergence_uniforms: uniform_buffer::<StageUniforms>(device, "Divergence Uniforms"),
            clear_uniforms: uniform_buffer::<ClearUniforms>(device, "Pressure Clear Uniforms"),
            pressure_uniforms: uniform_buffer::<StageUniforms>(device, "Pressure Uniforms"),
            gradient_uniforms: uniform_buffer::<StageUniforms>(device, "Gradient Subtract Uniforms"),
            advect_velocity_uniforms: uniform_buffer::<AdvectionUniforms>(device, "Advect Velocity Uniforms"),
            advect_dye_uniforms: uniform_buffer::<AdvectionUniforms>(device, "Advect Dye Uniforms"),
            single_layout,
            pair_layout,
            sampler,
        })
    }

    /// Bind group for stages reading one field.
    pub fn single_group(&self, device: &Device, uniforms: &Buffer, texture: &TextureView) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Single Field Stage Bind Group"),
            layout: &self.single_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(texture),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Bind group for stages reading two fields.
    pub fn pair_group(
        &self,
        device: &Device,
        uniforms: &Buffer,
        first: &TextureView,
        second: &TextureView,
    ) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Paired Field Stage Bind Group"),
            layout: &self.pair_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(first),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(second),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}

fn uniform_buffer<T>(device: &Device, label: &str) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub(crate) fn create_field_sampler(device: &Device, filterable: bool) -> Sampler {
    let filter = if filterable {
        wgpu::FilterMode::Linear
    } else {
        wgpu::FilterMode::Nearest
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Field Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn create_stage_layout(device: &Device, label: &str, texture_count: u32, filterable: bool) -> BindGroupLayout {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];
    for i in 0..texture_count {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 1 + i,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: 1 + texture_count,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(if filterable {
            wgpu::SamplerBindingType::Filtering
        } else {
            wgpu::SamplerBindingType::NonFiltering
        }),
        count: None,
    });

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

/// Compile one stage's shader and build its pipeline, surfacing validation
/// errors instead of running a partially-initialized pipeline.
pub(crate) async fn build_pipeline(
    device: &Device,
    stage: &str,
    fragment_source: &str,
    layout: &BindGroupLayout,
    target_format: TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> EngineResult<RenderPipeline> {
    let source = format!("{}\n{}", include_str!("shaders/common.wgsl"), fragment_source);

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{stage} shader")),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    if let Some(error) = device.pop_error_scope().await {
        return Err(EngineError::ShaderCompile {
            stage: stage.to_string(),
            error: error.to_string(),
        });
    }

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{stage} pipeline layout")),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{stage} pipeline")),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: "vs_main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    });
    if let Some(error) = device.pop_error_scope().await {
        return Err(EngineError::PipelineCreation {
            stage: stage.to_string(),
            error: error.to_string(),
        });
    }

    Ok(pipeline)
}
