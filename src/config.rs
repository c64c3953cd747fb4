//! Simulation configuration
//!
//! A plain value constructed once and threaded through every stage call.
//! Capability-driven downgrades produce a new value via [`SimulationConfig::degraded`]
//! instead of mutating shared state.

use serde::Deserialize;

/// All tunable simulation parameters.
///
/// Defaults match the reference parameterization: a 128-cell simulation grid
/// advecting a 1024-cell dye field, with 20 Jacobi iterations per frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Target resolution of the velocity/pressure grid (shorter axis)
    pub sim_resolution: u32,
    /// Target resolution of the dye field (shorter axis)
    pub dye_resolution: u32,
    /// Exponential decay rate applied to dye during advection
    pub density_dissipation: f32,
    /// Exponential decay rate applied to velocity during advection
    pub velocity_dissipation: f32,
    /// Fraction of the previous frame's pressure kept as the solver seed
    pub pressure: f32,
    /// Jacobi iterations per pressure solve
    pub pressure_iterations: u32,
    /// Vorticity confinement strength
    pub curl: f32,
    /// Splat radius in normalized units (divided by 100 before use)
    pub splat_radius: f32,
    /// Force scale applied to pointer displacement
    pub splat_force: f32,
    pub shading: bool,
    pub colorful: bool,
    pub color_update_speed: f32,
    pub paused: bool,
    /// Background color shown through low-density dye regions
    pub back_color: [f32; 3],
    pub transparent: bool,
    pub bloom: bool,
    pub bloom_iterations: u32,
    pub bloom_resolution: u32,
    pub bloom_intensity: f32,
    pub bloom_threshold: f32,
    pub bloom_soft_knee: f32,
    pub sunrays: bool,
    pub sunrays_resolution: u32,
    pub sunrays_weight: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 1.0,
            velocity_dissipation: 0.2,
            pressure: 0.8,
            pressure_iterations: 20,
            curl: 30.0,
            splat_radius: 0.25,
            splat_force: 6000.0,
            shading: true,
            colorful: true,
            color_update_speed: 10.0,
            paused: false,
            back_color: [0.0, 0.0, 0.0],
            transparent: false,
            bloom: true,
            bloom_iterations: 8,
            bloom_resolution: 256,
            bloom_intensity: 0.8,
            bloom_threshold: 0.6,
            bloom_soft_knee: 0.7,
            sunrays: true,
            sunrays_resolution: 196,
            sunrays_weight: 1.0,
        }
    }
}

impl SimulationConfig {
    /// Dye resolution used when linear filtering is unavailable
    pub const DEGRADED_DYE_RESOLUTION: u32 = 512;

    /// Returns the configuration adjusted for a backend without linear
    /// filtering on the field format: lower dye resolution, post effects off.
    pub fn degraded(&self) -> Self {
        Self {
            dye_resolution: self.dye_resolution.min(Self::DEGRADED_DYE_RESOLUTION),
            shading: false,
            bloom: false,
            sunrays: false,
            ..self.clone()
        }
    }
}
