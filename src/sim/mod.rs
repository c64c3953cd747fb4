//! GPU fluid simulation core
//!
//! Double-buffered fields, the fixed stage pipeline and the headless
//! simulation loop. Everything here runs on whatever device it is given;
//! surface presentation lives in the engine layer.

pub mod fields;
pub mod passes;
pub mod resolution;
pub mod simulation;
pub mod storage;

pub use fields::{DoubleField, Field};
pub use passes::{GpuCapabilities, StagePipelines};
pub use resolution::Resolution;
pub use simulation::{FluidSimulation, StepStats};
pub use storage::FieldStorage;

/// Upper bound on the timestep fed into the solver (one 60 FPS frame)
pub const MAX_DELTA_TIME: f32 = 1.0 / 60.0;

/// Lower bound keeping the timestep strictly positive
pub const MIN_DELTA_TIME: f32 = 1.0e-6;

/// Per-frame probability of an ambient splat
pub const AMBIENT_SPLAT_CHANCE: f32 = 0.005;

/// Pointer displacement below this (per axis, normalized) never splats
pub const SPLAT_EPSILON: f32 = 1.0e-3;

/// Clamp a measured wall-clock delta into the stable range
/// `(0, MAX_DELTA_TIME]`. A single stalled frame must not inject a huge
/// unstable timestep into the solver.
pub fn clamp_delta_time(raw: f32) -> f32 {
    raw.min(MAX_DELTA_TIME).max(MIN_DELTA_TIME)
}

#[cfg(test)]
mod tests;
