//! dyeflow
//!
//! A GPU fluid simulation rendering an interactive dye field: pointer motion
//! injects velocity and color into a double-buffered half-float field set,
//! and a fixed pass sequence (vorticity confinement, Jacobi pressure solve,
//! gradient subtraction, semi-Lagrangian advection) advances it each frame.
//!
//! [`FluidEngine`] owns a window surface and drives everything; the headless
//! [`FluidSimulation`] underneath runs on any device and is what the GPU
//! tests exercise.

pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod sim;

pub use config::SimulationConfig;
pub use engine::FluidEngine;
pub use error::{EngineError, EngineResult};
pub use input::{CommandQueue, EngineCommand, InputTranslator, PointerKind, SplatRequest};
pub use sim::{clamp_delta_time, FluidSimulation, GpuCapabilities, StepStats};
