use std::sync::Arc;

use wgpu::{Device, Queue, TextureFormat};

use super::fields::{DoubleField, Field};
use super::passes::GpuCapabilities;
use super::resolution::Resolution;
use super::simulation::FluidSimulation;
use super::storage::FieldStorage;
use super::{clamp_delta_time, MAX_DELTA_TIME, MIN_DELTA_TIME};
use crate::config::SimulationConfig;

/// Acquire a headless device, or `None` on machines without a GPU adapter
/// so the GPU tests skip instead of failing.
async fn create_test_context() -> Option<(Arc<Device>, Arc<Queue>)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        })
        .await?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Test Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        )
        .await
        .ok()?;

    Some((Arc::new(device), Arc::new(queue)))
}

/// Full-float capabilities keep readback and validation independent of
/// half-float support on the test machine.
fn test_caps() -> GpuCapabilities {
    GpuCapabilities {
        field_format: TextureFormat::Rgba32Float,
        filterable: false,
    }
}

#[test]
fn delta_time_is_clamped_to_stable_range() {
    assert_eq!(clamp_delta_time(0.5), MAX_DELTA_TIME);
    assert_eq!(clamp_delta_time(MAX_DELTA_TIME), MAX_DELTA_TIME);
    assert_eq!(clamp_delta_time(0.0), MIN_DELTA_TIME);
    assert_eq!(clamp_delta_time(-1.0), MIN_DELTA_TIME);

    let typical = 1.0 / 120.0;
    assert_eq!(clamp_delta_time(typical), typical);
}

#[test]
fn texel_size_is_reciprocal_of_dimensions() {
    let Some((device, _queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };

    let field = Field::new(&device, "Test Field", 128, 64, TextureFormat::Rgba32Float);
    assert_eq!(field.texel_size(), [1.0 / 128.0, 1.0 / 64.0]);
}

#[test]
fn double_field_swap_exchanges_distinct_textures() {
    let Some((device, _queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };

    let mut double = DoubleField::new(&device, "Test Double", 32, 32, TextureFormat::Rgba32Float);

    let read_before = double.read().texture().global_id();
    let write_before = double.write().texture().global_id();
    assert_ne!(read_before, write_before, "read and write must never alias");

    double.swap();
    assert_eq!(double.read().texture().global_id(), write_before);
    assert_eq!(double.write().texture().global_id(), read_before);

    // Swap is an involution
    double.swap();
    assert_eq!(double.read().texture().global_id(), read_before);
}

#[test]
fn resize_reallocates_only_changed_fields() {
    let Some((device, queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };

    let sim_res = Resolution { width: 64, height: 64 };
    let dye_res = Resolution { width: 256, height: 256 };
    let mut storage = FieldStorage::new(&device, &queue, sim_res, dye_res, TextureFormat::Rgba32Float);
    assert_eq!(storage.allocation_count(), 8);

    // Same dimensions: nothing happens
    assert!(!storage.resize_if_needed(&device, &queue, sim_res, dye_res));
    assert_eq!(storage.allocation_count(), 8);

    // Dye only: the two dye buffers
    let wider_dye = Resolution { width: 512, height: 256 };
    assert!(storage.resize_if_needed(&device, &queue, sim_res, wider_dye));
    assert_eq!(storage.allocation_count(), 10);
    assert_eq!(storage.dye.width(), 512);
    assert_eq!(storage.velocity.width(), 64);

    // Sim only: velocity pair, pressure pair, divergence, curl
    let wider_sim = Resolution { width: 128, height: 64 };
    assert!(storage.resize_if_needed(&device, &queue, wider_sim, wider_dye));
    assert_eq!(storage.allocation_count(), 16);
    assert_eq!(storage.velocity.width(), 128);
    assert_eq!(storage.pressure.width(), 128);
    assert_eq!(storage.curl.width, 128);
    assert_eq!(storage.divergence.width, 128);
}

#[test]
fn step_runs_configured_pressure_iterations() {
    let Some((device, queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };

    let config = SimulationConfig {
        sim_resolution: 64,
        dye_resolution: 128,
        pressure_iterations: 13,
        ..Default::default()
    };
    let mut sim = pollster::block_on(FluidSimulation::new(
        device,
        queue,
        config,
        test_caps(),
        256,
        256,
    ))
    .expect("simulation setup");

    let stats = sim.step(0.016);
    assert_eq!(stats.pressure_iterations, 13);
}

#[test]
fn surface_resize_reallocates_fields() {
    let Some((device, queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };

    let config = SimulationConfig {
        sim_resolution: 64,
        dye_resolution: 128,
        ..Default::default()
    };
    let mut sim = pollster::block_on(FluidSimulation::new(
        device,
        queue,
        config,
        test_caps(),
        256,
        256,
    ))
    .expect("simulation setup");
    assert_eq!(sim.storage().allocation_count(), 8);

    // Same size again: no reallocation
    assert!(!sim.resize_surface(256, 256));

    // Doubling the width changes the aspect ratio, so every field's target
    // dimensions change
    assert!(sim.resize_surface(512, 256));
    assert_eq!(sim.storage().allocation_count(), 16);
    assert_eq!(sim.storage().velocity.width(), 128);
    assert_eq!(sim.storage().velocity.height(), 64);
}

#[test]
fn ambient_splat_lands_while_paused() {
    let Some((device, queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };

    // Pause gates the physics step, never splat injection: the field keeps
    // receiving ambient dye so it stays visually alive.
    let config = SimulationConfig {
        sim_resolution: 32,
        dye_resolution: 32,
        paused: true,
        ..Default::default()
    };
    let mut sim = pollster::block_on(FluidSimulation::new(
        device,
        queue,
        config,
        test_caps(),
        128,
        128,
    ))
    .expect("simulation setup");

    sim.ambient_splat(&mut rand::thread_rng());

    let dye = sim.read_field(sim.storage().dye.read()).expect("dye readback");
    let energy: f64 = dye
        .iter()
        .map(|t| (t[0] + t[1] + t[2]).abs() as f64)
        .sum();
    assert!(energy > 0.0, "ambient splat must deposit dye while paused");
}

#[test]
fn zero_divergence_field_keeps_pressure_uniform() {
    let Some((device, queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };

    let config = SimulationConfig {
        sim_resolution: 32,
        dye_resolution: 32,
        pressure_iterations: 10,
        ..Default::default()
    };
    let mut sim = pollster::block_on(FluidSimulation::new(
        device,
        queue,
        config,
        test_caps(),
        128,
        128,
    ))
    .expect("simulation setup");

    // Fields start cleared: velocity zero everywhere, so divergence is zero
    // and the Jacobi iteration must leave a uniform (zero) pressure field.
    sim.step(0.016);

    let pressure = sim
        .read_field(sim.storage().pressure.read())
        .expect("pressure readback");
    for texel in &pressure {
        assert!(
            texel[0].abs() < 1.0e-4,
            "pressure must stay uniform with zero divergence, found {}",
            texel[0]
        );
    }
}
