//! End-to-end headless simulation test: inject a splat, step once, and read
//! the fields back to verify dye and velocity actually moved.

use std::sync::Arc;

use glam::Vec2;
use wgpu::TextureFormat;

use dyeflow::sim::GpuCapabilities;
use dyeflow::{FluidSimulation, SimulationConfig};

async fn create_test_context() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
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

fn test_simulation(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> FluidSimulation {
    let config = SimulationConfig {
        sim_resolution: 128,
        dye_resolution: 256,
        pressure_iterations: 20,
        ..Default::default()
    };
    // Full-float fields so readback needs no half decoding and nearest
    // sampling works everywhere
    let caps = GpuCapabilities {
        field_format: TextureFormat::Rgba32Float,
        filterable: false,
    };
    pollster::block_on(FluidSimulation::new(device, queue, config, caps, 256, 256))
        .expect("simulation setup")
}

fn total_energy(texels: &[[f32; 4]], channel: usize) -> f64 {
    texels.iter().map(|t| t[channel].abs() as f64).sum()
}

#[test]
fn splat_then_step_moves_dye_and_velocity() {
    let Some((device, queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };
    let mut sim = test_simulation(device, queue);

    sim.splat(Vec2::new(0.5, 0.5), Vec2::new(100.0, 0.0), [1.0, 0.0, 0.0]);
    sim.step(0.016);

    let dye = sim.read_field(sim.storage().dye.read()).expect("dye readback");
    let red = total_energy(&dye, 0);
    assert!(red > 0.0, "splat must deposit red dye");
    let green = total_energy(&dye, 1);
    assert!(green < red * 1.0e-3, "only the red channel was injected");

    let velocity = sim
        .read_field(sim.storage().velocity.read())
        .expect("velocity readback");
    let x_energy = total_energy(&velocity, 0);
    assert!(x_energy > 0.0, "splat must inject rightward velocity");

    // The force pointed along +x; net motion should, too
    let width = sim.storage().velocity.width() as usize;
    let height = sim.storage().velocity.height() as usize;
    let center = velocity[(height / 2) * width + width / 2];
    assert!(center[0] > 0.0, "center velocity should point along the force");
}

#[test]
fn non_finite_splat_is_rejected() {
    let Some((device, queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };
    let mut sim = test_simulation(device, queue);

    sim.splat(Vec2::new(f32::NAN, 0.5), Vec2::new(100.0, 0.0), [1.0, 0.0, 0.0]);
    sim.splat(Vec2::new(0.5, 0.5), Vec2::new(f32::INFINITY, 0.0), [1.0, 0.0, 0.0]);
    sim.splat(Vec2::new(0.5, 0.5), Vec2::new(100.0, 0.0), [f32::NAN, 0.0, 0.0]);

    let dye = sim.read_field(sim.storage().dye.read()).expect("dye readback");
    assert_eq!(total_energy(&dye, 0), 0.0, "rejected splats must not touch the field");

    let velocity = sim
        .read_field(sim.storage().velocity.read())
        .expect("velocity readback");
    assert_eq!(total_energy(&velocity, 0), 0.0);
}

#[test]
fn dye_decays_under_dissipation() {
    let Some((device, queue)) = pollster::block_on(create_test_context()) else {
        eprintln!("Skipping GPU test: no adapter");
        return;
    };
    let mut sim = test_simulation(device, queue);

    sim.splat(Vec2::new(0.5, 0.5), Vec2::ZERO, [1.0, 1.0, 1.0]);
    let before = total_energy(
        &sim.read_field(sim.storage().dye.read()).expect("dye readback"),
        0,
    );
    assert!(before > 0.0);

    for _ in 0..30 {
        sim.step(0.016);
    }
    let after = total_energy(
        &sim.read_field(sim.storage().dye.read()).expect("dye readback"),
        0,
    );
    assert!(
        after < before,
        "dissipation must bleed dye energy: {} -> {}",
        before,
        after
    );
}
