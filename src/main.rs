use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec2;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, Touch, TouchPhase, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;

use dyeflow::{EngineCommand, FluidEngine, InputTranslator, PointerKind, SimulationConfig};

const CONFIG_PATH: &str = "dyeflow.toml";

fn load_config() -> Result<SimulationConfig> {
    if !Path::new(CONFIG_PATH).exists() {
        return Ok(SimulationConfig::default());
    }
    let text = std::fs::read_to_string(CONFIG_PATH).context("reading dyeflow.toml")?;
    let config = toml::from_str(&text).context("parsing dyeflow.toml")?;
    log::info!("[main] Loaded configuration from {}", CONFIG_PATH);
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();

    let config = load_config()?;
    let mut translator = InputTranslator::new(config.splat_force);
    let mut rng = rand::thread_rng();

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("dyeflow")
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)?,
    );

    let mut engine = pollster::block_on(FluidEngine::new(window.clone(), config))?;

    // Cursor position is delivered in physical pixels; the simulation wants
    // normalized texcoords with y up.
    let normalize = |window: &winit::window::Window, x: f64, y: f64| {
        let size = window.inner_size();
        Vec2::new(
            (x / size.width.max(1) as f64) as f32,
            (1.0 - y / size.height.max(1) as f64) as f32,
        )
    };

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => {
                engine.enqueue(EngineCommand::Resize {
                    width: size.width,
                    height: size.height,
                });
            }
            WindowEvent::CursorEntered { .. } => translator.pointer_enter(PointerKind::Mouse),
            WindowEvent::CursorLeft { .. } => translator.pointer_leave(PointerKind::Mouse),
            WindowEvent::CursorMoved { position, .. } => {
                let texcoord = normalize(engine.window(), position.x, position.y);
                if let Some(splat) = translator.pointer_move(PointerKind::Mouse, texcoord, &mut rng) {
                    engine.enqueue(EngineCommand::Splat(splat));
                }
            }
            WindowEvent::MouseInput { state, .. } => match state {
                ElementState::Pressed => translator.pointer_down(PointerKind::Mouse),
                ElementState::Released => translator.pointer_up(PointerKind::Mouse),
            },
            WindowEvent::Touch(Touch { phase, location, id, .. }) => {
                let kind = PointerKind::Touch(id);
                let texcoord = normalize(engine.window(), location.x, location.y);
                match phase {
                    TouchPhase::Started => {
                        translator.pointer_down(kind);
                        translator.pointer_move(kind, texcoord, &mut rng);
                    }
                    TouchPhase::Moved => {
                        if let Some(splat) = translator.pointer_move(kind, texcoord, &mut rng) {
                            engine.enqueue(EngineCommand::Splat(splat));
                        }
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled => translator.pointer_leave(kind),
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(error) = engine.frame() {
                    log::error!("[main] Frame failed: {}", error);
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => engine.window().request_redraw(),
        _ => {}
    })?;

    Ok(())
}
