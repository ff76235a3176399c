//! Standalone Image Studio Application (Desktop)
//!
//! Runs the studio as a native window. An optional image path on the
//! command line is loaded at startup; files can also be dropped onto the
//! window. For WASM/web builds, the entry point is in lib.rs (wasm_start).

use std::path::PathBuf;

use anyhow::Context;
use image_studio::window::load_path;
use image_studio::{AppWrapper, Command, StudioConfig, UserEvent};
use winit::event_loop::{ControlFlow, EventLoop};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    log::info!("Starting image studio desktop app");

    let config = StudioConfig::default();
    config.validate()?;

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app_wrapper = AppWrapper::new(config, event_loop.create_proxy());

    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        let image = load_path(&path)?;
        log::info!("Loading {}", path.display());
        app_wrapper.execute(Command::LoadImage(image));
    }

    event_loop.run_app(&mut app_wrapper).context("event loop error")?;
    Ok(())
}
