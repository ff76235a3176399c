//! Image Studio Library
//!
//! The editing core of an AI image studio: a masked-editing canvas with
//! brush, eraser and shape tools, undo/redo history with a generation log,
//! rotate/flip/resize/crop transforms and the request model for the image
//! synthesis service. It runs:
//! - Standalone in a browser (via WASM), driven by the host page
//! - As a native desktop window
//!
//! The session ([`App`]) knows nothing about windows; [`AppWrapper`] and
//! [`Renderer`] put it on screen.

pub mod app;
pub mod brush;
pub mod canvas;
pub mod color;
pub mod config;
pub mod debug;
pub mod error;
pub mod history;
pub mod image_state;
pub mod input;
pub mod raster;
pub mod renderer;
pub mod synthesis;
pub mod tool;
pub mod transform;
pub mod viewport;
#[cfg(target_arch = "wasm32")]
mod web;
pub mod window;

pub use app::{App, Completion, DisplayState, Job};
pub use brush::{BrushDab, BrushParams, BrushState};
pub use canvas::{DrawingCanvas, MaskUpdate};
pub use config::StudioConfig;
pub use error::{Result, StudioError};
pub use history::{Generation, GenerationLog, HistoryStore};
pub use image_state::ImageState;
pub use input::{InputQueue, PointerEvent, PointerEventType, TouchTracker};
pub use renderer::Renderer;
pub use synthesis::{SynthesisRequest, Synthesizer};
pub use tool::Tool;
pub use transform::{Axis, Transform};
pub use viewport::{ScreenRect, ViewportState, Zoom};
pub use window::{AppWrapper, Command, UserEvent};

// Re-export for WASM builds
#[cfg(target_arch = "wasm32")]
pub use wasm_bindgen;

/// Initialize panic hook for better error messages in WASM
#[cfg(target_arch = "wasm32")]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Initialize logging for WASM (logs go to browser console)
#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    if console_log::init_with_level(log::Level::Debug).is_err() {
        web_sys::console::warn_1(&"Logger already initialized".into());
    }
}

/// WASM entry point - called when the module is loaded
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn wasm_start() {
    init_panic_hook();
    init_logging();

    log::info!("Image Studio WASM module started");
    run_event_loop();
}

#[cfg(target_arch = "wasm32")]
fn run_event_loop() {
    use winit::event_loop::{ControlFlow, EventLoop};
    use winit::platform::web::EventLoopExtWebSys;

    let event_loop = match EventLoop::<UserEvent>::with_user_event().build() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            debug::update_status("Failed to create event loop");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app_wrapper = AppWrapper::new(StudioConfig::default(), event_loop.create_proxy());
    web::install(&mut app_wrapper, event_loop.create_proxy());

    // Returns immediately; the browser drives the loop from here
    event_loop.spawn_app(app_wrapper);
}
