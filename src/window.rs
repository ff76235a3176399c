//! Window and Event Loop Management
//!
//! Shared windowing logic for the WASM (lib.rs) and desktop (main.rs) entry
//! points. Pointer and keyboard input are translated into session calls;
//! asynchronous work comes back to the loop as a [`UserEvent`] through the
//! event loop proxy, so the session is only ever touched from the loop.

use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoopProxy};
use winit::keyboard::{Key, ModifiersState, NamedKey};
use winit::window::{Window, WindowId};

use crate::app::{App, Completion, DisplayState, Job};
use crate::color::Rgba;
use crate::config::StudioConfig;
use crate::debug;
use crate::image_state::ImageState;
use crate::input::{PointerEvent, PointerEventSource, PointerEventType, TouchTracker};
use crate::renderer::Renderer;
use crate::synthesis::{AspectRatio, Credential, GeminiModel, ImageSize, Mode, StyleFilter, Synthesizer};
use crate::tool::Tool;
use crate::transform::Axis;

const INITIAL_WIDTH: u32 = 1280;
const INITIAL_HEIGHT: u32 = 800;
/// Brush size change per `[` / `]` press
const BRUSH_STEP: f32 = 5.0;

/// Events delivered to the loop from outside it
pub enum UserEvent {
    /// The browser finished creating the renderer
    RendererReady(Renderer),
    Completion(Completion),
    Command(Command),
}

/// Session operations that can be requested by keyboard or by the page
pub enum Command {
    SelectTool(Tool),
    Undo,
    Redo,
    LoadImage(ImageState),
    RestoreGeneration(u64),
    ClearMask,
    SetBrushSize(f32),
    AdjustBrushSize(f32),
    SetBrushColor(Rgba),
    ZoomIn,
    ZoomOut,
    ResetZoom,
    ApplyCrop,
    Rotate(f32),
    Flip(Axis),
    Resize { width: i64, height: i64 },
    SetMode(Mode),
    SetPrompt(String),
    SetModel(GeminiModel),
    SetAspectRatio(AspectRatio),
    SetImageSize(ImageSize),
    SetCredential(Option<Credential>),
    SetReferenceImage(Option<ImageState>),
    SetSynthesizer(Rc<dyn Synthesizer>),
    /// Run synthesis with the prompt box, or with a style filter's prompt
    Synthesize(Option<StyleFilter>),
}

type StateListener = Box<dyn FnMut(&DisplayState)>;

/// Wrapper for the application window and state
pub struct AppWrapper {
    pub window: Option<Arc<Window>>,
    pub renderer: Option<Renderer>,
    pub app: App,
    proxy: EventLoopProxy<UserEvent>,
    synthesizer: Option<Rc<dyn Synthesizer>>,
    state_listener: Option<StateListener>,
    /// Last cursor position in logical pixels
    cursor: [f32; 2],
    scale_factor: f64,
    touches: TouchTracker,
    modifiers: ModifiersState,
    #[cfg(not(target_arch = "wasm32"))]
    started: std::time::Instant,
}

impl AppWrapper {
    pub fn new(config: StudioConfig, proxy: EventLoopProxy<UserEvent>) -> Self {
        Self {
            window: None,
            renderer: None,
            app: App::new(config),
            proxy,
            synthesizer: None,
            state_listener: None,
            cursor: [0.0, 0.0],
            scale_factor: 1.0,
            touches: TouchTracker::new(),
            modifiers: ModifiersState::empty(),
            #[cfg(not(target_arch = "wasm32"))]
            started: std::time::Instant::now(),
        }
    }

    /// Called with a fresh snapshot after every change
    pub fn set_state_listener(&mut self, listener: impl FnMut(&DisplayState) + 'static) {
        self.state_listener = Some(Box::new(listener));
    }

    pub fn execute(&mut self, command: Command) {
        let job = match command {
            Command::SelectTool(tool) => {
                let active = self.app.select_tool(tool);
                log::info!("Tool: {}", active);
                None
            }
            Command::Undo => self.app.undo(),
            Command::Redo => self.app.redo(),
            Command::LoadImage(image) => Some(self.app.load_image(image)),
            Command::RestoreGeneration(id) => self.app.restore_generation(id),
            Command::ClearMask => {
                self.app.clear_mask();
                None
            }
            Command::SetBrushSize(size) => {
                if let Err(e) = self.app.set_brush_size(size) {
                    log::debug!("Brush size rejected: {}", e);
                }
                None
            }
            Command::AdjustBrushSize(delta) => {
                let size = self.app.canvas().brush_params().size + delta;
                if let Err(e) = self.app.set_brush_size(size) {
                    log::debug!("Brush size rejected: {}", e);
                }
                None
            }
            Command::SetBrushColor(color) => {
                if let Err(e) = self.app.set_brush_color(color) {
                    log::debug!("Brush color rejected: {}", e);
                }
                None
            }
            Command::ZoomIn => {
                self.app.zoom_in();
                None
            }
            Command::ZoomOut => {
                self.app.zoom_out();
                None
            }
            Command::ResetZoom => {
                self.app.reset_zoom();
                None
            }
            Command::ApplyCrop => self.app.apply_crop(),
            Command::Rotate(degrees) => self.app.rotate(degrees),
            Command::Flip(axis) => self.app.flip(axis),
            Command::Resize { width, height } => self.app.resize(width, height),
            Command::SetMode(mode) => {
                self.app.set_mode(mode);
                None
            }
            Command::SetPrompt(prompt) => {
                self.app.settings_mut().prompt = prompt;
                None
            }
            Command::SetModel(model) => {
                self.app.settings_mut().model = model;
                None
            }
            Command::SetAspectRatio(aspect_ratio) => {
                self.app.settings_mut().aspect_ratio = aspect_ratio;
                None
            }
            Command::SetImageSize(image_size) => {
                self.app.settings_mut().image_size = image_size;
                None
            }
            Command::SetCredential(credential) => {
                self.app.settings_mut().credential = credential;
                None
            }
            Command::SetReferenceImage(reference) => {
                self.app.set_reference_image(reference);
                None
            }
            Command::SetSynthesizer(synthesizer) => {
                log::info!("Synthesizer registered");
                self.synthesizer = Some(synthesizer);
                None
            }
            Command::Synthesize(filter) => {
                self.start_synthesis(filter);
                None
            }
        };
        self.run_job(job);
        self.changed();
    }

    fn start_synthesis(&mut self, filter: Option<StyleFilter>) {
        let Some(synthesizer) = self.synthesizer.clone() else {
            log::warn!("No synthesizer registered, ignoring request");
            return;
        };
        let request = match filter {
            Some(filter) => self.app.filter_request(filter),
            None => self.app.synthesis_request(None),
        };
        // Rejections are already recorded as the session's last error
        let Ok(request) = request else {
            return;
        };
        let prompt = request.prompt.clone();
        let pending = synthesizer.synthesize(request);
        self.spawn(async move {
            Completion::Synthesized {
                prompt,
                result: pending.await,
            }
        });
    }

    fn run_job(&self, job: Option<Job>) {
        if let Some(job) = job {
            self.spawn(job.run());
        }
    }

    /// Run `work` and post its completion back to the loop
    fn spawn(&self, work: impl Future<Output = Completion> + 'static) {
        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                post(&proxy, UserEvent::Completion(work.await));
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            // Desktop decodes in place; the completion still goes through
            // the loop so both platforms apply it the same way
            post(&self.proxy, UserEvent::Completion(pollster::block_on(work)));
        }
    }

    /// Publish the new state and schedule a frame
    fn changed(&mut self) {
        let state = self.app.display_state();
        debug::update_tool(&state.tool, state.brush_size);
        debug::update_history(self.app.history().cursor(), self.app.history().len(), state.zoom_percent);
        if let Some(error) = &state.last_error {
            debug::update_status(error);
        }
        if let Some(listener) = self.state_listener.as_mut() {
            listener(&state);
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn timestamp(&self) -> f64 {
        #[cfg(target_arch = "wasm32")]
        {
            web_sys::window()
                .and_then(|w| w.performance())
                .map(|p| p.now())
                .unwrap_or(0.0)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            self.started.elapsed().as_secs_f64() * 1000.0
        }
    }

    fn pointer(&mut self, event: PointerEvent) {
        let source = match event.source {
            PointerEventSource::Mouse => "mouse",
            PointerEventSource::Touch => "touch",
        };
        debug::update_pointer(source, event.position);
        self.app.queue_input_event(event.with_timestamp(self.timestamp()));
        if self.app.has_pending_input() {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    /// Map a key press to a command
    fn shortcut(&self, key: &Key) -> Option<Command> {
        let ctrl = self.modifiers.control_key() || self.modifiers.super_key();
        let shift = self.modifiers.shift_key();
        let command = match key {
            Key::Named(NamedKey::Enter) => Command::ApplyCrop,
            Key::Named(NamedKey::Delete | NamedKey::Backspace) => Command::ClearMask,
            Key::Named(NamedKey::Escape) => Command::SelectTool(Tool::None),
            Key::Character(c) => match (ctrl, c.to_lowercase().as_str()) {
                (true, "z") if shift => Command::Redo,
                (true, "z") => Command::Undo,
                (true, "y") => Command::Redo,
                (true, _) => return None,
                (false, "b") => Command::SelectTool(Tool::AiMaskBrush),
                (false, "e") => Command::SelectTool(Tool::Eraser),
                (false, "c") => Command::SelectTool(Tool::Crop),
                (false, "r") => Command::SelectTool(Tool::RectSelect),
                (false, "o") => Command::SelectTool(Tool::EllipseSelect),
                (false, "p") => Command::SelectTool(Tool::ColorBrush),
                (false, "q") => Command::Rotate(-90.0),
                (false, "w") => Command::Rotate(90.0),
                (false, "h") => Command::Flip(Axis::Horizontal),
                (false, "v") => Command::Flip(Axis::Vertical),
                (false, "+" | "=") => Command::ZoomIn,
                (false, "-") => Command::ZoomOut,
                (false, "0") => Command::ResetZoom,
                (false, "[") => Command::AdjustBrushSize(-BRUSH_STEP),
                (false, "]") => Command::AdjustBrushSize(BRUSH_STEP),
                _ => return None,
            },
            _ => return None,
        };
        Some(command)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn export(&self) {
        match self.app.export_png() {
            Ok((bytes, name)) => match std::fs::write(&name, bytes) {
                Ok(()) => log::info!("Exported {}", name),
                Err(e) => log::error!("Could not write {}: {}", name, e),
            },
            Err(e) => log::warn!("Export failed: {}", e),
        }
    }
}

fn post(proxy: &EventLoopProxy<UserEvent>, event: UserEvent) {
    if proxy.send_event(event).is_err() {
        log::warn!("Event loop closed, dropping completion");
    }
}

/// Physical window size in the logical pixels the session lays out in
fn logical_size(size: PhysicalSize<u32>, scale_factor: f64) -> [f32; 2] {
    let logical = size.to_logical::<f32>(scale_factor);
    [logical.width, logical.height]
}

/// Read an image file from disk as a data URI handle
#[cfg(not(target_arch = "wasm32"))]
pub fn load_path(path: &std::path::Path) -> anyhow::Result<ImageState> {
    use anyhow::Context;

    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(ImageState::from_bytes(&bytes)?)
}

impl ApplicationHandler<UserEvent> for AppWrapper {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title("Image Studio")
            .with_inner_size(PhysicalSize::new(INITIAL_WIDTH, INITIAL_HEIGHT));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.scale_factor = window.scale_factor();
        let size = match window.inner_size() {
            size if size.width > 0 && size.height > 0 => size,
            _ => PhysicalSize::new(INITIAL_WIDTH, INITIAL_HEIGHT),
        };
        log::info!("Window created: {:?} at {}x", size, self.scale_factor);
        self.app.resize_window(logical_size(size, self.scale_factor));

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowExtWebSys;

            let attached = window.canvas().and_then(|canvas| {
                let container = web_sys::window()?.document()?.get_element_by_id("canvas-container")?;
                container.append_child(&canvas).ok()
            });
            if attached.is_none() {
                log::error!("Failed to attach canvas to #canvas-container");
                debug::update_status("Canvas container missing");
                return;
            }
            // On web the size only applies once the canvas is in the DOM
            let _ = window.request_inner_size(size);

            let proxy = self.proxy.clone();
            let target = window.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match Renderer::new(target, size).await {
                    Ok(renderer) => post(&proxy, UserEvent::RendererReady(renderer)),
                    Err(e) => {
                        log::error!("Renderer initialization failed: {:#}", e);
                        debug::update_status("Renderer initialization failed");
                    }
                }
            });
            self.window = Some(window);
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            match pollster::block_on(Renderer::new(window.clone(), size)) {
                Ok(mut renderer) => {
                    renderer.set_scale_factor(self.scale_factor);
                    self.renderer = Some(renderer);
                }
                Err(e) => {
                    log::error!("Renderer initialization failed: {:#}", e);
                    event_loop.exit();
                    return;
                }
            }
            self.window = Some(window);
            self.changed();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::RendererReady(mut renderer) => {
                log::info!("Renderer ready");
                renderer.set_scale_factor(self.scale_factor);
                self.renderer = Some(renderer);
                self.changed();
            }
            UserEvent::Completion(completion) => {
                let next = self.app.complete(completion);
                self.run_job(next);
                self.changed();
            }
            UserEvent::Command(command) => self.execute(command),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if physical_size.width == 0 || physical_size.height == 0 {
                    log::warn!("Ignoring resize to zero size: {:?}", physical_size);
                    return;
                }
                log::debug!("Resized to {:?}", physical_size);
                self.app.resize_window(logical_size(physical_size, self.scale_factor));
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(physical_size);
                }
                self.changed();
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::debug!("Scale factor changed to {}", scale_factor);
                self.scale_factor = scale_factor;
                if let Some(renderer) = &mut self.renderer {
                    renderer.set_scale_factor(scale_factor);
                }
                // The new physical size follows as a Resized event
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                #[cfg(not(target_arch = "wasm32"))]
                {
                    let ctrl = self.modifiers.control_key() || self.modifiers.super_key();
                    if let Key::Character(c) = &event.logical_key {
                        if ctrl && c.eq_ignore_ascii_case("s") {
                            self.export();
                            return;
                        }
                    }
                }
                if let Some(command) = self.shortcut(&event.logical_key) {
                    self.execute(command);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = position.to_logical::<f32>(self.scale_factor);
                self.cursor = [position.x, position.y];
                self.pointer(PointerEvent::mouse(PointerEventType::Move, self.cursor));
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer(PointerEvent::mouse(PointerEventType::Leave, self.cursor));
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let event_type = match state {
                    ElementState::Pressed => PointerEventType::Down,
                    ElementState::Released => PointerEventType::Up,
                };
                self.pointer(PointerEvent::mouse(event_type, self.cursor));
            }
            WindowEvent::Touch(touch) => {
                let event_type = match touch.phase {
                    TouchPhase::Started => PointerEventType::Down,
                    TouchPhase::Moved => PointerEventType::Move,
                    TouchPhase::Ended => PointerEventType::Up,
                    TouchPhase::Cancelled => PointerEventType::Leave,
                };
                if !self.touches.accept(touch.id, event_type) {
                    return;
                }
                let location = touch.location.to_logical::<f32>(self.scale_factor);
                self.pointer(PointerEvent::touch(event_type, &[[location.x, location.y]]));
            }
            #[cfg(not(target_arch = "wasm32"))]
            WindowEvent::DroppedFile(path) => match load_path(&path) {
                Ok(image) => {
                    log::info!("Loading dropped file {}", path.display());
                    self.execute(Command::LoadImage(image));
                }
                Err(e) => log::warn!("Could not load {}: {:#}", path.display(), e),
            },
            WindowEvent::RedrawRequested => {
                let had_input = self.app.has_pending_input();
                self.app.process_input();
                if let Some(renderer) = &mut self.renderer {
                    self.app.render(renderer);
                }
                if had_input {
                    let state = self.app.display_state();
                    if let Some(listener) = self.state_listener.as_mut() {
                        listener(&state);
                    }
                }
            }
            _ => {}
        }
    }
}
