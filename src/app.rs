//! Application State and Logic
//!
//! [`App`] is the editing session: history, generation log, canvas rasters,
//! viewport, prompt settings and the last error. It is independent of the
//! windowing system. Anything that needs decoded pixels is returned to the
//! caller as a [`Job`]; the caller runs it on whatever executor it has and
//! hands the resulting [`Completion`] back through [`App::complete`].

use chrono::Utc;
use image::RgbaImage;
use serde::Serialize;

use crate::brush::BrushParams;
use crate::canvas::DrawingCanvas;
use crate::color::Rgba;
use crate::config::StudioConfig;
use crate::error::{Result, StudioError};
use crate::history::{GenerationLog, HistoryStore};
use crate::image_state::{encode_png, ImageState};
use crate::input::{InputQueue, PointerEvent, PointerEventType};
use crate::renderer::Renderer;
use crate::synthesis::{
    AspectRatio, Credential, GeminiModel, ImageSize, Mode, StyleFilter, SynthesisRequest, Synthesizer,
};
use crate::tool::Tool;
use crate::transform::{Axis, Transform};
use crate::viewport::{client_to_raster, ScreenRect, ViewportState, Zoom};

/// Window size assumed until the shell reports the real one
const DEFAULT_WINDOW: [f32; 2] = [1280.0, 800.0];

/// Asynchronous work requested by the session
#[derive(Debug, Clone)]
pub enum Job {
    /// Decode the working image to learn its intrinsic size
    Measure { revision: u64, image: ImageState },
    Transform {
        revision: u64,
        image: ImageState,
        transform: Transform,
    },
}

impl Job {
    pub async fn run(self) -> Completion {
        match self {
            Job::Measure { revision, image } => Completion::Measured {
                revision,
                result: image.decode().await,
            },
            Job::Transform {
                revision,
                image,
                transform,
            } => Completion::Transformed {
                revision,
                result: transform.apply(&image).await,
            },
        }
    }
}

/// Result of a [`Job`] or of a synthesis call
#[derive(Debug)]
pub enum Completion {
    Measured {
        revision: u64,
        result: Result<RgbaImage>,
    },
    Transformed {
        revision: u64,
        result: Result<Option<ImageState>>,
    },
    Synthesized {
        prompt: String,
        result: Result<ImageState>,
    },
}

/// Prompt panel state
#[derive(Debug, Clone)]
pub struct PromptSettings {
    pub mode: Mode,
    pub prompt: String,
    pub model: GeminiModel,
    pub aspect_ratio: AspectRatio,
    pub image_size: ImageSize,
    pub credential: Option<Credential>,
}

/// Read-only snapshot for whatever draws the chrome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayState {
    pub image: Option<ImageState>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub tool: String,
    pub brush_size: f32,
    pub brush_color: String,
    pub zoom_percent: u32,
    pub has_mask: bool,
    pub has_crop_selection: bool,
    pub loading: bool,
    pub last_error: Option<String>,
    pub generations: usize,
}

type MaskListener = Box<dyn FnMut(Option<&ImageState>)>;

/// Main application state
pub struct App {
    config: StudioConfig,
    history: HistoryStore,
    generations: GenerationLog,
    canvas: DrawingCanvas,
    input_queue: InputQueue,
    /// `None` until the working image has been measured
    viewport: Option<ViewportState>,
    zoom: Zoom,
    window_size: [f32; 2],
    /// Where the page put the canvas, when it does its own layout
    canvas_rect: Option<ScreenRect>,
    decoded: Option<RgbaImage>,
    image_dirty: bool,
    mask: Option<ImageState>,
    mask_listener: Option<MaskListener>,
    reference_image: Option<ImageState>,
    settings: PromptSettings,
    last_error: Option<String>,
    loading: bool,
}

impl App {
    pub fn new(config: StudioConfig) -> Self {
        let params = BrushParams::new(config.default_brush_size, config.default_brush_color);
        let settings = PromptSettings {
            mode: Mode::Edit,
            prompt: String::new(),
            model: config.default_model,
            aspect_ratio: config.default_aspect_ratio,
            image_size: config.default_image_size,
            credential: None,
        };
        Self {
            canvas: DrawingCanvas::new((1, 1), params),
            config,
            history: HistoryStore::new(),
            generations: GenerationLog::new(),
            input_queue: InputQueue::new(),
            viewport: None,
            zoom: Zoom::default(),
            window_size: DEFAULT_WINDOW,
            canvas_rect: None,
            decoded: None,
            image_dirty: true,
            mask: None,
            mask_listener: None,
            reference_image: None,
            settings,
            last_error: None,
            loading: false,
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn generations(&self) -> &GenerationLog {
        &self.generations
    }

    pub fn canvas(&self) -> &DrawingCanvas {
        &self.canvas
    }

    pub fn viewport(&self) -> Option<&ViewportState> {
        self.viewport.as_ref()
    }

    /// Decoded pixels of the working image, once measured
    pub fn decoded_image(&self) -> Option<&RgbaImage> {
        self.decoded.as_ref()
    }

    pub fn current_image(&self) -> Option<&ImageState> {
        self.history.current()
    }

    /// Encoded mask as last reported to the listener
    pub fn mask(&self) -> Option<&ImageState> {
        self.mask.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn settings(&self) -> &PromptSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut PromptSettings {
        &mut self.settings
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.settings.mode = mode;
        self.last_error = None;
    }

    pub fn set_reference_image(&mut self, reference: Option<ImageState>) {
        self.reference_image = reference;
    }

    /// Called with the encoded mask on every commit and `None` on clear
    pub fn set_mask_listener(&mut self, listener: impl FnMut(Option<&ImageState>) + 'static) {
        self.mask_listener = Some(Box::new(listener));
    }

    pub fn display_state(&self) -> DisplayState {
        let params = self.canvas.brush_params();
        DisplayState {
            image: self.history.current().cloned(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            tool: self.canvas.active_tool().to_string(),
            brush_size: params.size,
            brush_color: params.color.to_string(),
            zoom_percent: self.zoom.percent(),
            has_mask: self.mask.is_some(),
            has_crop_selection: self.canvas.crop_selection().is_some(),
            loading: self.loading,
            last_error: self.last_error.clone(),
            generations: self.generations.len(),
        }
    }

    // ---- History ----------------------------------------------------------

    /// Make `image` the working image (upload, URL, any new result)
    pub fn load_image(&mut self, image: ImageState) -> Job {
        self.settings.mode = Mode::Edit;
        self.last_error = None;
        self.push(image)
    }

    pub fn undo(&mut self) -> Option<Job> {
        if !self.history.undo() {
            log::debug!("Nothing to undo");
            return None;
        }
        Some(self.image_changed())
    }

    pub fn redo(&mut self) -> Option<Job> {
        if !self.history.redo() {
            log::debug!("Nothing to redo");
            return None;
        }
        Some(self.image_changed())
    }

    /// Put a generation-log entry back on top of the history
    pub fn restore_generation(&mut self, id: u64) -> Option<Job> {
        let image = self.generations.get(id)?.result_image.clone();
        log::info!("Restoring generation #{}", id);
        Some(self.push(image))
    }

    fn push(&mut self, image: ImageState) -> Job {
        self.history.push(image);
        self.image_changed()
    }

    /// The working image moved: drop the mask and wait for a new measure
    fn image_changed(&mut self) -> Job {
        self.set_mask(None);
        self.viewport = None;
        self.decoded = None;
        self.image_dirty = true;
        self.input_queue.reset();
        self.canvas.clear();
        let image = self
            .history
            .current()
            .cloned()
            .unwrap_or_else(|| ImageState::new(""));
        Job::Measure {
            revision: self.history.revision(),
            image,
        }
    }

    // ---- Async completions ------------------------------------------------

    /// Apply a finished job. May return follow-up work.
    pub fn complete(&mut self, completion: Completion) -> Option<Job> {
        match completion {
            Completion::Measured { revision, result } => {
                if revision != self.history.revision() {
                    log::warn!("Dropping stale measure (revision {} != {})", revision, self.history.revision());
                    return None;
                }
                match result {
                    Ok(pixels) => self.measured(pixels),
                    Err(e) => {
                        log::warn!("Could not decode working image: {}", e);
                        self.last_error = Some(e.to_string());
                    }
                }
                None
            }
            Completion::Transformed { revision, result } => {
                if revision != self.history.revision() {
                    log::warn!(
                        "Dropping stale transform (revision {} != {})",
                        revision,
                        self.history.revision()
                    );
                    return None;
                }
                match result {
                    Ok(Some(image)) => Some(self.push(image)),
                    Ok(None) => None,
                    Err(e) => {
                        log::warn!("Transform failed: {}", e);
                        self.last_error = Some(e.to_string());
                        None
                    }
                }
            }
            Completion::Synthesized { prompt, result } => self.finish_synthesis(&prompt, result),
        }
    }

    /// Run `job` and everything it leads to
    pub async fn drive(&mut self, mut job: Option<Job>) {
        while let Some(next) = job {
            let completion = next.run().await;
            job = self.complete(completion);
        }
    }

    fn measured(&mut self, pixels: RgbaImage) {
        let mut viewport = ViewportState::fit(self.window_size, pixels.dimensions(), &self.config);
        viewport.zoom_scale = self.zoom.scale();
        log::info!(
            "Image measured {}x{}, base size {:.0}x{:.0}",
            pixels.width(),
            pixels.height(),
            viewport.base_width,
            viewport.base_height
        );
        self.canvas.resize(viewport.raster_size());
        self.viewport = Some(viewport);
        self.decoded = Some(pixels);
        self.image_dirty = true;
    }

    // ---- Tools and brush --------------------------------------------------

    pub fn active_tool(&self) -> Tool {
        self.canvas.active_tool()
    }

    /// Select a tool, or toggle it off when already active
    pub fn select_tool(&mut self, tool: Tool) -> Tool {
        self.input_queue.reset();
        let active = self.canvas.select_tool(tool);
        self.set_mask(None);
        active
    }

    pub fn set_brush_size(&mut self, size: f32) -> std::result::Result<(), String> {
        let params = BrushParams::new(size, self.canvas.brush_params().color);
        params.validate()?;
        self.canvas.set_brush_params(params);
        Ok(())
    }

    pub fn set_brush_color(&mut self, color: Rgba) -> std::result::Result<(), String> {
        let params = BrushParams::new(self.canvas.brush_params().size, color);
        params.validate()?;
        self.canvas.set_brush_params(params);
        Ok(())
    }

    // ---- Viewport ---------------------------------------------------------

    pub fn zoom_in(&mut self) {
        self.zoom.zoom_in(&self.config);
        self.sync_zoom();
    }

    pub fn zoom_out(&mut self) {
        self.zoom.zoom_out(&self.config);
        self.sync_zoom();
    }

    pub fn reset_zoom(&mut self) {
        self.zoom.reset();
        self.sync_zoom();
    }

    pub fn zoom_scale(&self) -> f32 {
        self.zoom.scale()
    }

    fn sync_zoom(&mut self) {
        if let Some(viewport) = self.viewport.as_mut() {
            viewport.zoom_scale = self.zoom.scale();
        }
        log::debug!("Zoom {}%", self.zoom.percent());
    }

    /// The window (or page viewport) changed size
    pub fn resize_window(&mut self, size: [f32; 2]) {
        self.window_size = size;
        if !self.config.refit_on_resize {
            return;
        }
        let Some(dims) = self.decoded.as_ref().map(|d| d.dimensions()) else {
            return;
        };
        let mut viewport = ViewportState::fit(size, dims, &self.config);
        viewport.zoom_scale = self.zoom.scale();
        if self.viewport.map(|v| v.raster_size()) != Some(viewport.raster_size()) {
            log::info!("Refit on resize: {:?}", viewport.raster_size());
            self.canvas.resize(viewport.raster_size());
            self.set_mask(None);
        }
        self.viewport = Some(viewport);
    }

    pub fn set_canvas_rect(&mut self, rect: Option<ScreenRect>) {
        self.canvas_rect = rect;
    }

    /// On-screen rectangle of the canvas in client space
    pub fn screen_rect(&self) -> Option<ScreenRect> {
        let viewport = self.viewport?;
        Some(self.canvas_rect.unwrap_or_else(|| viewport.display_rect(self.window_size)))
    }

    // ---- Pointer input ----------------------------------------------------

    pub fn queue_input_event(&mut self, event: PointerEvent) {
        self.input_queue.push_event(event);
    }

    pub fn has_pending_input(&self) -> bool {
        self.input_queue.has_events()
    }

    /// Feed queued pointer events through the active tool
    pub fn process_input(&mut self) {
        let events: Vec<PointerEvent> = self.input_queue.drain_events().collect();
        let (Some(viewport), Some(rect)) = (self.viewport, self.screen_rect()) else {
            if !events.is_empty() {
                log::debug!("Ignoring {} pointer events, canvas not ready", events.len());
            }
            return;
        };
        let raster_size = viewport.raster_size();

        for event in events {
            let position = event.position.and_then(|p| client_to_raster(p, &rect, raster_size));
            let outcome = match (event.event_type, position) {
                (PointerEventType::Down, Some(p)) => self.canvas.pointer_down(p),
                (PointerEventType::Move, Some(p)) => self.canvas.pointer_move(p),
                (PointerEventType::Up | PointerEventType::Leave, _) => self.canvas.pointer_up(),
                (_, None) => Ok(None),
            };
            match outcome {
                Ok(Some(update)) => self.set_mask(update.into_state()),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Mask encode failed: {}", e);
                    self.last_error = Some(e.to_string());
                }
            }
        }
    }

    /// Wipe the mask, overlay and any selection
    pub fn clear_mask(&mut self) {
        self.canvas.clear();
        self.mask = None;
        // Clearing always reports, even when nothing was committed
        if let Some(listener) = self.mask_listener.as_mut() {
            listener(None);
        }
    }

    fn set_mask(&mut self, mask: Option<ImageState>) {
        if mask.is_none() && self.mask.is_none() {
            return;
        }
        self.mask = mask;
        if let Some(listener) = self.mask_listener.as_mut() {
            listener(self.mask.as_ref());
        }
    }

    // ---- Transforms -------------------------------------------------------

    /// Crop the working image to the finished crop selection
    pub fn apply_crop(&mut self) -> Option<Job> {
        let rect = self.canvas.crop_selection()?;
        let (viewport, decoded) = (self.viewport?, self.decoded.as_ref()?);
        let (raster_w, raster_h) = viewport.raster_size();
        let scale_x = decoded.width() as f32 / raster_w as f32;
        let scale_y = decoded.height() as f32 / raster_h as f32;
        let transform = Transform::Crop {
            x: (rect.x * scale_x).round() as i64,
            y: (rect.y * scale_y).round() as i64,
            width: (rect.width * scale_x).round() as i64,
            height: (rect.height * scale_y).round() as i64,
        };
        let job = self.transform(transform)?;
        self.clear_mask();
        Some(job)
    }

    pub fn rotate(&mut self, degrees: f32) -> Option<Job> {
        self.transform(Transform::Rotate(degrees))
    }

    pub fn flip(&mut self, axis: Axis) -> Option<Job> {
        self.transform(Transform::Flip(axis))
    }

    pub fn resize(&mut self, width: i64, height: i64) -> Option<Job> {
        self.transform(Transform::Resize { width, height })
    }

    fn transform(&mut self, transform: Transform) -> Option<Job> {
        if !transform.is_valid() {
            log::debug!("Rejected {:?}", transform);
            return None;
        }
        let image = self.history.current()?.clone();
        Some(Job::Transform {
            revision: self.history.revision(),
            image,
            transform,
        })
    }

    // ---- Synthesis --------------------------------------------------------

    /// Build the request for the current prompt (or `forced_prompt`, used by
    /// style filters) and mark the session as loading
    pub fn synthesis_request(&mut self, forced_prompt: Option<&str>) -> Result<SynthesisRequest> {
        let prompt = forced_prompt.unwrap_or(&self.settings.prompt).to_string();
        let mut request = SynthesisRequest::new(prompt)
            .with_model(self.settings.model)
            .with_aspect_ratio(self.settings.aspect_ratio)
            .with_image_size(self.settings.image_size)
            .with_reference(self.reference_image.clone());
        if let Some(credential) = self.settings.credential.clone() {
            request = request.with_credential(credential);
        }
        if self.settings.mode == Mode::Edit {
            if let Some(current) = self.history.current() {
                request = request.with_source_image(current.clone()).with_mask(self.mask.clone());
            }
        }
        if let Err(e) = request.validate() {
            log::debug!("Synthesis request rejected: {}", e);
            self.last_error = Some(e.to_string());
            return Err(e);
        }
        log::info!("Synthesis started ({:?}, {})", request.mode, request.model);
        self.loading = true;
        self.last_error = None;
        Ok(request)
    }

    pub fn filter_request(&mut self, filter: StyleFilter) -> Result<SynthesisRequest> {
        self.synthesis_request(Some(filter.prompt()))
    }

    /// Record a synthesis outcome. Success is logged and pushed; failure
    /// leaves history, mask and viewport untouched.
    pub fn finish_synthesis(&mut self, prompt: &str, result: Result<ImageState>) -> Option<Job> {
        match result {
            Ok(image) => Some(self.accept_synthesis(prompt, image)),
            Err(e) => {
                self.reject_synthesis(&e);
                None
            }
        }
    }

    /// Build, send and apply one synthesis round trip
    pub async fn synthesize(&mut self, synthesizer: &dyn Synthesizer, forced_prompt: Option<&str>) -> Result<()> {
        let request = self.synthesis_request(forced_prompt)?;
        let prompt = request.prompt.clone();
        match synthesizer.synthesize(request).await {
            Ok(image) => {
                let job = self.accept_synthesis(&prompt, image);
                self.drive(Some(job)).await;
                Ok(())
            }
            Err(e) => {
                self.reject_synthesis(&e);
                Err(e)
            }
        }
    }

    fn accept_synthesis(&mut self, prompt: &str, image: ImageState) -> Job {
        self.loading = false;
        self.generations.append(prompt, image.clone());
        self.push(image)
    }

    fn reject_synthesis(&mut self, error: &StudioError) {
        self.loading = false;
        if error.is_remote() {
            log::warn!("Synthesis failed: {}", error);
        } else {
            log::error!("Synthesis request could not be built: {}", error);
        }
        self.last_error = Some(error.to_string());
    }

    // ---- Export and display -----------------------------------------------

    /// Working image as PNG bytes plus a timestamped file name
    pub fn export_png(&self) -> Result<(Vec<u8>, String)> {
        let pixels = self.decoded.as_ref().ok_or(StudioError::NoImage)?;
        let name = format!("studio-{}.png", Utc::now().timestamp_millis());
        Ok((encode_png(pixels)?, name))
    }

    /// Upload whatever changed and draw a frame
    pub fn render(&mut self, renderer: &mut Renderer) {
        if self.image_dirty {
            renderer.set_image(self.decoded.as_ref());
            self.image_dirty = false;
        }
        let (mask_dirty, overlay_dirty) = self.canvas.take_dirty();
        if mask_dirty {
            renderer.upload_mask(self.canvas.mask());
        }
        if overlay_dirty {
            renderer.upload_overlay(self.canvas.overlay());
        }
        renderer.render(self.screen_rect(), self.config.mask_opacity);
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(StudioConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use futures::executor::block_on;
    use futures::future::{self, LocalBoxFuture};
    use futures::FutureExt;

    use super::*;
    use crate::image_state::tests::solid;

    /// App with one 400x300 image measured into a 400x300 base size
    fn loaded_app() -> App {
        let mut app = App::default();
        let job = app.load_image(solid(400, 300, [10, 10, 10, 255]));
        block_on(app.drive(Some(job)));
        app.set_canvas_rect(Some(ScreenRect::new(0.0, 0.0, 200.0, 150.0)));
        app
    }

    fn base_app() -> App {
        let mut app = loaded_app();
        let viewport = app.viewport.as_mut().unwrap();
        *viewport = ViewportState::new([400.0, 300.0]);
        app.canvas.resize((400, 300));
        app
    }

    fn click(app: &mut App, from: [f32; 2], to: [f32; 2]) {
        app.queue_input_event(PointerEvent::mouse(PointerEventType::Down, from));
        app.queue_input_event(PointerEvent::mouse(PointerEventType::Move, to));
        app.queue_input_event(PointerEvent::mouse(PointerEventType::Up, to));
        app.process_input();
    }

    struct Canned(Result<ImageState>);

    impl Synthesizer for Canned {
        fn synthesize(&self, _request: SynthesisRequest) -> LocalBoxFuture<'static, Result<ImageState>> {
            let result = match &self.0 {
                Ok(image) => Ok(image.clone()),
                Err(e) => Err(StudioError::Synthesis(e.to_string())),
            };
            future::ready(result).boxed_local()
        }
    }

    #[test]
    fn load_measures_and_fits() {
        let app = loaded_app();
        let viewport = app.viewport().unwrap();
        // 1280x800 window minus wide chrome leaves 584x600
        assert_eq!(viewport.raster_size(), (584, 438));
        assert_eq!(app.canvas().size(), (584, 438));
        assert_eq!(app.decoded_image().unwrap().dimensions(), (400, 300));
    }

    #[test]
    fn pointer_mapping_goes_through_the_screen_rect() {
        let mut app = base_app();
        // Client (100, 75) in a 200x150 rect over a 400x300 raster
        click(&mut app, [100.0, 75.0], [100.0, 75.0]);
        assert_eq!(app.canvas().mask().pixel(200, 150), Rgba::MARKER);
        assert!(app.mask().is_some());
    }

    #[test]
    fn mask_listener_sees_commits_and_clears() {
        let mut app = base_app();
        let seen: Rc<RefCell<Vec<bool>>> = Rc::default();
        let sink = seen.clone();
        app.set_mask_listener(move |mask| sink.borrow_mut().push(mask.is_some()));

        click(&mut app, [50.0, 50.0], [60.0, 50.0]);
        app.clear_mask();
        assert_eq!(*seen.borrow(), vec![true, false]);
        assert!(app.mask().is_none());
    }

    #[test]
    fn clear_without_a_mask_still_notifies() {
        let mut app = base_app();
        let seen: Rc<RefCell<Vec<bool>>> = Rc::default();
        let sink = seen.clone();
        app.set_mask_listener(move |mask| sink.borrow_mut().push(mask.is_some()));

        app.clear_mask();
        assert_eq!(*seen.borrow(), vec![false]);
    }

    #[test]
    fn extra_fingers_do_not_break_a_rect_drag() {
        use crate::input::TouchTracker;

        let mut app = base_app();
        app.select_tool(Tool::RectSelect);
        let mut touches = TouchTracker::new();
        let steps = [
            (1, PointerEventType::Down, [10.0, 10.0]),
            (1, PointerEventType::Move, [50.0, 50.0]),
            (2, PointerEventType::Down, [150.0, 100.0]),
            (2, PointerEventType::Up, [150.0, 100.0]),
            (1, PointerEventType::Move, [100.0, 100.0]),
            (1, PointerEventType::Up, [100.0, 100.0]),
        ];
        for (id, event_type, location) in steps {
            if touches.accept(id, event_type) {
                app.queue_input_event(PointerEvent::touch(event_type, &[location]));
            }
        }
        app.process_input();

        // Raster is twice the client rect: the drag covers (20, 20)..(200, 200)
        assert_eq!(app.canvas().mask().pixel(60, 60), Rgba::MARKER);
        assert_eq!(app.canvas().mask().pixel(150, 150), Rgba::MARKER);
        assert_ne!(app.canvas().mask().pixel(250, 250), Rgba::MARKER);
        assert!(app.mask().is_some());
    }

    #[test]
    fn rect_drag_interrupted_by_tool_switch_leaves_no_trace() {
        let mut app = base_app();
        app.select_tool(Tool::RectSelect);
        app.queue_input_event(PointerEvent::mouse(PointerEventType::Down, [10.0, 10.0]));
        app.queue_input_event(PointerEvent::mouse(PointerEventType::Move, [80.0, 60.0]));
        app.process_input();
        assert!(!app.canvas().overlay().is_clear());

        app.select_tool(Tool::EllipseSelect);
        app.queue_input_event(PointerEvent::mouse(PointerEventType::Up, [80.0, 60.0]));
        app.process_input();
        assert!(app.canvas().overlay().is_clear());
        assert!(app.canvas().mask().is_clear());
        assert!(app.mask().is_none());
    }

    #[test]
    fn pointer_events_wait_for_measure() {
        let mut app = App::default();
        let _pending = app.load_image(solid(10, 10, [0, 0, 0, 255]));
        click(&mut app, [1.0, 1.0], [2.0, 2.0]);
        assert!(app.mask().is_none());
        assert!(!app.has_pending_input());
    }

    #[test]
    fn history_changes_clear_the_mask() {
        let mut app = base_app();
        let job = app.load_image(solid(20, 20, [1, 1, 1, 255]));
        block_on(app.drive(Some(job)));
        app.set_canvas_rect(Some(ScreenRect::new(0.0, 0.0, 20.0, 20.0)));
        click(&mut app, [5.0, 5.0], [5.0, 5.0]);
        assert!(app.mask().is_some());

        let job = app.undo();
        assert!(job.is_some());
        assert!(app.mask().is_none());
        assert!(app.display_state().can_redo);
        block_on(app.drive(job));
        assert_eq!(app.decoded_image().unwrap().dimensions(), (400, 300));
    }

    #[test]
    fn redo_clears_the_mask() {
        let mut app = base_app();
        let job = app.load_image(solid(20, 20, [1, 1, 1, 255]));
        block_on(app.drive(Some(job)));
        let job = app.undo();
        block_on(app.drive(job));
        app.set_canvas_rect(Some(ScreenRect::new(0.0, 0.0, 20.0, 20.0)));
        click(&mut app, [5.0, 5.0], [5.0, 5.0]);
        assert!(app.mask().is_some());

        let job = app.redo();
        assert!(job.is_some());
        assert!(app.mask().is_none());
        block_on(app.drive(job));
        assert_eq!(app.decoded_image().unwrap().dimensions(), (20, 20));
        assert_eq!(app.history().cursor(), Some(1));
    }

    #[test]
    fn undo_redo_at_the_edges_do_nothing() {
        let mut app = loaded_app();
        assert!(app.undo().is_none());
        assert!(app.redo().is_none());
        assert_eq!(app.history().cursor(), Some(0));
    }

    #[test]
    fn invalid_transforms_never_touch_history() {
        let mut app = loaded_app();
        assert!(app.resize(0, 100).is_none());
        assert!(app.resize(100, 0).is_none());
        assert!(app.resize(-5, 10).is_none());
        assert_eq!(app.history().len(), 1);
    }

    #[test]
    fn rotate_pushes_and_remeasures() {
        let mut app = loaded_app();
        let job = app.rotate(90.0);
        block_on(app.drive(job));
        assert_eq!(app.history().len(), 2);
        assert_eq!(app.decoded_image().unwrap().dimensions(), (300, 400));
        assert!(app.display_state().can_undo);
    }

    #[test]
    fn stale_transform_results_are_dropped() {
        let mut app = loaded_app();
        let job = app.flip(Axis::Horizontal).unwrap();
        // History moves before the transform lands
        let other = app.load_image(solid(8, 8, [5, 5, 5, 255]));
        block_on(app.drive(Some(other)));
        let completion = block_on(job.run());
        assert!(app.complete(completion).is_none());
        assert_eq!(app.history().len(), 2);
    }

    #[test]
    fn crop_apply_maps_selection_to_source_pixels() {
        let mut app = base_app();
        app.select_tool(Tool::Crop);
        // 200x150 on screen over a 400x300 raster over a 400x300 image
        click(&mut app, [10.0, 10.0], [60.0, 35.0]);
        assert!(app.display_state().has_crop_selection);

        let job = app.apply_crop();
        assert!(job.is_some());
        assert!(app.canvas().crop_selection().is_none());
        block_on(app.drive(job));
        assert_eq!(app.decoded_image().unwrap().dimensions(), (100, 50));
        assert_eq!(app.history().len(), 2);
    }

    #[test]
    fn zero_area_crop_is_rejected() {
        let mut app = base_app();
        app.select_tool(Tool::Crop);
        click(&mut app, [10.0, 10.0], [10.0, 40.0]);
        assert!(app.apply_crop().is_none());
        assert_eq!(app.history().len(), 1);
    }

    #[test]
    fn zoom_clamps_and_keeps_raster_size() {
        let mut app = loaded_app();
        let raster = app.viewport().unwrap().raster_size();
        for _ in 0..20 {
            app.zoom_in();
        }
        assert_eq!(app.display_state().zoom_percent, 300);
        assert_eq!(app.viewport().unwrap().raster_size(), raster);
        for _ in 0..20 {
            app.zoom_out();
        }
        assert_eq!(app.display_state().zoom_percent, 50);
        app.reset_zoom();
        assert_eq!(app.zoom_scale(), 1.0);
    }

    #[test]
    fn refit_on_resize_is_opt_in() {
        let mut app = loaded_app();
        app.resize_window([2000.0, 2000.0]);
        assert_eq!(app.viewport().unwrap().raster_size(), (584, 438));

        let mut config = StudioConfig::default();
        config.refit_on_resize = true;
        let mut app = App::new(config);
        let job = app.load_image(solid(400, 300, [0, 0, 0, 255]));
        block_on(app.drive(Some(job)));
        app.resize_window([1096.0, 700.0]);
        // 1096 - 696 = 400 wide, 700 - 200 = 500 tall
        assert_eq!(app.viewport().unwrap().raster_size(), (400, 300));
    }

    #[test]
    fn brush_settings_are_validated() {
        let mut app = App::default();
        assert!(app.set_brush_size(0.0).is_err());
        assert!(app.set_brush_size(12.0).is_ok());
        assert!(app.set_brush_color(Rgba::TRANSPARENT).is_err());
        assert!(app.set_brush_color(Rgba::new(0, 128, 0, 255)).is_ok());
        let state = app.display_state();
        assert_eq!(state.brush_size, 12.0);
        assert_eq!(state.brush_color, "#008000");
    }

    #[test]
    fn empty_prompt_is_rejected_before_any_call() {
        let mut app = loaded_app();
        app.settings_mut().credential = Some(Credential::ApiKey("k".into()));
        assert!(matches!(app.synthesis_request(None), Err(StudioError::EmptyPrompt)));
        assert_eq!(app.last_error(), Some("please enter a prompt"));
        assert!(!app.is_loading());
    }

    #[test]
    fn edit_request_carries_image_and_mask() {
        let mut app = base_app();
        click(&mut app, [20.0, 20.0], [20.0, 20.0]);
        app.settings_mut().credential = Some(Credential::Password("pw".into()));
        app.settings_mut().prompt = "make it night".into();
        let request = app.synthesis_request(None).unwrap();
        assert_eq!(request.mode, Mode::Edit);
        assert_eq!(request.source_image.as_ref(), app.current_image());
        assert!(request.mask_image.is_some());
        assert!(app.is_loading());

        app.set_mode(Mode::Generate);
        let request = app.synthesis_request(None).unwrap();
        assert_eq!(request.mode, Mode::Generate);
        assert!(request.source_image.is_none());
    }

    #[test]
    fn synthesis_success_logs_and_pushes() {
        let mut app = base_app();
        click(&mut app, [20.0, 20.0], [20.0, 20.0]);
        app.settings_mut().credential = Some(Credential::ApiKey("k".into()));
        let result = solid(64, 32, [200, 0, 0, 255]);
        block_on(app.synthesize(&Canned(Ok(result.clone())), Some(StyleFilter::Noir.prompt()))).unwrap();

        assert_eq!(app.current_image(), Some(&result));
        assert_eq!(app.generations().len(), 1);
        assert_eq!(app.generations().iter().next().unwrap().prompt, StyleFilter::Noir.prompt());
        assert!(app.mask().is_none());
        assert!(!app.is_loading());
        assert_eq!(app.decoded_image().unwrap().dimensions(), (64, 32));
    }

    #[test]
    fn synthesis_failure_changes_nothing_but_the_error() {
        let mut app = base_app();
        click(&mut app, [20.0, 20.0], [20.0, 20.0]);
        app.settings_mut().credential = Some(Credential::ApiKey("k".into()));
        app.settings_mut().prompt = "x".into();
        let viewport = *app.viewport().unwrap();
        let mask = app.mask().cloned();

        let failed = Canned(Err(StudioError::Synthesis("quota".into())));
        assert!(block_on(app.synthesize(&failed, None)).is_err());
        assert_eq!(app.history().len(), 1);
        assert_eq!(app.generations().len(), 0);
        assert_eq!(app.mask().cloned(), mask);
        assert_eq!(*app.viewport().unwrap(), viewport);
        assert!(app.last_error().unwrap().contains("quota"));
    }

    #[test]
    fn generations_can_be_restored() {
        let mut app = loaded_app();
        let first = app.current_image().cloned().unwrap();
        let job = app.finish_synthesis("p", Ok(solid(4, 4, [9, 9, 9, 255])));
        block_on(app.drive(job));
        let id = app.generations().iter().next().unwrap().id;
        let job = app.undo();
        block_on(app.drive(job));
        assert_eq!(app.current_image(), Some(&first));

        let job = app.restore_generation(id);
        block_on(app.drive(job));
        assert_eq!(app.history().len(), 2);
        assert_eq!(app.decoded_image().unwrap().dimensions(), (4, 4));
        assert!(app.restore_generation(999).is_none());
    }

    #[test]
    fn export_needs_a_decoded_image() {
        assert!(matches!(App::default().export_png(), Err(StudioError::NoImage)));
        let (bytes, name) = loaded_app().export_png().unwrap();
        assert!(name.starts_with("studio-") && name.ends_with(".png"));
        assert_eq!(image::load_from_memory(&bytes).unwrap().width(), 400);
    }

    #[test]
    fn undecodable_urls_surface_an_error() {
        let mut app = App::default();
        let job = app.load_image(ImageState::new("https://example.com/cat.png"));
        block_on(app.drive(Some(job)));
        assert!(app.viewport().is_none());
        assert!(app.last_error().is_some());
        assert!(app.display_state().image.is_some());
    }

    #[test]
    fn failed_transform_decode_pushes_nothing() {
        let mut app = App::default();
        let job = app.load_image(ImageState::new("https://example.com/cat.png"));
        block_on(app.drive(Some(job)));
        app.set_mode(Mode::Edit);
        assert!(app.last_error().is_none());

        let job = app.flip(Axis::Horizontal);
        assert!(job.is_some());
        block_on(app.drive(job));
        assert_eq!(app.history().len(), 1);
        assert_eq!(app.history().cursor(), Some(0));
        assert!(app.last_error().is_some());
        assert!(!app.display_state().can_redo);
    }
}
