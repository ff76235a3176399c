//! Page-facing exports for the browser build
//!
//! Every export turns into a [`Command`] posted to the event loop. Values
//! the page reads back (the encoded mask and the display snapshot) are
//! cached here as the loop publishes them.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use winit::event_loop::EventLoopProxy;

use crate::color::Rgba;
use crate::image_state::ImageState;
use crate::synthesis::{AspectRatio, Credential, GeminiModel, ImageSize, JsSynthesizer, Mode, StyleFilter};
use crate::tool::Tool;
use crate::transform::Axis;
use crate::window::{AppWrapper, Command, UserEvent};

thread_local! {
    static PROXY: RefCell<Option<EventLoopProxy<UserEvent>>> = const { RefCell::new(None) };
    static LAST_MASK: RefCell<Option<String>> = const { RefCell::new(None) };
    static LAST_STATE: RefCell<Option<String>> = const { RefCell::new(None) };
    static MASK_CALLBACK: RefCell<Option<js_sys::Function>> = const { RefCell::new(None) };
    static STATE_CALLBACK: RefCell<Option<js_sys::Function>> = const { RefCell::new(None) };
}

/// Hook the wrapper's listeners up to the caches and remember the proxy
pub(crate) fn install(wrapper: &mut AppWrapper, proxy: EventLoopProxy<UserEvent>) {
    PROXY.with(|p| *p.borrow_mut() = Some(proxy));

    wrapper.app.set_mask_listener(|mask| {
        let uri = mask.map(|m| m.as_str().to_string());
        notify(&MASK_CALLBACK, uri.as_deref());
        LAST_MASK.with(|m| *m.borrow_mut() = uri);
    });

    wrapper.set_state_listener(|state| match serde_json::to_string(state) {
        Ok(json) => {
            notify(&STATE_CALLBACK, Some(&json));
            LAST_STATE.with(|s| *s.borrow_mut() = Some(json));
        }
        Err(e) => log::error!("Could not serialize display state: {}", e),
    });
}

fn notify(callback: &'static std::thread::LocalKey<RefCell<Option<js_sys::Function>>>, value: Option<&str>) {
    callback.with(|cb| {
        if let Some(function) = cb.borrow().as_ref() {
            let arg = value.map(JsValue::from_str).unwrap_or(JsValue::NULL);
            if let Err(e) = function.call1(&JsValue::NULL, &arg) {
                log::warn!("Page callback threw: {:?}", e);
            }
        }
    });
}

fn send(command: Command) {
    PROXY.with(|p| match p.borrow().as_ref() {
        Some(proxy) => {
            if proxy.send_event(UserEvent::Command(command)).is_err() {
                log::warn!("Event loop closed, dropping command");
            }
        }
        None => log::warn!("Studio not started yet, dropping command"),
    });
}

fn parse<T>(value: &str) -> Result<T, JsValue>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn select_tool(name: &str) -> Result<(), JsValue> {
    send(Command::SelectTool(parse::<Tool>(name)?));
    Ok(())
}

#[wasm_bindgen]
pub fn undo() {
    send(Command::Undo);
}

#[wasm_bindgen]
pub fn redo() {
    send(Command::Redo);
}

/// Load an image from a data URI (or any URL the page resolved)
#[wasm_bindgen]
pub fn load_image(uri: String) {
    send(Command::LoadImage(ImageState::new(uri)));
}

#[wasm_bindgen]
pub fn restore_generation(id: u32) {
    send(Command::RestoreGeneration(u64::from(id)));
}

#[wasm_bindgen]
pub fn clear_mask() {
    send(Command::ClearMask);
}

#[wasm_bindgen]
pub fn set_brush_size(size: f32) {
    send(Command::SetBrushSize(size));
}

#[wasm_bindgen]
pub fn set_brush_color(hex: &str) -> Result<(), JsValue> {
    let color = Rgba::from_hex(hex).ok_or_else(|| JsValue::from_str(&format!("invalid colour: {hex}")))?;
    send(Command::SetBrushColor(color));
    Ok(())
}

#[wasm_bindgen]
pub fn zoom_in() {
    send(Command::ZoomIn);
}

#[wasm_bindgen]
pub fn zoom_out() {
    send(Command::ZoomOut);
}

#[wasm_bindgen]
pub fn reset_zoom() {
    send(Command::ResetZoom);
}

#[wasm_bindgen]
pub fn apply_crop() {
    send(Command::ApplyCrop);
}

/// Positive degrees rotate clockwise
#[wasm_bindgen]
pub fn rotate(degrees: f32) {
    send(Command::Rotate(degrees));
}

#[wasm_bindgen]
pub fn flip(horizontal: bool) {
    send(Command::Flip(if horizontal { Axis::Horizontal } else { Axis::Vertical }));
}

#[wasm_bindgen]
pub fn resize_image(width: f64, height: f64) {
    send(Command::Resize {
        width: width as i64,
        height: height as i64,
    });
}

#[wasm_bindgen]
pub fn set_mode(mode: &str) -> Result<(), JsValue> {
    let mode = match mode.trim().to_ascii_lowercase().as_str() {
        "edit" => Mode::Edit,
        "generate" => Mode::Generate,
        other => return Err(JsValue::from_str(&format!("unknown mode: {other}"))),
    };
    send(Command::SetMode(mode));
    Ok(())
}

#[wasm_bindgen]
pub fn set_prompt(prompt: String) {
    send(Command::SetPrompt(prompt));
}

#[wasm_bindgen]
pub fn set_model(id: &str) -> Result<(), JsValue> {
    send(Command::SetModel(parse::<GeminiModel>(id)?));
    Ok(())
}

#[wasm_bindgen]
pub fn set_aspect_ratio(ratio: &str) -> Result<(), JsValue> {
    send(Command::SetAspectRatio(parse::<AspectRatio>(ratio)?));
    Ok(())
}

#[wasm_bindgen]
pub fn set_image_size(size: &str) -> Result<(), JsValue> {
    send(Command::SetImageSize(parse::<ImageSize>(size)?));
    Ok(())
}

#[wasm_bindgen]
pub fn set_api_key(key: Option<String>) {
    send(Command::SetCredential(key.map(Credential::ApiKey)));
}

#[wasm_bindgen]
pub fn set_password(password: Option<String>) {
    send(Command::SetCredential(password.map(Credential::Password)));
}

#[wasm_bindgen]
pub fn set_reference_image(uri: Option<String>) {
    send(Command::SetReferenceImage(uri.map(ImageState::new)));
}

/// Register the page function that performs synthesis requests. It gets
/// the request as a JSON string and must resolve to the response body.
#[wasm_bindgen]
pub fn register_synthesizer(function: js_sys::Function) {
    send(Command::SetSynthesizer(Rc::new(JsSynthesizer::new(function))));
}

#[wasm_bindgen]
pub fn synthesize() {
    send(Command::Synthesize(None));
}

#[wasm_bindgen]
pub fn apply_filter(label: &str) -> Result<(), JsValue> {
    let filter = StyleFilter::ALL
        .into_iter()
        .find(|f| f.label().eq_ignore_ascii_case(label.trim()))
        .ok_or_else(|| JsValue::from_str(&format!("unknown filter: {label}")))?;
    send(Command::Synthesize(Some(filter)));
    Ok(())
}

/// Encoded mask data URI, or `undefined` when there is no mask
#[wasm_bindgen]
pub fn current_mask() -> Option<String> {
    LAST_MASK.with(|m| m.borrow().clone())
}

/// Latest display snapshot as JSON
#[wasm_bindgen]
pub fn display_state() -> Option<String> {
    LAST_STATE.with(|s| s.borrow().clone())
}

#[wasm_bindgen]
pub fn on_mask_change(callback: Option<js_sys::Function>) {
    MASK_CALLBACK.with(|cb| *cb.borrow_mut() = callback);
}

#[wasm_bindgen]
pub fn on_state_change(callback: Option<js_sys::Function>) {
    STATE_CALLBACK.with(|cb| *cb.borrow_mut() = callback);
}
