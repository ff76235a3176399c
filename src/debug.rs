//! Status hooks for the web page
//!
//! The host page may define `updateDebugStatus`, `updateDebugTool`,
//! `updateDebugHistory`, `updateDebugPointer` and `incrementFrameCount` to
//! mirror the studio state in its own UI. On desktop these are no-ops.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = updateDebugStatus)]
    fn update_debug_status(status: &str);

    #[wasm_bindgen(js_name = updateDebugTool)]
    fn update_debug_tool(tool: &str, brush_size: f32);

    #[wasm_bindgen(js_name = updateDebugHistory)]
    fn update_debug_history(cursor: Option<u32>, len: u32, zoom_percent: u32);

    #[wasm_bindgen(js_name = updateDebugPointer)]
    fn update_debug_pointer(source: &str, x: Option<f32>, y: Option<f32>);

    #[wasm_bindgen(js_name = incrementFrameCount)]
    fn increment_frame_count_js();
}

/// Update the status line
#[cfg(target_arch = "wasm32")]
pub fn update_status(status: &str) {
    update_debug_status(status);
}

/// Show the active tool and brush size
#[cfg(target_arch = "wasm32")]
pub fn update_tool(tool: &str, brush_size: f32) {
    update_debug_tool(tool, brush_size);
}

/// Show the history position and zoom
#[cfg(target_arch = "wasm32")]
pub fn update_history(cursor: Option<usize>, len: usize, zoom_percent: u32) {
    update_debug_history(cursor.map(|c| c as u32), len as u32, zoom_percent);
}

#[cfg(target_arch = "wasm32")]
pub fn update_pointer(source: &str, position: Option<[f32; 2]>) {
    update_debug_pointer(source, position.map(|p| p[0]), position.map(|p| p[1]));
}

#[cfg(target_arch = "wasm32")]
pub fn increment_frame_count() {
    increment_frame_count_js();
}

// No-op versions for non-WASM platforms
#[cfg(not(target_arch = "wasm32"))]
pub fn update_status(_status: &str) {}

#[cfg(not(target_arch = "wasm32"))]
pub fn update_tool(_tool: &str, _brush_size: f32) {}

#[cfg(not(target_arch = "wasm32"))]
pub fn update_history(_cursor: Option<usize>, _len: usize, _zoom_percent: u32) {}

#[cfg(not(target_arch = "wasm32"))]
pub fn update_pointer(_source: &str, _position: Option<[f32; 2]>) {}

#[cfg(not(target_arch = "wasm32"))]
pub fn increment_frame_count() {}
