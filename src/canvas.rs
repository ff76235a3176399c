//! Drawing Canvas
//!
//! Owns the two rasters that sit on top of the working image:
//!
//! - the **mask**, which accumulates committed strokes and shapes and is
//!   encoded to a PNG data URI on every commit
//! - the **overlay**, which only ever holds the live preview of a shape drag
//!   and is never reported
//!
//! Both are sized to the base (fit) size. Pointer positions handed to the
//! canvas are already in raster space.

use crate::brush::{BrushDab, BrushParams, BrushState};
use crate::color::Rgba;
use crate::error::Result;
use crate::image_state::ImageState;
use crate::raster::{Composite, RectF, Surface};
use crate::tool::{GesturePhase, ShapeSelection, Tool, ToolAction, ToolKind, ToolSession};

const PREVIEW_LINE_WIDTH: f32 = 2.0;

/// Report produced for the mask listener
#[derive(Debug, Clone, PartialEq)]
pub enum MaskUpdate {
    Changed(ImageState),
    Cleared,
}

impl MaskUpdate {
    pub fn into_state(self) -> Option<ImageState> {
        match self {
            MaskUpdate::Changed(state) => Some(state),
            MaskUpdate::Cleared => None,
        }
    }
}

pub struct DrawingCanvas {
    tools: ToolSession,
    brush: BrushState,
    mask: Surface,
    overlay: Surface,
    mask_dirty: bool,
    overlay_dirty: bool,
}

impl DrawingCanvas {
    pub fn new(size: (u32, u32), params: BrushParams) -> Self {
        Self {
            tools: ToolSession::new(),
            brush: BrushState::with_params(params),
            mask: Surface::new(size.0, size.1),
            overlay: Surface::new(size.0, size.1),
            mask_dirty: true,
            overlay_dirty: true,
        }
    }

    /// Reallocate both rasters for a new base size. Everything drawn so far
    /// and any gesture in progress is dropped; the active tool is kept.
    pub fn resize(&mut self, size: (u32, u32)) {
        log::debug!("Canvas rasters resized to {}x{}", size.0, size.1);
        self.mask = Surface::new(size.0, size.1);
        self.overlay = Surface::new(size.0, size.1);
        self.tools.cancel();
        self.brush.reset_stroke();
        self.mask_dirty = true;
        self.overlay_dirty = true;
    }

    pub fn size(&self) -> (u32, u32) {
        self.mask.size()
    }

    pub fn active_tool(&self) -> Tool {
        self.tools.active()
    }

    /// Switch tools (toggling off when `tool` is already active). The overlay
    /// and any selection are discarded; the committed mask is kept.
    pub fn select_tool(&mut self, tool: Tool) -> Tool {
        self.brush.reset_stroke();
        self.clear_overlay();
        self.tools.select(tool)
    }

    pub fn brush_params(&self) -> BrushParams {
        self.brush.params
    }

    pub fn set_brush_params(&mut self, params: BrushParams) {
        self.brush.params = params;
    }

    pub fn selection(&self) -> Option<ShapeSelection> {
        self.tools.selection()
    }

    /// Normalised crop rectangle in raster space, once a crop drag finished
    pub fn crop_selection(&self) -> Option<RectF> {
        self.tools.crop_selection().map(|s| s.rect())
    }

    pub fn is_gesture_active(&self) -> bool {
        self.brush.is_stroking() || self.tools.phase() != GesturePhase::Idle
    }

    pub fn pointer_down(&mut self, position: [f32; 2]) -> Result<Option<MaskUpdate>> {
        let action = self.tools.pointer_down(position);
        self.apply(action)
    }

    pub fn pointer_move(&mut self, position: [f32; 2]) -> Result<Option<MaskUpdate>> {
        let action = self.tools.pointer_move(position);
        self.apply(action)
    }

    /// Pointer released or left the canvas
    pub fn pointer_up(&mut self) -> Result<Option<MaskUpdate>> {
        let action = self.tools.pointer_up();
        self.apply(action)
    }

    /// Wipe mask, overlay and selection
    pub fn clear(&mut self) -> MaskUpdate {
        self.tools.cancel();
        self.brush.reset_stroke();
        self.mask.clear();
        self.mask_dirty = true;
        self.clear_overlay();
        MaskUpdate::Cleared
    }

    pub fn mask(&self) -> &Surface {
        &self.mask
    }

    pub fn overlay(&self) -> &Surface {
        &self.overlay
    }

    /// Current mask encoded, `None` while nothing is painted
    pub fn encoded_mask(&self) -> Result<Option<ImageState>> {
        if self.mask.is_clear() {
            return Ok(None);
        }
        self.mask.to_image_state().map(Some)
    }

    /// Which rasters changed since the last call, as `(mask, overlay)`
    pub fn take_dirty(&mut self) -> (bool, bool) {
        let dirty = (self.mask_dirty, self.overlay_dirty);
        self.mask_dirty = false;
        self.overlay_dirty = false;
        dirty
    }

    fn apply(&mut self, action: ToolAction) -> Result<Option<MaskUpdate>> {
        match action {
            ToolAction::Ignore => Ok(None),
            ToolAction::BeginStroke(position) => {
                let (color, composite) = self.stroke_paint();
                let dab = self.brush.begin_stroke(position, color, composite);
                self.stamp(dab);
                Ok(None)
            }
            ToolAction::ContinueStroke(position) => {
                let (color, composite) = self.stroke_paint();
                if let Some(dab) = self.brush.continue_stroke(position, color, composite) {
                    self.stamp(dab);
                }
                Ok(None)
            }
            ToolAction::EndStroke => {
                let dabs = self.brush.end_stroke();
                log::debug!("Stroke committed ({} dabs)", dabs);
                self.report()
            }
            ToolAction::Preview(selection) => {
                self.draw_preview(selection);
                Ok(None)
            }
            ToolAction::CommitShape(selection) => {
                let rect = selection.rect();
                match self.tools.active() {
                    Tool::EllipseSelect => self.mask.fill_ellipse(rect, Rgba::MARKER, Composite::SourceOver),
                    _ => self.mask.fill_rect(rect, Rgba::MARKER, Composite::SourceOver),
                }
                self.mask_dirty = true;
                self.clear_overlay();
                log::debug!("Shape committed: {:?}", rect);
                self.report()
            }
            ToolAction::FinalizeCrop(selection) => {
                log::debug!("Crop selection finalised: {:?}", selection.rect());
                Ok(None)
            }
        }
    }

    fn stroke_paint(&self) -> (Rgba, Composite) {
        match (self.tools.active(), self.tools.active().kind()) {
            (_, ToolKind::Eraser) => (Rgba::MARKER, Composite::DestinationOut),
            (Tool::ColorBrush, _) => (self.brush.params.color, Composite::SourceOver),
            _ => (Rgba::MARKER, Composite::SourceOver),
        }
    }

    fn stamp(&mut self, dab: BrushDab) {
        self.mask.stamp_circle(dab.position, dab.radius, dab.color, dab.composite);
        self.mask_dirty = true;
    }

    fn draw_preview(&mut self, selection: ShapeSelection) {
        let rect = selection.rect();
        self.overlay.clear();
        match self.tools.active() {
            Tool::Crop => {
                self.overlay.fill(Rgba::DIM);
                self.overlay.fill_rect(rect, Rgba::WHITE, Composite::DestinationOut);
                self.overlay.stroke_rect(rect, PREVIEW_LINE_WIDTH, Rgba::WHITE);
            }
            Tool::EllipseSelect => self.overlay.stroke_ellipse(rect, PREVIEW_LINE_WIDTH, Rgba::MARKER),
            _ => self.overlay.stroke_rect(rect, PREVIEW_LINE_WIDTH, Rgba::MARKER),
        }
        self.overlay_dirty = true;
    }

    fn clear_overlay(&mut self) {
        self.overlay.clear();
        self.overlay_dirty = true;
    }

    fn report(&self) -> Result<Option<MaskUpdate>> {
        Ok(Some(MaskUpdate::Changed(self.mask.to_image_state()?)))
    }
}
