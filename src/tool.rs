//! Tool State Machine
//!
//! Exactly one [`Tool`] is active. Tools change only through explicit
//! selection (never through drawing), and selecting the active tool again
//! toggles back to [`Tool::None`]. Pointer phases are turned into
//! [`ToolAction`]s here; executing them against the rasters is the canvas's
//! job.

use std::fmt;
use std::str::FromStr;

use crate::raster::RectF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    /// No tool picked; pointer input still paints the AI mask
    #[default]
    None,
    AiMaskBrush,
    Crop,
    Eraser,
    RectSelect,
    EllipseSelect,
    Rotate,
    Resize,
    ColorBrush,
}

/// How a tool consumes pointer input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Circle stamps composited source-over
    Freehand,
    /// Circle stamps composited destination-out
    Eraser,
    /// Drag out a rectangle or ellipse
    Shape,
    /// Driven by discrete commands, ignores the pointer
    Command,
}

impl Tool {
    pub const ALL: [Tool; 9] = [
        Tool::None,
        Tool::AiMaskBrush,
        Tool::Crop,
        Tool::Eraser,
        Tool::RectSelect,
        Tool::EllipseSelect,
        Tool::Rotate,
        Tool::Resize,
        Tool::ColorBrush,
    ];

    pub fn kind(self) -> ToolKind {
        match self {
            Tool::None | Tool::AiMaskBrush | Tool::ColorBrush => ToolKind::Freehand,
            Tool::Eraser => ToolKind::Eraser,
            Tool::Crop | Tool::RectSelect | Tool::EllipseSelect => ToolKind::Shape,
            Tool::Rotate | Tool::Resize => ToolKind::Command,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tool::None => "NONE",
            Tool::AiMaskBrush => "AI_EDIT",
            Tool::Crop => "CROP",
            Tool::Eraser => "ERASER",
            Tool::RectSelect => "RECT_SELECT",
            Tool::EllipseSelect => "ELLIPSE_SELECT",
            Tool::Rotate => "ROTATE",
            Tool::Resize => "RESIZE",
            Tool::ColorBrush => "COLOR_BRUSH",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Tool::ALL
            .into_iter()
            .find(|t| t.name() == wanted || (wanted == "AI_MASK_BRUSH" && *t == Tool::AiMaskBrush))
            .ok_or_else(|| format!("unknown tool: {s}"))
    }
}

/// In-progress shape drag, in raster pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeSelection {
    pub start_x: f32,
    pub start_y: f32,
    pub end_x: f32,
    pub end_y: f32,
}

impl ShapeSelection {
    pub fn at(position: [f32; 2]) -> Self {
        Self {
            start_x: position[0],
            start_y: position[1],
            end_x: position[0],
            end_y: position[1],
        }
    }

    pub fn rect(&self) -> RectF {
        RectF::from_corners([self.start_x, self.start_y], [self.end_x, self.end_y])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Stroking,
    Dragging,
}

/// What the canvas should do in response to a pointer phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToolAction {
    Ignore,
    BeginStroke([f32; 2]),
    ContinueStroke([f32; 2]),
    EndStroke,
    /// Redraw the live preview for the drag so far
    Preview(ShapeSelection),
    /// Fill the final shape onto the mask
    CommitShape(ShapeSelection),
    /// Crop drag released; the rectangle waits for Apply
    FinalizeCrop(ShapeSelection),
}

#[derive(Debug)]
pub struct ToolSession {
    active: Tool,
    phase: GesturePhase,
    selection: Option<ShapeSelection>,
}

impl Default for ToolSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolSession {
    pub fn new() -> Self {
        Self {
            active: Tool::None,
            phase: GesturePhase::Idle,
            selection: None,
        }
    }

    pub fn active(&self) -> Tool {
        self.active
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// Current selection: mid-drag for any shape tool, or the finalised crop
    /// rectangle awaiting Apply
    pub fn selection(&self) -> Option<ShapeSelection> {
        self.selection
    }

    /// Finalised crop rectangle, if the crop tool has one
    pub fn crop_selection(&self) -> Option<ShapeSelection> {
        match (self.active, self.phase) {
            (Tool::Crop, GesturePhase::Idle) => self.selection,
            _ => None,
        }
    }

    /// Select `tool`, toggling back to `None` when it is already active.
    /// Any gesture and selection in progress is discarded. Returns the tool
    /// that is active afterwards.
    pub fn select(&mut self, tool: Tool) -> Tool {
        let next = if tool == self.active { Tool::None } else { tool };
        log::info!("Tool {} -> {}", self.active, next);
        self.active = next;
        self.cancel();
        next
    }

    /// Drop the in-progress gesture and selection
    pub fn cancel(&mut self) {
        self.phase = GesturePhase::Idle;
        self.selection = None;
    }

    pub fn pointer_down(&mut self, position: [f32; 2]) -> ToolAction {
        match self.active.kind() {
            ToolKind::Freehand | ToolKind::Eraser => {
                self.phase = GesturePhase::Stroking;
                ToolAction::BeginStroke(position)
            }
            ToolKind::Shape => {
                let selection = ShapeSelection::at(position);
                self.phase = GesturePhase::Dragging;
                self.selection = Some(selection);
                ToolAction::Preview(selection)
            }
            ToolKind::Command => ToolAction::Ignore,
        }
    }

    pub fn pointer_move(&mut self, position: [f32; 2]) -> ToolAction {
        match self.phase {
            GesturePhase::Idle => ToolAction::Ignore,
            GesturePhase::Stroking => ToolAction::ContinueStroke(position),
            GesturePhase::Dragging => match self.selection.as_mut() {
                Some(selection) => {
                    selection.end_x = position[0];
                    selection.end_y = position[1];
                    ToolAction::Preview(*selection)
                }
                None => ToolAction::Ignore,
            },
        }
    }

    pub fn pointer_up(&mut self) -> ToolAction {
        let phase = std::mem::replace(&mut self.phase, GesturePhase::Idle);
        match phase {
            GesturePhase::Idle => ToolAction::Ignore,
            GesturePhase::Stroking => ToolAction::EndStroke,
            GesturePhase::Dragging => {
                let Some(selection) = self.selection else {
                    return ToolAction::Ignore;
                };
                // The crop rectangle outlives the drag until Apply
                if self.active == Tool::Crop {
                    return ToolAction::FinalizeCrop(selection);
                }
                self.selection = None;
                ToolAction::CommitShape(selection)
            }
        }
    }
}
