//! Brush Parameters and State
//!
//! Freehand tools paint one filled circle per pointer sample. There is no
//! interpolation between samples: a fast stroke shows as a chain of
//! overlapping circles, which is the accepted look.

use crate::color::Rgba;
use crate::raster::Composite;

/// Parameters that define brush behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushParams {
    /// Stamp radius in raster pixels
    pub size: f32,
    /// Paint colour for the colour brush (mask brushes always use the marker)
    pub color: Rgba,
}

impl BrushParams {
    pub fn new(size: f32, color: Rgba) -> Self {
        Self { size, color }
    }

    /// Validate that parameters are in acceptable ranges
    pub fn validate(&self) -> Result<(), String> {
        if !(self.size > 0.0) {
            return Err("Brush size must be positive".to_string());
        }
        if self.color.a == 0 {
            return Err("Brush colour must not be fully transparent".to_string());
        }
        Ok(())
    }
}

impl Default for BrushParams {
    fn default() -> Self {
        Self {
            size: 30.0,
            color: Rgba::MARKER,
        }
    }
}

/// A single circle stamp to be composited onto the mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushDab {
    /// Centre in raster space (pixels)
    pub position: [f32; 2],
    pub radius: f32,
    pub color: Rgba,
    pub composite: Composite,
}

/// Tracks the stroke in progress
#[derive(Debug, Default)]
pub struct BrushState {
    pub params: BrushParams,
    stroking: bool,
    dabs_in_stroke: usize,
}

impl BrushState {
    pub fn with_params(params: BrushParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Start a stroke and return its first dab
    pub fn begin_stroke(&mut self, position: [f32; 2], color: Rgba, composite: Composite) -> BrushDab {
        self.stroking = true;
        self.dabs_in_stroke = 0;
        self.dab(position, color, composite)
    }

    /// Dab for a move sample; `None` when no stroke is active
    pub fn continue_stroke(&mut self, position: [f32; 2], color: Rgba, composite: Composite) -> Option<BrushDab> {
        if !self.stroking {
            return None;
        }
        Some(self.dab(position, color, composite))
    }

    /// Finish the stroke, returning how many dabs it laid down
    pub fn end_stroke(&mut self) -> usize {
        let count = self.dabs_in_stroke;
        self.reset_stroke();
        count
    }

    /// Reset stroke state (tool change, clear)
    pub fn reset_stroke(&mut self) {
        self.stroking = false;
        self.dabs_in_stroke = 0;
    }

    pub fn is_stroking(&self) -> bool {
        self.stroking
    }

    fn dab(&mut self, position: [f32; 2], color: Rgba, composite: Composite) -> BrushDab {
        self.dabs_in_stroke += 1;
        BrushDab {
            position,
            radius: self.params.size,
            color,
            composite,
        }
    }
}
