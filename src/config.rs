//! Studio Configuration
//!
//! Tunables for viewport fitting, zoom and brush defaults. Everything has a
//! sensible default; call [`StudioConfig::validate`] after overriding fields.

use crate::color::Rgba;
use crate::error::{Result, StudioError};
use crate::synthesis::{AspectRatio, GeminiModel, ImageSize};

/// Space reserved around the canvas for surrounding chrome, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromeReservation {
    /// Sidebars plus horizontal padding
    pub horizontal: f32,
    /// Header, footer and vertical padding
    pub vertical: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    /// Reservation on wide viewports (both sidebars docked)
    pub wide_chrome: ChromeReservation,
    /// Reservation on narrow viewports (sidebars overlay the canvas)
    pub narrow_chrome: ChromeReservation,
    /// Viewports narrower than this use `narrow_chrome`
    pub narrow_breakpoint: f32,
    pub zoom_step: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Recompute the fit size when the window is resized
    pub refit_on_resize: bool,
    /// Stamp radius for freehand tools
    pub default_brush_size: f32,
    pub default_brush_color: Rgba,
    /// Opacity of the mask layer when shown over the image
    pub mask_opacity: f32,
    pub default_model: GeminiModel,
    pub default_aspect_ratio: AspectRatio,
    pub default_image_size: ImageSize,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            wide_chrome: ChromeReservation {
                horizontal: 320.0 + 256.0 + 120.0,
                vertical: 200.0,
            },
            narrow_chrome: ChromeReservation {
                horizontal: 40.0,
                vertical: 180.0,
            },
            narrow_breakpoint: 1024.0,
            zoom_step: 0.2,
            min_zoom: 0.5,
            max_zoom: 3.0,
            refit_on_resize: false,
            default_brush_size: 30.0,
            default_brush_color: Rgba::MARKER,
            mask_opacity: 0.6,
            default_model: GeminiModel::Flash25,
            default_aspect_ratio: AspectRatio::Square,
            default_image_size: ImageSize::OneK,
        }
    }
}

impl StudioConfig {
    /// Chrome reservation for a viewport of the given width
    pub fn chrome_for(&self, viewport_width: f32) -> ChromeReservation {
        if viewport_width < self.narrow_breakpoint {
            self.narrow_chrome
        } else {
            self.wide_chrome
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(StudioError::Config(msg.to_string()));
        for chrome in [self.wide_chrome, self.narrow_chrome] {
            if chrome.horizontal < 0.0 || chrome.vertical < 0.0 {
                return bad("chrome reservation must be non-negative");
            }
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= 1.0 && self.max_zoom >= 1.0) {
            return bad("zoom range must contain 1.0 and stay positive");
        }
        if self.zoom_step <= 0.0 {
            return bad("zoom step must be positive");
        }
        if self.default_brush_size <= 0.0 {
            return bad("brush size must be positive");
        }
        if !(0.0..=1.0).contains(&self.mask_opacity) {
            return bad("mask opacity must be between 0.0 and 1.0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StudioConfig::default().validate().is_ok());
    }

    #[test]
    fn narrow_viewports_reserve_less_chrome() {
        let config = StudioConfig::default();
        assert_eq!(config.chrome_for(800.0).horizontal, 40.0);
        assert_eq!(config.chrome_for(1440.0).horizontal, 696.0);
        assert_eq!(config.chrome_for(1024.0).vertical, 200.0);
    }

    #[test]
    fn rejects_inverted_zoom_range() {
        let config = StudioConfig {
            min_zoom: 2.0,
            ..StudioConfig::default()
        };
        assert!(matches!(config.validate(), Err(StudioError::Config(_))));
    }
}
