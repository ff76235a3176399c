//! Viewport and Coordinate Mapping
//!
//! The canvas keeps two sizes apart:
//! - the *base* (fit) size, computed once per image load, which is also the
//!   pixel resolution of the mask and overlay rasters
//! - the *display* size, `base * zoom`, which only affects what is shown
//!
//! Pointer positions arrive in client (screen) space and are mapped into
//! raster space through the on-screen rectangle of the canvas, recomputed for
//! every event because zoom and window size change the rectangle.

use crate::config::StudioConfig;

/// On-screen bounding rectangle of the raster surface (client pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    /// A `width` x `height` rectangle centred in a container
    pub fn centered_in(container: [f32; 2], width: f32, height: f32) -> Self {
        Self {
            left: (container[0] - width) / 2.0,
            top: (container[1] - height) / 2.0,
            width,
            height,
        }
    }
}

/// Map a client-space position into raster pixel space.
///
/// No clamping: positions outside the rectangle map outside the raster and
/// drawing clips them naturally. Returns `None` only for a degenerate
/// (zero-area) rectangle.
pub fn client_to_raster(client: [f32; 2], rect: &ScreenRect, raster_size: (u32, u32)) -> Option<[f32; 2]> {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }
    let scale_x = raster_size.0 as f32 / rect.width;
    let scale_y = raster_size.1 as f32 / rect.height;
    Some([
        (client[0] - rect.left) * scale_x,
        (client[1] - rect.top) * scale_y,
    ])
}

/// Space left for the canvas once chrome is reserved, never below 1px
pub fn available_space(window: [f32; 2], config: &StudioConfig) -> [f32; 2] {
    let chrome = config.chrome_for(window[0]);
    [
        (window[0] - chrome.horizontal).max(1.0),
        (window[1] - chrome.vertical).max(1.0),
    ]
}

/// Largest aspect-preserving size of `intrinsic` that fits `available`.
///
/// May upscale: a small image in a large window fills the space.
pub fn fit_base_size(available: [f32; 2], intrinsic: (u32, u32)) -> [f32; 2] {
    let (w, h) = (intrinsic.0.max(1) as f32, intrinsic.1.max(1) as f32);
    let ratio = (available[0] / w).min(available[1] / h);
    [w * ratio, h * ratio]
}

/// Base size plus zoom for the image currently on the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub base_width: f32,
    pub base_height: f32,
    pub zoom_scale: f32,
}

impl ViewportState {
    pub fn new(base: [f32; 2]) -> Self {
        Self {
            base_width: base[0],
            base_height: base[1],
            zoom_scale: 1.0,
        }
    }

    /// Fit `intrinsic` into the given window, keeping the current zoom
    pub fn fit(window: [f32; 2], intrinsic: (u32, u32), config: &StudioConfig) -> Self {
        Self::new(fit_base_size(available_space(window, config), intrinsic))
    }

    /// Pixel size of the mask/overlay rasters (the base size, truncated the
    /// way a canvas truncates fractional width/height attributes)
    pub fn raster_size(&self) -> (u32, u32) {
        (
            (self.base_width as u32).max(1),
            (self.base_height as u32).max(1),
        )
    }

    /// On-screen size, zoom applied
    pub fn display_size(&self) -> [f32; 2] {
        [self.base_width * self.zoom_scale, self.base_height * self.zoom_scale]
    }

    /// Display rectangle centred in a container of the given size
    pub fn display_rect(&self, container: [f32; 2]) -> ScreenRect {
        let [w, h] = self.display_size();
        ScreenRect::centered_in(container, w, h)
    }

}

/// Session zoom multiplier. It outlives any one image, so it is kept apart
/// from [`ViewportState`] and copied into it whenever either changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    scale: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl Zoom {
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn zoom_in(&mut self, config: &StudioConfig) {
        self.scale = (self.scale + config.zoom_step).min(config.max_zoom);
    }

    pub fn zoom_out(&mut self, config: &StudioConfig) {
        self.scale = (self.scale - config.zoom_step).max(config.min_zoom);
    }

    pub fn reset(&mut self) {
        self.scale = 1.0;
    }

    /// Zoom as a whole percentage, for status display
    pub fn percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_scale_rect_maps_to_double_coordinates() {
        let rect = ScreenRect::new(10.0, 20.0, 200.0, 150.0);
        let p = client_to_raster([110.0, 95.0], &rect, (400, 300)).unwrap();
        assert_eq!(p, [200.0, 150.0]);
    }

    #[test]
    fn positions_outside_the_rect_are_not_clamped() {
        let rect = ScreenRect::new(0.0, 0.0, 100.0, 100.0);
        let p = client_to_raster([-10.0, 150.0], &rect, (200, 200)).unwrap();
        assert_eq!(p, [-20.0, 300.0]);
    }

    #[test]
    fn degenerate_rect_maps_nothing() {
        let rect = ScreenRect::new(0.0, 0.0, 0.0, 10.0);
        assert!(client_to_raster([1.0, 1.0], &rect, (10, 10)).is_none());
    }

    #[test]
    fn zoom_changes_display_but_not_raster() {
        let config = StudioConfig::default();
        let mut zoom = Zoom::default();
        zoom.zoom_in(&config);
        zoom.zoom_in(&config);
        let mut viewport = ViewportState::new([400.0, 300.0]);
        viewport.zoom_scale = zoom.scale();
        assert_eq!(viewport.raster_size(), (400, 300));
        let [w, h] = viewport.display_size();
        assert!((w - 560.0).abs() < 1e-3 && (h - 420.0).abs() < 1e-3);

        // Same client point under zoom still lands on the same raster pixel
        let rect = viewport.display_rect([1000.0, 1000.0]);
        let centre = [rect.left + rect.width / 2.0, rect.top + rect.height / 2.0];
        let p = client_to_raster(centre, &rect, viewport.raster_size()).unwrap();
        assert!((p[0] - 200.0).abs() < 1e-3 && (p[1] - 150.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped() {
        let config = StudioConfig::default();
        let mut zoom = Zoom::default();
        for _ in 0..20 {
            zoom.zoom_in(&config);
        }
        assert_eq!(zoom.percent(), 300);
        for _ in 0..20 {
            zoom.zoom_out(&config);
        }
        assert_eq!(zoom.percent(), 50);
        zoom.reset();
        assert_eq!(zoom.scale(), 1.0);
    }

    #[test]
    fn fit_preserves_aspect_and_may_upscale() {
        let base = fit_base_size([800.0, 800.0], (200, 100));
        assert_eq!(base, [800.0, 400.0]);
        let base = fit_base_size([300.0, 600.0], (600, 400));
        assert_eq!(base, [300.0, 200.0]);
    }

    #[test]
    fn fit_reserves_chrome_by_viewport_width() {
        let config = StudioConfig::default();
        // Wide: 1696 - 696 = 1000 wide, 1200 - 200 = 1000 tall
        let viewport = ViewportState::fit([1696.0, 1200.0], (2000, 1000), &config);
        assert_eq!(viewport.raster_size(), (1000, 500));
        // Narrow: 500 - 40 = 460 wide
        let viewport = ViewportState::fit([500.0, 1000.0], (920, 460), &config);
        assert_eq!(viewport.raster_size(), (460, 230));
    }

    #[test]
    fn tiny_windows_still_produce_a_raster() {
        let config = StudioConfig::default();
        let viewport = ViewportState::fit([10.0, 10.0], (100, 100), &config);
        assert_eq!(viewport.raster_size(), (1, 1));
    }
}
