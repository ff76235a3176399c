//! CPU Raster Surfaces
//!
//! A [`Surface`] is a straight-alpha RGBA8 buffer with the handful of 2D
//! canvas primitives the editing tools need: circle stamps, filled and
//! stroked rectangles/ellipses, and full clears. Two compositing modes are
//! supported and they are exact:
//!
//! - [`Composite::SourceOver`]: paint over; never lowers destination alpha
//! - [`Composite::DestinationOut`]: erase; removes destination alpha in
//!   proportion to the source coverage and leaves transparent pixels alone
//!
//! Coordinates are floats in pixel space with pixel centres at `+0.5`, like
//! the browser canvas. Anything outside the surface is clipped.

use image::RgbaImage;

use crate::color::Rgba;
use crate::error::Result;
use crate::image_state::ImageState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    SourceOver,
    DestinationOut,
}

/// Axis-aligned rectangle normalised from two drag corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub fn from_corners(a: [f32; 2], b: [f32; 2]) -> Self {
        Self {
            x: a[0].min(b[0]),
            y: a[1].min(b[1]),
            width: (b[0] - a[0]).abs(),
            height: (b[1] - a[1]).abs(),
        }
    }

    pub fn center(&self) -> [f32; 2] {
        [self.x + self.width / 2.0, self.y + self.height / 2.0]
    }

    fn contains_center(&self, px: u32, py: u32) -> bool {
        let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
        cx >= self.x && cx < self.x + self.width && cy >= self.y && cy < self.y + self.height
    }
}

pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Fully transparent surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        Rgba::from(self.pixels.get_pixel(x, y).0)
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// True when every pixel is fully transparent
    pub fn is_clear(&self) -> bool {
        self.pixels.pixels().all(|p| p.0[3] == 0)
    }

    pub fn clear(&mut self) {
        self.pixels.pixels_mut().for_each(|p| p.0 = [0, 0, 0, 0]);
    }

    /// Fill the whole surface with one colour (replaces, does not blend)
    pub fn fill(&mut self, color: Rgba) {
        let c = color.to_array();
        self.pixels.pixels_mut().for_each(|p| p.0 = c);
    }

    /// Stamp a filled, anti-aliased circle
    pub fn stamp_circle(&mut self, center: [f32; 2], radius: f32, color: Rgba, mode: Composite) {
        if radius <= 0.0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.clip_bounds(
            center[0] - radius - 1.0,
            center[1] - radius - 1.0,
            center[0] + radius + 1.0,
            center[1] + radius + 1.0,
        ) else {
            return;
        };

        for py in y0..y1 {
            let dy = py as f32 + 0.5 - center[1];
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - center[0];
                let dist = (dx * dx + dy * dy).sqrt();
                // One-pixel coverage ramp across the edge
                let coverage = (radius - dist + 0.5).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(px, py, color, coverage, mode);
                }
            }
        }
    }

    pub fn fill_rect(&mut self, rect: RectF, color: Rgba, mode: Composite) {
        let Some((x0, y0, x1, y1)) = self.clip_bounds(rect.x, rect.y, rect.x + rect.width, rect.y + rect.height)
        else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                if rect.contains_center(px, py) {
                    self.blend(px, py, color, 1.0, mode);
                }
            }
        }
    }

    /// Fill the ellipse inscribed in `rect`
    pub fn fill_ellipse(&mut self, rect: RectF, color: Rgba, mode: Composite) {
        let [cx, cy] = rect.center();
        let (rx, ry) = (rect.width / 2.0, rect.height / 2.0);
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.clip_bounds(rect.x, rect.y, rect.x + rect.width, rect.y + rect.height)
        else {
            return;
        };
        for py in y0..y1 {
            let ny = (py as f32 + 0.5 - cy) / ry;
            for px in x0..x1 {
                let nx = (px as f32 + 0.5 - cx) / rx;
                if nx * nx + ny * ny <= 1.0 {
                    self.blend(px, py, color, 1.0, mode);
                }
            }
        }
    }

    /// Outline of `rect`, `line_width` pixels wide, centred on the edge
    pub fn stroke_rect(&mut self, rect: RectF, line_width: f32, color: Rgba) {
        let half = line_width / 2.0;
        let outer = RectF {
            x: rect.x - half,
            y: rect.y - half,
            width: rect.width + line_width,
            height: rect.height + line_width,
        };
        let inner = RectF {
            x: rect.x + half,
            y: rect.y + half,
            width: (rect.width - line_width).max(0.0),
            height: (rect.height - line_width).max(0.0),
        };
        let Some((x0, y0, x1, y1)) =
            self.clip_bounds(outer.x, outer.y, outer.x + outer.width, outer.y + outer.height)
        else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                if outer.contains_center(px, py) && !inner.contains_center(px, py) {
                    self.blend(px, py, color, 1.0, Composite::SourceOver);
                }
            }
        }
    }

    /// Outline of the ellipse inscribed in `rect`
    pub fn stroke_ellipse(&mut self, rect: RectF, line_width: f32, color: Rgba) {
        let [cx, cy] = rect.center();
        let (rx, ry) = (rect.width / 2.0, rect.height / 2.0);
        let half = line_width / 2.0;
        let (orx, ory) = (rx + half, ry + half);
        let (irx, iry) = (rx - half, ry - half);
        let Some((x0, y0, x1, y1)) = self.clip_bounds(cx - orx, cy - ory, cx + orx, cy + ory) else {
            return;
        };
        for py in y0..y1 {
            let dy = py as f32 + 0.5 - cy;
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                let outside_inner = irx <= 0.0 || iry <= 0.0 || (dx / irx).powi(2) + (dy / iry).powi(2) > 1.0;
                let inside_outer = (dx / orx).powi(2) + (dy / ory).powi(2) <= 1.0;
                if inside_outer && outside_inner {
                    self.blend(px, py, color, 1.0, Composite::SourceOver);
                }
            }
        }
    }

    /// Encode as a PNG data URI
    pub fn to_image_state(&self) -> Result<ImageState> {
        ImageState::from_rgba(&self.pixels)
    }

    /// Integer pixel bounds of a float box, clipped to the surface
    fn clip_bounds(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = (self.width() as f32, self.height() as f32);
        let x0 = min_x.floor().max(0.0);
        let y0 = min_y.floor().max(0.0);
        let x1 = max_x.ceil().min(w);
        let y1 = max_y.ceil().min(h);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgba, coverage: f32, mode: Composite) {
        let dst = &mut self.pixels.get_pixel_mut(x, y).0;
        let sa = color.a as f32 / 255.0 * coverage;
        let da = dst[3] as f32 / 255.0;
        match mode {
            Composite::SourceOver => {
                let out_a = sa + da * (1.0 - sa);
                if out_a <= 0.0 {
                    return;
                }
                let src = [color.r, color.g, color.b];
                for i in 0..3 {
                    let s = src[i] as f32;
                    let d = dst[i] as f32;
                    dst[i] = ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8;
                }
                // Rounded result is never below the old alpha
                dst[3] = ((out_a * 255.0).round() as u8).max(dst[3]);
            }
            Composite::DestinationOut => {
                let out_a = da * (1.0 - sa);
                dst[3] = (out_a * 255.0).round() as u8;
                if dst[3] == 0 {
                    *dst = [0, 0, 0, 0];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eraser_removes_marker_at_stamp_centre() {
        let mut surface = Surface::new(64, 64);
        surface.stamp_circle([32.0, 32.0], 10.0, Rgba::MARKER, Composite::SourceOver);
        assert_eq!(surface.pixel(32, 32).a, 255);

        surface.stamp_circle([32.0, 32.0], 10.0, Rgba::MARKER, Composite::DestinationOut);
        assert_eq!(surface.pixel(32, 32).a, 0);
        assert_eq!(surface.pixel(26, 32).a, 0);
        assert_eq!(surface.pixel(32, 38).a, 0);
    }

    #[test]
    fn eraser_on_transparent_pixels_is_a_no_op() {
        let mut surface = Surface::new(16, 16);
        surface.stamp_circle([8.0, 8.0], 4.0, Rgba::MARKER, Composite::DestinationOut);
        assert!(surface.is_clear());
    }

    #[test]
    fn source_over_never_decreases_alpha() {
        let mut surface = Surface::new(32, 32);
        let translucent = Rgba::new(0, 0, 255, 90);
        surface.stamp_circle([16.0, 16.0], 8.0, translucent, Composite::SourceOver);
        let before: Vec<u8> = surface.as_raw().chunks(4).map(|p| p[3]).collect();

        surface.stamp_circle([18.0, 14.0], 8.0, Rgba::new(0, 255, 0, 40), Composite::SourceOver);
        let after: Vec<u8> = surface.as_raw().chunks(4).map(|p| p[3]).collect();
        assert!(before.iter().zip(&after).all(|(b, a)| a >= b));
        assert!(after[16 * 32 + 16] > before[16 * 32 + 16]);
    }

    #[test]
    fn opaque_paint_replaces_colour() {
        let mut surface = Surface::new(8, 8);
        surface.fill(Rgba::new(0, 0, 255, 255));
        surface.fill_rect(RectF::from_corners([0.0, 0.0], [8.0, 8.0]), Rgba::MARKER, Composite::SourceOver);
        assert_eq!(surface.pixel(3, 3), Rgba::MARKER);
    }

    #[test]
    fn stamps_clip_at_edges() {
        let mut surface = Surface::new(10, 10);
        surface.stamp_circle([-2.0, -2.0], 5.0, Rgba::MARKER, Composite::SourceOver);
        assert_eq!(surface.pixel(0, 0).a, 255);
        surface.stamp_circle([500.0, 500.0], 5.0, Rgba::MARKER, Composite::SourceOver);
        assert_eq!(surface.pixel(9, 9).a, 0);
    }

    #[test]
    fn rect_from_any_drag_direction() {
        let rect = RectF::from_corners([30.0, 40.0], [10.0, 5.0]);
        assert_eq!(rect, RectF { x: 10.0, y: 5.0, width: 20.0, height: 35.0 });
    }

    #[test]
    fn ellipse_fill_stays_inside_bounding_box() {
        let mut surface = Surface::new(40, 20);
        surface.fill_ellipse(RectF::from_corners([0.0, 0.0], [40.0, 20.0]), Rgba::MARKER, Composite::SourceOver);
        assert_eq!(surface.pixel(20, 10).a, 255);
        assert_eq!(surface.pixel(0, 0).a, 0);
        assert_eq!(surface.pixel(39, 19).a, 0);
    }

    #[test]
    fn rect_stroke_leaves_interior_empty() {
        let mut surface = Surface::new(40, 40);
        surface.stroke_rect(RectF::from_corners([5.0, 5.0], [35.0, 35.0]), 2.0, Rgba::WHITE);
        assert_eq!(surface.pixel(5, 20).a, 255);
        assert_eq!(surface.pixel(20, 20).a, 0);
    }

    #[test]
    fn ellipse_stroke_leaves_centre_empty() {
        let mut surface = Surface::new(40, 40);
        surface.stroke_ellipse(RectF::from_corners([0.0, 0.0], [40.0, 40.0]), 2.0, Rgba::MARKER);
        assert_eq!(surface.pixel(20, 20).a, 0);
        assert_eq!(surface.pixel(20, 0).a, 255);
    }
}
