//! Transform Operations
//!
//! Image-to-image operations on the working image. Each one decodes its
//! source asynchronously, renders into a fresh buffer and encodes the result
//! as a PNG data URI; the source handle is never touched. Invalid parameters
//! are rejected before any decoding happens and yield `Ok(None)`.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::error::Result;
use crate::image_state::ImageState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Mirror left/right
    Horizontal,
    /// Mirror top/bottom
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Degrees, positive is clockwise
    Rotate(f32),
    Flip(Axis),
    Resize { width: i64, height: i64 },
    /// Source region; may extend past the image edges
    Crop { x: i64, y: i64, width: i64, height: i64 },
}

impl Transform {
    pub fn is_valid(&self) -> bool {
        match *self {
            Transform::Rotate(degrees) => degrees.is_finite(),
            Transform::Flip(_) => true,
            Transform::Resize { width, height } => dimension(width).is_some() && dimension(height).is_some(),
            Transform::Crop { width, height, .. } => dimension(width).is_some() && dimension(height).is_some(),
        }
    }

    /// Render the transform on decoded pixels; `None` when rejected
    pub fn apply_pixels(&self, source: &RgbaImage) -> Option<RgbaImage> {
        match *self {
            Transform::Rotate(degrees) => degrees.is_finite().then(|| rotate(source, degrees)),
            Transform::Flip(axis) => Some(flip(source, axis)),
            Transform::Resize { width, height } => resize(source, width, height),
            Transform::Crop { x, y, width, height } => crop(source, x, y, width, height),
        }
    }

    /// Decode `source`, transform it and encode the result
    pub async fn apply(&self, source: &ImageState) -> Result<Option<ImageState>> {
        if !self.is_valid() {
            log::debug!("Rejected transform {:?}", self);
            return Ok(None);
        }
        let pixels = source.decode().await?;
        let Some(out) = self.apply_pixels(&pixels) else {
            return Ok(None);
        };
        log::info!(
            "Transform {:?}: {}x{} -> {}x{}",
            self,
            pixels.width(),
            pixels.height(),
            out.width(),
            out.height()
        );
        ImageState::from_rgba(&out).map(Some)
    }
}

fn dimension(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v > 0)
}

/// Rotate about the centre. Quarter turns are exact and swap dimensions for
/// 90/270; any other angle renders into the rotated bounding box with
/// transparent corners.
pub fn rotate(source: &RgbaImage, degrees: f32) -> RgbaImage {
    let normalized = degrees.rem_euclid(360.0);
    if normalized == 0.0 {
        return source.clone();
    }
    if normalized == 90.0 {
        return imageops::rotate90(source);
    }
    if normalized == 180.0 {
        return imageops::rotate180(source);
    }
    if normalized == 270.0 {
        return imageops::rotate270(source);
    }
    rotate_arbitrary(source, normalized.to_radians())
}

fn rotate_arbitrary(source: &RgbaImage, radians: f32) -> RgbaImage {
    let (w, h) = (source.width() as f32, source.height() as f32);
    let (sin, cos) = radians.sin_cos();
    let out_w = (w * cos.abs() + h * sin.abs()).round().max(1.0) as u32;
    let out_h = (w * sin.abs() + h * cos.abs()).round().max(1.0) as u32;
    let (ocx, ocy) = (out_w as f32 / 2.0, out_h as f32 / 2.0);
    let (scx, scy) = (w / 2.0, h / 2.0);

    RgbaImage::from_fn(out_w, out_h, |x, y| {
        let dx = x as f32 + 0.5 - ocx;
        let dy = y as f32 + 0.5 - ocy;
        // Inverse of a clockwise rotation in y-down space
        let sx = dx * cos + dy * sin + scx;
        let sy = -dx * sin + dy * cos + scy;
        if sx < 0.0 || sy < 0.0 || sx >= w || sy >= h {
            return Rgba([0, 0, 0, 0]);
        }
        *source.get_pixel(sx as u32, sy as u32)
    })
}

pub fn flip(source: &RgbaImage, axis: Axis) -> RgbaImage {
    match axis {
        Axis::Horizontal => imageops::flip_horizontal(source),
        Axis::Vertical => imageops::flip_vertical(source),
    }
}

/// Resample to exactly `width` x `height`
pub fn resize(source: &RgbaImage, width: i64, height: i64) -> Option<RgbaImage> {
    let (width, height) = (dimension(width)?, dimension(height)?);
    Some(imageops::resize(source, width, height, FilterType::Triangle))
}

/// Copy the `width` x `height` region at `(x, y)`. The region is not clamped
/// to the source; whatever it does not cover stays transparent.
pub fn crop(source: &RgbaImage, x: i64, y: i64, width: i64, height: i64) -> Option<RgbaImage> {
    let (out_w, out_h) = (dimension(width)?, dimension(height)?);
    let (src_w, src_h) = (i64::from(source.width()), i64::from(source.height()));
    let mut out = RgbaImage::new(out_w, out_h);
    // Offsets that overflow are simply outside the source
    let inside = |origin: i64, offset: u32, limit: i64| {
        origin
            .checked_add(i64::from(offset))
            .filter(|v| (0..limit).contains(v))
    };
    for oy in 0..out_h {
        let Some(sy) = inside(y, oy, src_h) else {
            continue;
        };
        for ox in 0..out_w {
            let Some(sx) = inside(x, ox, src_w) else {
                continue;
            };
            out.put_pixel(ox, oy, *source.get_pixel(sx as u32, sy as u32));
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_state::tests::solid;
    use futures::executor::block_on;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 0, 255]))
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        let src = gradient(3, 2);
        let cw = rotate(&src, 90.0);
        assert_eq!(cw.dimensions(), (2, 3));
        // Clockwise: bottom-left moves to top-left
        assert_eq!(cw.get_pixel(0, 0).0, [0, 1, 0, 255]);
        assert_eq!(rotate(&src, -90.0).dimensions(), (2, 3));
        assert_eq!(rotate(&src, 270.0), rotate(&src, -90.0));
        assert_eq!(rotate(&src, 180.0).dimensions(), (3, 2));
        assert_eq!(rotate(&src, 360.0), src);
    }

    #[test]
    fn general_angle_renders_bounding_box() {
        let src = RgbaImage::from_pixel(10, 10, Rgba([9, 9, 9, 255]));
        let out = rotate(&src, 45.0);
        assert_eq!(out.dimensions(), (14, 14));
        assert_eq!(out.get_pixel(7, 7).0, [9, 9, 9, 255]);
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn flips_mirror_pixels() {
        let src = gradient(4, 3);
        let h = flip(&src, Axis::Horizontal);
        assert_eq!(h.dimensions(), (4, 3));
        assert_eq!(h.get_pixel(0, 0).0, [3, 0, 0, 255]);
        let v = flip(&src, Axis::Vertical);
        assert_eq!(v.get_pixel(0, 0).0, [0, 2, 0, 255]);
    }

    #[test]
    fn resize_rejects_non_positive_sizes() {
        let src = gradient(8, 8);
        assert!(resize(&src, 0, 100).is_none());
        assert!(resize(&src, 100, 0).is_none());
        assert!(resize(&src, -5, 10).is_none());
        assert_eq!(resize(&src, 3, 20).unwrap().dimensions(), (3, 20));
    }

    #[test]
    fn crop_is_exact_and_unclamped() {
        let src = RgbaImage::from_pixel(200, 200, Rgba([1, 2, 3, 255]));
        assert!(crop(&src, 0, 0, 0, 50).is_none());
        assert_eq!(crop(&src, 10, 10, 50, 50).unwrap().dimensions(), (50, 50));

        let out = crop(&src, -10, 190, 30, 30).unwrap();
        assert_eq!(out.dimensions(), (30, 30));
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
        assert_eq!(out.get_pixel(15, 5).0, [1, 2, 3, 255]);
        assert_eq!(out.get_pixel(15, 15).0[3], 0);
    }

    #[test]
    fn crop_far_outside_the_source_is_blank() {
        let src = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        for (x, y) in [(i64::MAX, 0), (0, i64::MAX), (i64::MIN, i64::MIN), (i64::MAX - 1, 2)] {
            let out = crop(&src, x, y, 2, 2).unwrap();
            assert_eq!(out.dimensions(), (2, 2));
            assert!(out.pixels().all(|p| p.0[3] == 0));
        }
    }

    #[test]
    fn async_apply_round_trips_through_data_uris() {
        let source = solid(200, 200, [50, 60, 70, 255]);
        let out = block_on(
            Transform::Crop { x: 10, y: 10, width: 50, height: 50 }.apply(&source),
        )
        .unwrap()
        .unwrap();
        let pixels = block_on(out.decode()).unwrap();
        assert_eq!(pixels.dimensions(), (50, 50));
        assert_ne!(out, source);
    }

    #[test]
    fn rejected_transforms_skip_decoding() {
        // Not decodable, yet rejection happens first
        let source = ImageState::new("https://example.com/x.png");
        let rejected = Transform::Resize { width: 0, height: 100 };
        assert!(!rejected.is_valid());
        assert_eq!(block_on(rejected.apply(&source)).unwrap(), None);
        assert!(block_on(Transform::Flip(Axis::Vertical).apply(&source)).is_err());
    }
}
