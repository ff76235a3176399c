//! Colour Utilities
//!
//! Raster colours are straight (non-premultiplied) RGBA8, the same layout the
//! browser canvas and PNG use. The display shell works in linear floats, so
//! the sRGB → linear helpers live here too.

use std::fmt;

/// Straight-alpha RGBA8 colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Marks a mask pixel as "selected for AI edit"
    pub const MARKER: Rgba = Rgba::new(255, 0, 0, 255);
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    /// Crop preview dim (black at 50%)
    pub const DIM: Rgba = Rgba::new(0, 0, 0, 128);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(Self::new(out[0], out[1], out[2], 255))
            }
            6 => Some(Self::new(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, 255)),
            8 => Some(Self::new(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                byte(&hex[6..8])?,
            )),
            _ => None,
        }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Linear-space RGBA floats for GPU clear colours
    pub fn to_linear_f64(self) -> [f64; 4] {
        [
            srgb_to_linear(self.r as f32 / 255.0) as f64,
            srgb_to_linear(self.g as f32 / 255.0) as f64,
            srgb_to_linear(self.b as f32 / 255.0) as f64,
            self.a as f64 / 255.0,
        ]
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::MARKER
    }
}

impl From<[u8; 4]> for Rgba {
    fn from(p: [u8; 4]) -> Self {
        Self::new(p[0], p[1], p[2], p[3])
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Convert a single sRGB color component to linear space
///
/// Formula from: https://en.wikipedia.org/wiki/SRGB#From_sRGB_to_CIE_XYZ
#[inline]
pub fn srgb_to_linear(srgb: f32) -> f32 {
    if srgb <= 0.04045 {
        srgb / 12.92
    } else {
        ((srgb + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_to_linear() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 0.001);

        // Middle gray (sRGB 0.5 ≈ linear 0.214)
        let linear = srgb_to_linear(0.5);
        assert!((linear - 0.214).abs() < 0.01);
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Rgba::from_hex("#ff0000"), Some(Rgba::MARKER));
        assert_eq!(Rgba::from_hex("0f0"), Some(Rgba::new(0, 255, 0, 255)));
        assert_eq!(Rgba::from_hex("#11223344"), Some(Rgba::new(0x11, 0x22, 0x33, 0x44)));
        assert_eq!(Rgba::from_hex("#12345"), None);
        assert_eq!(Rgba::from_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_display_round_trips_through_hex() {
        let c = Rgba::new(163, 2, 222, 255);
        assert_eq!(c.to_string(), "#a302de");
        assert_eq!(Rgba::from_hex(&c.to_string()), Some(c));
    }

    #[test]
    fn test_linear_keeps_alpha() {
        let linear = Rgba::new(244, 243, 239, 128).to_linear_f64();
        assert!(linear[0] > 0.9 && linear[0] <= 1.0);
        assert!((linear[3] - 128.0 / 255.0).abs() < 1e-9);
    }
}
