//! Encoded Image Handles
//!
//! An [`ImageState`] is an immutable handle to an encoded image, normally a
//! base64 data URI as produced by a file upload, the synthesis service or a
//! canvas export. Cloning is cheap (shared string). Decoding into pixels is
//! asynchronous: callers must not assume the pixels are available right
//! after they obtain a handle.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, RgbaImage};

use crate::error::{Result, StudioError};

/// Mime type assumed when a data URI does not name one
pub const DEFAULT_MIME: &str = "image/jpeg";

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ImageState {
    handle: Arc<str>,
}

/// Borrowed view of a `data:<mime>;base64,<payload>` URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime_type: &'a str,
    pub base64: &'a str,
}

impl<'a> DataUri<'a> {
    pub fn parse(uri: &'a str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| StudioError::InvalidDataUri(preview(uri)))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| StudioError::InvalidDataUri(preview(uri)))?;
        let (mime, encoding) = header.split_once(';').unwrap_or((header, ""));
        if encoding != "base64" {
            return Err(StudioError::InvalidDataUri(preview(uri)));
        }
        Ok(Self {
            mime_type: if mime.is_empty() { DEFAULT_MIME } else { mime },
            base64: payload,
        })
    }
}

impl ImageState {
    /// Wrap any image handle: a data URI, or a URL typed by the user
    pub fn new(handle: impl Into<Arc<str>>) -> Self {
        Self { handle: handle.into() }
    }

    /// Wrap raw encoded bytes (PNG/JPEG/WebP), sniffing the mime type
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes).map_err(StudioError::Decode)?;
        Ok(Self::from_encoded(format.to_mime_type(), bytes))
    }

    pub fn from_encoded(mime_type: &str, bytes: &[u8]) -> Self {
        Self::new(format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)))
    }

    /// Encode pixels as a PNG data URI
    pub fn from_rgba(pixels: &RgbaImage) -> Result<Self> {
        Ok(Self::from_encoded("image/png", &encode_png(pixels)?))
    }

    pub fn as_str(&self) -> &str {
        &self.handle
    }

    pub fn is_data_uri(&self) -> bool {
        self.handle.starts_with("data:")
    }

    pub fn data_uri(&self) -> Result<DataUri<'_>> {
        DataUri::parse(&self.handle)
    }

    /// Encoded bytes of a data URI handle
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.is_data_uri() {
            return Err(StudioError::UnsupportedSource(preview(&self.handle)));
        }
        Ok(STANDARD.decode(self.data_uri()?.base64)?)
    }

    /// Decode into RGBA pixels.
    ///
    /// This is the suspension point of every operation that needs pixels or
    /// intrinsic dimensions. Handles that are not data URIs (remote URLs)
    /// cannot be decoded by the core and resolve to
    /// [`StudioError::UnsupportedSource`].
    pub async fn decode(&self) -> Result<RgbaImage> {
        let bytes = self.to_bytes()?;
        let decoded = image::load_from_memory(&bytes).map_err(StudioError::Decode)?;
        log::debug!("Decoded image {}x{}", decoded.width(), decoded.height());
        Ok(decoded.into_rgba8())
    }
}

impl fmt::Debug for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ImageState").field(&preview(&self.handle)).finish()
    }
}

impl fmt::Display for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.handle)
    }
}

/// Serialises as the bare handle string
impl serde::Serialize for ImageState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.handle)
    }
}

pub fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    pixels
        .write_to(&mut out, ImageFormat::Png)
        .map_err(StudioError::Encode)?;
    Ok(out.into_inner())
}

/// First few characters of a handle, for logs and error messages
fn preview(handle: &str) -> String {
    const MAX: usize = 48;
    match handle.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &handle[..idx]),
        None => handle.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::executor::block_on;
    use image::Rgba;

    /// Solid-colour PNG handle for tests across the crate
    pub(crate) fn solid(width: u32, height: u32, rgba: [u8; 4]) -> ImageState {
        ImageState::from_rgba(&RgbaImage::from_pixel(width, height, Rgba(rgba))).unwrap()
    }

    #[test]
    fn png_round_trip_keeps_pixels() {
        let state = solid(3, 2, [10, 20, 30, 255]);
        assert!(state.as_str().starts_with("data:image/png;base64,"));
        let pixels = block_on(state.decode()).unwrap();
        assert_eq!(pixels.dimensions(), (3, 2));
        assert_eq!(pixels.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn parses_data_uri_parts() {
        let uri = DataUri::parse("data:image/webp;base64,AAAA").unwrap();
        assert_eq!(uri.mime_type, "image/webp");
        assert_eq!(uri.base64, "AAAA");

        let uri = DataUri::parse("data:;base64,AAAA").unwrap();
        assert_eq!(uri.mime_type, DEFAULT_MIME);
    }

    #[test]
    fn rejects_non_base64_and_non_data_handles() {
        assert!(matches!(
            DataUri::parse("data:text/plain,hello"),
            Err(StudioError::InvalidDataUri(_))
        ));
        let remote = ImageState::new("https://example.com/cat.png");
        assert!(!remote.is_data_uri());
        assert!(matches!(
            block_on(remote.decode()),
            Err(StudioError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn malformed_payload_fails_to_decode() {
        let broken = ImageState::new("data:image/png;base64,bm90IGFuIGltYWdl");
        assert!(matches!(block_on(broken.decode()), Err(StudioError::Decode(_))));
    }

    #[test]
    fn sniffs_mime_from_bytes() {
        let png = encode_png(&RgbaImage::new(1, 1)).unwrap();
        let state = ImageState::from_bytes(&png).unwrap();
        assert_eq!(state.data_uri().unwrap().mime_type, "image/png");
    }

    #[test]
    fn debug_output_is_truncated() {
        let state = solid(64, 64, [0, 0, 0, 255]);
        assert!(format!("{:?}", state).len() < 80);
    }
}
