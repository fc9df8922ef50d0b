//! Source image intake and result inspection.
//!
//! Screenshots are never decoded or re-encoded here; the frame service does
//! all pixel work. This module only sniffs formats so obviously wrong files
//! are rejected before a request is made, and checks that whatever the
//! service sends back is actually an image.

use crate::error::{AppError, FrameApplyError, Result};
use chrono::NaiveDate;
use image::ImageFormat;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// Formats accepted as screenshots.
pub const ACCEPTED_FORMATS: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// A screenshot the user wants framed.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceImage {
    file_name: String,
    format: ImageFormat,
    bytes: Arc<[u8]>,
}

impl SourceImage {
    /// Wraps raw bytes, checking that they are PNG, JPEG or WebP.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidImage`] for empty input or any other format.
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let file_name = file_name.into();
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(AppError::image(format!("'{}' is empty", file_name)));
        }

        let format = image::guess_format(&bytes)
            .map_err(|_| AppError::image(format!("'{}' is not a recognised image", file_name)))?;
        if !ACCEPTED_FORMATS.contains(&format) {
            return Err(AppError::image(format!(
                "'{}' is {:?}; only PNG, JPEG and WebP are supported",
                file_name, format
            )));
        }

        Ok(Self {
            file_name,
            format,
            bytes: bytes.into(),
        })
    }

    /// Reads a screenshot from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "screenshot".to_string());
        Self::from_bytes(file_name, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// MIME type sent with the multipart upload.
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("file_name", &self.file_name)
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Reads the pixel dimensions from an encoded image header.
///
/// Used to reject a "successful" service response whose body is not an image.
pub fn decode_dimensions(bytes: &[u8]) -> std::result::Result<(u32, u32), FrameApplyError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FrameApplyError::UnexpectedResponse(e.to_string()))?
        .into_dimensions()
        .map_err(|e| FrameApplyError::UnexpectedResponse(e.to_string()))
}

/// File name offered when saving a framed screenshot,
/// e.g. `iPhone 16-Black-2025-01-31.png`.
pub fn download_file_name(device: &str, variation: &str, date: NaiveDate) -> String {
    format!("{}-{}-{}.png", device, variation, date.format("%Y-%m-%d"))
}
