//! Error types for the device-frame-core library.
//!
//! Each subsystem has its own error enum so callers can react precisely:
//! catalog loading, selection transitions and frame application fail in
//! different ways and recover differently. [`AppError`] wraps all of them
//! for code that only needs to report.

use thiserror::Error;

/// Failure to build a [`Catalog`](crate::catalog::Catalog) from the remote listing.
///
/// Catalog construction is all-or-nothing: any of these aborts the whole load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogLoadError {
    /// The listing endpoint could not be reached or answered with a non-success status.
    #[error("device list unreachable: {0}")]
    Unreachable(String),

    /// The listing body did not have the expected nested shape.
    #[error("device list is malformed: {0}")]
    Malformed(String),

    /// An entry's screen rectangle does not fit inside its frame.
    #[error("invalid geometry for {category}/{device}/{variation}: {reason}")]
    InvalidGeometry {
        category: String,
        device: String,
        variation: String,
        reason: String,
    },
}

impl CatalogLoadError {
    /// Message shown to end users regardless of the underlying cause.
    pub fn user_message(&self) -> &'static str {
        "Failed to load device list. Please try again."
    }
}

/// A cascade transition targeted a key that is not in the catalog.
///
/// The selection is left untouched when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionInvalidError {
    #[error("no device catalog has been loaded yet")]
    CatalogNotLoaded,

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("unknown device '{device}' in category '{category}'")]
    UnknownDevice { category: String, device: String },

    #[error("unknown variation '{variation}' for device '{device}'")]
    UnknownVariation { device: String, variation: String },
}

/// Failure of a single "apply frame" call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameApplyError {
    /// The frame service could not be reached.
    #[error("could not reach the frame service: {0}")]
    Transport(String),

    /// The frame service answered with a non-success status.
    ///
    /// `detail` is the service-provided message and is displayed verbatim.
    #[error("{detail}")]
    Service { status: u16, detail: String },

    /// The service reported success but the payload is not an image.
    #[error("frame service returned an unreadable image: {0}")]
    UnexpectedResponse(String),
}

/// Errors that can occur within the device-frame-core library.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (invalid values in the environment).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    CatalogLoad(#[from] CatalogLoadError),

    #[error(transparent)]
    SelectionInvalid(#[from] SelectionInvalidError),

    #[error(transparent)]
    FrameApply(#[from] FrameApplyError),

    /// A source image was empty or not one of the accepted formats.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an invalid image error with the given message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
