//! Error types for the palette sampler.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], for callers that map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The uploaded payload was missing, too large, of the wrong type or undecodable.
    Input,
    /// The session token is unknown or its session has expired.
    Session,
    /// A request parameter was malformed.
    Validation,
    /// The service was configured with impossible values.
    Config,
    /// A background task failed.
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no image data provided")]
    EmptyInput,

    #[error("image payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("unsupported mime type: {0}")]
    UnsupportedMime(String),

    #[error("image format not supported: {0}")]
    FormatNotSupported(String),

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("session not found or expired")]
    SessionNotFound,

    #[error("invalid {axis} coordinate: {value}")]
    InvalidCoordinate { axis: char, value: f64 },

    #[error("invalid coordinate unit: {0:?}")]
    InvalidUnit(String),

    #[error("pixel buffer of {len} bytes does not match {width}x{height} rgba geometry")]
    InvalidGeometry { width: u32, height: u32, len: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyInput
            | Error::PayloadTooLarge { .. }
            | Error::UnsupportedMime(_)
            | Error::FormatNotSupported(_)
            | Error::Decode(_)
            | Error::InvalidGeometry { .. } => ErrorKind::Input,
            Error::SessionNotFound => ErrorKind::Session,
            Error::InvalidCoordinate { .. } | Error::InvalidUnit(_) => ErrorKind::Validation,
            Error::Config(_) => ErrorKind::Config,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
