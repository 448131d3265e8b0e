//! Constructor-injected configuration for [`crate::SamplerService`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 15 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_MAX_DECODE_DIMENSION: u32 = 8192;
pub const DEFAULT_EXTRACT_MAX_DIMENSION: u32 = 160;
pub const DEFAULT_PALETTE_SIZE: usize = 8;
pub const DEFAULT_MAX_SAMPLE_RADIUS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// How long a session stays queryable after creation.
    pub session_ttl_secs: u64,

    /// Period of the background expiry sweep.
    pub sweep_interval_secs: u64,

    /// Uploads larger than this are rejected before decoding.
    pub max_upload_bytes: usize,

    /// Decoder limit on either image dimension.
    pub max_decode_dimension: u32,

    /// Longest side of the reduced copy used for palette extraction.
    pub extract_max_dimension: u32,

    /// Maximum number of swatches returned.
    pub palette_size: usize,

    /// Sampling radius requests are clamped to this.
    pub max_sample_radius: u32,

    /// Keep the decoded RGBA buffer in the session.
    pub cache_pixels: bool,

    /// Keep the encoded upload in the session so pixels can be re-extracted.
    pub retain_source: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_decode_dimension: DEFAULT_MAX_DECODE_DIMENSION,
            extract_max_dimension: DEFAULT_EXTRACT_MAX_DIMENSION,
            palette_size: DEFAULT_PALETTE_SIZE,
            max_sample_radius: DEFAULT_MAX_SAMPLE_RADIUS,
            cache_pixels: true,
            retain_source: false,
        }
    }
}

impl SamplerConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SamplerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.session_ttl_secs == 0, "session_ttl_secs must be positive"),
            (self.sweep_interval_secs == 0, "sweep_interval_secs must be positive"),
            (self.max_upload_bytes == 0, "max_upload_bytes must be positive"),
            (self.max_decode_dimension == 0, "max_decode_dimension must be positive"),
            (self.extract_max_dimension == 0, "extract_max_dimension must be positive"),
            (self.palette_size == 0, "palette_size must be positive"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(Error::Config((*message).to_string())),
            None => Ok(()),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Whether sessions keep their encoded upload. A session without a pixel cache always does.
    pub fn keeps_source(&self) -> bool {
        self.retain_source || !self.cache_pixels
    }
}
