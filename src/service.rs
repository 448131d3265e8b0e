//! The request-facing facade tying normalization, extraction, storage and sampling together.

use crate::color::Rgb;
use crate::config::SamplerConfig;
use crate::error::{Error, Result};
use crate::extract::{PaletteExtractor, PaletteResult, PaletteStrategy, VibrantStrategy};
use crate::lifecycle::SessionLifecycle;
use crate::normalize::{ImageNormalizer, SourceMetadata};
use crate::sampler::{validate_coordinates, ColorSample, CoordinateUnit, PixelSampler};
use crate::store::{token_prefix, Clock, ImageSession, SessionStore, StoreStats, SystemClock};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-upload options.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Original filename, kept for diagnostics only.
    pub filename: Option<String>,
    /// Bound on the longest side of the buffer used for palette extraction.
    pub extract_max_dimension: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedSession {
    pub token: String,
    pub width: u32,
    pub height: u32,
    pub dominant: Rgb,
    pub palette: Vec<Rgb>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CloseOutcome {
    pub closed: bool,
}

pub struct SamplerServiceBuilder {
    config: SamplerConfig,
    clock: Arc<dyn Clock>,
    library: Option<Box<dyn PaletteStrategy>>,
}

impl SamplerServiceBuilder {
    pub fn clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// Replace the library palette tier.
    pub fn library(self, library: Box<dyn PaletteStrategy>) -> Self {
        Self {
            library: Some(library),
            ..self
        }
    }

    /// Run without a library tier; palettes come from the statistical fallback.
    pub fn without_library(self) -> Self {
        Self { library: None, ..self }
    }

    pub fn build(self) -> Result<SamplerService> {
        self.config.validate()?;

        let normalizer = ImageNormalizer::new(&self.config);
        let extractor = PaletteExtractor::new(self.config.palette_size, self.library);
        let sampler = PixelSampler::new(self.config.max_sample_radius, normalizer.clone());
        let store = Arc::new(SessionStore::new(self.config.session_ttl(), self.clock));
        let lifecycle = SessionLifecycle::new(store, self.config.sweep_interval());

        Ok(SamplerService {
            config: self.config,
            normalizer,
            extractor,
            sampler,
            lifecycle,
        })
    }
}

pub struct SamplerService {
    config: SamplerConfig,
    normalizer: ImageNormalizer,
    extractor: PaletteExtractor,
    sampler: PixelSampler,
    lifecycle: SessionLifecycle,
}

impl SamplerService {
    /// A service on the system clock with the built-in library tier.
    pub fn new(config: SamplerConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: SamplerConfig) -> SamplerServiceBuilder {
        SamplerServiceBuilder {
            config,
            clock: Arc::new(SystemClock::new()),
            library: Some(Box::new(VibrantStrategy::default())),
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Decode an upload, extract its palette and cache it behind a new token.
    pub fn create_session(&self, bytes: &[u8], mime: &str, options: CreateOptions) -> Result<CreatedSession> {
        let normalized = self
            .normalizer
            .normalize(bytes, mime, options.extract_max_dimension)?;
        let PaletteResult {
            dominant,
            swatches,
            source,
        } = self.extractor.extract(&normalized.reduced);

        let (width, height) = (normalized.width(), normalized.height());
        let metadata = SourceMetadata {
            filename: options.filename,
            byte_len: bytes.len(),
            mime: mime.to_string(),
            format: normalized.format.to_mime_type().to_string(),
        };
        let pixels = self.config.cache_pixels.then(|| normalized.pixels.into_raw());
        let source_bytes = self.config.keeps_source().then(|| Arc::<[u8]>::from(bytes));

        let session = ImageSession::new(width, height, pixels, source_bytes, metadata)?;
        let token = self.lifecycle.issue(session);

        info!(
            token = token_prefix(&token),
            width,
            height,
            palette_source = ?source,
            swatches = swatches.len(),
            "session created"
        );

        Ok(CreatedSession {
            token,
            width,
            height,
            dominant,
            palette: swatches,
        })
    }

    /// [`Self::create_session`] on the blocking pool, so decoding does not stall the runtime.
    pub async fn create_session_async(
        self: &Arc<Self>,
        bytes: Vec<u8>,
        mime: String,
        options: CreateOptions,
    ) -> Result<CreatedSession> {
        let service = Arc::clone(self);

        tokio::task::spawn_blocking(move || service.create_session(&bytes, &mime, options))
            .await
            .map_err(|err| Error::Internal(err.to_string()))?
    }

    /// Read the color at `(x, y)`, averaged over `radius` when it exceeds one pixel.
    pub fn sample_color(
        &self,
        token: &str,
        x: f64,
        y: f64,
        unit: CoordinateUnit,
        radius: Option<u32>,
    ) -> Result<ColorSample> {
        validate_coordinates(x, y)?;

        let session = self.lifecycle.store().get(token).ok_or(Error::SessionNotFound)?;
        let sample = self.sampler.sample(&session, x, y, unit, radius)?;

        debug!(
            token = token_prefix(token),
            x = sample.x,
            y = sample.y,
            color = %sample.color,
            "sampled color"
        );

        Ok(sample)
    }

    pub fn close_session(&self, token: &str) -> CloseOutcome {
        CloseOutcome {
            closed: self.lifecycle.close(token),
        }
    }

    pub fn stats(&self) -> StoreStats {
        self.lifecycle.stats()
    }

    /// Start periodic expiry sweeps on the ambient tokio runtime. See
    /// [`SessionLifecycle::start_sweeper`].
    pub fn start_sweeper(&self) -> bool {
        self.lifecycle.start_sweeper()
    }

    pub fn stop_sweeper(&self) {
        self.lifecycle.stop_sweeper();
    }
}
