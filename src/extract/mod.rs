//! Palette extraction.
//!
//! Extraction walks an ordered list of [`PaletteStrategy`] tiers and returns the first palette a
//! tier produces. A tier that reports [`TierUnavailable`] or panics is skipped. When every tier
//! fails, a fixed gray ramp is returned, so [`PaletteExtractor::extract`] cannot fail.

mod filter;
mod quantizer;
mod statistical;
mod swatch;
mod target;
mod vibrant;

pub use filter::{AllowAll, DefaultFilter, Filter};
pub use statistical::StatisticalStrategy;
pub use swatch::Swatch;
pub use target::{Target, TargetKind};
pub use vibrant::{NamedSwatch, VibrantStrategy};

use crate::color::Rgb;
use image::RgbaImage;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

pub const STATIC_DOMINANT: Rgb = Rgb::new(0x80, 0x80, 0x80);
pub const STATIC_RAMP: [Rgb; 5] = [
    STATIC_DOMINANT,
    Rgb::new(0xB0, 0xB0, 0xB0),
    Rgb::new(0x50, 0x50, 0x50),
    Rgb::new(0xE0, 0xE0, 0xE0),
    Rgb::new(0x20, 0x20, 0x20),
];

/// Which tier produced a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteSource {
    Library,
    Statistical,
    Static,
}

/// A dominant color plus distinct swatches, most significant first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaletteResult {
    pub dominant: Rgb,
    pub swatches: Vec<Rgb>,
    #[serde(skip)]
    pub source: PaletteSource,
}

impl PaletteResult {
    pub fn new(dominant: Rgb, swatches: Vec<Rgb>, source: PaletteSource) -> Result<Self, TierUnavailable> {
        if swatches.is_empty() {
            return Err(TierUnavailable::new("no swatches"));
        }

        Ok(Self {
            dominant,
            swatches,
            source,
        })
    }

    /// Build from swatches already ranked by significance; the first becomes dominant.
    pub fn from_ranked(swatches: Vec<Rgb>, source: PaletteSource) -> Result<Self, TierUnavailable> {
        match swatches.first().copied() {
            Some(dominant) => Self::new(dominant, swatches, source),
            None => Err(TierUnavailable::new("no swatches")),
        }
    }

    /// The gray ramp returned when no tier succeeds.
    pub fn fallback() -> Self {
        Self {
            dominant: STATIC_DOMINANT,
            swatches: STATIC_RAMP.to_vec(),
            source: PaletteSource::Static,
        }
    }

    pub fn dominant_hex(&self) -> String {
        self.dominant.hex()
    }

    pub fn swatch_hexes(&self) -> Vec<String> {
        self.swatches.iter().map(|color| color.hex()).collect()
    }
}

/// A tier could not produce a palette for this image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("palette tier unavailable: {reason}")]
pub struct TierUnavailable {
    reason: String,
}

impl TierUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// One palette extraction tier.
pub trait PaletteStrategy: Send + Sync {
    fn source(&self) -> PaletteSource;

    fn extract(&self, image: &RgbaImage, palette_size: usize) -> Result<PaletteResult, TierUnavailable>;
}

pub struct PaletteExtractor {
    tiers: Vec<Box<dyn PaletteStrategy>>,
    palette_size: usize,
}

impl PaletteExtractor {
    /// Tiers in order: `library` when present, then the statistical fallback.
    pub fn new(palette_size: usize, library: Option<Box<dyn PaletteStrategy>>) -> Self {
        let mut tiers = Vec::with_capacity(2);
        tiers.extend(library);
        tiers.push(Box::new(StatisticalStrategy::default()) as Box<dyn PaletteStrategy>);

        Self::with_tiers(palette_size, tiers)
    }

    pub fn with_tiers(palette_size: usize, tiers: Vec<Box<dyn PaletteStrategy>>) -> Self {
        Self {
            tiers,
            palette_size: palette_size.max(1),
        }
    }

    pub fn palette_size(&self) -> usize {
        self.palette_size
    }

    pub fn extract(&self, image: &RgbaImage) -> PaletteResult {
        for tier in &self.tiers {
            let source = tier.source();
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| tier.extract(image, self.palette_size)));

            match attempt {
                Ok(Ok(result)) => {
                    debug!(tier = ?source, swatches = result.swatches.len(), "palette extracted");
                    return result;
                }
                Ok(Err(unavailable)) => {
                    debug!(tier = ?source, %unavailable, "palette tier skipped");
                }
                Err(_) => {
                    warn!(tier = ?source, "palette tier panicked");
                }
            }
        }

        warn!("all palette tiers failed, using static palette");
        PaletteResult::fallback()
    }
}

impl Default for PaletteExtractor {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_PALETTE_SIZE,
            Some(Box::new(VibrantStrategy::default())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct Panicking;

    impl PaletteStrategy for Panicking {
        fn source(&self) -> PaletteSource {
            PaletteSource::Library
        }

        fn extract(&self, _: &RgbaImage, _: usize) -> Result<PaletteResult, TierUnavailable> {
            panic!("decoder blew up")
        }
    }

    struct Unavailable;

    impl PaletteStrategy for Unavailable {
        fn source(&self) -> PaletteSource {
            PaletteSource::Library
        }

        fn extract(&self, _: &RgbaImage, _: usize) -> Result<PaletteResult, TierUnavailable> {
            Err(TierUnavailable::new("not installed"))
        }
    }

    fn red() -> RgbaImage {
        RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]))
    }

    #[test]
    fn library_tier_wins_when_available() {
        let result = PaletteExtractor::default().extract(&red());

        assert_eq!(result.source, PaletteSource::Library);
        assert_eq!(result.dominant_hex(), "#FF0000");
        assert_eq!(result.swatch_hexes(), vec!["#FF0000".to_string()]);
    }

    #[test]
    fn missing_library_falls_back_to_statistics() {
        let result = PaletteExtractor::new(8, None).extract(&red());

        assert_eq!(result.source, PaletteSource::Statistical);
        assert_eq!(result.dominant, Rgb::new(255, 0, 0));
    }

    #[test]
    fn unavailable_library_falls_back_to_statistics() {
        let result = PaletteExtractor::new(8, Some(Box::new(Unavailable))).extract(&red());
        assert_eq!(result.source, PaletteSource::Statistical);
    }

    #[test]
    fn panicking_tier_is_absorbed() {
        let result = PaletteExtractor::new(8, Some(Box::new(Panicking))).extract(&red());
        assert_eq!(result.source, PaletteSource::Statistical);
    }

    #[test]
    fn static_palette_when_every_tier_fails() {
        let extractor = PaletteExtractor::with_tiers(8, vec![Box::new(Panicking), Box::new(Unavailable)]);
        let result = extractor.extract(&red());

        assert_eq!(result, PaletteResult::fallback());
        assert_eq!(result.dominant_hex(), "#808080");
        assert!(result.swatches.contains(&result.dominant));
    }

    #[test]
    fn empty_image_gets_static_palette() {
        let result = PaletteExtractor::default().extract(&RgbaImage::new(0, 0));
        assert_eq!(result.source, PaletteSource::Static);
    }

    #[test]
    fn white_image_degrades_to_statistics() {
        let image = RgbaImage::from_pixel(6, 6, Rgba([255, 255, 255, 255]));
        let result = PaletteExtractor::default().extract(&image);

        assert_eq!(result.source, PaletteSource::Statistical);
        assert_eq!(result.dominant_hex(), "#FFFFFF");
    }

    #[test]
    fn library_color_budget_is_configurable() {
        let image = RgbaImage::from_fn(32, 32, |x, y| Rgba([(x * 8) as u8, (y * 8) as u8, 200, 255]));
        let library = VibrantStrategy::default().maximum_color_count(4);
        let result = PaletteExtractor::new(8, Some(Box::new(library))).extract(&image);

        assert!(!result.swatches.is_empty());
        assert!(result.swatches.len() <= 8);
        assert!(result.swatches.contains(&result.dominant));
    }

    #[test]
    fn result_serializes_as_hex() {
        let encoded = toml::to_string(&PaletteResult::fallback()).unwrap();
        assert!(encoded.contains("dominant = \"#808080\""));
        assert!(!encoded.contains("source"));
    }
}
