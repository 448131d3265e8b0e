//! Library tier: median-cut quantization followed by assignment to named targets.

use crate::{
    color::Rgb,
    extract::{
        filter::{DefaultFilter, Filter},
        quantizer::ColorCutQuantizer,
        swatch::Swatch,
        target::{Target, TargetKind},
        PaletteResult, PaletteSource, PaletteStrategy, TierUnavailable,
    },
};
use image::RgbaImage;
use std::collections::HashSet;

pub const DEFAULT_CALCULATE_NUMBER_COLORS: usize = 16;

/// A swatch chosen for one of the named targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NamedSwatch {
    pub kind: TargetKind,
    pub swatch: Swatch,
}

pub struct VibrantStrategy {
    max_colors: usize,
    targets: Vec<Target>,
    filters: Vec<Box<dyn Filter>>,
}

impl Default for VibrantStrategy {
    fn default() -> Self {
        Self {
            max_colors: DEFAULT_CALCULATE_NUMBER_COLORS,
            targets: Target::all().to_vec(),
            filters: vec![Box::new(DefaultFilter)],
        }
    }
}

impl VibrantStrategy {
    pub fn maximum_color_count(self, max_colors: usize) -> Self {
        Self { max_colors, ..self }
    }

    pub fn add_filter<F>(mut self, filter: F) -> Self
    where
        F: Filter + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn clear_filters(self) -> Self {
        Self {
            filters: Vec::new(),
            ..self
        }
    }

    /// Quantize `image` and pick the best swatch for each target. A swatch color is assigned to
    /// at most one target.
    pub fn named_swatches(&self, image: &RgbaImage) -> Vec<NamedSwatch> {
        let swatches = ColorCutQuantizer::new(self.max_colors, &self.filters).quantize(image.as_raw());
        let max_population = swatches.iter().map(|s| s.population()).max().unwrap_or(0);
        let mut used_colors = HashSet::new();

        self.targets
            .iter()
            .filter_map(|target| {
                let swatch = best_swatch_for_target(&swatches, *target, max_population, &used_colors)?;
                used_colors.insert(swatch.color());
                Some(NamedSwatch {
                    kind: target.kind(),
                    swatch,
                })
            })
            .collect()
    }
}

impl PaletteStrategy for VibrantStrategy {
    fn source(&self) -> PaletteSource {
        PaletteSource::Library
    }

    fn extract(&self, image: &RgbaImage, palette_size: usize) -> Result<PaletteResult, TierUnavailable> {
        let mut named = self.named_swatches(image);
        if named.is_empty() {
            return Err(TierUnavailable::new("no swatch matched any target"));
        }

        named.sort_by_key(|named| std::cmp::Reverse(named.swatch.population()));

        let mut seen = HashSet::new();
        let swatches: Vec<Rgb> = named
            .iter()
            .map(|named| named.swatch.color())
            .filter(|color| seen.insert(*color))
            .take(palette_size)
            .collect();

        PaletteResult::from_ranked(swatches, self.source())
    }
}

fn best_swatch_for_target(
    swatches: &[Swatch],
    target: Target,
    max_population: u32,
    used_colors: &HashSet<Rgb>,
) -> Option<Swatch> {
    let mut best: Option<(f32, Swatch)> = None;

    for swatch in swatches.iter().copied() {
        if used_colors.contains(&swatch.color()) {
            continue;
        }

        let (_, saturation, lightness) = swatch.hsl();
        if !target.accepts(saturation, lightness) {
            continue;
        }

        let population_ratio = swatch.population() as f32 / max_population.max(1) as f32;
        let score = target.score(saturation, lightness, population_ratio);

        if best.map_or(true, |(best_score, _)| score > best_score) {
            best = Some((score, swatch));
        }
    }

    best.map(|(_, swatch)| swatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::filter::AllowAll;
    use image::Rgba;

    fn two_tone(primary: Rgba<u8>, primary_rows: u32, secondary: Rgba<u8>, height: u32) -> RgbaImage {
        RgbaImage::from_fn(10, height, |_, y| if y < primary_rows { primary } else { secondary })
    }

    #[test]
    fn solid_red_is_vibrant() {
        let image = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let named = VibrantStrategy::default().named_swatches(&image);

        assert_eq!(named.len(), 1);
        assert_eq!(named[0].kind, TargetKind::Vibrant);
        assert_eq!(named[0].swatch.color(), Rgb::new(255, 0, 0));
        assert_eq!(named[0].swatch.population(), 100);
    }

    #[test]
    fn palette_is_ordered_by_population() {
        let image = two_tone(Rgba([0, 0, 128, 255]), 3, Rgba([255, 0, 0, 255]), 10);
        let result = VibrantStrategy::default().extract(&image, 8).unwrap();

        assert_eq!(result.dominant, Rgb::new(255, 0, 0));
        assert_eq!(result.swatches, vec![Rgb::new(255, 0, 0), Rgb::new(0, 0, 132)]);
        assert_eq!(result.source, PaletteSource::Library);
    }

    #[test]
    fn palette_is_truncated() {
        let image = two_tone(Rgba([0, 0, 128, 255]), 3, Rgba([255, 0, 0, 255]), 10);
        let result = VibrantStrategy::default().extract(&image, 1).unwrap();

        assert_eq!(result.swatches, vec![Rgb::new(255, 0, 0)]);
    }

    #[test]
    fn filtered_out_image_is_unavailable() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        assert!(VibrantStrategy::default().extract(&image, 8).is_err());
    }

    #[test]
    fn custom_filters_replace_default() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([20, 20, 20, 255]));
        let strategy = VibrantStrategy::default().clear_filters().add_filter(AllowAll);
        let result = strategy.extract(&image, 8).unwrap();

        assert_eq!(result.dominant, Rgb::new(16, 16, 16));
    }
}
