//! Property-based tests for palette extraction and coordinate resolution.
//!
//! 1. resolve_coordinate: any finite value lands on a pixel, in range values are kept
//! 2. PaletteExtractor: every tier combination yields a non-empty palette holding `dominant`
//! 3. SamplerService: any decodable image gives a usable palette and bounded samples

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use proptest::prelude::*;
use std::io::Cursor;
use std::sync::Arc;

use palette_sampler::extract::{StatisticalStrategy, VibrantStrategy};
use palette_sampler::sampler::resolve_coordinate;
use palette_sampler::{
    CoordinateUnit, CreateOptions, ManualClock, PaletteExtractor, PaletteStrategy, SamplerConfig,
    SamplerService,
};

// =============================================================================
// Strategies
// =============================================================================

fn arb_unit() -> impl Strategy<Value = CoordinateUnit> {
    prop_oneof![Just(CoordinateUnit::Normalized), Just(CoordinateUnit::Absolute)]
}

/// Finite values, heavy on the edges of the usual ranges.
fn arb_finite() -> impl Strategy<Value = f64> {
    prop_oneof![
        -2.0f64..2.0,
        -1.0e9f64..1.0e9,
        Just(0.0),
        Just(1.0),
        Just(-0.0),
        Just(f64::MAX),
        Just(f64::MIN),
    ]
}

/// Small RGBA images, alpha included, so fully transparent inputs come up too.
fn arb_rgba_image() -> impl Strategy<Value = RgbaImage> {
    (1u32..=20, 1u32..=20).prop_flat_map(|(width, height)| {
        proptest::collection::vec(any::<[u8; 4]>(), (width * height) as usize).prop_map(move |pixels| {
            RgbaImage::from_fn(width, height, |x, y| Rgba(pixels[(y * width + x) as usize]))
        })
    })
}

/// Images with few distinct colors, closer to what real artwork looks like.
fn arb_blocky_image() -> impl Strategy<Value = RgbaImage> {
    (
        1u32..=32,
        1u32..=32,
        proptest::collection::vec(any::<[u8; 3]>(), 1..=4),
    )
        .prop_map(|(width, height, palette)| {
            RgbaImage::from_fn(width, height, |x, y| {
                let [r, g, b] = palette[((x / 4 + y / 4) as usize) % palette.len()];
                Rgba([r, g, b, 255])
            })
        })
}

fn encode_png(image: RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image).write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn extractors(palette_size: usize) -> Vec<PaletteExtractor> {
    vec![
        PaletteExtractor::new(palette_size, Some(Box::new(VibrantStrategy::default()))),
        PaletteExtractor::new(palette_size, None),
        PaletteExtractor::with_tiers(
            palette_size,
            vec![Box::new(StatisticalStrategy::with_grid(3, 2)) as Box<dyn PaletteStrategy>],
        ),
        PaletteExtractor::with_tiers(palette_size, Vec::new()),
    ]
}

// =============================================================================
// resolve_coordinate
// =============================================================================

proptest! {
    #[test]
    fn resolved_coordinate_is_always_a_pixel(
        value in arb_finite(),
        unit in arb_unit(),
        extent in 1u32..=16_384,
    ) {
        let resolved = resolve_coordinate(value, unit, extent);
        prop_assert!(resolved < extent);
    }

    #[test]
    fn in_range_absolute_coordinates_floor(
        extent in 1u32..=16_384,
        fraction in 0.0f64..1.0,
    ) {
        let value = fraction * extent as f64;
        let resolved = resolve_coordinate(value, CoordinateUnit::Absolute, extent);
        prop_assert_eq!(resolved, (value.floor() as u32).min(extent - 1));
    }

    #[test]
    fn out_of_range_coordinates_clamp_to_the_nearest_edge(
        extent in 1u32..=16_384,
        overshoot in 0.0f64..1.0e6,
        unit in arb_unit(),
    ) {
        let far = match unit {
            CoordinateUnit::Normalized => 1.0 + overshoot,
            CoordinateUnit::Absolute => extent as f64 + overshoot,
        };
        prop_assert_eq!(resolve_coordinate(far, unit, extent), extent - 1);
        prop_assert_eq!(resolve_coordinate(-overshoot - f64::EPSILON, unit, extent), 0);
    }
}

// =============================================================================
// PaletteExtractor
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn palette_is_never_empty_and_holds_dominant(
        image in arb_rgba_image(),
        palette_size in 1usize..=12,
    ) {
        for extractor in extractors(palette_size) {
            let result = extractor.extract(&image);

            prop_assert!(!result.swatches.is_empty());
            prop_assert!(result.swatches.len() <= palette_size.max(5));
            prop_assert!(result.swatches.contains(&result.dominant));
        }
    }

    #[test]
    fn library_and_statistical_tiers_respect_palette_size(
        image in arb_blocky_image(),
        palette_size in 1usize..=12,
    ) {
        for extractor in extractors(palette_size).into_iter().take(3) {
            let result = extractor.extract(&image);
            prop_assert!(result.swatches.len() <= palette_size);
            prop_assert!(result.swatches.contains(&result.dominant));
        }
    }

    #[test]
    fn extraction_is_deterministic(image in arb_blocky_image()) {
        for extractor in extractors(8) {
            prop_assert_eq!(extractor.extract(&image), extractor.extract(&image));
        }
    }
}

// =============================================================================
// SamplerService
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_decodable_image_gets_a_palette_and_bounded_samples(
        image in arb_blocky_image(),
        x in arb_finite(),
        y in arb_finite(),
        unit in arb_unit(),
        radius in proptest::option::of(0u32..=64),
    ) {
        let service = SamplerService::builder(SamplerConfig::default())
            .clock(Arc::new(ManualClock::new(0)))
            .build()
            .unwrap();
        let (width, height) = image.dimensions();

        let created = service
            .create_session(&encode_png(image), "image/png", CreateOptions::default())
            .unwrap();
        prop_assert!(!created.palette.is_empty());
        prop_assert!(created.palette.contains(&created.dominant));
        prop_assert_eq!((created.width, created.height), (width, height));

        let sample = service.sample_color(&created.token, x, y, unit, radius).unwrap();
        prop_assert!(sample.x < width);
        prop_assert!(sample.y < height);
    }
}
