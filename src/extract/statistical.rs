//! Fallback tier: channel means plus a coarse grid walk over a thumbnail.

use crate::{
    color::{ChannelSums, Rgb},
    extract::{PaletteResult, PaletteSource, PaletteStrategy, TierUnavailable},
};
use image::RgbaImage;

/// Grid cells walked over the thumbnail, in row-major scan order.
pub const GRID_COLUMNS: u32 = 4;
pub const GRID_ROWS: u32 = 2;

/// Longest side of the thumbnail the grid is laid over.
pub const THUMBNAIL_DIMENSION: u32 = 32;

#[derive(Debug, Clone, Copy)]
pub struct StatisticalStrategy {
    columns: u32,
    rows: u32,
}

impl Default for StatisticalStrategy {
    fn default() -> Self {
        Self {
            columns: GRID_COLUMNS,
            rows: GRID_ROWS,
        }
    }
}

impl StatisticalStrategy {
    pub fn with_grid(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }

    /// Colors at the grid cell centers, deduplicated in first-seen order.
    fn grid_colors(&self, thumbnail: &RgbaImage) -> Vec<Rgb> {
        let (width, height) = thumbnail.dimensions();
        let mut colors = Vec::with_capacity((self.columns * self.rows) as usize);

        for row in 0..self.rows {
            let y = cell_center(row, self.rows, height);
            for column in 0..self.columns {
                let x = cell_center(column, self.columns, width);
                let color = Rgb::from_rgba(thumbnail.get_pixel(x, y).0);

                if !colors.contains(&color) {
                    colors.push(color);
                }
            }
        }

        colors
    }
}

impl PaletteStrategy for StatisticalStrategy {
    fn source(&self) -> PaletteSource {
        PaletteSource::Statistical
    }

    fn extract(&self, image: &RgbaImage, palette_size: usize) -> Result<PaletteResult, TierUnavailable> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(TierUnavailable::new("image has no pixels"));
        }

        let mut sums = ChannelSums::default();
        for pixel in image.as_raw().chunks_exact(4) {
            sums.add(pixel);
        }
        let dominant = sums
            .mean()
            .ok_or_else(|| TierUnavailable::new("image has no pixels"))?;

        let longest = width.max(height);
        let thumbnail = if longest > THUMBNAIL_DIMENSION {
            let scale = THUMBNAIL_DIMENSION as f64 / longest as f64;
            image::imageops::thumbnail(
                image,
                ((width as f64 * scale).round() as u32).max(1),
                ((height as f64 * scale).round() as u32).max(1),
            )
        } else {
            image.clone()
        };

        let mut swatches = self.grid_colors(&thumbnail);
        if !swatches.contains(&dominant) {
            swatches.insert(0, dominant);
        }
        swatches.truncate(palette_size);

        PaletteResult::new(dominant, swatches, self.source())
    }
}

fn cell_center(index: u32, cells: u32, extent: u32) -> u32 {
    let center = ((2 * index + 1) as u64 * extent as u64) / (2 * cells) as u64;
    (center as u32).min(extent - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn quadrants() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| match (x < 4, y < 4) {
            (true, true) => Rgba([255, 0, 0, 255]),
            (false, true) => Rgba([0, 255, 0, 255]),
            (true, false) => Rgba([0, 0, 255, 255]),
            (false, false) => Rgba([255, 255, 255, 255]),
        })
    }

    #[test]
    fn dominant_is_channel_mean() {
        let result = StatisticalStrategy::default().extract(&quadrants(), 8).unwrap();

        assert_eq!(result.dominant, Rgb::new(128, 128, 128));
        assert_eq!(result.source, PaletteSource::Statistical);
    }

    #[test]
    fn grid_colors_follow_scan_order() {
        let result = StatisticalStrategy::default().extract(&quadrants(), 8).unwrap();

        assert_eq!(
            result.swatches,
            vec![
                Rgb::new(128, 128, 128),
                Rgb::new(255, 0, 0),
                Rgb::new(0, 255, 0),
                Rgb::new(0, 0, 255),
                Rgb::new(255, 255, 255),
            ]
        );
    }

    #[test]
    fn ordering_is_deterministic() {
        let image = RgbaImage::from_fn(50, 30, |x, y| Rgba([(x * 5) as u8, (y * 8) as u8, ((x + y) * 2) as u8, 255]));
        let strategy = StatisticalStrategy::default();

        let first = strategy.extract(&image, 8).unwrap();
        let second = strategy.extract(&image, 8).unwrap();
        assert_eq!(first, second);
        assert!(first.swatches.len() <= 8);
    }

    #[test]
    fn solid_image_yields_single_swatch() {
        let image = RgbaImage::from_pixel(5, 5, Rgba([255, 255, 255, 255]));
        let result = StatisticalStrategy::with_grid(3, 3).extract(&image, 8).unwrap();

        assert_eq!(result.dominant, Rgb::new(255, 255, 255));
        assert_eq!(result.swatches, vec![Rgb::new(255, 255, 255)]);
    }

    #[test]
    fn empty_image_is_unavailable() {
        let image = RgbaImage::new(0, 0);
        assert!(StatisticalStrategy::default().extract(&image, 8).is_err());
    }

    #[test]
    fn cell_centers_stay_in_bounds() {
        assert_eq!(cell_center(0, 4, 1), 0);
        assert_eq!(cell_center(3, 4, 1), 0);
        assert_eq!(cell_center(0, 4, 8), 1);
        assert_eq!(cell_center(3, 4, 8), 7);
    }
}
