//! Point and neighbourhood color reads against a session's buffer.

use crate::color::{ChannelSums, Rgb};
use crate::error::{Error, Result};
use crate::normalize::ImageNormalizer;
use crate::store::ImageSession;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// How request coordinates are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateUnit {
    /// Fractions of the image width and height.
    #[default]
    Normalized,
    /// Pixel offsets from the top-left corner.
    Absolute,
}

impl FromStr for CoordinateUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normalized" | "relative" => Ok(CoordinateUnit::Normalized),
            "absolute" | "px" | "pixel" | "pixels" => Ok(CoordinateUnit::Absolute),
            _ => Err(Error::InvalidUnit(s.to_string())),
        }
    }
}

impl fmt::Display for CoordinateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateUnit::Normalized => f.write_str("normalized"),
            CoordinateUnit::Absolute => f.write_str("absolute"),
        }
    }
}

/// The averaged color and the pixel coordinates actually sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorSample {
    #[serde(rename = "hex")]
    pub color: Rgb,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ColorSample {
    pub fn hex(&self) -> String {
        self.color.hex()
    }
}

/// Reject coordinates that cannot be resolved to a pixel.
pub fn validate_coordinates(x: f64, y: f64) -> Result<()> {
    for (axis, value) in [('x', x), ('y', y)] {
        if !value.is_finite() {
            return Err(Error::InvalidCoordinate { axis, value });
        }
    }

    Ok(())
}

/// Resolve one coordinate to a pixel index in `[0, extent - 1]`. Out-of-range values clamp.
pub fn resolve_coordinate(value: f64, unit: CoordinateUnit, extent: u32) -> u32 {
    let scaled = match unit {
        CoordinateUnit::Normalized => value * extent as f64,
        CoordinateUnit::Absolute => value,
    };
    let max = extent.saturating_sub(1) as f64;

    scaled.floor().clamp(0.0, max) as u32
}

#[derive(Debug, Clone)]
pub struct PixelSampler {
    max_radius: u32,
    normalizer: ImageNormalizer,
}

impl PixelSampler {
    pub fn new(max_radius: u32, normalizer: ImageNormalizer) -> Self {
        Self { max_radius, normalizer }
    }

    pub fn max_radius(&self) -> u32 {
        self.max_radius
    }

    pub fn sample(
        &self,
        session: &ImageSession,
        x: f64,
        y: f64,
        unit: CoordinateUnit,
        radius: Option<u32>,
    ) -> Result<ColorSample> {
        validate_coordinates(x, y)?;

        let (width, height) = (session.width(), session.height());
        let x = resolve_coordinate(x, unit, width);
        let y = resolve_coordinate(y, unit, height);
        let radius = radius.unwrap_or(0).min(self.max_radius);

        let color = match session.pixels() {
            Some(pixels) if pixels.len() == width as usize * height as usize * 4 => {
                read(pixels, width, height, x, y, radius)
            }
            _ => self.read_from_source(session, x, y, radius)?,
        };

        Ok(ColorSample {
            color,
            x,
            y,
            width,
            height,
        })
    }

    /// Re-decode the retained upload and average the requested region.
    fn read_from_source(&self, session: &ImageSession, x: u32, y: u32, radius: u32) -> Result<Rgb> {
        let source = session.source().ok_or(Error::InvalidGeometry {
            width: session.width(),
            height: session.height(),
            len: session.pixels().map_or(0, <[u8]>::len),
        })?;

        warn!(
            width = session.width(),
            height = session.height(),
            "no cached pixels for session, re-decoding source"
        );

        let (_, decoded) = self.normalizer.decode_rgba(source, &session.metadata().format)?;
        let (width, height) = decoded.dimensions();

        Ok(read(
            decoded.as_raw(),
            width,
            height,
            x.min(width - 1),
            y.min(height - 1),
            radius,
        ))
    }
}

/// Read from an RGBA buffer of `width * height * 4` bytes; `(x, y)` must be in bounds.
fn read(pixels: &[u8], width: u32, height: u32, x: u32, y: u32, radius: u32) -> Rgb {
    if radius <= 1 {
        let offset = (y as usize * width as usize + x as usize) * 4;
        return Rgb::from_rgba([pixels[offset], pixels[offset + 1], pixels[offset + 2], 255]);
    }

    let (left, right) = neighbourhood(x, radius, width);
    let (top, bottom) = neighbourhood(y, radius, height);

    let mut sums = ChannelSums::default();
    for row in top..=bottom {
        let start = (row as usize * width as usize + left as usize) * 4;
        let end = (row as usize * width as usize + right as usize + 1) * 4;
        for pixel in pixels[start..end].chunks_exact(4) {
            sums.add(pixel);
        }
    }

    // the center is always inside the neighbourhood, so the region is never empty
    sums.mean().unwrap_or_default()
}

/// `[center - radius, center + radius]` intersected with `[0, extent - 1]`.
fn neighbourhood(center: u32, radius: u32, extent: u32) -> (u32, u32) {
    (center.saturating_sub(radius), center.saturating_add(radius).min(extent - 1))
}
