use palette::{FromColor, Hsl, Srgb};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An opaque 8-bit sRGB color.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn from_rgba(pixel: [u8; 4]) -> Self {
        Self::new(pixel[0], pixel[1], pixel[2])
    }

    pub fn tuple(self) -> (u8, u8, u8) {
        (self.red, self.green, self.blue)
    }

    /// Hue in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
    pub fn hsl(self) -> (f32, f32, f32) {
        let srgb: Srgb<f32> = Srgb::new(self.red, self.green, self.blue).into_format();
        let hsl = Hsl::from_color(srgb);

        (hsl.hue.into_positive_degrees(), hsl.saturation, hsl.lightness)
    }

    /// Uppercase `#RRGGBB`.
    pub fn hex(self) -> String {
        self.to_string()
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((red, green, blue): (u8, u8, u8)) -> Self {
        Self::new(red, green, blue)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex color: {0:?}")]
pub struct ParseColorError(String);

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ParseColorError(s.to_string()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ParseColorError(s.to_string()))
        };

        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Running per-channel sums, averaged with round-half-up.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ChannelSums {
    red: u64,
    green: u64,
    blue: u64,
    count: u64,
}

impl ChannelSums {
    pub(crate) fn add(&mut self, pixel: &[u8]) {
        self.red += pixel[0] as u64;
        self.green += pixel[1] as u64;
        self.blue += pixel[2] as u64;
        self.count += 1;
    }

    pub(crate) fn mean(&self) -> Option<Rgb> {
        if self.count == 0 {
            return None;
        }

        let mean = |sum: u64| ((sum + self.count / 2) / self.count) as u8;
        Some(Rgb::new(mean(self.red), mean(self.green), mean(self.blue)))
    }
}
