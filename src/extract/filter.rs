const BLACK_MAX_LIGHTNESS: f32 = 0.05;
const WHITE_MIN_LIGHTNESS: f32 = 0.95;

// hue band (degrees) and saturation ceiling of the red I line
const RED_I_LINE_HUE: std::ops::RangeInclusive<f32> = 10.0..=37.0;
const RED_I_LINE_MAX_SATURATION: f32 = 0.82;

/// Removes colors from quantization, and drops final swatches whose average lands on a removed
/// color.
pub trait Filter: Send + Sync {
    /// Return whether a given color should be allowed. The same color is given in both sRGB and
    /// HSL for convenience.
    fn is_allowed(&self, rgb: (u8, u8, u8), hsl: (f32, f32, f32)) -> bool;
}

/// Disallows colors very close to black, very close to white, and the skin-tone band around the
/// red I line.
#[derive(Debug)]
pub struct DefaultFilter;

impl Filter for DefaultFilter {
    fn is_allowed(&self, _: (u8, u8, u8), (hue, saturation, lightness): (f32, f32, f32)) -> bool {
        let extreme = lightness <= BLACK_MAX_LIGHTNESS || lightness >= WHITE_MIN_LIGHTNESS;
        let skin = RED_I_LINE_HUE.contains(&hue) && saturation <= RED_I_LINE_MAX_SATURATION;

        !extreme && !skin
    }
}

/// Lets every color through. Useful for images that are mostly near-black or near-white.
#[derive(Debug)]
pub struct AllowAll;

impl Filter for AllowAll {
    fn is_allowed(&self, _: (u8, u8, u8), _: (f32, f32, f32)) -> bool {
        true
    }
}
