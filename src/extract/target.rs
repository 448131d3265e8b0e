const WEIGHT_SATURATION: f32 = 0.24;
const WEIGHT_LUMA: f32 = 0.52;
const WEIGHT_POPULATION: f32 = 0.24;

const MIN_VIBRANT_SATURATION: f32 = 0.35;
const TARGET_VIBRANT_SATURATION: f32 = 1.0;

const TARGET_MUTED_SATURATION: f32 = 0.3;
const MAX_MUTED_SATURATION: f32 = 0.4;

const MIN_LIGHT_LUMA: f32 = 0.55;
const TARGET_LIGHT_LUMA: f32 = 0.74;

const TARGET_DARK_LUMA: f32 = 0.26;
const MAX_DARK_LUMA: f32 = 0.45;

const MIN_NORMAL_LUMA: f32 = 0.3;
const TARGET_NORMAL_LUMA: f32 = 0.5;
const MAX_NORMAL_LUMA: f32 = 0.7;

/// The named buckets a quantized swatch can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    LightVibrant,
    Vibrant,
    DarkVibrant,
    LightMuted,
    Muted,
    DarkMuted,
}

/// Saturation/lightness window plus scoring weights for one [`TargetKind`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    kind: TargetKind,
    // min, target, max
    saturation: (f32, f32, f32),
    // min, target, max
    lightness: (f32, f32, f32),
    // sat, luma, pop; normalized to sum to one
    weights: (f32, f32, f32),
}

impl Target {
    pub fn all() -> [Target; 6] {
        [
            Target::new(TargetKind::LightVibrant),
            Target::new(TargetKind::Vibrant),
            Target::new(TargetKind::DarkVibrant),
            Target::new(TargetKind::LightMuted),
            Target::new(TargetKind::Muted),
            Target::new(TargetKind::DarkMuted),
        ]
    }

    pub fn new(kind: TargetKind) -> Self {
        let vibrant = (MIN_VIBRANT_SATURATION, TARGET_VIBRANT_SATURATION, 1.0);
        let muted = (0.0, TARGET_MUTED_SATURATION, MAX_MUTED_SATURATION);
        let light = (MIN_LIGHT_LUMA, TARGET_LIGHT_LUMA, 1.0);
        let normal = (MIN_NORMAL_LUMA, TARGET_NORMAL_LUMA, MAX_NORMAL_LUMA);
        let dark = (0.0, TARGET_DARK_LUMA, MAX_DARK_LUMA);

        let (saturation, lightness) = match kind {
            TargetKind::LightVibrant => (vibrant, light),
            TargetKind::Vibrant => (vibrant, normal),
            TargetKind::DarkVibrant => (vibrant, dark),
            TargetKind::LightMuted => (muted, light),
            TargetKind::Muted => (muted, normal),
            TargetKind::DarkMuted => (muted, dark),
        };

        Self {
            kind,
            saturation,
            lightness,
            weights: normalize_weights((WEIGHT_SATURATION, WEIGHT_LUMA, WEIGHT_POPULATION)),
        }
    }

    pub fn kind(self) -> TargetKind {
        self.kind
    }

    /// Whether a color with the given saturation and lightness may be assigned to this target.
    pub fn accepts(self, saturation: f32, lightness: f32) -> bool {
        (self.saturation.0..=self.saturation.2).contains(&saturation)
            && (self.lightness.0..=self.lightness.2).contains(&lightness)
    }

    /// Weighted closeness of a swatch to this target. `population_ratio` is the swatch population
    /// divided by the largest population in the palette.
    pub fn score(self, saturation: f32, lightness: f32, population_ratio: f32) -> f32 {
        let (saturation_weight, lightness_weight, population_weight) = self.weights;

        saturation_weight * (1.0 - (saturation - self.saturation.1).abs())
            + lightness_weight * (1.0 - (lightness - self.lightness.1).abs())
            + population_weight * population_ratio
    }
}

fn normalize_weights((saturation, lightness, population): (f32, f32, f32)) -> (f32, f32, f32) {
    let sum = saturation + lightness + population;

    if sum == 0.0 {
        return (saturation, lightness, population);
    }

    (saturation / sum, lightness / sum, population / sum)
}
