use crate::color::Rgb;

/// A candidate color together with the number of pixels it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    color: Rgb,
    population: u32,
}

impl Swatch {
    pub fn new(color: Rgb, population: u32) -> Swatch {
        Self { color, population }
    }

    pub fn color(self) -> Rgb {
        self.color
    }

    pub fn hsl(self) -> (f32, f32, f32) {
        self.color.hsl()
    }

    pub fn population(self) -> u32 {
        self.population
    }
}
