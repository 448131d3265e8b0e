//! Median-cut quantizer over a 15-bit color histogram.

use crate::{
    color::Rgb,
    extract::{filter::Filter, swatch::Swatch},
};
use std::collections::{BinaryHeap, HashMap};

const QUANTIZE_WORD_WIDTH: u32 = 5;
const QUANTIZE_WORD_MAX: u8 = (1 << QUANTIZE_WORD_WIDTH) - 1;

/// Pixels at or below this alpha do not contribute to the histogram.
const TRANSPARENT_MAX_ALPHA: u8 = 127;

pub struct ColorCutQuantizer<'f> {
    max_colors: usize,
    filters: &'f [Box<dyn Filter>],
}

/// A 5-bit-per-channel color and how many pixels fell into it.
type Bucket = ([u8; 3], u32);

/// An axis-aligned box in quantized color space, tightly fit around its colors.
struct ColorBox<'a> {
    colors: &'a mut [Bucket],
    population: u32,
    // min, max per channel
    ranges: [(u8, u8); 3],
}

impl<'f> ColorCutQuantizer<'f> {
    pub fn new(max_colors: usize, filters: &'f [Box<dyn Filter>]) -> Self {
        Self {
            max_colors: max_colors.max(1),
            filters,
        }
    }

    /// Quantize an interleaved RGBA buffer into at most `max_colors` swatches.
    pub fn quantize(&self, rgba: &[u8]) -> Vec<Swatch> {
        let mut histogram: HashMap<[u8; 3], u32> = HashMap::new();
        for pixel in rgba.chunks_exact(4) {
            if pixel[3] <= TRANSPARENT_MAX_ALPHA {
                continue;
            }

            let key = [narrow(pixel[0]), narrow(pixel[1]), narrow(pixel[2])];
            *histogram.entry(key).or_insert(0) += 1;
        }

        let distinct = histogram.len();
        let mut colors = histogram
            .into_iter()
            .filter(|(color, _)| !self.should_ignore(widen_color(*color)))
            .collect::<Vec<Bucket>>();

        // order by the packed 15-bit value so splitting does not depend on hash order
        colors.sort_unstable_by_key(|(color, _)| pack(*color));

        if distinct <= self.max_colors {
            return colors
                .into_iter()
                .map(|(color, count)| Swatch::new(widen_color(color), count))
                .collect();
        }

        self.cut(&mut colors)
    }

    fn cut(&self, colors: &mut [Bucket]) -> Vec<Swatch> {
        if colors.is_empty() {
            return Vec::new();
        }

        // the heap pops the largest box by volume first
        let mut queue = BinaryHeap::with_capacity(self.max_colors);
        queue.push(ColorBox::new(colors));

        while queue.len() < self.max_colors {
            match queue.pop() {
                Some(largest) if largest.can_split() => {
                    let (left, right) = largest.split();
                    queue.push(left);
                    queue.push(right);
                }
                Some(largest) => {
                    queue.push(largest);
                    break;
                }
                None => break,
            }
        }

        queue
            .iter()
            .map(ColorBox::average)
            .filter(|swatch| !self.should_ignore(swatch.color()))
            .collect()
    }

    fn should_ignore(&self, color: Rgb) -> bool {
        let hsl = color.hsl();
        self.filters
            .iter()
            .any(|filter| !filter.is_allowed(color.tuple(), hsl))
    }
}

impl<'a> ColorBox<'a> {
    fn new(colors: &'a mut [Bucket]) -> Self {
        let mut population = 0;
        let mut ranges = [(QUANTIZE_WORD_MAX, 0); 3];

        for (color, count) in colors.iter() {
            population += count;
            for (range, &value) in ranges.iter_mut().zip(color.iter()) {
                range.0 = range.0.min(value);
                range.1 = range.1.max(value);
            }
        }

        Self {
            colors,
            population,
            ranges,
        }
    }

    fn volume(&self) -> u32 {
        self.ranges
            .iter()
            .map(|(min, max)| (max - min) as u32 + 1)
            .product()
    }

    fn can_split(&self) -> bool {
        self.colors.len() > 1
    }

    /// Split at the population median along the longest channel.
    fn split(self) -> (ColorBox<'a>, ColorBox<'a>) {
        let channel = self.longest_channel();
        let population = self.population;
        let colors = self.colors;

        colors.sort_unstable_by_key(|(color, _)| (color[channel], pack(*color)));

        let split_point = find_split_point(colors, population);
        let (left, right) = colors.split_at_mut(split_point);

        (ColorBox::new(left), ColorBox::new(right))
    }

    fn longest_channel(&self) -> usize {
        let lengths = self.ranges.map(|(min, max)| max - min);

        // ties prefer red, then green
        if lengths[0] >= lengths[1] && lengths[0] >= lengths[2] {
            0
        } else if lengths[1] >= lengths[2] {
            1
        } else {
            2
        }
    }

    fn average(&self) -> Swatch {
        let mut sums = [0u64; 3];
        let mut population = 0u64;

        for (color, count) in self.colors.iter() {
            population += *count as u64;
            for (sum, &value) in sums.iter_mut().zip(color.iter()) {
                *sum += value as u64 * *count as u64;
            }
        }

        let mean = sums.map(|sum| (sum as f64 / population.max(1) as f64).round() as u8);
        Swatch::new(widen_color(mean), population as u32)
    }
}

/// The first index whose running population reaches half the box, never 0 so both halves are
/// non-empty.
fn find_split_point(colors: &[Bucket], population: u32) -> usize {
    let midpoint = population / 2;
    let mut running = 0;

    for (i, (_, count)) in colors.iter().enumerate() {
        running += count;
        if running >= midpoint {
            return i.clamp(1, colors.len() - 1);
        }
    }

    1
}

impl Eq for ColorBox<'_> {}
impl PartialEq for ColorBox<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.volume() == other.volume()
    }
}

impl Ord for ColorBox<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.volume().cmp(&other.volume())
    }
}

impl PartialOrd for ColorBox<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn narrow(value: u8) -> u8 {
    value >> (8 - QUANTIZE_WORD_WIDTH)
}

/// Widen a 5-bit value to 8 bits by replicating its high bits, so 31 maps to 255.
fn widen(value: u8) -> u8 {
    (value << (8 - QUANTIZE_WORD_WIDTH)) | (value >> (2 * QUANTIZE_WORD_WIDTH - 8))
}

fn widen_color([r, g, b]: [u8; 3]) -> Rgb {
    Rgb::new(widen(r), widen(g), widen(b))
}

fn pack([r, g, b]: [u8; 3]) -> u32 {
    ((r as u32) << (2 * QUANTIZE_WORD_WIDTH)) | ((g as u32) << QUANTIZE_WORD_WIDTH) | b as u32
}
