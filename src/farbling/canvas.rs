//! Image farbling algorithms
//!
//! All algorithms draw from the PRNG in row-major order and only change
//! channel values; length, dimensions and (except where a variant asks for
//! it) alpha stay untouched.

use std::collections::HashMap;

use rand::seq::index;
use rand::Rng;

use super::pixels::{PixelRows, CHANNELS};

/// Number of colour channels (alpha excluded).
const RGB: usize = 3;

/// When the random-walk offsets are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Once for the whole image.
    PerBuffer,
    /// Redrawn for every row.
    PerRow,
}

/// What colour mapping does once the threshold is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStrategy {
    /// Perturb every distinct colour by its own pattern.
    Buckets,
    /// Delegate to [`bit_flip`] with mask 1.
    BitFlip,
    /// Delegate to [`random_walk`] with range 3.
    RandomWalk,
}

/// XOR `mask` onto each colour channel with probability `probability`.
pub fn bit_flip<P, R>(pixels: &mut P, rng: &mut R, mask: u8, probability: f64)
where
    P: PixelRows + ?Sized,
    R: Rng + ?Sized,
{
    let probability = probability.clamp(0.0, 1.0);
    for y in 0..pixels.geometry().height() {
        for px in pixels.row_mut(y).chunks_exact_mut(CHANNELS) {
            for value in &mut px[..RGB] {
                if rng.gen_bool(probability) {
                    *value ^= mask;
                }
            }
        }
    }
}

/// With probability `probability` per pixel, flip the low bit of one channel.
pub fn sparse_channel<P, R>(pixels: &mut P, rng: &mut R, probability: f64, include_alpha: bool)
where
    P: PixelRows + ?Sized,
    R: Rng + ?Sized,
{
    let probability = probability.clamp(0.0, 1.0);
    let channels = if include_alpha { CHANNELS } else { RGB };
    for y in 0..pixels.geometry().height() {
        for px in pixels.row_mut(y).chunks_exact_mut(CHANNELS) {
            if rng.gen_bool(probability) {
                px[rng.gen_range(0..channels)] ^= 1;
            }
        }
    }
}

fn walk_offsets<R: Rng + ?Sized>(rng: &mut R, range: i16) -> [i16; RGB] {
    let range = range.abs();
    [
        rng.gen_range(-range..=range),
        rng.gen_range(-range..=range),
        rng.gen_range(-range..=range),
    ]
}

/// Shift every colour channel by a random offset in `-range..=range`.
pub fn random_walk<P, R>(pixels: &mut P, rng: &mut R, range: i16, mode: WalkMode)
where
    P: PixelRows + ?Sized,
    R: Rng + ?Sized,
{
    let mut offsets = walk_offsets(rng, range);
    for y in 0..pixels.geometry().height() {
        if mode == WalkMode::PerRow && y > 0 {
            offsets = walk_offsets(rng, range);
        }
        for px in pixels.row_mut(y).chunks_exact_mut(CHANNELS) {
            for (value, offset) in px[..RGB].iter_mut().zip(offsets) {
                *value = (*value as i16 + offset).clamp(0, 255) as u8;
            }
        }
    }
}

/// Blend `fraction` of the difference between the horizontal neighbours into
/// one randomly chosen channel of every pixel.
///
/// Neighbours are read from the unmodified row; at the edges the pixel stands
/// in for its missing neighbour.
pub fn smoothing<P, R>(pixels: &mut P, rng: &mut R, fraction: f32)
where
    P: PixelRows + ?Sized,
    R: Rng + ?Sized,
{
    let width = pixels.geometry().width();
    for y in 0..pixels.geometry().height() {
        let original = pixels.row(y).to_vec();
        let row = pixels.row_mut(y);
        for x in 0..width {
            let channel = rng.gen_range(0..RGB);
            let at = |px: usize| original[px * CHANNELS + channel] as f32;
            let left = if x > 0 { at(x - 1) } else { at(x) };
            let right = if x + 1 < width { at(x + 1) } else { at(x) };
            let blended = at(x) + fraction * (right - left);
            row[x * CHANNELS + channel] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Negate (255 - v) the colour channels of `percent`% of the pixels.
///
/// When the share rounds down to zero pixels, one channel of one pixel is
/// negated instead.
pub fn pixel_negation<P, R>(pixels: &mut P, rng: &mut R, percent: u32)
where
    P: PixelRows + ?Sized,
    R: Rng + ?Sized,
{
    let geometry = pixels.geometry();
    let total = geometry.pixel_count();
    if total == 0 {
        return;
    }

    let percent = percent.min(100) as usize;
    // floor(total * percent / 100) without the intermediate product.
    let amount = total / 100 * percent + total % 100 * percent / 100;
    if amount == 0 {
        let pixel = rng.gen_range(0..total);
        let channel = rng.gen_range(0..RGB);
        let row = pixels.row_mut(pixel / geometry.width());
        let idx = (pixel % geometry.width()) * CHANNELS + channel;
        row[idx] = 255 - row[idx];
        return;
    }

    let mut chosen = index::sample(rng, total, amount).into_vec();
    chosen.sort_unstable();
    for pixel in chosen {
        let row = pixels.row_mut(pixel / geometry.width());
        let start = (pixel % geometry.width()) * CHANNELS;
        for value in &mut row[start..start + RGB] {
            *value = 255 - *value;
        }
    }
}

/// Distinct RGB tuples in order of first appearance.
pub fn distinct_colors<P: PixelRows + ?Sized>(pixels: &P) -> Vec<[u8; 3]> {
    let mut seen = HashMap::new();
    let mut colors = Vec::new();
    for y in 0..pixels.geometry().height() {
        for px in pixels.row(y).chunks_exact(CHANNELS) {
            let rgb = [px[0], px[1], px[2]];
            seen.entry(rgb).or_insert_with(|| {
                colors.push(rgb);
                colors.len() - 1
            });
        }
    }
    colors
}

/// Remap colours of images with more than `threshold` distinct colours.
///
/// Returns whether the image was modified.
pub fn color_mapping<P, R>(pixels: &mut P, rng: &mut R, threshold: u64, strategy: MappingStrategy) -> bool
where
    P: PixelRows + ?Sized,
    R: Rng + ?Sized,
{
    let colors = distinct_colors(pixels);
    if colors.len() as u64 <= threshold {
        log::debug!(
            "Colour mapping skipped: {} colours, threshold {}",
            colors.len(),
            threshold
        );
        return false;
    }

    match strategy {
        MappingStrategy::BitFlip => bit_flip(pixels, rng, 1, 0.5),
        MappingStrategy::RandomWalk => random_walk(pixels, rng, 3, WalkMode::PerBuffer),
        MappingStrategy::Buckets => {
            // Non-zero 3-bit pattern per colour: bit c flips the low bit of channel c.
            let patterns: HashMap<[u8; 3], u8> = colors
                .into_iter()
                .map(|rgb| (rgb, rng.gen_range(1..8u8)))
                .collect();
            for y in 0..pixels.geometry().height() {
                for px in pixels.row_mut(y).chunks_exact_mut(CHANNELS) {
                    let rgb = [px[0], px[1], px[2]];
                    if let Some(&pattern) = patterns.get(&rgb) {
                        for (c, value) in px[..RGB].iter_mut().enumerate() {
                            *value ^= (pattern >> c) & 1;
                        }
                    }
                }
            }
        }
    }
    true
}

/// Replace the image by opaque white.
pub fn blank<P: PixelRows + ?Sized>(pixels: &mut P) {
    for y in 0..pixels.geometry().height() {
        pixels.row_mut(y).fill(255);
    }
}

/// Farbled answer of `isPointInPath` / `isPointInStroke`.
///
/// Approach 0 turns a hit into a miss once in 20 queries, approach 1 always
/// misses and any other approach passes the answer through.
pub fn point_query<R: Rng + ?Sized>(original: bool, approach: i64, rng: &mut R) -> bool {
    match approach {
        0 => original && !rng.gen_ratio(1, 20),
        1 => false,
        _ => original,
    }
}
