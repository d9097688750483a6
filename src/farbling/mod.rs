//! Farbling engine
//!
//! Deterministic, bounded distortion of pixel and audio buffers. Algorithms
//! are pure functions over a caller-supplied copy of the content; randomness
//! comes only from a PRNG seeded by [`FarblingSeed`].
//!
//! The persisted configuration selects image algorithms by a numeric
//! "approach" (the first parameter of the canvas group's variants).
//! [`CanvasProtection::from_approach`] is the only place that knows those
//! numbers.

pub mod audio;
pub mod canvas;
pub mod pixels;
pub mod seed;

use crate::catalog::VariantParams;
use crate::error::Result;

pub use audio::AudioProtection;
pub use canvas::{MappingStrategy, WalkMode};
pub use pixels::{Geometry, PixelRows, RgbaImage, RgbaSlice};
pub use seed::{Crc16, DomainIdentity, FarblingSeed, SessionKey, AUDIO_LABEL, CANVAS_LABEL, POINT_LABEL};

/// Image protection, one case per algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasProtection {
    BitFlip { mask: u8, probability: f64 },
    /// Opaque white image.
    Blank,
    SparseChannel { probability: f64, include_alpha: bool },
    RandomWalk { range: i16, mode: WalkMode },
    Smoothing { fraction: f32 },
    PixelNegation { percent: u32 },
    ColorMapping { threshold: u64, strategy: MappingStrategy },
}

/// Colour-count thresholds of the mapping approaches 21..=33.
const MAPPING_THRESHOLDS: [u64; 13] = [
    1, 2, 3, 4, 5, 10, 50, 100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000,
];

impl CanvasProtection {
    /// Stable-id table of the persisted approach numbers.
    ///
    /// Unknown approaches get the mildest bit flip rather than nothing.
    pub fn from_approach(approach: i64) -> Self {
        use CanvasProtection::*;

        let bits = |mask: u8| BitFlip {
            mask,
            probability: 0.5,
        };
        match approach {
            0 => bits(1),
            1 => Blank,
            2 => SparseChannel {
                probability: 0.05,
                include_alpha: false,
            },
            3 => SparseChannel {
                probability: 0.10,
                include_alpha: false,
            },
            4 => RandomWalk {
                range: 3,
                mode: WalkMode::PerBuffer,
            },
            5 => RandomWalk {
                range: 3,
                mode: WalkMode::PerRow,
            },
            6 => Smoothing { fraction: 0.1 },
            7 => SparseChannel {
                probability: 0.15,
                include_alpha: true,
            },
            8..=13 => bits((1u8 << (approach - 6)) - 1),
            14 => PixelNegation { percent: 15 },
            15 => PixelNegation { percent: 20 },
            16 => PixelNegation { percent: 25 },
            17 => PixelNegation { percent: 50 },
            18 => Smoothing { fraction: 0.2 },
            19 => Smoothing { fraction: 0.3 },
            20 => Smoothing { fraction: 0.5 },
            21..=33 => ColorMapping {
                threshold: MAPPING_THRESHOLDS[(approach - 21) as usize],
                strategy: MappingStrategy::Buckets,
            },
            other => {
                log::warn!("⚠️ Unknown canvas approach {}, using bit flip", other);
                bits(1)
            }
        }
    }

    pub fn from_params(params: &VariantParams) -> Self {
        Self::from_approach(params.first_int().unwrap_or(0))
    }
}

/// Farble an image in place.
///
/// Returns whether the content was modified.
pub fn farble_pixels<P>(pixels: &mut P, protection: &CanvasProtection, identity: &DomainIdentity) -> bool
where
    P: PixelRows + ?Sized,
{
    // Seed from the original content before touching it.
    let checksum = pixels.checksum();
    let mut rng = FarblingSeed::new(identity, CANVAS_LABEL, checksum).rng();

    match *protection {
        CanvasProtection::BitFlip { mask, probability } => {
            canvas::bit_flip(pixels, &mut rng, mask, probability)
        }
        CanvasProtection::Blank => canvas::blank(pixels),
        CanvasProtection::SparseChannel {
            probability,
            include_alpha,
        } => canvas::sparse_channel(pixels, &mut rng, probability, include_alpha),
        CanvasProtection::RandomWalk { range, mode } => {
            canvas::random_walk(pixels, &mut rng, range, mode)
        }
        CanvasProtection::Smoothing { fraction } => canvas::smoothing(pixels, &mut rng, fraction),
        CanvasProtection::PixelNegation { percent } => {
            canvas::pixel_negation(pixels, &mut rng, percent)
        }
        CanvasProtection::ColorMapping {
            threshold,
            strategy,
        } => return canvas::color_mapping(pixels, &mut rng, threshold, strategy),
    }
    true
}

/// Farble a raw RGBA buffer of the given size in place.
pub fn farble_rgba(
    data: &mut [u8],
    geometry: Geometry,
    protection: &CanvasProtection,
    identity: &DomainIdentity,
) -> Result<bool> {
    let mut pixels = RgbaSlice::new(geometry, data)?;
    Ok(farble_pixels(&mut pixels, protection, identity))
}

/// Farble float audio samples in place.
pub fn farble_audio_f32(samples: &mut [f32], protection: AudioProtection, identity: &DomainIdentity) {
    let checksum = audio::checksum_f32(samples);
    let mut rng = FarblingSeed::new(identity, AUDIO_LABEL, checksum).rng();
    audio::farble_f32(samples, protection, &mut rng);
}

/// Farble byte audio samples in place.
pub fn farble_audio_u8(bytes: &mut [u8], protection: AudioProtection, identity: &DomainIdentity) {
    let checksum = Crc16::checksum(bytes);
    let mut rng = FarblingSeed::new(identity, AUDIO_LABEL, checksum).rng();
    audio::farble_u8(bytes, protection, &mut rng);
}

/// Farbled point-in-path answer, keyed on the queried coordinates.
pub fn farble_point_query(original: bool, x: f64, y: f64, approach: i64, identity: &DomainIdentity) -> bool {
    let mut crc = Crc16::new();
    crc.update(&x.to_le_bytes());
    crc.update(&y.to_le_bytes());
    let mut rng = FarblingSeed::new(identity, POINT_LABEL, crc.finish()).rng();
    canvas::point_query(original, approach, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approach_table() {
        assert_eq!(
            CanvasProtection::from_approach(0),
            CanvasProtection::BitFlip { mask: 1, probability: 0.5 }
        );
        assert_eq!(CanvasProtection::from_approach(1), CanvasProtection::Blank);
        assert_eq!(
            CanvasProtection::from_approach(8),
            CanvasProtection::BitFlip { mask: 3, probability: 0.5 }
        );
        assert_eq!(
            CanvasProtection::from_approach(13),
            CanvasProtection::BitFlip { mask: 127, probability: 0.5 }
        );
        assert_eq!(
            CanvasProtection::from_approach(17),
            CanvasProtection::PixelNegation { percent: 50 }
        );
        assert_eq!(
            CanvasProtection::from_approach(33),
            CanvasProtection::ColorMapping {
                threshold: 10_000_000,
                strategy: MappingStrategy::Buckets
            }
        );
        assert_eq!(
            CanvasProtection::from_approach(99),
            CanvasProtection::from_approach(0)
        );
    }

    #[test]
    fn test_from_params() {
        let params = VariantParams(vec![crate::catalog::ParamValue::Int(5)]);
        assert_eq!(
            CanvasProtection::from_params(&params),
            CanvasProtection::RandomWalk { range: 3, mode: WalkMode::PerRow }
        );
    }

    #[test]
    fn test_farble_rgba_rejects_bad_geometry() {
        let identity = DomainIdentity::from_bytes([1; 32]);
        let mut data = vec![0u8; 10];
        assert!(farble_rgba(
            &mut data,
            Geometry::new(2, 2).unwrap(),
            &CanvasProtection::Blank,
            &identity
        )
        .is_err());
        assert_eq!(data, vec![0u8; 10]);
    }

    #[test]
    fn test_point_query_stable_per_coordinate() {
        let identity = DomainIdentity::from_bytes([2; 32]);
        for i in 0..50 {
            let x = i as f64;
            assert_eq!(
                farble_point_query(true, x, 1.0, 0, &identity),
                farble_point_query(true, x, 1.0, 0, &identity)
            );
        }
    }
}
