//! Audio farbling
//!
//! Float data (`getChannelData`, `copyFromChannel`, float analyser readings)
//! and byte data (byte analyser readings) are handled separately; both are
//! seeded from the checksum of the original samples.

use rand::{Rng, RngCore};

use super::seed::Crc16;

/// Audio protection selected by the `audiobuffer` group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioProtection {
    /// Small per-buffer distortion.
    LittleLies,
    /// Replace content with white noise.
    WhiteNoise,
}

impl AudioProtection {
    /// Map the group's parameter onto a protection; unknown values get the
    /// mild one.
    pub fn from_approach(approach: i64) -> Self {
        match approach {
            1 => AudioProtection::WhiteNoise,
            _ => AudioProtection::LittleLies,
        }
    }
}

/// CRC-16 of float samples (little-endian IEEE bytes).
pub fn checksum_f32(samples: &[f32]) -> u16 {
    let mut crc = Crc16::new();
    for sample in samples {
        crc.update(&sample.to_le_bytes());
    }
    crc.finish()
}

/// Farble float samples in place.
pub fn farble_f32<R: Rng + ?Sized>(samples: &mut [f32], protection: AudioProtection, rng: &mut R) {
    match protection {
        AudioProtection::LittleLies => {
            let fudge: f32 = rng.gen_range(0.99..1.0);
            for sample in samples.iter_mut() {
                *sample *= fudge;
            }
        }
        AudioProtection::WhiteNoise => {
            for sample in samples.iter_mut() {
                *sample = rng.gen_range(-1.0..1.0);
            }
        }
    }
}

/// Farble byte samples in place.
pub fn farble_u8<R: Rng + ?Sized>(bytes: &mut [u8], protection: AudioProtection, rng: &mut R) {
    match protection {
        AudioProtection::LittleLies => {
            for byte in bytes.iter_mut() {
                if rng.gen_ratio(1, 16) {
                    *byte ^= 1;
                }
            }
        }
        AudioProtection::WhiteNoise => rng.fill_bytes(bytes),
    }
}
