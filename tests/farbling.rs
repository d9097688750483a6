//! Farbling integration tests
//!
//! Determinism and structural guarantees of the image and audio algorithms.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use shelter_wasm::farbling::{
    self, AudioProtection, CanvasProtection, DomainIdentity, Geometry, MappingStrategy,
    RgbaImage, RgbaSlice, SessionKey, WalkMode,
};

fn identity(domain: &str) -> DomainIdentity {
    SessionKey::from_bytes([42; 32]).domain_identity(domain).unwrap()
}

/// Noisy opaque-ish image with a fixed alpha.
fn noisy(width: usize, height: usize, alpha: u8) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut data = vec![0u8; width * height * 4];
    for px in data.chunks_exact_mut(4) {
        px[0] = rng.gen();
        px[1] = rng.gen();
        px[2] = rng.gen();
        px[3] = alpha;
    }
    data
}

fn farbled(data: &[u8], geometry: Geometry, protection: CanvasProtection, id: &DomainIdentity) -> Vec<u8> {
    let mut copy = data.to_vec();
    farbling::farble_rgba(&mut copy, geometry, &protection, id).unwrap();
    copy
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

#[test]
fn test_bit_flip_is_deterministic() {
    let geometry = Geometry::new(16, 16).unwrap();
    let data = noisy(16, 16, 255);
    let id = identity("a.example");
    let protection = CanvasProtection::from_approach(0);

    let first = farbled(&data, geometry, protection, &id);
    let second = farbled(&data, geometry, protection, &id);
    assert_eq!(first, second);
    assert_ne!(first, data);
}

#[test]
fn test_random_walk_is_deterministic() {
    let geometry = Geometry::new(12, 9).unwrap();
    let data = noisy(12, 9, 255);
    let id = identity("a.example");
    for mode in [WalkMode::PerBuffer, WalkMode::PerRow] {
        let protection = CanvasProtection::RandomWalk { range: 3, mode };
        assert_eq!(
            farbled(&data, geometry, protection, &id),
            farbled(&data, geometry, protection, &id)
        );
    }
}

#[test]
fn test_single_byte_change_reseeds() {
    let geometry = Geometry::new(16, 16).unwrap();
    let data = noisy(16, 16, 255);
    let mut changed = data.clone();
    changed[100] ^= 0x80;
    let id = identity("a.example");
    let protection = CanvasProtection::from_approach(0);

    let flips_a = xor(&data, &farbled(&data, geometry, protection, &id));
    let flips_b = xor(&changed, &farbled(&changed, geometry, protection, &id));
    assert_ne!(flips_a, flips_b);
}

#[test]
fn test_other_domain_gets_other_output() {
    let geometry = Geometry::new(16, 16).unwrap();
    let data = noisy(16, 16, 255);
    let protection = CanvasProtection::from_approach(0);
    assert_ne!(
        farbled(&data, geometry, protection, &identity("a.example")),
        farbled(&data, geometry, protection, &identity("b.example"))
    );
}

#[test]
fn test_mapping_below_threshold_is_untouched() {
    let geometry = Geometry::new(10, 10).unwrap();
    let data = RgbaImage::filled(geometry, [30, 60, 90, 255]).into_bytes();
    let protection = CanvasProtection::from_approach(21);
    assert_eq!(
        protection,
        CanvasProtection::ColorMapping {
            threshold: 1,
            strategy: MappingStrategy::Buckets
        }
    );

    let mut copy = data.clone();
    let modified = farbling::farble_rgba(&mut copy, geometry, &protection, &identity("a.example")).unwrap();
    assert!(!modified);
    assert_eq!(copy, data);
}

#[test]
fn test_mapping_above_threshold_changes_every_colour() {
    let geometry = Geometry::new(40, 25).unwrap();
    let mut data = Vec::with_capacity(geometry.byte_len());
    for i in 0..1000u32 {
        data.extend_from_slice(&[(i % 256) as u8, (i / 256) as u8, 7, 255]);
    }
    let protection = CanvasProtection::from_approach(25);

    let mut copy = data.clone();
    let modified = farbling::farble_rgba(&mut copy, geometry, &protection, &identity("a.example")).unwrap();
    assert!(modified);
    for (before, after) in data.chunks_exact(4).zip(copy.chunks_exact(4)) {
        assert_ne!(before[..3], after[..3]);
        assert_eq!(before[3], after[3]);
    }
}

#[test]
fn test_owned_and_borrowed_images_agree() {
    let geometry = Geometry::new(8, 6).unwrap();
    let data = noisy(8, 6, 255);
    let id = identity("a.example");
    let protection = CanvasProtection::from_approach(6);

    let mut owned = RgbaImage::new(geometry, data.clone()).unwrap();
    farbling::farble_pixels(&mut owned, &protection, &id);

    let mut buffer = data;
    let mut borrowed = RgbaSlice::new(geometry, &mut buffer).unwrap();
    farbling::farble_pixels(&mut borrowed, &protection, &id);

    assert_eq!(owned.as_bytes(), buffer.as_slice());
}

#[test]
fn test_every_approach_keeps_length_and_alpha() {
    let geometry = Geometry::new(9, 7).unwrap();
    let data = noisy(9, 7, 200);
    let id = identity("a.example");

    for approach in 0..=33 {
        let out = farbled(&data, geometry, CanvasProtection::from_approach(approach), &id);
        assert_eq!(out.len(), data.len(), "approach {}", approach);
        // Blank rewrites alpha and approach 7 counts it as a channel.
        if approach == 1 || approach == 7 {
            continue;
        }
        for (before, after) in data.chunks_exact(4).zip(out.chunks_exact(4)) {
            assert_eq!(before[3], after[3], "approach {}", approach);
        }
    }
}

#[test]
fn test_blank_is_opaque_white() {
    let geometry = Geometry::new(4, 4).unwrap();
    let out = farbled(&noisy(4, 4, 10), geometry, CanvasProtection::Blank, &identity("a.example"));
    assert!(out.iter().all(|&b| b == 255));
}

#[test]
fn test_wrong_geometry_is_rejected() {
    let mut data = vec![0u8; 15];
    let result = farbling::farble_rgba(
        &mut data,
        Geometry::new(2, 2).unwrap(),
        &CanvasProtection::from_approach(0),
        &identity("a.example"),
    );
    assert!(result.is_err());
}

#[test]
fn test_audio_is_deterministic_and_bounded() {
    let id = identity("a.example");
    let samples: Vec<f32> = (0..512).map(|i| (i as f32 / 20.0).sin()).collect();

    let mut first = samples.clone();
    let mut second = samples.clone();
    farbling::farble_audio_f32(&mut first, AudioProtection::LittleLies, &id);
    farbling::farble_audio_f32(&mut second, AudioProtection::LittleLies, &id);
    assert_eq!(first, second);
    for (orig, out) in samples.iter().zip(&first) {
        assert!(out.abs() <= orig.abs());
        assert!((orig - out).abs() <= orig.abs() * 0.01 + f32::EPSILON);
    }

    let mut noise = samples.clone();
    farbling::farble_audio_f32(&mut noise, AudioProtection::WhiteNoise, &id);
    assert!(noise.iter().all(|s| (-1.0..1.0).contains(s)));
    assert_ne!(noise, samples);
}

#[test]
fn test_audio_bytes_are_deterministic() {
    let id = identity("a.example");
    let bytes: Vec<u8> = (0..=255).collect();
    let mut first = bytes.clone();
    let mut second = bytes.clone();
    farbling::farble_audio_u8(&mut first, AudioProtection::LittleLies, &id);
    farbling::farble_audio_u8(&mut second, AudioProtection::LittleLies, &id);
    assert_eq!(first, second);
    assert!(first.iter().zip(&bytes).all(|(a, b)| (a ^ b) <= 1));
}

#[test]
fn test_point_query() {
    let id = identity("a.example");
    assert!(!farbling::farble_point_query(true, 3.0, 4.0, 1, &id));
    assert!(farbling::farble_point_query(true, 3.0, 4.0, 12, &id));
    assert!(!farbling::farble_point_query(false, 3.0, 4.0, 0, &id));

    let answers: Vec<bool> = (0..200)
        .map(|i| farbling::farble_point_query(true, i as f64, 0.5, 0, &id))
        .collect();
    let again: Vec<bool> = (0..200)
        .map(|i| farbling::farble_point_query(true, i as f64, 0.5, 0, &id))
        .collect();
    assert_eq!(answers, again);
    assert!(answers.iter().filter(|&&hit| hit).count() > 150);
}

#[test]
fn test_oversized_geometry_is_an_error() {
    let err = Geometry::new(usize::MAX / 2, 3).unwrap_err();
    assert_eq!(err.code(), shelter_wasm::ErrorCode::InvalidGeometry);
    assert!(Geometry::new(u32::MAX as usize, u32::MAX as usize).is_err());

    let empty = Geometry::new(0, 1_000_000).unwrap();
    assert_eq!(empty.byte_len(), 0);
    let mut data = Vec::new();
    for approach in 0..=33 {
        let protection = CanvasProtection::from_approach(approach);
        farbling::farble_rgba(&mut data, empty, &protection, &identity("a.example")).unwrap();
    }
    assert!(data.is_empty());
}
