//! Built-in level presets

use crate::catalog::{Assignments, CANVAS_GROUP};

use super::Level;

pub const LEVEL_OFF: &str = "off";
pub const LEVEL_MINIMAL: &str = "minimal";
pub const LEVEL_BALANCED: &str = "balanced";
pub const LEVEL_STRICT: &str = "strict";
pub const LEVEL_EXPERIMENTAL: &str = "experimental";

/// Level used when no valid default is configured.
pub const FALLBACK_LEVEL: &str = LEVEL_BALANCED;

/// Ids stored by earlier configuration formats, mapped to current ids.
const LEGACY_ALIASES: [(&str, &str); 5] = [
    ("0", LEVEL_OFF),
    ("1", LEVEL_MINIMAL),
    ("2", LEVEL_BALANCED),
    ("3", LEVEL_STRICT),
    ("Experiment", LEVEL_EXPERIMENTAL),
];

/// Map a legacy level id onto its current name; other ids pass through.
pub fn canonical_level_id(id: &str) -> &str {
    LEGACY_ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == id)
        .map(|(_, current)| *current)
        .unwrap_or(id)
}

/// Single-purpose canvas presets: (id, text, description, canvas variant).
const CANVAS_PRESETS: [(&str, &str, &str, u32); 34] = [
    ("CanvasDefault", "Canvas protection default", "Flip the lowest bit of random channels", 1),
    ("CanvasBlank", "Canvas protection - Blank", "Return a blank white image", 2),
    ("CanvasMethod5", "Canvas protection - 5% noise", "Flip one channel of 5% of pixels", 3),
    ("CanvasMethod10", "Canvas protection - 10% noise", "Flip one channel of 10% of pixels", 4),
    ("CanvasFPRandomOff", "Canvas protection - FPRandom off", "Shift every RGB channel by one offset per image", 5),
    ("CanvasFPRandomOn", "Canvas protection - FPRandom on", "Shift every RGB channel by one offset per row", 6),
    ("CanvasPixelSmooth", "Canvas protection - Pixel smoothing 10%", "Blend neighbouring pixels", 7),
    ("CanvasNoise", "Canvas protection - Channel noise", "Flip one channel, alpha included, of 15% of pixels", 8),
    ("CanvasDefault2Bits", "Canvas protection default 2 bits", "Flip the two lowest bits of random channels", 9),
    ("CanvasDefault3Bits", "Canvas protection default 3 bits", "Flip the three lowest bits of random channels", 10),
    ("CanvasDefault4Bits", "Canvas protection default 4 bits", "Flip the four lowest bits of random channels", 11),
    ("CanvasDefault5Bits", "Canvas protection default 5 bits", "Flip the five lowest bits of random channels", 12),
    ("CanvasDefault6Bits", "Canvas protection default 6 bits", "Flip the six lowest bits of random channels", 13),
    ("CanvasDefault7Bits", "Canvas protection default 7 bits", "Flip the seven lowest bits of random channels", 14),
    ("CanvasMethod15", "Canvas protection - 15% negation", "Negate 15% of pixels", 15),
    ("CanvasMethod20", "Canvas protection - 20% negation", "Negate 20% of pixels", 16),
    ("CanvasMethod25", "Canvas protection - 25% negation", "Negate 25% of pixels", 17),
    ("CanvasMethod50", "Canvas protection - 50% negation", "Negate 50% of pixels", 18),
    ("CanvasPixelSmooth20", "Canvas protection - Pixel smoothing 20%", "Blend neighbouring pixels", 19),
    ("CanvasPixelSmooth30", "Canvas protection - Pixel smoothing 30%", "Blend neighbouring pixels", 20),
    ("CanvasPixelSmooth50", "Canvas protection - Pixel smoothing 50%", "Blend neighbouring pixels", 21),
    ("CanvasMapping1", "Canvas protection - Mapping thr. 1", "Remap colours of images with more than 1 colour", 22),
    ("CanvasMapping2", "Canvas protection - Mapping thr. 2", "Remap colours of images with more than 2 colours", 23),
    ("CanvasMapping3", "Canvas protection - Mapping thr. 3", "Remap colours of images with more than 3 colours", 24),
    ("CanvasMapping4", "Canvas protection - Mapping thr. 4", "Remap colours of images with more than 4 colours", 25),
    ("CanvasMapping5", "Canvas protection - Mapping thr. 5", "Remap colours of images with more than 5 colours", 26),
    ("CanvasMapping10", "Canvas protection - Mapping thr. 10", "Remap colours of images with more than 10 colours", 27),
    ("CanvasMapping50", "Canvas protection - Mapping thr. 50", "Remap colours of images with more than 50 colours", 28),
    ("CanvasMapping100", "Canvas protection - Mapping thr. 100", "Remap colours of images with more than 100 colours", 29),
    ("CanvasMapping1000", "Canvas protection - Mapping thr. 1000", "Remap colours of images with more than 1000 colours", 30),
    ("CanvasMapping10000", "Canvas protection - Mapping thr. 10000", "Remap colours of images with more than 10000 colours", 31),
    ("CanvasMapping100000", "Canvas protection - Mapping thr. 100000", "Remap colours of images with more than 100000 colours", 32),
    ("CanvasMapping1000000", "Canvas protection - Mapping thr. 1000000", "Remap colours of images with more than 1000000 colours", 33),
    ("CanvasMapping10000000", "Canvas protection - Mapping thr. 10000000", "Remap colours of images with more than 10000000 colours", 34),
];

fn assign(pairs: &[(&str, u32)]) -> Assignments {
    pairs.iter().map(|(g, v)| (g.to_string(), *v)).collect()
}

fn preset(id: &str, text: &str, description: &str, assignments: Assignments) -> Level {
    Level {
        id: id.to_string(),
        builtin: true,
        text: text.to_string(),
        description: description.to_string(),
        assignments,
    }
}

const MINIMAL: [(&str, u32); 12] = [
    ("time_precision", 3),
    ("net", 1),
    ("webworker", 3),
    ("geolocation", 3),
    ("physical_environment", 1),
    ("useridle", 1),
    ("coopschedule", 1),
    ("gamepads", 1),
    ("vr", 1),
    ("analytics", 1),
    ("battery", 1),
    ("nfc", 1),
];

const BALANCED: [(&str, u32); 20] = [
    ("time_precision", 3),
    ("htmlcanvaselement", 1),
    ("audiobuffer", 1),
    ("webgl", 1),
    ("plugins", 2),
    ("enumerateDevices", 2),
    ("hardware", 1),
    ("net", 1),
    ("webworker", 3),
    ("geolocation", 3),
    ("physical_environment", 1),
    ("useridle", 2),
    ("coopschedule", 1),
    ("gamepads", 1),
    ("vr", 1),
    ("analytics", 1),
    ("battery", 1),
    ("windowname", 1),
    ("nfc", 1),
    ("wasm", 1),
];

const STRICT: [(&str, u32); 20] = [
    ("time_precision", 3),
    ("htmlcanvaselement", 2),
    ("audiobuffer", 2),
    ("webgl", 2),
    ("plugins", 3),
    ("enumerateDevices", 3),
    ("hardware", 3),
    ("net", 1),
    ("webworker", 3),
    ("geolocation", 6),
    ("physical_environment", 1),
    ("useridle", 3),
    ("coopschedule", 1),
    ("gamepads", 1),
    ("vr", 1),
    ("playback", 2),
    ("analytics", 1),
    ("battery", 1),
    ("windowname", 1),
    ("nfc", 1),
];

const EXPERIMENTAL_EXTRA: [(&str, u32); 5] = [
    ("xhr", 1),
    ("arrays", 2),
    ("shared_array", 2),
    ("webworker", 2),
    ("playback", 3),
];

/// Every built-in level, coarse presets first.
pub fn builtin_levels() -> Vec<Level> {
    let mut experimental = assign(&STRICT);
    experimental.extend(assign(&EXPERIMENTAL_EXTRA));

    let mut levels = vec![
        preset(
            LEVEL_OFF,
            "Turn JavaScript protection off",
            "No API is modified",
            Assignments::new(),
        ),
        preset(
            LEVEL_MINIMAL,
            "Minimal",
            "Limits the APIs that are rarely needed and leak the most",
            assign(&MINIMAL),
        ),
        preset(
            LEVEL_BALANCED,
            "Balanced",
            "Farbles fingerprintable APIs so every site sees a different device",
            assign(&BALANCED),
        ),
        preset(
            LEVEL_STRICT,
            "Strict",
            "Returns fixed or empty values where possible; may break pages",
            assign(&STRICT),
        ),
        preset(
            LEVEL_EXPERIMENTAL,
            "Experimental",
            "Strict plus protections still being evaluated",
            experimental,
        ),
    ];

    levels.extend(CANVAS_PRESETS.iter().map(|(id, text, description, variant)| {
        preset(id, text, description, assign(&[(CANVAS_GROUP, *variant)]))
    }));

    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_unique() {
        let levels = builtin_levels();
        let ids: HashSet<_> = levels.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids.len(), levels.len());
    }

    #[test]
    fn test_builtin_assignments_are_valid() {
        let catalog = Catalog::builtin().unwrap();
        for level in builtin_levels() {
            for (group, &variant) in &level.assignments {
                let g = catalog
                    .get_group(group)
                    .unwrap_or_else(|| panic!("{} references unknown group {}", level.id, group));
                assert!(variant >= 1 && g.accepts(variant), "{}: {}={}", level.id, group, variant);
            }
        }
    }

    #[test]
    fn test_canvas_presets_cover_every_variant() {
        let variants: HashSet<u32> = builtin_levels()
            .iter()
            .filter(|l| l.id.starts_with("Canvas"))
            .filter_map(|l| l.assignments.get(CANVAS_GROUP).copied())
            .collect();
        assert_eq!(variants.len(), 34);
    }

    #[test]
    fn test_experimental_extends_strict() {
        let levels = builtin_levels();
        let strict = levels.iter().find(|l| l.id == LEVEL_STRICT).unwrap();
        let experimental = levels.iter().find(|l| l.id == LEVEL_EXPERIMENTAL).unwrap();
        assert_eq!(experimental.assignments["webworker"], 2);
        assert_eq!(experimental.assignments["xhr"], 1);
        assert_eq!(experimental.assignments["htmlcanvaselement"], strict.assignments["htmlcanvaselement"]);
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(canonical_level_id("2"), LEVEL_BALANCED);
        assert_eq!(canonical_level_id("Experiment"), LEVEL_EXPERIMENTAL);
        assert_eq!(canonical_level_id("my-level"), "my-level");
    }
}
