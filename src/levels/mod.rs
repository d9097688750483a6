//! Level registry
//!
//! A level is a named bundle of per-group variant choices. The registry holds
//! the built-in presets plus the user's custom levels and is rebuilt in full
//! whenever the persisted configuration changes.
//!
//! Persisted levels store their group assignments as top-level numeric keys
//! next to the descriptive fields:
//!
//! ```json
//! { "level_id": "mine", "level_text": "Mine", "htmlcanvaselement": 3 }
//! ```

mod builtin;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::Assignments;
use crate::error::{Result, ShieldError};

pub use builtin::{
    builtin_levels, canonical_level_id, FALLBACK_LEVEL, LEVEL_BALANCED, LEVEL_EXPERIMENTAL,
    LEVEL_MINIMAL, LEVEL_OFF, LEVEL_STRICT,
};

/// A named bundle of group variant choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub id: String,
    pub builtin: bool,
    pub text: String,
    pub description: String,
    /// Groups absent from the map are disabled.
    pub assignments: Assignments,
}

impl Level {
    /// Variant the level selects for a group (0 when not assigned).
    pub fn variant_of(&self, group: &str) -> u32 {
        self.assignments.get(group).copied().unwrap_or(0)
    }
}

/// Persisted form of a level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub level_id: String,
    #[serde(default)]
    pub level_text: String,
    #[serde(default)]
    pub level_description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub builtin: bool,
    /// Group assignments plus whatever foreign keys older writers left behind.
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl From<LevelRecord> for Level {
    fn from(record: LevelRecord) -> Self {
        let assignments = record
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let variant = value.as_u64().and_then(|v| u32::try_from(v).ok())?;
                Some((key.clone(), variant))
            })
            .collect();

        Level {
            id: record.level_id,
            builtin: record.builtin,
            text: record.level_text,
            description: record.level_description,
            assignments,
        }
    }
}

impl From<&Level> for LevelRecord {
    fn from(level: &Level) -> Self {
        LevelRecord {
            level_id: level.id.clone(),
            level_text: level.text.clone(),
            level_description: level.description.clone(),
            builtin: level.builtin,
            fields: level
                .assignments
                .iter()
                .map(|(group, &variant)| (group.clone(), serde_json::Value::from(variant)))
                .collect(),
        }
    }
}

/// All levels known to the engine, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct LevelRegistry {
    levels: HashMap<String, Level>,
}

impl LevelRegistry {
    /// Registry holding only the built-in presets.
    pub fn init_builtins() -> Self {
        let levels = builtin_levels()
            .into_iter()
            .map(|level| (level.id.clone(), level))
            .collect();
        Self { levels }
    }

    /// Merge user-authored levels on top; custom entries win on id collision.
    ///
    /// The map key is authoritative for the id.
    pub fn load_custom(&mut self, custom: &BTreeMap<String, LevelRecord>) {
        for (key, record) in custom {
            let mut level = Level::from(record.clone());
            if level.id != *key {
                log::debug!("Custom level {} stored under key {}", level.id, key);
                level.id = key.clone();
            }
            level.builtin = false;
            if self.levels.insert(key.clone(), level).is_some() {
                log::info!("🛡️ Custom level {} overrides a built-in level", key);
            }
        }
    }

    /// Look up a level, accepting legacy ids.
    pub fn resolve_level(&self, id: &str) -> Result<&Level> {
        self.levels
            .get(id)
            .or_else(|| self.levels.get(canonical_level_id(id)))
            .ok_or_else(|| ShieldError::UnknownLevel(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resolve_level(id).is_ok()
    }

    /// Id under which a (possibly legacy) id is stored.
    pub fn canonical_id(&self, id: &str) -> Option<String> {
        self.resolve_level(id).ok().map(|level| level.id.clone())
    }

    /// User-authored levels in persisted form.
    pub fn custom_records(&self) -> BTreeMap<String, LevelRecord> {
        self.levels
            .values()
            .filter(|level| !level.builtin)
            .map(|level| (level.id.clone(), LevelRecord::from(level)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> LevelRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_record_keeps_numeric_keys_only() {
        let level = Level::from(record(
            r#"{"level_id":"mine","level_text":"Mine","htmlcanvaselement":3,
                "wrappers":[],"tweaks":{"webgl":1},"webgl":-1}"#,
        ));
        assert_eq!(level.id, "mine");
        assert_eq!(level.text, "Mine");
        assert_eq!(level.assignments.len(), 1);
        assert_eq!(level.variant_of("htmlcanvaselement"), 3);
        assert_eq!(level.variant_of("webgl"), 0);
    }

    #[test]
    fn test_record_serializes_flat() {
        let level = Level {
            id: "mine".into(),
            builtin: false,
            text: "Mine".into(),
            description: String::new(),
            assignments: [("audiobuffer".to_string(), 2)].into_iter().collect(),
        };
        let json = serde_json::to_value(LevelRecord::from(&level)).unwrap();
        assert_eq!(json["audiobuffer"], 2);
        assert_eq!(json["level_id"], "mine");
        assert!(json.get("builtin").is_none());
    }

    #[test]
    fn test_custom_level_wins() {
        let mut registry = LevelRegistry::init_builtins();
        let builtin_count = registry.len();
        let mut custom = BTreeMap::new();
        custom.insert(
            LEVEL_STRICT.to_string(),
            record(r#"{"level_id":"strict","level_text":"Mine","webgl":1}"#),
        );
        custom.insert(
            "fresh".to_string(),
            record(r#"{"level_id":"fresh","audiobuffer":1}"#),
        );
        registry.load_custom(&custom);

        assert_eq!(registry.len(), builtin_count + 1);
        let strict = registry.resolve_level(LEVEL_STRICT).unwrap();
        assert!(!strict.builtin);
        assert_eq!(strict.variant_of("webgl"), 1);
        assert_eq!(strict.variant_of("htmlcanvaselement"), 0);
        assert_eq!(registry.custom_records().len(), 2);
    }

    #[test]
    fn test_unknown_level() {
        let registry = LevelRegistry::init_builtins();
        assert_eq!(
            registry.resolve_level("deleted").unwrap_err(),
            ShieldError::UnknownLevel("deleted".into())
        );
    }

    #[test]
    fn test_legacy_ids_resolve() {
        let registry = LevelRegistry::init_builtins();
        assert_eq!(registry.resolve_level("3").unwrap().id, LEVEL_STRICT);
        assert_eq!(registry.canonical_id("1").as_deref(), Some(LEVEL_MINIMAL));
        assert_eq!(registry.canonical_id("nope"), None);
    }
}
