//! Persisted configuration and the registry built from it
//!
//! The persisted document holds three keys:
//!
//! - `custom_levels`: level id → level object
//! - `domains`: domain → `{ level_id, tweaks?, restore?, restore_tweaks? }`
//! - `__default__`: default level id
//!
//! A [`Registry`] (levels + domain resolver) is rebuilt from scratch for every
//! snapshot. [`ConfigurationStore`] owns the snapshot currently in force and
//! the generation counter that keeps overlapping reloads from applying out of
//! order.

mod readiness;
mod store;

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::{Assignments, Catalog};
use crate::compositor::{compose, prune_redundant_tweaks, ResolvedLevel};
use crate::domains::{normalize_domain, DomainEntry, DomainExtractor, DomainResolver};
use crate::error::{Result, ShieldError};
use crate::levels::{builtin_levels, Level, LevelRecord, LevelRegistry, FALLBACK_LEVEL};

pub use readiness::{ReadinessFlag, ReadinessGate};
pub use store::{ConfigBackend, LocalStorageBackend, MemoryBackend, STORAGE_KEY};

/// The persisted configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub custom_levels: BTreeMap<String, LevelRecord>,
    #[serde(default, deserialize_with = "lenient_domains")]
    pub domains: BTreeMap<String, DomainEntry>,
    #[serde(rename = "__default__", default, skip_serializing_if = "Option::is_none")]
    pub default_level: Option<String>,
}

impl ConfigSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Domain entries that fail to parse are dropped instead of failing the
/// whole document.
fn lenient_domains<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, DomainEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(domain, value)| match serde_json::from_value(value) {
            Ok(entry) => Some((domain, entry)),
            Err(e) => {
                let err = ShieldError::MalformedDomainEntry {
                    domain,
                    reason: e.to_string(),
                };
                log::warn!("⚠️ {}", err);
                None
            }
        })
        .collect())
}

/// Automatically applied per-domain override.
///
/// Only merged while its level is the default level and the user has no entry
/// of their own for the domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainPolicy {
    pub domain: String,
    pub level_id: String,
    #[serde(default)]
    pub tweaks: Option<Assignments>,
}

/// Levels plus domain resolver for one snapshot.
#[derive(Debug, Clone)]
pub struct Registry {
    pub levels: LevelRegistry,
    pub resolver: DomainResolver,
    needs_default_write_back: bool,
}

impl Registry {
    /// Build the registry for a snapshot.
    pub fn build(
        snapshot: &ConfigSnapshot,
        policies: &[DomainPolicy],
        fallback_level: &str,
        extractor: Rc<dyn DomainExtractor>,
    ) -> Self {
        let mut levels = LevelRegistry::init_builtins();
        levels.load_custom(&snapshot.custom_levels);

        let stored_default = snapshot
            .default_level
            .as_deref()
            .and_then(|id| levels.canonical_id(id));
        let needs_default_write_back = stored_default.is_none();
        let default_id = stored_default.unwrap_or_else(|| {
            let fallback = levels
                .canonical_id(fallback_level)
                .unwrap_or_else(|| FALLBACK_LEVEL.to_string());
            if let Some(stored) = &snapshot.default_level {
                log::warn!("⚠️ Unknown default level {}, using {}", stored, fallback);
            }
            fallback
        });

        let mut resolver = DomainResolver::with_extractor(default_id.clone(), extractor);
        for (domain, entry) in &snapshot.domains {
            resolver.insert_entry(domain, entry.clone());
        }
        for policy in policies {
            let policy_level = levels.canonical_id(&policy.level_id);
            if policy_level.as_deref() == Some(default_id.as_str())
                && !resolver.contains(&policy.domain)
            {
                resolver.insert_entry(
                    &policy.domain,
                    DomainEntry::new(policy.level_id.clone(), policy.tweaks.clone()),
                );
            }
        }

        log::debug!(
            "Registry built: {} levels, {} domains, default {}",
            levels.len(),
            resolver.entries().len(),
            default_id
        );

        Self {
            levels,
            resolver,
            needs_default_write_back,
        }
    }

    /// Whether the stored default was absent or invalid.
    pub fn needs_default_write_back(&self) -> bool {
        self.needs_default_write_back
    }

    /// Resolve the effective protection for an origin.
    pub fn lookup(&self, catalog: &Rc<Catalog>, origin: &str) -> ResolvedLevel {
        let Some((domain, entry)) = self.resolver.find(origin) else {
            return self.default_resolved(catalog);
        };
        match self.levels.resolve_level(&entry.level_id) {
            Ok(level) => compose(catalog, level, entry.tweaks.as_ref())
                .with_domain(domain)
                .with_restore(entry.restore.clone(), entry.restore_tweaks.clone()),
            Err(e) => {
                log::warn!("⚠️ {} (domain {}), using default level", e, domain);
                self.default_resolved(catalog).with_domain(domain)
            }
        }
    }

    /// The default level, composed.
    pub fn default_resolved(&self, catalog: &Rc<Catalog>) -> ResolvedLevel {
        match self.resolver.default_level(&self.levels) {
            Some(level) => compose(catalog, level, None).mark_default(),
            None => compose(catalog, &fallback_level(), None).mark_default(),
        }
    }

    /// Persisted form of this registry.
    ///
    /// Tweaks for groups the catalog does not register are dropped, the rest
    /// are pruned against their level. Entries identical to an active domain
    /// policy are left out (they are re-merged on load).
    pub fn to_snapshot(&self, catalog: &Catalog, policies: &[DomainPolicy]) -> ConfigSnapshot {
        let default_id = self.resolver.default_level_id();
        let mut domains = BTreeMap::new();

        for (domain, entry) in self.resolver.entries() {
            let key = normalize_domain(domain);
            let level = self.levels.resolve_level(&entry.level_id).ok();
            let tweaks = saved_tweaks(catalog, level, entry.tweaks.as_ref());

            let policy_copy = policies.iter().any(|policy| {
                normalize_domain(&policy.domain) == key
                    && self.levels.canonical_id(&policy.level_id).as_deref() == Some(default_id)
                    && policy.level_id == entry.level_id
                    && saved_tweaks(catalog, level, policy.tweaks.as_ref()) == tweaks
                    && entry.restore.is_none()
            });
            if policy_copy {
                continue;
            }

            let mut saved = DomainEntry::new(entry.level_id.clone(), tweaks);
            if entry.restore.is_some() {
                saved.restore = entry.restore.clone();
                saved.restore_tweaks = entry
                    .restore_tweaks
                    .as_ref()
                    .map(|t| registered_tweaks(catalog, t))
                    .filter(|t| !t.is_empty());
            }
            domains.insert(key, saved);
        }

        ConfigSnapshot {
            custom_levels: self.levels.custom_records(),
            domains,
            default_level: Some(default_id.to_string()),
        }
    }
}

/// Tweaks restricted to groups registered in the catalog.
fn registered_tweaks(catalog: &Catalog, tweaks: &Assignments) -> Assignments {
    tweaks
        .iter()
        .filter(|(group, _)| {
            let registered = catalog.get_group(group).is_some();
            if !registered {
                log::debug!("Dropping tweak for unknown group {}", group);
            }
            registered
        })
        .map(|(group, variant)| (group.clone(), *variant))
        .collect()
}

/// Tweaks as written out for an entry: registered groups only, minus those
/// equal to the level's own choice when the level is known.
fn saved_tweaks(
    catalog: &Catalog,
    level: Option<&Level>,
    tweaks: Option<&Assignments>,
) -> Option<Assignments> {
    let tweaks = registered_tweaks(catalog, tweaks?);
    match level {
        Some(level) => prune_redundant_tweaks(level, &tweaks),
        None => Some(tweaks).filter(|t| !t.is_empty()),
    }
}

/// Built-in fallback level, used only if the registry lost it.
fn fallback_level() -> Level {
    builtin_levels()
        .into_iter()
        .find(|level| level.id == FALLBACK_LEVEL)
        .unwrap_or(Level {
            id: FALLBACK_LEVEL.to_string(),
            builtin: true,
            text: String::new(),
            description: String::new(),
            assignments: Assignments::new(),
        })
}

/// Holder of the snapshot currently in force.
///
/// Between reloads the snapshot is read-only; a reload replaces it as a whole.
#[derive(Debug, Default)]
pub struct ConfigurationStore {
    snapshot: ConfigSnapshot,
    issued: u64,
    applied: u64,
}

impl ConfigurationStore {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            snapshot,
            issued: 0,
            applied: 0,
        }
    }

    pub fn current_snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Replace the snapshot in force.
    pub fn reload(&mut self, snapshot: ConfigSnapshot) {
        self.snapshot = snapshot;
    }

    /// Ticket for a reload about to start.
    pub fn begin_reload(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Apply a loaded snapshot unless a newer reload already landed.
    pub fn finish_reload(&mut self, ticket: u64, snapshot: ConfigSnapshot) -> bool {
        if ticket <= self.applied {
            log::debug!("Dropping stale configuration load #{}", ticket);
            return false;
        }
        self.applied = ticket;
        self.reload(snapshot);
        true
    }

    pub fn generation(&self) -> u64 {
        self.applied
    }
}
