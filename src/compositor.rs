//! Level compositor
//!
//! Flattens a level plus optional per-domain tweaks into the concrete
//! assignment map consumed by the wrapper installer:
//!
//! 1. every group the catalog knows, disabled
//! 2. the level's assignments
//! 3. the tweaks, entry by entry
//! 4. keys outside the known schema dropped
//!
//! Wrappers (surface + parameter tuple) are only materialized when first
//! requested.

use std::cell::OnceCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::catalog::{Assignments, Catalog, VariantParams};
use crate::levels::Level;

/// One surface to wrap together with the parameters of the selected variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wrapper {
    pub surface: String,
    pub params: VariantParams,
}

/// Effective protection for one lookup.
///
/// Never mutated once handed out; callers ask the engine for a fresh one after
/// a configuration change.
#[derive(Debug, Clone)]
pub struct ResolvedLevel {
    pub level_id: String,
    pub level_text: String,
    pub is_default: bool,
    /// Configured domain the lookup matched, if any.
    pub matched_domain: Option<String>,
    pub tweaks: Option<Assignments>,
    pub restore: Option<String>,
    pub restore_tweaks: Option<Assignments>,
    assignments: Assignments,
    catalog: Rc<Catalog>,
    wrappers: OnceCell<Vec<Wrapper>>,
}

impl ResolvedLevel {
    /// Flattened group → variant map, covering exactly the known groups.
    pub fn assignments(&self) -> &Assignments {
        &self.assignments
    }

    pub fn variant_of(&self, group: &str) -> u32 {
        self.assignments.get(group).copied().unwrap_or(0)
    }

    /// Parameters of the variant selected for a group, if enabled.
    pub fn params_of(&self, group: &str) -> Option<&VariantParams> {
        match self.variant_of(group) {
            0 => None,
            index => self.catalog.get_variant(group, index).ok(),
        }
    }

    /// Surfaces to wrap, computed on first use.
    pub fn wrappers(&self) -> &[Wrapper] {
        self.wrappers
            .get_or_init(|| materialize_wrappers(&self.catalog, &self.assignments))
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub(crate) fn mark_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub(crate) fn with_domain(mut self, domain: &str) -> Self {
        self.matched_domain = Some(domain.to_string());
        self
    }

    pub(crate) fn with_restore(
        mut self,
        restore: Option<String>,
        restore_tweaks: Option<Assignments>,
    ) -> Self {
        self.restore = restore;
        self.restore_tweaks = restore_tweaks;
        self
    }
}

/// Compose the assignment map for a level and optional tweaks.
///
/// Variant indices out of range for their group are clamped to 0.
pub fn compose_assignments(
    catalog: &Catalog,
    level: &Level,
    tweaks: Option<&Assignments>,
) -> Assignments {
    let mut working = catalog.empty_schema();

    let layers = std::iter::once(&level.assignments).chain(tweaks);
    for layer in layers {
        for (group, &variant) in layer {
            if !catalog.is_known(group) {
                if catalog.get_group(group).is_none() {
                    log::warn!("⚠️ Dropping unknown group {} from level {}", group, level.id);
                }
                continue;
            }
            working.insert(group.clone(), variant);
        }
    }

    for (group, variant) in working.iter_mut() {
        let valid = catalog
            .get_group(group)
            .map(|g| g.accepts(*variant))
            .unwrap_or(false);
        if !valid {
            log::warn!(
                "⚠️ Invalid variant {} for group {} in level {}, disabling",
                variant,
                group,
                level.id
            );
            *variant = 0;
        }
    }

    working
}

/// Compose a level and optional tweaks into a resolved level.
pub fn compose(catalog: &Rc<Catalog>, level: &Level, tweaks: Option<&Assignments>) -> ResolvedLevel {
    ResolvedLevel {
        level_id: level.id.clone(),
        level_text: level.text.clone(),
        is_default: false,
        matched_domain: None,
        tweaks: tweaks.filter(|t| !t.is_empty()).cloned(),
        restore: None,
        restore_tweaks: None,
        assignments: compose_assignments(catalog, level, tweaks),
        catalog: Rc::clone(catalog),
        wrappers: OnceCell::new(),
    }
}

/// Drop tweak entries the level already produces.
///
/// Returns `None` when nothing remains.
pub fn prune_redundant_tweaks(level: &Level, tweaks: &Assignments) -> Option<Assignments> {
    let pruned: Assignments = tweaks
        .iter()
        .filter(|(group, &variant)| variant != level.variant_of(group))
        .map(|(group, &variant)| (group.clone(), variant))
        .collect();

    if pruned.is_empty() {
        None
    } else {
        Some(pruned)
    }
}

/// Wrapper list for an assignment map.
pub fn materialize_wrappers(catalog: &Catalog, assignments: &Assignments) -> Vec<Wrapper> {
    let mut wrappers = Vec::new();
    for group in catalog.list_groups() {
        let index = assignments.get(&group.id).copied().unwrap_or(0);
        if index == 0 {
            continue;
        }
        let params = match catalog.get_variant(&group.id, index) {
            Ok(params) => params,
            Err(e) => {
                log::warn!("⚠️ {}", e);
                continue;
            }
        };
        wrappers.extend(group.surfaces.iter().map(|surface| Wrapper {
            surface: surface.clone(),
            params: params.clone(),
        }));
    }
    wrappers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CANVAS_GROUP;
    use crate::levels::{LevelRegistry, LEVEL_BALANCED, LEVEL_OFF};

    fn catalog() -> Rc<Catalog> {
        Rc::new(Catalog::builtin().unwrap())
    }

    fn tweaks(pairs: &[(&str, u32)]) -> Assignments {
        pairs.iter().map(|(g, v)| (g.to_string(), *v)).collect()
    }

    #[test]
    fn test_compose_covers_schema() {
        let catalog = catalog();
        let levels = LevelRegistry::init_builtins();
        let off = levels.resolve_level(LEVEL_OFF).unwrap();
        let resolved = compose(&catalog, off, None);
        assert_eq!(resolved.assignments().len(), catalog.known_group_ids().len());
        assert!(resolved.assignments().values().all(|&v| v == 0));
        assert!(resolved.wrappers().is_empty());
    }

    #[test]
    fn test_tweaks_override_level() {
        let catalog = catalog();
        let levels = LevelRegistry::init_builtins();
        let balanced = levels.resolve_level(LEVEL_BALANCED).unwrap();
        let t = tweaks(&[(CANVAS_GROUP, 5), ("webgl", 0), ("bogus", 1)]);
        let resolved = compose(&catalog, balanced, Some(&t));

        assert_eq!(resolved.variant_of(CANVAS_GROUP), 5);
        assert_eq!(resolved.variant_of("webgl"), 0);
        assert!(!resolved.assignments().contains_key("bogus"));
        assert_eq!(resolved.params_of(CANVAS_GROUP).unwrap().first_int(), Some(4));
    }

    #[test]
    fn test_invalid_variant_disables_group() {
        let catalog = catalog();
        let levels = LevelRegistry::init_builtins();
        let balanced = levels.resolve_level(LEVEL_BALANCED).unwrap();
        let t = tweaks(&[("audiobuffer", 9)]);
        let resolved = compose(&catalog, balanced, Some(&t));
        assert_eq!(resolved.variant_of("audiobuffer"), 0);
    }

    #[test]
    fn test_compose_idempotent() {
        let catalog = catalog();
        let levels = LevelRegistry::init_builtins();
        let balanced = levels.resolve_level(LEVEL_BALANCED).unwrap();
        let t = tweaks(&[("plugins", 3)]);
        let a = compose_assignments(&catalog, balanced, Some(&t));
        let b = compose_assignments(&catalog, balanced, Some(&t));
        assert_eq!(a, b);
    }

    #[test]
    fn test_prune_redundant_tweaks() {
        let levels = LevelRegistry::init_builtins();
        let balanced = levels.resolve_level(LEVEL_BALANCED).unwrap();

        let same = tweaks(&[(CANVAS_GROUP, 1), ("plugins", 2), ("xhr", 0)]);
        assert_eq!(prune_redundant_tweaks(balanced, &same), None);

        let mixed = tweaks(&[(CANVAS_GROUP, 1), ("xhr", 2)]);
        assert_eq!(
            prune_redundant_tweaks(balanced, &mixed),
            Some(tweaks(&[("xhr", 2)]))
        );
    }

    #[test]
    fn test_wrappers_pair_surfaces_with_params() {
        let catalog = catalog();
        let levels = LevelRegistry::init_builtins();
        let balanced = levels.resolve_level(LEVEL_BALANCED).unwrap();
        let resolved = compose(&catalog, balanced, None);

        let canvas: Vec<_> = resolved
            .wrappers()
            .iter()
            .filter(|w| w.surface.starts_with("HTMLCanvasElement"))
            .collect();
        assert_eq!(canvas.len(), 2);
        assert!(canvas.iter().all(|w| w.params.first_int() == Some(0)));
        // Policy-only groups contribute no wrapper.
        assert_eq!(
            resolved.wrappers().len(),
            catalog
                .list_groups()
                .filter(|g| resolved.variant_of(&g.id) != 0)
                .map(|g| g.surfaces.len())
                .sum::<usize>()
        );
    }
}
