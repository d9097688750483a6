//! Protection catalog
//!
//! Static, read-only definition of the wrapping groups: each group is one
//! fingerprinting concern, a list of selectable variants (each carrying the
//! parameter tuple handed to the installed wrappers) and the native API
//! surfaces it governs.
//!
//! Variant indices are 1-based from the consumer's point of view; index `0`
//! means the group is disabled. Those indices are part of the persisted
//! configuration format, so variants are only ever appended.

mod groups;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::{AssumeAllPresent, CapabilityProbe};
use crate::error::{Result, ShieldError};

pub use groups::builtin_groups;

/// Group id of the canvas protection group.
pub const CANVAS_GROUP: &str = "htmlcanvaselement";
/// Group id of the audio protection group.
pub const AUDIO_GROUP: &str = "audiobuffer";

/// Mapping group id → variant index. Used for level assignments and tweaks.
pub type Assignments = BTreeMap<String, u32>;

/// One scalar of a variant parameter tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            ParamValue::Int(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
        }
    }
}

/// Parameter tuple of one variant, serialized as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantParams(pub Vec<ParamValue>);

impl VariantParams {
    pub fn first_int(&self) -> Option<i64> {
        self.0.first().and_then(ParamValue::as_int)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One selectable configuration point within a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub label: String,
    pub params: VariantParams,
}

/// A wrapping group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub label: String,
    pub variants: Vec<Variant>,
    pub surfaces: Vec<String>,
}

impl Group {
    /// Policy-only groups govern no surface directly.
    pub fn is_policy_only(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Whether `index` selects an existing variant (0 = disabled is valid).
    pub fn accepts(&self, index: u32) -> bool {
        (index as usize) <= self.variants.len()
    }
}

/// The finalized catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    groups: Vec<Group>,
    by_id: HashMap<String, usize>,
    surface_owner: HashMap<String, String>,
    /// Ids of groups meaningful in this environment, in declaration order.
    known: Vec<String>,
}

impl Catalog {
    /// Built-in catalog with every surface assumed present.
    pub fn builtin() -> Result<Self> {
        Self::from_groups(builtin_groups(), &AssumeAllPresent)
    }

    /// Built-in catalog pruned against the given environment.
    pub fn builtin_with_probe(probe: &dyn CapabilityProbe) -> Result<Self> {
        Self::from_groups(builtin_groups(), probe)
    }

    /// Finalize a catalog.
    ///
    /// Registering two groups under one id, or one surface under two groups,
    /// is a construction-time error.
    pub fn from_groups(groups: Vec<Group>, probe: &dyn CapabilityProbe) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(groups.len());
        let mut surface_owner = HashMap::new();
        let mut known = Vec::with_capacity(groups.len());

        for (idx, group) in groups.iter().enumerate() {
            if by_id.insert(group.id.clone(), idx).is_some() {
                return Err(ShieldError::DuplicateGroup(group.id.clone()));
            }
            for surface in &group.surfaces {
                if let Some(owner) = surface_owner.insert(surface.clone(), group.id.clone()) {
                    return Err(ShieldError::DuplicateSurface {
                        surface: surface.clone(),
                        group: owner,
                    });
                }
            }
            if group.is_policy_only() || !probe.all_surfaces_absent(&group.surfaces) {
                known.push(group.id.clone());
            } else {
                log::info!("Hiding group {}: no surface available", group.id);
            }
        }

        log::debug!(
            "Catalog finalized: {} groups, {} meaningful, {} surfaces",
            groups.len(),
            known.len(),
            surface_owner.len()
        );

        Ok(Self {
            groups,
            by_id,
            surface_owner,
            known,
        })
    }

    /// Groups meaningful in the current environment.
    pub fn list_groups(&self) -> impl Iterator<Item = &Group> {
        self.known.iter().filter_map(move |id| self.get_group(id))
    }

    /// Every registered group, including hidden ones.
    pub fn all_groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn get_group(&self, id: &str) -> Option<&Group> {
        self.by_id.get(id).map(|&idx| &self.groups[idx])
    }

    /// Surfaces governed by a group; empty for unknown groups.
    pub fn surfaces_for_group(&self, id: &str) -> &[String] {
        self.get_group(id)
            .map(|g| g.surfaces.as_slice())
            .unwrap_or(&[])
    }

    /// Parameters of variant `index` (1-based) of a group.
    pub fn get_variant(&self, group_id: &str, index: u32) -> Result<&VariantParams> {
        let group = self
            .get_group(group_id)
            .ok_or_else(|| ShieldError::UnknownGroup(group_id.to_string()))?;
        if index == 0 {
            return Err(ShieldError::InvalidVariant {
                group: group_id.to_string(),
                index,
            });
        }
        group
            .variants
            .get(index as usize - 1)
            .map(|v| &v.params)
            .ok_or_else(|| ShieldError::InvalidVariant {
                group: group_id.to_string(),
                index,
            })
    }

    /// Group governing a surface.
    pub fn group_for_surface(&self, surface: &str) -> Option<&str> {
        self.surface_owner.get(surface).map(String::as_str)
    }

    /// Whether the group is part of the composed schema.
    pub fn is_known(&self, id: &str) -> bool {
        self.known.iter().any(|k| k == id)
    }

    pub fn known_group_ids(&self) -> &[String] {
        &self.known
    }

    /// Schema with every meaningful group disabled.
    pub fn empty_schema(&self) -> Assignments {
        self.known.iter().map(|id| (id.clone(), 0)).collect()
    }
}
