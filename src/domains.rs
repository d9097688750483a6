//! Domain resolver
//!
//! Maps visited origins onto per-domain entries. The lookup walks the host and
//! each of its parent domains, most specific first, and stops at the first
//! configured entry:
//!
//! ```text
//! https://a.b.example.com/x  →  a.b.example.com, b.example.com, example.com
//! ```
//!
//! There is no best-match search. Effective-domain extraction goes through
//! [`DomainExtractor`] so a public-suffix aware implementation can be plugged
//! in; [`HostExtractor`] is a conservative default.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use url::{Host, ParseError, Url};

use crate::catalog::Assignments;
use crate::levels::{Level, LevelRegistry, FALLBACK_LEVEL};

/// Per-domain override as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntry {
    pub level_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweaks: Option<Assignments>,
    /// Setting superseded by an automatic override, reinstated on undo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_tweaks: Option<Assignments>,
}

impl DomainEntry {
    pub fn new(level_id: impl Into<String>, tweaks: Option<Assignments>) -> Self {
        Self {
            level_id: level_id.into(),
            tweaks,
            restore: None,
            restore_tweaks: None,
        }
    }
}

/// Canonical spelling of a domain key: lowercase, no trailing dots.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Effective-domain extraction seam.
pub trait DomainExtractor {
    /// Host of an origin URL (or bare host), normalized. `None` when no host
    /// can be derived.
    fn host(&self, origin: &str) -> Option<String>;

    /// Registrable domain of a normalized host; the walk never goes above it.
    fn registrable_domain(&self, host: &str) -> String;
}

/// Extractor without public-suffix knowledge.
///
/// Origins are parsed as WHATWG URLs; input without a scheme is read as a
/// bare host. The registrable domain is the last two labels, so multi-label
/// suffixes such as `co.uk` are treated as a site of their own. IP literals
/// and single-label hosts are their own registrable domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostExtractor;

impl DomainExtractor for HostExtractor {
    fn host(&self, origin: &str) -> Option<String> {
        let origin = origin.trim();
        let url = match Url::parse(origin) {
            Ok(url) => url,
            Err(ParseError::RelativeUrlWithoutBase) => {
                Url::parse(&format!("http://{}", origin)).ok()?
            }
            Err(_) => return None,
        };

        let host = match url.host()? {
            Host::Domain(domain) => normalize_domain(domain),
            Host::Ipv4(addr) => addr.to_string(),
            Host::Ipv6(addr) => addr.to_string(),
        };
        if host.is_empty() {
            None
        } else {
            Some(host)
        }
    }

    fn registrable_domain(&self, host: &str) -> String {
        if host.parse::<IpAddr>().is_ok() {
            return host.to_string();
        }
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() <= 2 {
            return host.to_string();
        }
        labels[labels.len() - 2..].join(".")
    }
}

/// Candidate keys for an origin, most specific first.
pub fn candidate_domains(extractor: &dyn DomainExtractor, origin: &str) -> Vec<String> {
    let Some(host) = extractor.host(origin) else {
        return Vec::new();
    };
    let registrable = extractor.registrable_domain(&host);

    let mut candidates = vec![host.clone()];
    let mut current = host.as_str();
    while current != registrable {
        match current.split_once('.') {
            Some((_, parent)) if parent.len() >= registrable.len() => {
                candidates.push(parent.to_string());
                current = parent;
            }
            _ => break,
        }
    }
    candidates
}

/// Per-domain entries plus the process-wide default level id.
#[derive(Clone)]
pub struct DomainResolver {
    domains: BTreeMap<String, DomainEntry>,
    default_level_id: String,
    extractor: Rc<dyn DomainExtractor>,
}

impl std::fmt::Debug for DomainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainResolver")
            .field("domains", &self.domains)
            .field("default_level_id", &self.default_level_id)
            .finish()
    }
}

impl DomainResolver {
    pub fn new(default_level_id: impl Into<String>) -> Self {
        Self::with_extractor(default_level_id, Rc::new(HostExtractor))
    }

    pub fn with_extractor(
        default_level_id: impl Into<String>,
        extractor: Rc<dyn DomainExtractor>,
    ) -> Self {
        Self {
            domains: BTreeMap::new(),
            default_level_id: default_level_id.into(),
            extractor,
        }
    }

    pub fn extractor(&self) -> Rc<dyn DomainExtractor> {
        Rc::clone(&self.extractor)
    }

    /// First configured entry along the candidate walk.
    pub fn find(&self, origin: &str) -> Option<(&str, &DomainEntry)> {
        candidate_domains(self.extractor.as_ref(), origin)
            .into_iter()
            .find_map(|candidate| self.domains.get_key_value(&candidate))
            .map(|(domain, entry)| (domain.as_str(), entry))
    }

    /// Insert or replace the entry for a domain.
    pub fn set_domain(&mut self, domain: &str, level_id: &str, tweaks: Option<Assignments>) {
        let key = normalize_domain(domain);
        log::debug!("Domain {} set to level {}", key, level_id);
        self.domains.insert(key, DomainEntry::new(level_id, tweaks));
    }

    /// Insert a complete entry, restore markers included.
    pub fn insert_entry(&mut self, domain: &str, entry: DomainEntry) {
        self.domains.insert(normalize_domain(domain), entry);
    }

    pub fn remove_domain(&mut self, domain: &str) -> Option<DomainEntry> {
        self.domains.remove(&normalize_domain(domain))
    }

    pub fn get(&self, domain: &str) -> Option<&DomainEntry> {
        self.domains.get(&normalize_domain(domain))
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains_key(&normalize_domain(domain))
    }

    pub fn entries(&self) -> &BTreeMap<String, DomainEntry> {
        &self.domains
    }

    pub fn default_level_id(&self) -> &str {
        &self.default_level_id
    }

    /// Change the default level.
    ///
    /// An unknown id leaves the last known-good default in place.
    pub fn set_default(&mut self, level_id: &str, levels: &LevelRegistry) -> bool {
        match levels.canonical_id(level_id) {
            Some(id) => {
                log::info!("🛡️ Default level set to {}", id);
                self.default_level_id = id;
                true
            }
            None => {
                log::warn!(
                    "⚠️ Unknown default level {}, keeping {}",
                    level_id,
                    self.default_level_id
                );
                false
            }
        }
    }

    /// The default level, falling back to the built-in fallback level.
    pub fn default_level<'a>(&self, levels: &'a LevelRegistry) -> Option<&'a Level> {
        levels
            .resolve_level(&self.default_level_id)
            .or_else(|_| levels.resolve_level(FALLBACK_LEVEL))
            .ok()
    }
}
