//! Protection engine
//!
//! Owns the catalog, the configuration store and the registry built from it,
//! and answers the two questions the wrapper installer asks:
//!
//! - which surfaces to wrap for an origin, with which parameters
//! - how to farble a given buffer for an origin
//!
//! All state is single-threaded (`Rc`/`RefCell`). Loading and saving the
//! configuration are the only `async` operations; everything else runs to
//! completion inline.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityProbe;
use crate::catalog::{Assignments, Catalog, AUDIO_GROUP, CANVAS_GROUP};
use crate::compositor::{ResolvedLevel, Wrapper};
use crate::config::{
    ConfigBackend, ConfigSnapshot, ConfigurationStore, DomainPolicy, ReadinessFlag, ReadinessGate,
    Registry,
};
use crate::domains::{DomainEntry, DomainExtractor, HostExtractor};
use crate::error::{Result, ShieldError};
use crate::farbling::{
    self, AudioProtection, CanvasProtection, DomainIdentity, Geometry, SessionKey,
};
use crate::levels::FALLBACK_LEVEL;

/// Hosts kept in each per-host cache before it is flushed.
pub const MAX_CACHED_HOSTS: usize = 1024;

/// Insert into a per-host cache, flushing it first when full.
fn insert_bounded<V>(cache: &mut HashMap<String, V>, key: String, value: V) {
    if cache.len() >= MAX_CACHED_HOSTS && !cache.contains_key(&key) {
        log::debug!("Host cache full ({} entries), flushing", cache.len());
        cache.clear();
    }
    cache.insert(key, value);
}

/// Engine options, deserializable from a partial JS object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Default level when none (or an unknown one) is stored.
    pub fallback_level: String,
    /// Hide groups whose surfaces do not exist in this environment.
    pub probe_capabilities: bool,
    /// Automatically applied per-domain overrides.
    pub domain_policies: Vec<DomainPolicy>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fallback_level: FALLBACK_LEVEL.to_string(),
            probe_capabilities: true,
            domain_policies: Vec::new(),
        }
    }
}

/// Engine counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Resolution requests
    pub lookups: u64,
    /// Requests answered from the cache
    pub cache_hits: u64,
    /// Applied configuration loads
    pub reloads: u64,
    /// Loads or saves that failed
    pub store_failures: u64,
    /// Buffers farbled
    pub farbled_buffers: u64,
}

pub struct ProtectionEngine {
    catalog: Rc<Catalog>,
    backend: Rc<dyn ConfigBackend>,
    extractor: Rc<dyn DomainExtractor>,
    options: EngineOptions,
    store: RefCell<ConfigurationStore>,
    registry: RefCell<Registry>,
    resolved_cache: RefCell<HashMap<String, Rc<ResolvedLevel>>>,
    session: RefCell<Option<SessionKey>>,
    identities: RefCell<HashMap<String, DomainIdentity>>,
    readiness: ReadinessGate,
    stats: RefCell<EngineStats>,
}

impl std::fmt::Debug for ProtectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionEngine")
            .field("options", &self.options)
            .field("readiness", &self.readiness)
            .field("stats", &self.stats.borrow())
            .finish()
    }
}

impl ProtectionEngine {
    /// Engine over the built-in catalog.
    ///
    /// With `probe_capabilities` set, groups are pruned against the live JS
    /// environment in WebAssembly builds; native builds assume every surface.
    pub fn new(backend: Rc<dyn ConfigBackend>, options: EngineOptions) -> Result<Self> {
        let catalog = if options.probe_capabilities {
            Catalog::builtin_with_probe(default_probe().as_ref())?
        } else {
            Catalog::builtin()?
        };
        Ok(Self::with_parts(
            Rc::new(catalog),
            backend,
            Rc::new(HostExtractor),
            options,
        ))
    }

    /// Engine over an explicit catalog and domain extractor.
    pub fn with_parts(
        catalog: Rc<Catalog>,
        backend: Rc<dyn ConfigBackend>,
        extractor: Rc<dyn DomainExtractor>,
        options: EngineOptions,
    ) -> Self {
        let store = ConfigurationStore::default();
        let registry = Registry::build(
            store.current_snapshot(),
            &options.domain_policies,
            &options.fallback_level,
            Rc::clone(&extractor),
        );
        Self {
            catalog,
            backend,
            extractor,
            options,
            store: RefCell::new(store),
            registry: RefCell::new(registry),
            resolved_cache: RefCell::new(HashMap::new()),
            session: RefCell::new(None),
            identities: RefCell::new(HashMap::new()),
            readiness: ReadinessGate::new(),
            stats: RefCell::new(EngineStats::default()),
        }
    }

    pub fn catalog(&self) -> &Rc<Catalog> {
        &self.catalog
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    // ===== Lifecycle =====

    /// Load the configuration and the farbling session, then release queued
    /// ready callbacks.
    ///
    /// A failing store does not fail initialization: the built-in defaults
    /// stay in force until a later reload succeeds.
    pub async fn initialize(&self) -> Result<()> {
        if let Err(e) = self.refresh().await {
            log::warn!("⚠️ Starting with built-in configuration: {}", e);
        }
        self.readiness.mark(ReadinessFlag::BaseConfig);

        if self.session.borrow().is_none() {
            self.attach_session(SessionKey::generate()?);
        } else {
            self.readiness.mark(ReadinessFlag::FarblingConfig);
        }
        log::info!("🛡️ Protection engine ready");
        Ok(())
    }

    /// Reload the whole configuration from the backend.
    ///
    /// On failure the previously loaded snapshot stays authoritative. When
    /// loads overlap, only the most recently started one is applied.
    pub async fn refresh(&self) -> Result<()> {
        let ticket = self.store.borrow_mut().begin_reload();
        log::debug!("🔄 Reloading configuration (#{})", ticket);

        let snapshot = match self.backend.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.stats.borrow_mut().store_failures += 1;
                log::warn!("⚠️ Configuration load failed, keeping previous: {}", e);
                return Err(e);
            }
        };

        if !self.store.borrow_mut().finish_reload(ticket, snapshot) {
            return Ok(());
        }
        self.rebuild_registry();
        self.stats.borrow_mut().reloads += 1;
        Ok(())
    }

    /// React to a "configuration changed" notification from the store.
    pub async fn notify_changed(&self) -> Result<()> {
        self.refresh().await
    }

    /// Write the current registry through the backend.
    pub async fn persist(&self) -> Result<()> {
        let snapshot = self
            .registry
            .borrow()
            .to_snapshot(&self.catalog, &self.options.domain_policies);

        if let Err(e) = self.backend.save(&snapshot).await {
            self.stats.borrow_mut().store_failures += 1;
            log::warn!("⚠️ Configuration save failed: {}", e);
            return Err(e);
        }
        // Supersedes loads still in flight.
        let ticket = self.store.borrow_mut().begin_reload();
        if self.store.borrow_mut().finish_reload(ticket, snapshot) {
            self.rebuild_registry();
        }
        Ok(())
    }

    /// Run `callback` once the configuration is ready.
    pub fn on_ready(&self, callback: impl FnOnce() + 'static) {
        self.readiness.on_ready(callback);
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Snapshot currently in force.
    pub fn current_snapshot(&self) -> ConfigSnapshot {
        self.store.borrow().current_snapshot().clone()
    }

    /// Whether the stored default was missing or invalid and should be
    /// written back.
    pub fn needs_persist(&self) -> bool {
        self.registry.borrow().needs_default_write_back()
    }

    fn rebuild_registry(&self) {
        let registry = Registry::build(
            self.store.borrow().current_snapshot(),
            &self.options.domain_policies,
            &self.options.fallback_level,
            Rc::clone(&self.extractor),
        );
        if registry.needs_default_write_back() {
            log::info!(
                "🛡️ No valid default level stored, using {}",
                registry.resolver.default_level_id()
            );
        }
        *self.registry.borrow_mut() = registry;
        self.invalidate();
    }

    fn invalidate(&self) {
        self.resolved_cache.borrow_mut().clear();
    }

    // ===== Resolution =====

    /// Effective protection for an origin URL.
    pub fn get_resolved_level(&self, origin: &str) -> Rc<ResolvedLevel> {
        let key = self
            .extractor
            .host(origin)
            .unwrap_or_else(|| origin.to_string());

        self.stats.borrow_mut().lookups += 1;
        if let Some(hit) = self.resolved_cache.borrow().get(&key) {
            self.stats.borrow_mut().cache_hits += 1;
            return Rc::clone(hit);
        }

        let resolved = Rc::new(self.registry.borrow().lookup(&self.catalog, origin));
        log::debug!(
            "🛡️ {} → level {}{}",
            key,
            resolved.level_id,
            if resolved.is_default() { " (default)" } else { "" }
        );
        insert_bounded(&mut self.resolved_cache.borrow_mut(), key, Rc::clone(&resolved));
        resolved
    }

    /// Surfaces to wrap for a resolved level.
    pub fn get_wrappers_for(&self, resolved: &ResolvedLevel) -> Vec<Wrapper> {
        resolved.wrappers().to_vec()
    }

    pub fn default_level_id(&self) -> String {
        self.registry.borrow().resolver.default_level_id().to_string()
    }

    pub fn domain_entry(&self, domain: &str) -> Option<DomainEntry> {
        self.registry.borrow().resolver.get(domain).cloned()
    }

    // ===== Configuration edits =====

    /// Configure a domain; takes effect on the next lookup.
    pub fn set_domain(&self, domain: &str, level_id: &str, tweaks: Option<Assignments>) {
        {
            let mut registry = self.registry.borrow_mut();
            if !registry.levels.contains(level_id) {
                log::warn!("⚠️ Domain {} set to unknown level {}", domain, level_id);
            }
            registry.resolver.set_domain(domain, level_id, tweaks);
        }
        self.invalidate();
    }

    pub fn remove_domain(&self, domain: &str) -> bool {
        let removed = self.registry.borrow_mut().resolver.remove_domain(domain).is_some();
        if removed {
            self.invalidate();
        }
        removed
    }

    /// Change the default level. Unknown ids keep the current default.
    pub fn set_default(&self, level_id: &str) -> bool {
        let changed = {
            let mut registry = self.registry.borrow_mut();
            let Registry {
                levels, resolver, ..
            } = &mut *registry;
            resolver.set_default(level_id, levels)
        };
        if changed {
            self.invalidate();
        }
        changed
    }

    /// Apply an automatic override, remembering the setting it replaces.
    ///
    /// Stacked overrides keep the first remembered setting.
    pub fn apply_domain_override(&self, domain: &str, level_id: &str, tweaks: Option<Assignments>) {
        {
            let mut registry = self.registry.borrow_mut();
            let mut entry = DomainEntry::new(level_id, tweaks);
            if let Some(previous) = registry.resolver.get(domain) {
                if previous.restore.is_some() {
                    entry.restore = previous.restore.clone();
                    entry.restore_tweaks = previous.restore_tweaks.clone();
                } else {
                    entry.restore = Some(previous.level_id.clone());
                    entry.restore_tweaks = previous.tweaks.clone();
                }
            }
            log::info!("🛡️ Override for {}: level {}", domain, level_id);
            registry.resolver.insert_entry(domain, entry);
        }
        self.invalidate();
    }

    /// Undo an automatic override.
    ///
    /// Reinstates the remembered setting, or removes the entry when the
    /// override replaced no entry at all. Returns whether anything changed.
    pub fn undo_domain_override(&self, domain: &str) -> bool {
        let changed = {
            let mut registry = self.registry.borrow_mut();
            match registry.resolver.remove_domain(domain) {
                Some(DomainEntry {
                    restore: Some(level_id),
                    restore_tweaks,
                    ..
                }) => {
                    registry
                        .resolver
                        .insert_entry(domain, DomainEntry::new(level_id, restore_tweaks));
                    true
                }
                Some(_) => true,
                None => false,
            }
        };
        if changed {
            self.invalidate();
        }
        changed
    }

    // ===== Farbling =====

    /// Install the session secret; clears derived identities.
    pub fn attach_session(&self, key: SessionKey) {
        *self.session.borrow_mut() = Some(key);
        self.identities.borrow_mut().clear();
        self.readiness.mark(ReadinessFlag::FarblingConfig);
    }

    /// Per-origin farbling identity, derived once per session.
    pub fn domain_identity(&self, origin: &str) -> Result<DomainIdentity> {
        let domain = self
            .extractor
            .host(origin)
            .unwrap_or_else(|| origin.to_string());
        if let Some(identity) = self.identities.borrow().get(&domain) {
            return Ok(identity.clone());
        }

        if self.session.borrow().is_none() {
            log::debug!("No session key attached, generating one");
            self.attach_session(SessionKey::generate()?);
        }
        let identity = match self.session.borrow().as_ref() {
            Some(key) => key.domain_identity(&domain)?,
            None => return Err(ShieldError::Internal("no session key".into())),
        };
        log::debug!("Derived identity {} for {}", identity.fingerprint(), domain);
        insert_bounded(&mut self.identities.borrow_mut(), domain, identity.clone());
        Ok(identity)
    }

    /// Canvas protection in force for an origin, if any.
    pub fn canvas_protection(&self, origin: &str) -> Option<CanvasProtection> {
        self.get_resolved_level(origin)
            .params_of(CANVAS_GROUP)
            .map(CanvasProtection::from_params)
    }

    /// Audio protection in force for an origin, if any.
    pub fn audio_protection(&self, origin: &str) -> Option<AudioProtection> {
        self.get_resolved_level(origin)
            .params_of(AUDIO_GROUP)
            .map(|params| AudioProtection::from_approach(params.first_int().unwrap_or(0)))
    }

    /// Farble an RGBA scratch copy in place. Returns whether it changed.
    pub fn farble_image(&self, origin: &str, data: &mut [u8], geometry: Geometry) -> Result<bool> {
        let Some(protection) = self.canvas_protection(origin) else {
            return Ok(false);
        };
        let identity = self.domain_identity(origin)?;
        let modified = farbling::farble_rgba(data, geometry, &protection, &identity)?;
        self.stats.borrow_mut().farbled_buffers += 1;
        Ok(modified)
    }

    /// Farble float audio samples in place.
    pub fn farble_audio(&self, origin: &str, samples: &mut [f32]) -> Result<bool> {
        let Some(protection) = self.audio_protection(origin) else {
            return Ok(false);
        };
        let identity = self.domain_identity(origin)?;
        farbling::farble_audio_f32(samples, protection, &identity);
        self.stats.borrow_mut().farbled_buffers += 1;
        Ok(true)
    }

    /// Farble byte audio samples in place.
    pub fn farble_audio_bytes(&self, origin: &str, bytes: &mut [u8]) -> Result<bool> {
        let Some(protection) = self.audio_protection(origin) else {
            return Ok(false);
        };
        let identity = self.domain_identity(origin)?;
        farbling::farble_audio_u8(bytes, protection, &identity);
        self.stats.borrow_mut().farbled_buffers += 1;
        Ok(true)
    }

    /// Answer of a point-in-path query as seen by the page.
    pub fn farble_point_query(&self, origin: &str, original: bool, x: f64, y: f64) -> Result<bool> {
        let approach = match self.get_resolved_level(origin).params_of(CANVAS_GROUP) {
            Some(params) => params.first_int().unwrap_or(0),
            None => return Ok(original),
        };
        let identity = self.domain_identity(origin)?;
        Ok(farbling::farble_point_query(original, x, y, approach, &identity))
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.borrow().clone()
    }
}

#[cfg(target_arch = "wasm32")]
fn default_probe() -> Box<dyn CapabilityProbe> {
    Box::new(crate::capability::JsCapabilityProbe)
}

#[cfg(not(target_arch = "wasm32"))]
fn default_probe() -> Box<dyn CapabilityProbe> {
    Box::new(crate::capability::AssumeAllPresent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryBackend;
    use crate::levels::{LEVEL_BALANCED, LEVEL_MINIMAL, LEVEL_STRICT};
    use futures::executor::block_on;

    fn engine() -> (Rc<MemoryBackend>, ProtectionEngine) {
        let backend = Rc::new(MemoryBackend::new());
        let engine = ProtectionEngine::new(backend.clone(), EngineOptions::default()).unwrap();
        (backend, engine)
    }

    #[test]
    fn test_options_accept_partial_json() {
        let options: EngineOptions = serde_json::from_str(r#"{"fallback_level":"strict"}"#).unwrap();
        assert_eq!(options.fallback_level, LEVEL_STRICT);
        assert!(options.probe_capabilities);
    }

    #[test]
    fn test_cache_invalidated_on_edit() {
        let (_, engine) = engine();
        let before = engine.get_resolved_level("https://shop.example/");
        assert!(before.is_default());
        let again = engine.get_resolved_level("https://shop.example/cart");
        assert!(Rc::ptr_eq(&before, &again));
        assert_eq!(engine.stats().cache_hits, 1);

        engine.set_domain("shop.example", LEVEL_STRICT, None);
        let after = engine.get_resolved_level("https://shop.example/");
        assert_eq!(after.level_id, LEVEL_STRICT);
        // Handed-out levels are never mutated.
        assert!(before.is_default());
    }

    #[test]
    fn test_host_caches_stay_bounded() {
        let (_, engine) = engine();
        engine.attach_session(SessionKey::from_bytes([3; 32]));
        let first = engine.domain_identity("https://host0.example/").unwrap();

        for i in 0..MAX_CACHED_HOSTS + 10 {
            let origin = format!("https://host{}.example/", i);
            engine.get_resolved_level(&origin);
            engine.domain_identity(&origin).unwrap();
        }
        assert!(engine.resolved_cache.borrow().len() <= MAX_CACHED_HOSTS);
        assert!(engine.identities.borrow().len() <= MAX_CACHED_HOSTS);

        // Flushed identities are derived again unchanged.
        assert_eq!(engine.domain_identity("https://host0.example/").unwrap(), first);
        assert!(engine.get_resolved_level("https://host0.example/").is_default());
    }

    #[test]
    fn test_override_and_undo() {
        let (_, engine) = engine();
        engine.set_domain("news.example", LEVEL_MINIMAL, None);
        engine.apply_domain_override("news.example", LEVEL_STRICT, None);
        engine.apply_domain_override("news.example", LEVEL_BALANCED, None);

        let entry = engine.domain_entry("news.example").unwrap();
        assert_eq!(entry.restore.as_deref(), Some(LEVEL_MINIMAL));

        assert!(engine.undo_domain_override("news.example"));
        let entry = engine.domain_entry("news.example").unwrap();
        assert_eq!(entry.level_id, LEVEL_MINIMAL);
        assert_eq!(entry.restore, None);

        engine.apply_domain_override("fresh.example", LEVEL_STRICT, None);
        assert!(engine.undo_domain_override("fresh.example"));
        assert!(engine.domain_entry("fresh.example").is_none());
        assert!(!engine.undo_domain_override("fresh.example"));
    }

    #[test]
    fn test_initialize_marks_ready() {
        let (_, engine) = engine();
        let hit = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&hit);
        engine.on_ready(move || *flag.borrow_mut() = true);
        assert!(!engine.is_ready());

        block_on(engine.initialize()).unwrap();
        assert!(engine.is_ready());
        assert!(*hit.borrow());
        assert!(engine.needs_persist());
    }

    #[test]
    fn test_farbling_disabled_level_leaves_buffer() {
        let (_, engine) = engine();
        engine.set_domain("plain.example", "off", None);
        let mut data = vec![9u8; 16];
        let modified = engine
            .farble_image("https://plain.example/", &mut data, Geometry::new(2, 2).unwrap())
            .unwrap();
        assert!(!modified);
        assert_eq!(data, vec![9u8; 16]);
        assert!(engine
            .farble_point_query("https://plain.example/", true, 1.0, 1.0)
            .unwrap());
    }

    #[test]
    fn test_identity_stable_per_host() {
        let (_, engine) = engine();
        engine.attach_session(SessionKey::from_bytes([3; 32]));
        let a = engine.domain_identity("https://a.example/x").unwrap();
        let b = engine.domain_identity("https://a.example/y").unwrap();
        let c = engine.domain_identity("https://b.example/").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
