//! # Shelter WASM
//!
//! Anti-fingerprinting protection engine compiled to WebAssembly.
//!
//! Decides, per visited domain, which fingerprintable browser APIs get their
//! results distorted and how, and implements the deterministic distortion
//! ("farbling") of pixel and audio buffers.
//!
//! ## Architecture
//!
//! ```text
//! Wrapper installer (JS)
//!   ↓
//! ShieldHandle (bindings)
//!   ↓
//! ProtectionEngine ── ConfigBackend (localStorage)
//!   ↓                     ↓
//! Registry (levels + domains) ← ConfigSnapshot
//!   ↓
//! Compositor → ResolvedLevel → wrappers
//!   ↓
//! Farbling (canvas, audio) seeded per origin + content
//! ```
//!
//! ## Features
//!
//! - **Levels**: built-in presets plus user levels, per-domain tweaks
//! - **Most-specific-first domain matching** with safe fallbacks
//! - **Deterministic farbling**: same origin + same content ⇒ same output
//! - **No panics on bad configuration**: unknown levels and variants degrade
//!   to the default level or a disabled group

use wasm_bindgen::prelude::*;

// Modules
pub mod bindings;
pub mod capability;
pub mod catalog;
pub mod compositor;
pub mod config;
pub mod domains;
pub mod engine;
mod error;
pub mod farbling;
pub mod levels;

pub use bindings::ShieldHandle;
pub use capability::{AssumeAllPresent, CapabilityProbe, JsCapabilityProbe, StaticCapabilities};
pub use catalog::{Assignments, Catalog, Group, ParamValue, Variant, VariantParams};
pub use compositor::{compose, prune_redundant_tweaks, ResolvedLevel, Wrapper};
pub use config::{
    ConfigBackend, ConfigSnapshot, ConfigurationStore, DomainPolicy, LocalStorageBackend,
    MemoryBackend, Registry,
};
pub use domains::{DomainEntry, DomainExtractor, DomainResolver, HostExtractor};
pub use engine::{EngineOptions, EngineStats, ProtectionEngine};
pub use error::{ErrorCode, ErrorInfo, Result, ShieldError};
pub use farbling::{CanvasProtection, DomainIdentity, Geometry, RgbaImage, RgbaSlice, SessionKey};
pub use levels::{Level, LevelRecord, LevelRegistry};

/// Initialize the WASM module
///
/// Sets up console logging.
#[wasm_bindgen(start)]
pub fn init() {
    // A second init (e.g. module re-instantiated) finds the logger set.
    let _ = console_log::init_with_level(log::Level::Info);

    log::info!("Shelter WASM initialized");
}
