//! Capability probing
//!
//! Decides, once at catalog construction, whether the API surfaces a group
//! governs exist in the current environment. Groups whose every surface is
//! absent are hidden from the composed schema; groups with no surfaces at all
//! (policy-only groups) are always kept.
//!
//! The core only talks to the [`CapabilityProbe`] trait. The browser build
//! supplies [`JsCapabilityProbe`], which walks dotted surface paths such as
//! `CanvasRenderingContext2D.prototype.getImageData` on the JS global object.

use std::collections::HashSet;

use js_sys::Reflect;
use wasm_bindgen::JsValue;

/// Capability-query interface supplied by the platform integration.
pub trait CapabilityProbe {
    /// Whether the surface resolves to something other than `undefined`.
    fn is_available(&self, surface: &str) -> bool;

    /// Whether the surface is missing from the environment.
    fn is_surface_absent(&self, surface: &str) -> bool {
        !self.is_available(surface)
    }

    /// Whether every listed surface is missing.
    ///
    /// An empty list is never "all absent": policy-only groups stay visible.
    fn all_surfaces_absent(&self, surfaces: &[String]) -> bool {
        if surfaces.is_empty() {
            return false;
        }
        surfaces.iter().all(|s| self.is_surface_absent(s))
    }
}

/// Probe that reports every surface as present.
///
/// Used outside a browser and in tests where the catalog must stay complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeAllPresent;

impl CapabilityProbe for AssumeAllPresent {
    fn is_available(&self, _surface: &str) -> bool {
        true
    }
}

/// Probe backed by an explicit list of missing surfaces.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    absent: HashSet<String>,
}

impl StaticCapabilities {
    pub fn with_absent<I, S>(surfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            absent: surfaces.into_iter().map(Into::into).collect(),
        }
    }

    /// Mark a surface as missing.
    pub fn mark_absent(&mut self, surface: impl Into<String>) {
        self.absent.insert(surface.into());
    }
}

impl CapabilityProbe for StaticCapabilities {
    fn is_available(&self, surface: &str) -> bool {
        !self.absent.contains(surface)
    }
}

/// Probe that walks surface paths on the live JavaScript global object.
///
/// A path segment resolving to `undefined` makes the surface absent. A
/// throwing access (interface-typed getters read off a prototype, e.g.
/// `PerformanceEntry.prototype.startTime`) stops the walk and counts as
/// "present but inaccessible".
#[derive(Debug, Clone, Copy, Default)]
pub struct JsCapabilityProbe;

impl JsCapabilityProbe {
    fn walk(surface: &str) -> bool {
        let mut current: JsValue = js_sys::global().into();
        for segment in surface.split('.') {
            match Reflect::get(&current, &JsValue::from_str(segment)) {
                Ok(next) if next.is_undefined() => return false,
                Ok(next) => current = next,
                Err(_) => break,
            }
        }
        true
    }
}

impl CapabilityProbe for JsCapabilityProbe {
    fn is_available(&self, surface: &str) -> bool {
        let present = Self::walk(surface);
        if !present {
            log::debug!("Surface not available: {}", surface);
        }
        present
    }
}
