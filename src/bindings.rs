//! JavaScript bindings
//!
//! `ShieldHandle` is what the wrapper installer talks to. Configuration I/O is
//! async (a promise on the JS side); resolution and farbling are synchronous
//! so they can run inside the wrapped API call.

use std::rc::Rc;

use js_sys::Function;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::catalog::Assignments;
use crate::config::LocalStorageBackend;
use crate::engine::{EngineOptions, ProtectionEngine};
use crate::farbling::Geometry;

/// Resolved level as handed to JavaScript.
#[derive(Serialize)]
struct ResolvedView<'a> {
    level_id: &'a str,
    level_text: &'a str,
    is_default: bool,
    matched_domain: Option<&'a str>,
    assignments: &'a Assignments,
    tweaks: Option<&'a Assignments>,
    restore: Option<&'a str>,
    restore_tweaks: Option<&'a Assignments>,
}

fn optional_tweaks(tweaks: JsValue) -> Result<Option<Assignments>, JsValue> {
    if tweaks.is_undefined() || tweaks.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_wasm_bindgen::from_value(tweaks)?))
}

#[wasm_bindgen]
pub struct ShieldHandle {
    engine: Rc<ProtectionEngine>,
}

#[wasm_bindgen]
impl ShieldHandle {
    /// Create an engine backed by `localStorage`.
    ///
    /// `options` may be omitted or partial (`{ fallback_level: "strict" }`).
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<ShieldHandle, JsValue> {
        let options: EngineOptions = if options.is_undefined() || options.is_null() {
            EngineOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };
        let engine = ProtectionEngine::new(Rc::new(LocalStorageBackend::new()), options)?;
        log::info!("🛡️ Shield handle created");
        Ok(Self {
            engine: Rc::new(engine),
        })
    }

    /// Load configuration and session; resolves once ready.
    #[wasm_bindgen]
    pub async fn initialize(&self) -> Result<(), JsValue> {
        let engine = Rc::clone(&self.engine);
        engine.initialize().await?;
        Ok(())
    }

    /// Reload after the store reported a change.
    #[wasm_bindgen]
    pub async fn notify_changed(&self) -> Result<(), JsValue> {
        let engine = Rc::clone(&self.engine);
        engine.notify_changed().await?;
        Ok(())
    }

    /// Save the current configuration.
    #[wasm_bindgen]
    pub async fn persist(&self) -> Result<(), JsValue> {
        let engine = Rc::clone(&self.engine);
        engine.persist().await?;
        Ok(())
    }

    /// Register a callback for "configuration ready".
    pub fn on_ready(&self, callback: Function) {
        self.engine.on_ready(move || {
            if let Err(e) = callback.call0(&JsValue::NULL) {
                log::warn!("⚠️ Ready callback threw: {:?}", e);
            }
        });
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    pub fn resolve(&self, url: &str) -> Result<JsValue, JsValue> {
        let resolved = self.engine.get_resolved_level(url);
        let view = ResolvedView {
            level_id: &resolved.level_id,
            level_text: &resolved.level_text,
            is_default: resolved.is_default(),
            matched_domain: resolved.matched_domain.as_deref(),
            assignments: resolved.assignments(),
            tweaks: resolved.tweaks.as_ref(),
            restore: resolved.restore.as_deref(),
            restore_tweaks: resolved.restore_tweaks.as_ref(),
        };
        Ok(serde_wasm_bindgen::to_value(&view)?)
    }

    /// `[{ surface, params }]` for an origin.
    pub fn wrappers(&self, url: &str) -> Result<JsValue, JsValue> {
        let resolved = self.engine.get_resolved_level(url);
        Ok(serde_wasm_bindgen::to_value(resolved.wrappers())?)
    }

    pub fn set_domain(&self, domain: &str, level_id: &str, tweaks: JsValue) -> Result<(), JsValue> {
        self.engine
            .set_domain(domain, level_id, optional_tweaks(tweaks)?);
        Ok(())
    }

    pub fn remove_domain(&self, domain: &str) -> bool {
        self.engine.remove_domain(domain)
    }

    pub fn apply_domain_override(
        &self,
        domain: &str,
        level_id: &str,
        tweaks: JsValue,
    ) -> Result<(), JsValue> {
        self.engine
            .apply_domain_override(domain, level_id, optional_tweaks(tweaks)?);
        Ok(())
    }

    pub fn undo_domain_override(&self, domain: &str) -> bool {
        self.engine.undo_domain_override(domain)
    }

    /// Returns false (and keeps the current default) for unknown levels.
    pub fn set_default(&self, level_id: &str) -> bool {
        self.engine.set_default(level_id)
    }

    pub fn default_level(&self) -> String {
        self.engine.default_level_id()
    }

    /// Farble a scratch copy of `ImageData.data` in place.
    pub fn farble_image_data(
        &self,
        url: &str,
        data: &mut [u8],
        width: u32,
        height: u32,
    ) -> Result<bool, JsValue> {
        let geometry = Geometry::new(width as usize, height as usize)?;
        Ok(self.engine.farble_image(url, data, geometry)?)
    }

    /// Farble a scratch copy of float audio samples in place.
    pub fn farble_audio(&self, url: &str, samples: &mut [f32]) -> Result<bool, JsValue> {
        Ok(self.engine.farble_audio(url, samples)?)
    }

    /// Farble a scratch copy of byte audio samples in place.
    pub fn farble_audio_bytes(&self, url: &str, data: &mut [u8]) -> Result<bool, JsValue> {
        Ok(self.engine.farble_audio_bytes(url, data)?)
    }

    pub fn farble_point_query(&self, url: &str, original: bool, x: f64, y: f64) -> Result<bool, JsValue> {
        Ok(self.engine.farble_point_query(url, original, x, y)?)
    }

    pub fn stats(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.engine.stats()).unwrap_or(JsValue::NULL)
    }
}
