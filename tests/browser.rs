//! Browser integration tests
//!
//! Run with: wasm-pack test --headless --chrome
//! (or --firefox, --safari)

#![cfg(target_arch = "wasm32")]

use js_sys::Reflect;
use wasm_bindgen::prelude::*;
use wasm_bindgen_test::*;

use shelter_wasm::config::{ConfigBackend, ConfigSnapshot, LocalStorageBackend};
use shelter_wasm::{CapabilityProbe, DomainEntry, JsCapabilityProbe, ShieldHandle};

wasm_bindgen_test_configure!(run_in_browser);

// ===== Capability probing =====

#[wasm_bindgen_test]
fn probe_finds_real_surfaces() {
    let probe = JsCapabilityProbe;
    assert!(!probe.is_surface_absent("window.Date"));
    assert!(!probe.is_surface_absent("HTMLCanvasElement.prototype.toDataURL"));
}

#[wasm_bindgen_test]
fn probe_reports_missing_surfaces() {
    let probe = JsCapabilityProbe;
    assert!(probe.is_surface_absent("window.NoSuchInterface"));
    assert!(probe.is_surface_absent("Navigator.prototype.noSuchMethod"));
}

// ===== localStorage backend =====

#[wasm_bindgen_test]
async fn local_storage_round_trip() {
    let backend = LocalStorageBackend::with_key("shelter_test_round_trip");
    backend.clear().await.unwrap();
    assert!(backend.load().await.unwrap().domains.is_empty());

    let mut snapshot = ConfigSnapshot::default();
    snapshot.default_level = Some("strict".into());
    snapshot
        .domains
        .insert("a.example".into(), DomainEntry::new("minimal", None));
    backend.save(&snapshot).await.unwrap();

    let loaded = backend.load().await.unwrap();
    assert_eq!(loaded.default_level.as_deref(), Some("strict"));
    assert_eq!(loaded.domains["a.example"].level_id, "minimal");
    backend.clear().await.unwrap();
}

// ===== Shield handle =====

#[wasm_bindgen_test]
async fn handle_resolves_and_farbles() {
    let handle = ShieldHandle::new(JsValue::UNDEFINED).unwrap();
    handle.initialize().await.unwrap();
    assert!(handle.is_ready());

    handle.set_domain("farble.example", "balanced", JsValue::NULL).unwrap();
    let view = handle.resolve("https://www.farble.example/").unwrap();
    let level = Reflect::get(&view, &JsValue::from_str("level_id")).unwrap();
    assert_eq!(level.as_string().as_deref(), Some("balanced"));

    let mut data = vec![128u8; 8 * 8 * 4];
    let modified = handle
        .farble_image_data("https://www.farble.example/", &mut data, 8, 8)
        .unwrap();
    assert!(modified);
    assert!(data.iter().any(|&b| b != 128));

    assert!(handle.remove_domain("farble.example"));
}

#[wasm_bindgen_test]
fn handle_rejects_unknown_default() {
    let handle = ShieldHandle::new(JsValue::UNDEFINED).unwrap();
    let before = handle.default_level();
    assert!(!handle.set_default("does-not-exist"));
    assert_eq!(handle.default_level(), before);
}
