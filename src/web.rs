//! wasm-bindgen surface for the page script
//!
//! The page owns the DOM. It forwards clicks and key state here, calls
//! `frame` from `requestAnimationFrame`, and receives every notification
//! through a single JS callback `(kind, payload)`.

use js_sys::Function;
use serde_json::json;
use wasm_bindgen::prelude::*;

use crate::observer::{SiteObserver, View};
use crate::platform::{LocalStorage, now_ms};
use crate::progress::{Progress, SectionKey, reward_badge_svg};
use crate::rng::SeededRandom;
use crate::site::Site;
use crate::sim::TickInput;
use crate::tuning::Tuning;

#[wasm_bindgen(start)]
pub fn wasm_main() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"logger already initialised".into());
    }
    log::info!("sys404 core loaded");
}

/// Forwards notifications to one JS function
struct JsObserver {
    callback: Function,
}

impl JsObserver {
    fn emit(&self, kind: &str, payload: JsValue) {
        if let Err(e) = self.callback.call2(&JsValue::NULL, &JsValue::from_str(kind), &payload) {
            log::warn!("Page callback failed for {}: {:?}", kind, e);
        }
    }

    fn emit_json(&self, kind: &str, value: serde_json::Value) {
        self.emit(kind, JsValue::from_str(&value.to_string()));
    }
}

impl SiteObserver for JsObserver {
    fn render(&mut self, view: View<'_>) {
        let payload = match view {
            View::Circuit(p) => json!({ "engine": "circuit", "state": p }),
            View::Routing(p) => json!({
                "engine": "routing",
                "state": p,
                "powered": p.powered_cells(),
            }),
            View::Memory(p) => json!({ "engine": "memory", "state": p }),
            View::Arcade(s) => json!({
                "engine": "arcade",
                "state": s,
                "status": s.status(),
                "critical": s.is_critical(),
            }),
        };
        self.emit_json("render", payload);
    }

    fn terminal(&mut self, line: &str, is_error: bool) {
        self.emit_json("terminal", json!({ "line": line, "error": is_error }));
    }

    fn section_unlocked(&mut self, key: SectionKey, progress: &Progress) {
        self.emit_json("unlock", json!({ "key": key, "progress": progress }));
    }

    fn reward(&mut self) {
        self.emit("reward", JsValue::NULL);
    }

    fn utility_key_dropped(&mut self) {
        self.emit("utility_key", JsValue::NULL);
    }
}

#[wasm_bindgen]
pub struct WebSite {
    site: Site<LocalStorage, SeededRandom>,
    input: TickInput,
}

#[wasm_bindgen]
impl WebSite {
    /// Boot against `window.localStorage`. `tuning_json` may be empty.
    #[wasm_bindgen(constructor)]
    pub fn new(tuning_json: &str, callback: Function) -> WebSite {
        let tuning = if tuning_json.trim().is_empty() {
            Tuning::default()
        } else {
            Tuning::from_json_or_default(tuning_json)
        };
        let seed = now_ms() as u64;
        let mut site = Site::boot(LocalStorage::new(), tuning, SeededRandom::new(seed));
        site.add_observer(Box::new(JsObserver { callback }));
        site.render_all();
        WebSite {
            site,
            input: TickInput::default(),
        }
    }

    pub fn frame(&mut self, now_ms: f64) {
        self.site.frame(now_ms, &self.input);
    }

    pub fn set_keys(&mut self, left: bool, right: bool) {
        self.input.left = left;
        self.input.right = right;
    }

    /// Touch/pointer position in percent; negative clears it
    pub fn set_pointer(&mut self, x: f32) {
        self.input.pointer_x = (x >= 0.0).then_some(x);
    }

    pub fn set_idle_mode(&mut self, idle: bool) {
        self.input.idle_mode = idle;
    }

    pub fn circuit_toggle(&mut self, row: usize, col: usize) -> bool {
        self.site.circuit_toggle(row, col)
    }

    pub fn circuit_new(&mut self) {
        self.site.circuit_new();
    }

    pub fn circuit_reset(&mut self) {
        self.site.circuit_reset();
    }

    /// Cells to press for the current baseline
    pub fn circuit_hint(&self) -> String {
        json!(self.site.circuit().solution()).to_string()
    }

    pub fn route_rotate(&mut self, row: usize, col: usize) -> bool {
        self.site.route_rotate(row, col)
    }

    pub fn route_new(&mut self) {
        self.site.route_new();
    }

    pub fn memory_flip(&mut self, index: usize) -> bool {
        self.site.memory_flip(index)
    }

    pub fn memory_new(&mut self) {
        self.site.memory_new();
    }

    pub fn memory_reset(&mut self) {
        self.site.memory_reset();
    }

    pub fn arcade_start(&mut self) -> bool {
        self.site.arcade_start()
    }

    pub fn arcade_reset(&mut self) {
        self.site.arcade_reset();
        self.input = TickInput::default();
    }

    pub fn claim_utility_key(&mut self) -> bool {
        self.site.claim_utility_key()
    }

    /// Progress object including the derived `reward` flag
    pub fn progress_json(&self) -> String {
        json!(self.site.ledger().progress()).to_string()
    }

    /// `[[key, unlocked], ...]` for the roadmap
    pub fn roadmap_json(&self) -> String {
        let items: Vec<_> = self
            .site
            .ledger()
            .progress()
            .roadmap()
            .into_iter()
            .map(|(item, unlocked)| json!([item.key(), unlocked]))
            .collect();
        json!(items).to_string()
    }

    pub fn is_unlocked(&self, key: &str) -> bool {
        key.parse::<SectionKey>()
            .is_ok_and(|k| self.site.ledger().is_unlocked(k))
    }

    pub fn reward_badge_svg() -> String {
        reward_badge_svg().to_string()
    }
}
