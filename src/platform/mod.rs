//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Time (milliseconds for frame and settle deadlines)
//! - Storage (LocalStorage on web)

#[cfg(target_arch = "wasm32")]
mod web_storage;

#[cfg(target_arch = "wasm32")]
pub use web_storage::LocalStorage;

/// Wall clock in milliseconds
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Wall clock in milliseconds
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
