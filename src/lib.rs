//! sys404 - meta-puzzle core for the $404 site
//!
//! Core modules:
//! - `progress`: Unlock ledger persisted under `meta_progress`
//! - `puzzles`: Circuit, routing and memory-match engines
//! - `sim`: System Collapse arcade simulation (fixed 60 Hz tick)
//! - `site`: Coordinator wiring engines, timers and the ledger together
//! - `persistence`: Key-value storage backends
//! - `platform`: Browser/native platform abstraction
//! - `tuning`: Data-driven difficulty and unlock wiring

pub mod observer;
pub mod persistence;
pub mod platform;
pub mod progress;
pub mod puzzles;
pub mod rng;
pub mod sim;
pub mod site;
pub mod tuning;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use observer::{EngineEvent, LogObserver, SiteObserver, View};
pub use persistence::{MemoryStorage, Storage, StorageError};
pub use progress::{Progress, ProgressLedger, SectionKey, UnknownSection, UnlockOutcome};
pub use rng::{RandomSource, ScriptedRandom, SeededRandom};
pub use site::{Site, UtilityKey};
pub use tuning::Tuning;

/// Game configuration constants
pub mod consts {
    /// Simulation rate of the arcade
    pub const TICK_HZ: f32 = 60.0;
    /// One tick in milliseconds
    pub const TICK_MS: f64 = 1000.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest frame gap fed to the accumulator (tab switches, debugger pauses)
    pub const MAX_FRAME_MS: f64 = 100.0;

    /// Play area, in percent of the widget
    pub const AREA_WIDTH: f32 = 100.0;
    pub const AREA_HEIGHT: f32 = 100.0;

    /// Player bar
    pub const PLAYER_START_X: f32 = 50.0;
    pub const PLAYER_WIDTH: f32 = 10.0;
    pub const PLAYER_HEIGHT: f32 = 4.0;
    pub const PLAYER_TOP: f32 = 90.0;

    pub const MAX_HEALTH: u32 = 100;
    /// Health at or below this is shown as critical
    pub const CRITICAL_HEALTH: u32 = 30;
    /// Combo length from which each catch is announced as a streak
    pub const COMBO_STREAK: u32 = 10;

    /// Falling entity sizes
    pub const ERROR_HEIGHT: f32 = 5.0;
    pub const BOSS_WIDTH: f32 = 30.0;
    pub const BOSS_HEIGHT: f32 = 10.0;
    pub const POWERUP_WIDTH: f32 = 12.0;
    pub const POWERUP_HEIGHT: f32 = 5.0;

    /// Fall durations in seconds. Regular errors speed up with game speed.
    pub const ERROR_FALL_SECS: f32 = 3.0;
    pub const ERROR_FALL_SECS_PER_SPEED: f32 = 0.5;
    pub const MIN_FALL_SECS: f32 = 0.5;
    pub const POWERUP_FALL_SECS: f32 = 4.0;
    pub const BOSS_FALL_SECS: f32 = 8.0;
}
