//! System Collapse arcade simulation
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Injected RNG only
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies

pub mod collision;
pub mod state;
pub mod tick;

pub use collision::Rect;
pub use state::{
    ArcadeEvent, ArcadePhase, ArcadeState, BossKind, EntitySize, ErrorKind, FallingError, FallingPowerUp,
    PowerUpKind, RunSummary, Threat,
};
pub use tick::{TickInput, activate_power_up, spawn_boss, spawn_error, spawn_power_up, tick};
