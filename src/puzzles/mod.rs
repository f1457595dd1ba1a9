//! Turn-based puzzle engines
//!
//! Pure state machines driven by player input. No rendering, no timers:
//! delays are deadlines the owner advances, randomness is passed in.

pub mod circuit;
pub mod memory;
pub mod routing;

pub use circuit::{CircuitEvent, CircuitPuzzle};
pub use memory::{MemoryCard, MemoryEvent, MemoryPuzzle, PendingPair, SYMBOLS};
pub use routing::{Connections, Direction, Pos, RouteEvent, RoutePuzzle, RouteTile, TileKind};
