//! Waymark location backends
//!
//! The router never touches a real address bar. It talks to a [`Location`]:
//! - [`MemoryLocation`] keeps the history stack in memory
//! - [`PersistentLocation`] keeps it in SQLite so it survives restarts

mod error;
mod location;
mod memory;
mod persistent;

pub use error::LocationError;
pub use location::{HistoryState, Location, PopStateEvent, PopStateKind};
pub use memory::MemoryLocation;
pub use persistent::PersistentLocation;

pub type Result<T> = std::result::Result<T, LocationError>;
