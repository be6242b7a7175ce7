//! Cache Module
//!
//! The request-level engine: entry encoding with expiry stamps, the clock
//! those stamps are read against, counters, and the orchestrating store.

mod clock;
pub mod entry;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, Ttl, INFINITE};
pub use stats::{CacheStats, StatsSnapshot};
pub use store::{CacheStore, Mode};
