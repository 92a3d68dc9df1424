//! Connection sharding
//!
//! Each protocol connection can only sustain a bounded number of joined
//! channels. The pool spreads channels over as few connections as possible:
//!
//! ```text
//!   ShardPool (capacity = 3)
//!   ┌───────────────┬───────────────┬───────────────┐
//!   │ shard 1       │ shard 2       │ shard 3       │
//!   │ a, b, c  FULL │ d, e, f  FULL │ g, [reserved] │ ◄── next join lands here
//!   └───────────────┴───────────────┴───────────────┘
//! ```
//!
//! A new shard is opened only when every existing one is at capacity. Shard
//! ids start at 1 and are never reused.

pub mod handle;
pub mod pool;

pub use handle::{ConnectionHandle, SlotReservation};
pub use pool::ShardPool;
