//! # PYRE Memory
//!
//! Fixed-pool zone allocator designed for:
//! - One arena reserved at startup, zero heap traffic afterwards
//! - Deterministic, flat-latency allocate/free cycles inside the
//!   simulation loop
//! - Bulk release of a whole subsystem's memory by tag
//!
//! ## Architecture Rules
//!
//! 1. **No unsafe code** - blocks are byte offsets into the arena, every
//!    access is bounds-checked
//! 2. **Corruption is loud** - handles are verified against an in-band
//!    marker, and [`Zone::check_heap`] can audit the whole arena at any
//!    time
//! 3. **One zone per thread** - serialization is the caller's job
//!
//! ## Example
//!
//! ```rust,ignore
//! use pyre_memory::{Tag, Zone};
//!
//! const TAG_PROJECTILES: Tag = 2;
//!
//! let mut zone = Zone::new(4 * 1024 * 1024)?;
//! let handle = zone.allocate_zeroed(512, TAG_PROJECTILES)?;
//! // ... simulation step ...
//! zone.free_all_with_tag(TAG_PROJECTILES)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod block;
pub mod config;
pub mod error;
mod validate;
pub mod zone;

pub use block::{
    BlockInfo, Tag, ZoneHandle, ALIGNMENT, BLOCK_OVERHEAD, MIN_ZONE_BYTES, TAG_FREE, ZONE_OVERHEAD,
};
pub use config::{ZoneConfig, DEFAULT_CAPACITY, DEFAULT_MIN_FRAGMENT};
pub use error::{ZoneError, ZoneResult};
pub use zone::Zone;
