//! # Heap Validator
//!
//! A side-effect-free walk over the whole block ring, asserting every
//! structural invariant the allocator maintains. Cheap enough to run as a
//! pre/postcondition in tests and before risky operations; any failure
//! means the zone has already been stomped on and must not be used again.

use crate::block::{SENTINEL, TAG_FREE};
use crate::error::{ZoneError, ZoneResult};
use crate::zone::Zone;

/// Logs and returns a validation failure.
fn corrupt(err: ZoneError) -> ZoneError {
    tracing::error!(%err, "heap check failed");
    err
}

impl Zone {
    /// Validates the entire block ring.
    ///
    /// Checked per block pair, sentinel successor through to the
    /// sentinel again:
    /// - links and extents stay inside the arena and the walk closes
    ///   back on the sentinel,
    /// - every block's extent ends exactly where its successor begins,
    ///   with the last extent closing the arena,
    /// - every successor links back to its predecessor,
    /// - no two consecutive blocks are both free,
    /// - the rover refers to a block in the ring (or the sentinel).
    ///
    /// # Errors
    ///
    /// One [`ZoneError`] corruption variant per violated invariant; all
    /// of them are fatal.
    pub fn check_heap(&self) -> ZoneResult<()> {
        let capacity = self.capacity() as u32;
        let mut rover_seen = self.rover == SENTINEL;
        let mut cursor = self.header(SENTINEL).next;
        // More steps than headers could ever fit means the ring skipped
        // the sentinel.
        let mut fuel = self.capacity() / crate::ZONE_OVERHEAD + 1;

        while cursor != SENTINEL {
            if fuel == 0 || !self.header_in_bounds(cursor) {
                return Err(corrupt(ZoneError::TrashedList { offset: cursor }));
            }
            fuel -= 1;

            if cursor == self.rover {
                rover_seen = true;
            }

            let header = self.header(cursor);
            let Some(end) = cursor.checked_add(header.size) else {
                return Err(corrupt(ZoneError::TrashedList { offset: cursor }));
            };
            if end > capacity {
                return Err(corrupt(ZoneError::TrashedList { offset: cursor }));
            }
            // Contiguity: the next header starts where this extent ends;
            // the wrap edge through the sentinel instead closes the arena.
            let touching = if header.next == SENTINEL {
                end == capacity
            } else {
                end == header.next
            };
            if !touching {
                return Err(corrupt(ZoneError::BlocksNotTouching { offset: cursor }));
            }
            if !self.header_in_bounds(header.next) {
                return Err(corrupt(ZoneError::TrashedList { offset: cursor }));
            }
            let next_header = self.header(header.next);
            if next_header.prev != cursor {
                return Err(corrupt(ZoneError::BadBackLink { offset: cursor }));
            }
            if header.tag == TAG_FREE && header.next != SENTINEL && next_header.tag == TAG_FREE {
                return Err(corrupt(ZoneError::ConsecutiveFreeBlocks { offset: cursor }));
            }
            cursor = header.next;
        }

        if !rover_seen {
            return Err(corrupt(ZoneError::RoverLost { rover: self.rover }));
        }
        Ok(())
    }
}
