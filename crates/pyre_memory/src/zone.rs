//! # Zone Allocator
//!
//! A fixed-pool allocator over one pre-reserved arena. Every block in the
//! arena, free or allocated, sits on a single circular doubly-linked list
//! anchored by a zero-size sentinel at offset 0. Allocation is next-fit:
//! the search resumes at the rover cursor left behind by the previous
//! allocation. Freeing coalesces with both neighbors immediately, so free
//! blocks are always maximal.
//!
//! ## Design Philosophy
//!
//! All memory is reserved once, at zone creation. During gameplay:
//! - No heap allocations
//! - No pointer arithmetic - blocks are byte offsets into the arena
//! - Bulk release by tag when a whole subsystem shuts down
//!
//! # Thread Safety
//!
//! A zone is NOT thread-safe. Use one zone per thread, or serialize
//! access externally.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut zone = Zone::new(4 * 1024 * 1024)?;
//!
//! const TAG_PARTICLES: Tag = 3;
//! let handle = zone.allocate(4096, TAG_PARTICLES)?;
//! zone.payload_mut(handle)?.fill(0xff);
//!
//! // Release everything the particle system owns in one call.
//! zone.free_all_with_tag(TAG_PARTICLES)?;
//! ```

use crate::block::{
    align_up, read_header, write_header, write_trailer, BlockHeader, BlockInfo, Tag, ZoneHandle,
    BLOCK_MAGIC, BLOCK_OVERHEAD, HEADER, SENTINEL, TAG_FREE, TAG_SENTINEL, TRAILER,
};
use crate::config::ZoneConfig;
use crate::error::{ZoneError, ZoneResult};

/// A fixed-pool, tag-based, coalescing allocator.
pub struct Zone {
    /// The arena. Block headers live in-band, at 8-aligned offsets.
    pub(crate) storage: Box<[u8]>,
    /// Next-fit cursor: the block where the next search starts.
    pub(crate) rover: u32,
    /// Leftover threshold below which a split is skipped.
    pub(crate) min_fragment: u32,
}

impl Zone {
    /// Creates a zone with `capacity` bytes and default tuning.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `capacity` cannot hold the
    /// sentinel plus one block, or does not fit the 32-bit offset space.
    pub fn new(capacity: usize) -> ZoneResult<Self> {
        Self::with_config(&ZoneConfig {
            capacity,
            ..ZoneConfig::default()
        })
    }

    /// Creates a zone from a validated configuration.
    ///
    /// The whole arena becomes one free block spanning everything after
    /// the sentinel's bookkeeping, and the rover starts there.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`ZoneConfig::validate`].
    pub fn with_config(config: &ZoneConfig) -> ZoneResult<Self> {
        config.validate()?;
        let capacity = config.capacity;
        let mut storage = vec![0u8; capacity].into_boxed_slice();

        let first = HEADER;
        let sentinel = BlockHeader {
            size: 0,
            tag: TAG_SENTINEL,
            id: 0,
            prev: first,
            next: first,
            reserved: 0,
        };
        write_header(&mut storage, SENTINEL, &sentinel);

        let span = BlockHeader {
            size: capacity as u32 - HEADER,
            tag: TAG_FREE,
            id: BLOCK_MAGIC,
            prev: SENTINEL,
            next: SENTINEL,
            reserved: 0,
        };
        write_header(&mut storage, first, &span);

        tracing::debug!(capacity, "zone initialized");
        Ok(Self {
            storage,
            rover: first,
            min_fragment: config.min_fragment,
        })
    }

    /// Allocates `size` payload bytes owned by `tag`.
    ///
    /// Next-fit: the scan starts at the rover and wraps once around the
    /// ring. A winning free block is split when the leftover exceeds the
    /// fragment threshold; otherwise the whole block is handed out and
    /// the slack stays inside it as bounded waste.
    ///
    /// # Errors
    ///
    /// - [`ZoneError::ReservedTag`] for tag 0.
    /// - [`ZoneError::RequestTooLarge`] when padding overflows the size.
    /// - [`ZoneError::OutOfMemory`] when no free block fits; the zone is
    ///   left exactly as it was.
    pub fn allocate(&mut self, size: usize, tag: Tag) -> ZoneResult<ZoneHandle> {
        if tag == TAG_FREE {
            return Err(ZoneError::ReservedTag);
        }
        let needed = padded_size(size)?;

        // Scan from the rover. `start` is the rover's predecessor; seeing
        // it again means the scan has wrapped the whole ring.
        let mut base = self.rover;
        let start = self.header(base).prev;
        let mut rover = base;
        loop {
            if rover == start {
                return Err(ZoneError::OutOfMemory { requested: size });
            }
            let at_rover = self.header(rover);
            if at_rover.tag == TAG_FREE {
                rover = at_rover.next;
            } else {
                // Candidate restarts just past any block in use.
                base = at_rover.next;
                rover = at_rover.next;
            }
            let candidate = self.header(base);
            if candidate.tag == TAG_FREE && candidate.size >= needed {
                break;
            }
        }

        let mut header = self.header(base);
        let extra = header.size - needed;
        if extra > self.min_fragment {
            // Split: the tail of the winning block becomes a new free
            // block linked right after it.
            let fragment = base + needed;
            let fragment_header = BlockHeader {
                size: extra,
                tag: TAG_FREE,
                id: BLOCK_MAGIC,
                prev: base,
                next: header.next,
                reserved: 0,
            };
            self.put_header(fragment, &fragment_header);
            let mut successor = self.header(header.next);
            successor.prev = fragment;
            self.put_header(header.next, &successor);
            header.next = fragment;
            header.size = needed;
        }

        header.tag = tag;
        header.id = BLOCK_MAGIC;
        self.put_header(base, &header);
        write_trailer(&mut self.storage, base, header.size);

        // Next search starts after this allocation.
        self.rover = header.next;
        Ok(ZoneHandle(base + HEADER))
    }

    /// Allocates like [`Zone::allocate`] and zero-fills the payload.
    ///
    /// # Errors
    ///
    /// Same as [`Zone::allocate`].
    pub fn allocate_zeroed(&mut self, size: usize, tag: Tag) -> ZoneResult<ZoneHandle> {
        let handle = self.allocate(size, tag)?;
        self.payload_mut(handle)?.fill(0);
        Ok(handle)
    }

    /// Releases the block behind `handle` and coalesces it with any free
    /// neighbor.
    ///
    /// # Errors
    ///
    /// - [`ZoneError::UnmarkedBlock`] when the handle's header lacks the
    ///   allocator's marker: the handle is foreign or corrupted.
    /// - [`ZoneError::DoubleFree`] when the block is already free.
    /// - [`ZoneError::SizeOverflow`] when a merge would overflow the
    ///   block size; the merge is abandoned and the zone must be
    ///   considered corrupt.
    pub fn free(&mut self, handle: ZoneHandle) -> ZoneResult<()> {
        let mut block = self.resolve(handle)?;
        let mut header = self.header(block);
        if header.tag == TAG_FREE {
            tracing::error!(offset = block, "double free");
            return Err(ZoneError::DoubleFree { offset: handle.0 });
        }
        header.tag = TAG_FREE;
        self.put_header(block, &header);

        // Merge with the previous block when it is free.
        let prev = header.prev;
        let prev_header = self.header(prev);
        if prev_header.tag == TAG_FREE {
            let Some(merged) = prev_header.size.checked_add(header.size) else {
                tracing::error!(offset = prev, "coalesce size overflow");
                return Err(ZoneError::SizeOverflow { offset: prev });
            };
            let mut survivor = prev_header;
            survivor.size = merged;
            survivor.next = header.next;
            self.put_header(prev, &survivor);
            let mut successor = self.header(header.next);
            successor.prev = prev;
            self.put_header(header.next, &successor);
            // The rover may sit on either header involved in the merge;
            // only the survivor's offset remains addressable.
            if self.rover == block || self.rover == prev {
                self.rover = prev;
            }
            block = prev;
            header = self.header(block);
        }

        // Merge with the following block when it is free.
        let next = header.next;
        let next_header = self.header(next);
        if next_header.tag == TAG_FREE {
            let Some(merged) = header.size.checked_add(next_header.size) else {
                tracing::error!(offset = next, "coalesce size overflow");
                return Err(ZoneError::SizeOverflow { offset: next });
            };
            header.size = merged;
            header.next = next_header.next;
            self.put_header(block, &header);
            let mut successor = self.header(next_header.next);
            successor.prev = block;
            self.put_header(next_header.next, &successor);
            if self.rover == next {
                self.rover = block;
            }
        }
        Ok(())
    }

    /// Releases every block owned by `tag` in one pass and returns how
    /// many blocks were freed.
    ///
    /// # Errors
    ///
    /// [`ZoneError::ReservedTag`] for tag 0; otherwise the errors of
    /// [`Zone::free`], none of which can occur on a consistent zone.
    pub fn free_all_with_tag(&mut self, tag: Tag) -> ZoneResult<usize> {
        if tag == TAG_FREE {
            return Err(ZoneError::ReservedTag);
        }
        let mut freed = 0usize;
        let mut cursor = self.header(SENTINEL).next;
        while cursor != SENTINEL {
            // Capture the successor first: freeing `cursor` rewrites
            // neighbor links and may absorb the successor's header.
            let header = self.header(cursor);
            let next = header.next;
            if header.tag == tag {
                self.free(ZoneHandle(cursor + HEADER))?;
                freed += 1;
            }
            cursor = next;
        }
        tracing::debug!(tag, freed, "tag sweep");
        Ok(freed)
    }

    /// Usable bytes of a live allocation.
    ///
    /// The slice covers the padded extent, so it is at least as long as
    /// the size passed to [`Zone::allocate`].
    ///
    /// # Errors
    ///
    /// [`ZoneError::UnmarkedBlock`] for a foreign handle,
    /// [`ZoneError::StaleHandle`] for a block that has been freed.
    pub fn payload(&self, handle: ZoneHandle) -> ZoneResult<&[u8]> {
        let span = self.payload_span(handle)?;
        Ok(&self.storage[span.0..span.1])
    }

    /// Mutable variant of [`Zone::payload`].
    ///
    /// # Errors
    ///
    /// Same as [`Zone::payload`].
    pub fn payload_mut(&mut self, handle: ZoneHandle) -> ZoneResult<&mut [u8]> {
        let span = self.payload_span(handle)?;
        Ok(&mut self.storage[span.0..span.1])
    }

    /// Total arena size in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Sum of the sizes of all free blocks, their headers included.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.blocks()
            .filter(BlockInfo::is_free)
            .map(|block| block.size as usize)
            .sum()
    }

    /// Sum of the sizes of all allocated blocks, their headers included.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.blocks()
            .filter(|block| !block.is_free())
            .map(|block| block.size as usize)
            .sum()
    }

    /// Size of the largest free block, or 0 when nothing is free. An
    /// allocation can succeed only if this covers the padded request.
    #[must_use]
    pub fn largest_free(&self) -> usize {
        self.blocks()
            .filter(BlockInfo::is_free)
            .map(|block| block.size as usize)
            .max()
            .unwrap_or(0)
    }

    /// Number of blocks in the ring, the sentinel excluded.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// Iterates the blocks in address order, for diagnostics and tests.
    ///
    /// The walk is bounded and bounds-checked, so it terminates even on a
    /// trashed list; it may then report a truncated view. Run
    /// [`Zone::check_heap`](crate::Zone::check_heap) to diagnose.
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        let mut cursor = self.header(SENTINEL).next;
        let mut fuel = self.storage.len() / HEADER as usize + 1;
        std::iter::from_fn(move || {
            if cursor == SENTINEL || fuel == 0 || !self.header_in_bounds(cursor) {
                return None;
            }
            fuel -= 1;
            let header = self.header(cursor);
            let info = BlockInfo {
                offset: cursor,
                size: header.size,
                tag: header.tag,
            };
            cursor = header.next;
            Some(info)
        })
    }

    /// Reads the header at `offset`.
    #[inline]
    pub(crate) fn header(&self, offset: u32) -> BlockHeader {
        read_header(&self.storage, offset)
    }

    /// Writes `header` at `offset`.
    #[inline]
    pub(crate) fn put_header(&mut self, offset: u32, header: &BlockHeader) {
        write_header(&mut self.storage, offset, header);
    }

    /// Whether a full header fits at `offset`.
    #[inline]
    pub(crate) fn header_in_bounds(&self, offset: u32) -> bool {
        offset as usize + HEADER as usize <= self.storage.len()
    }

    /// Recovers and verifies the block offset behind a handle.
    fn resolve(&self, handle: ZoneHandle) -> ZoneResult<u32> {
        let rejected = ZoneError::UnmarkedBlock { offset: handle.0 };
        let Some(block) = handle.0.checked_sub(HEADER) else {
            return Err(rejected);
        };
        if !self.header_in_bounds(block) {
            return Err(rejected);
        }
        if self.header(block).id != BLOCK_MAGIC {
            tracing::error!(offset = block, "handle without allocator marker");
            return Err(rejected);
        }
        Ok(block)
    }

    /// Validated payload byte range behind a handle.
    fn payload_span(&self, handle: ZoneHandle) -> ZoneResult<(usize, usize)> {
        let block = self.resolve(handle)?;
        let header = self.header(block);
        if header.tag == TAG_FREE {
            return Err(ZoneError::StaleHandle { offset: handle.0 });
        }
        let start = (block + HEADER) as usize;
        let end = (block as usize) + header.size as usize - TRAILER as usize;
        if end < start || end > self.storage.len() {
            return Err(ZoneError::TrashedList { offset: block });
        }
        Ok((start, end))
    }
}

/// Total block size for a payload request: header and trailer added, then
/// rounded up to the alignment boundary.
fn padded_size(requested: usize) -> ZoneResult<u32> {
    let padded = (requested as u64)
        .checked_add(BLOCK_OVERHEAD as u64)
        .and_then(align_up);
    match padded {
        Some(value) if value <= u64::from(u32::MAX) => Ok(value as u32),
        _ => Err(ZoneError::RequestTooLarge { requested }),
    }
}
