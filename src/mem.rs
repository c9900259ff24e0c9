//! Arena allocator backing the load pipeline.
//!
//! Scene data is read once, used for the lifetime of a session, and then
//! discarded wholesale, so blocks are only ever freed all at once.

use std::sync::Mutex;

/// Owns every block allocated through it and frees them together, either
/// on [`SceneMemory::clear`] or on drop. There is no partial free and no
/// realloc.
///
/// Allocation is thread-safe: only the bookkeeping is serialized, the
/// caller's fill copy happens outside the lock.
#[derive(Default)]
pub struct SceneMemory {
    blocks: Mutex<Vec<Box<[u8]>>>,
}

impl SceneMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `size` zeroed bytes. Returns `None` for a zero-size
    /// request.
    pub fn alloc(&self, size: usize) -> Option<&mut [u8]> {
        self.alloc_partial(size, &[])
    }

    /// Allocates a block holding a copy of `data`.
    pub fn alloc_filled(&self, data: &[u8]) -> Option<&mut [u8]> {
        self.alloc_partial(data.len(), data)
    }

    /// Allocates `size` bytes, copying `fill` into the front of the
    /// block and zeroing the remainder. `fill` must not be longer than
    /// `size`.
    pub fn alloc_partial(&self, size: usize, fill: &[u8]) -> Option<&mut [u8]> {
        if size == 0 {
            return None;
        }
        debug_assert!(fill.len() <= size);
        let mut block = vec![0u8; size].into_boxed_slice();
        block[..fill.len()].copy_from_slice(fill);

        // The box's heap storage is stable, so a reference into it stays
        // valid while the box sits in the block list. Freeing requires
        // `&mut self` (or drop), which ends all outstanding borrows
        // first.
        let ptr = block.as_mut_ptr();
        let len = block.len();
        {
            let mut blocks = self.blocks.lock().expect("allocator poisoned");
            blocks.push(block);
        }
        Some(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
    }

    /// Number of blocks currently owned.
    pub fn block_count(&self) -> usize {
        self.blocks.lock().expect("allocator poisoned").len()
    }

    /// Frees every block at once. Taking `&mut self` proves no borrows
    /// of allocated blocks remain.
    pub fn clear(&mut self) {
        self.blocks.get_mut().expect("allocator poisoned").clear();
    }
}
