//! Boundary-tag coalescing.
//!
//! ```text
//!   prev     block    next            result
//!   alloc  │ free │  alloc    ──►   block joins the free list
//!   alloc  │ free │  FREE     ──►   block absorbs next, joins the list
//!   FREE   │ free │  alloc    ──►   prev absorbs block, keeps its place
//!   FREE   │ free │  FREE     ──►   prev absorbs both, keeps its place
//! ```

use crate::{ExplicitAllocator, HeapSource, block::Block};

impl<S: HeapSource> ExplicitAllocator<S> {
  /// Marks `block` free, merges it with free address neighbors and returns
  /// the resulting free block. The block header must hold its size.
  pub(crate) fn coalesce(
    &mut self,
    block: Block,
  ) -> Block {
    let mut size = self.heap.block_size(block);
    self.heap.stamp(block, size, false);

    let prev = self.heap.address_prev(block);
    let next = self.heap.address_next(block);
    let prev_free = !self.heap.is_allocated(prev);
    let next_free = !self.heap.is_allocated(next);

    let merged = match (prev_free, next_free) {
      (false, false) => {
        self
          .free_list
          .insert(&mut self.heap, block, self.config.policy.release_end);
        block
      }
      (false, true) => {
        self.free_list.remove(&mut self.heap, next);
        size += self.heap.block_size(next);
        self.heap.stamp(block, size, false);
        self
          .free_list
          .insert(&mut self.heap, block, self.config.policy.release_end);
        block
      }
      (true, false) => {
        size += self.heap.block_size(prev);
        self.heap.stamp(prev, size, false);
        prev
      }
      (true, true) => {
        self.free_list.remove(&mut self.heap, next);
        size += self.heap.block_size(prev) + self.heap.block_size(next);
        self.heap.stamp(prev, size, false);
        prev
      }
    };

    log::trace!(
      "coalesced block @{} into free block @{} ({} bytes)",
      block.offset(),
      merged.offset(),
      size
    );

    merged
  }
}
