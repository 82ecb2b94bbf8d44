//! Fit search and block placement.
//!
//! Blocks produced by heap growth are large and pile up at one end of the
//! free list, split leftovers at the other. Large requests therefore search
//! from the head and small ones from the tail, which keeps searches short
//! without sorted or segregated lists.
//!
//! ```text
//!   remainder > 1024          512 < remainder <= 1024     remainder <= 512
//!   ┌──────────┬───────┐      ┌───────┬──────────┐        ┌────────────────┐
//!   │   free   │ alloc │      │ alloc │   free   │        │ alloc (whole)  │
//!   └──────────┴───────┘      └───────┴──────────┘        └────────────────┘
//!    stays in the list         coalesced, re-listed
//! ```

use crate::{ExplicitAllocator, HeapSource, block::Block};

impl<S: HeapSource> ExplicitAllocator<S> {
  /// First free block of at least `size` bytes, scanning from the end of the
  /// list that matches the request's scale.
  pub(crate) fn find_fit(
    &self,
    size: usize,
  ) -> Option<Block> {
    let heap = &self.heap;
    let fits = |block: &Block| heap.block_size(*block) >= size;

    let found = if size > self.config.policy.search_threshold {
      self.free_list.iter(heap).find(fits)
    } else {
      self.free_list.iter_rev(heap).find(fits)
    };

    log::trace!(
      "fit for {} bytes: {:?}",
      size,
      found.map(Block::offset)
    );

    found
  }

  /// Allocates `size` bytes out of the free block `block` and returns the
  /// allocated block.
  pub(crate) fn place(
    &mut self,
    block: Block,
    size: usize,
  ) -> Block {
    let block_size = self.heap.block_size(block);
    debug_assert!(block_size >= size);

    let remainder = block_size - size;
    let policy = self.config.policy;

    self.free_list.remove(&mut self.heap, block);

    if remainder > policy.front_split_threshold {
      self.heap.stamp(block, remainder, false);
      self.free_list.insert_back(&mut self.heap, block);

      let allocated = self.heap.address_next(block);
      self.heap.stamp(allocated, size, true);

      log::trace!(
        "split @{}: {} bytes stay free, {} allocated above",
        block.offset(),
        remainder,
        size
      );

      allocated
    } else if remainder > policy.split_threshold {
      self.heap.stamp(block, size, true);

      let rest = self.heap.address_next(block);
      self.heap.set_header(rest, remainder, false);
      self.coalesce(rest);

      log::trace!(
        "split @{}: {} bytes allocated, {} freed above",
        block.offset(),
        size,
        remainder
      );

      block
    } else {
      self.heap.stamp(block, block_size, true);
      block
    }
  }
}
