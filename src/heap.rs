//! The managed heap region and block accessors.
//!
//! ```text
//!   offset 0    4          12                                size-4
//!   ┌─────┬───────────┬──────────┬──────────┬─── ─ ─ ───┬─────────┐
//!   │ pad │ prologue  │ block    │ block    │           │epilogue │
//!   │     │ 8 | alloc │          │          │           │0 | alloc│
//!   └─────┴───────────┴──────────┴──────────┴─── ─ ─ ───┴─────────┘
//! ```
//!
//! Headers sit at offsets `4 (mod 8)`, so every payload is 8-byte aligned
//! whenever the region base is.

use std::ptr::NonNull;

use crate::{
  ALIGNMENT, AllocError, HeapSource,
  block::{self, Block, MAX_HEAP_SIZE, PROLOGUE_SIZE, WORD_SIZE},
};

/// Decoded view of a block's state-dependent storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockState {
  Free {
    prev_free: Option<Block>,
    next_free: Option<Block>,
  },
  Allocated {
    payload: NonNull<u8>,
  },
}

pub(crate) struct Heap<S> {
  source: S,
  base: NonNull<u8>,
  size: usize,
}

/// Pad word, prologue header and footer, epilogue header.
const BOOTSTRAP_SIZE: usize = WORD_SIZE + PROLOGUE_SIZE + WORD_SIZE;

impl<S: HeapSource> Heap<S> {
  /// Lays out the prologue and epilogue in a fresh region.
  pub(crate) fn bootstrap(mut source: S) -> Result<Self, AllocError> {
    let base = source.grow(BOOTSTRAP_SIZE)?;

    if base.as_ptr() as usize % ALIGNMENT != 0 {
      return Err(AllocError::Misaligned {
        address: base.as_ptr() as usize,
      });
    }

    let mut heap = Self {
      source,
      base,
      size: BOOTSTRAP_SIZE,
    };

    heap.write_word(0, 0);
    let prologue = heap.prologue();
    heap.stamp(prologue, PROLOGUE_SIZE, true);
    heap.set_header(heap.epilogue(), 0, true);

    Ok(heap)
  }

  /// Extends the region by `increment` bytes. On success the old epilogue
  /// becomes the header of the new space, which is returned unstamped.
  pub(crate) fn grow(
    &mut self,
    increment: usize,
  ) -> Result<Block, AllocError> {
    let out_of_memory = AllocError::OutOfMemory {
      requested: increment,
    };

    if increment > MAX_HEAP_SIZE - self.size {
      return Err(out_of_memory);
    }

    let start = self.source.grow(increment)?;
    let expected = self.base.as_ptr() as usize + self.size;

    if start.as_ptr() as usize != expected {
      return Err(AllocError::Discontiguous {
        expected,
        actual: start.as_ptr() as usize,
      });
    }

    let block = self.epilogue();
    self.size += increment;

    Ok(block)
  }
}

impl<S> Heap<S> {
  /// Bytes managed, from the pad word through the epilogue header.
  pub(crate) fn size(&self) -> usize {
    self.size
  }

  pub(crate) fn prologue(&self) -> Block {
    self.block_at(WORD_SIZE)
  }

  pub(crate) fn epilogue(&self) -> Block {
    self.block_at(self.size - WORD_SIZE)
  }

  /// Lowest-addressed block after the prologue (the epilogue on an empty heap).
  pub(crate) fn first_block(&self) -> Block {
    self.block_at(WORD_SIZE + PROLOGUE_SIZE)
  }

  fn block_at(
    &self,
    offset: usize,
  ) -> Block {
    debug_assert!(offset > 0 && offset < self.size);
    match Block::at(offset) {
      Some(block) => block,
      None => unreachable!("heap offsets are nonzero and below 4 GiB"),
    }
  }

  pub(crate) fn read_word(
    &self,
    offset: usize,
  ) -> u32 {
    assert!(offset % WORD_SIZE == 0 && offset + WORD_SIZE <= self.size);
    unsafe { self.base.as_ptr().add(offset).cast::<u32>().read() }
  }

  fn write_word(
    &mut self,
    offset: usize,
    word: u32,
  ) {
    assert!(offset % WORD_SIZE == 0 && offset + WORD_SIZE <= self.size);
    unsafe { self.base.as_ptr().add(offset).cast::<u32>().write(word) }
  }

  pub(crate) fn block_size(
    &self,
    block: Block,
  ) -> usize {
    block::unpack_size(self.read_word(block.offset()))
  }

  pub(crate) fn is_allocated(
    &self,
    block: Block,
  ) -> bool {
    block::unpack_allocated(self.read_word(block.offset()))
  }

  pub(crate) fn set_header(
    &mut self,
    block: Block,
    size: usize,
    allocated: bool,
  ) {
    self.write_word(block.offset(), block::pack(size, allocated));
  }

  /// Writes the footer of a block spanning `size` bytes.
  pub(crate) fn set_footer(
    &mut self,
    block: Block,
    size: usize,
    allocated: bool,
  ) {
    self.write_word(block.offset() + size - WORD_SIZE, block::pack(size, allocated));
  }

  /// Writes matching header and footer.
  pub(crate) fn stamp(
    &mut self,
    block: Block,
    size: usize,
    allocated: bool,
  ) {
    self.set_header(block, size, allocated);
    self.set_footer(block, size, allocated);
  }

  /// The block ending directly below `block`, found through its footer.
  pub(crate) fn address_prev(
    &self,
    block: Block,
  ) -> Block {
    let size = block::unpack_size(self.read_word(block.offset() - WORD_SIZE));
    self.block_at(block.offset() - size)
  }

  /// The block starting directly above `block`.
  pub(crate) fn address_next(
    &self,
    block: Block,
  ) -> Block {
    self.block_at(block.offset() + self.block_size(block))
  }

  pub(crate) fn payload(
    &self,
    block: Block,
  ) -> NonNull<u8> {
    unsafe { self.base.add(block.offset() + WORD_SIZE) }
  }

  /// Recovers the block owning `payload`. Meaningful only for pointers
  /// previously returned by [`payload`](Self::payload).
  pub(crate) fn block_of(
    &self,
    payload: NonNull<u8>,
  ) -> Block {
    let offset = (payload.as_ptr() as usize).wrapping_sub(self.base.as_ptr() as usize + WORD_SIZE);
    self.block_at(offset)
  }

  pub(crate) fn state(
    &self,
    block: Block,
  ) -> BlockState {
    if self.is_allocated(block) {
      BlockState::Allocated {
        payload: self.payload(block),
      }
    } else {
      BlockState::Free {
        prev_free: self.prev_free(block),
        next_free: self.next_free(block),
      }
    }
  }

  pub(crate) fn prev_free(
    &self,
    block: Block,
  ) -> Option<Block> {
    debug_assert!(!self.is_allocated(block), "free link read on an allocated block");
    Block::from_link(self.read_word(block.offset() + WORD_SIZE))
  }

  pub(crate) fn next_free(
    &self,
    block: Block,
  ) -> Option<Block> {
    debug_assert!(!self.is_allocated(block), "free link read on an allocated block");
    Block::from_link(self.read_word(block.offset() + 2 * WORD_SIZE))
  }

  pub(crate) fn set_prev_free(
    &mut self,
    block: Block,
    prev: Option<Block>,
  ) {
    debug_assert!(!self.is_allocated(block), "free link written on an allocated block");
    self.write_word(block.offset() + WORD_SIZE, Block::to_link(prev));
  }

  pub(crate) fn set_next_free(
    &mut self,
    block: Block,
    next: Option<Block>,
  ) {
    debug_assert!(!self.is_allocated(block), "free link written on an allocated block");
    self.write_word(block.offset() + 2 * WORD_SIZE, Block::to_link(next));
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::MmapRegion;

  pub(crate) fn empty_heap() -> Heap<MmapRegion> {
    Heap::bootstrap(MmapRegion::reserve(1 << 16).unwrap()).unwrap()
  }

  /// Grows an empty heap by `sizes.iter().sum()` bytes and stamps one free
  /// block per entry. Adjacent free blocks are fine for accessor tests.
  pub(crate) fn heap_with_free_blocks(sizes: &[usize]) -> (Heap<MmapRegion>, Vec<Block>) {
    let mut heap = empty_heap();
    let mut block = heap.grow(sizes.iter().sum()).unwrap();
    let mut blocks = Vec::new();

    for &size in sizes {
      heap.stamp(block, size, false);
      heap.set_prev_free(block, None);
      heap.set_next_free(block, None);
      blocks.push(block);
      block = heap.address_next(block);
    }

    heap.set_header(block, 0, true);

    (heap, blocks)
  }

  #[test]
  fn test_bootstrap_layout() {
    let heap = empty_heap();

    assert_eq!(heap.size(), 16);
    assert_eq!(heap.prologue().offset(), 4);
    assert_eq!(heap.block_size(heap.prologue()), 8);
    assert!(heap.is_allocated(heap.prologue()));
    assert_eq!(heap.epilogue().offset(), 12);
    assert_eq!(heap.first_block(), heap.epilogue());
    assert_eq!(heap.block_size(heap.epilogue()), 0);
    assert!(heap.is_allocated(heap.epilogue()));
  }

  #[test]
  fn test_address_adjacency() {
    let (heap, blocks) = heap_with_free_blocks(&[16, 32, 24]);

    assert_eq!(blocks[0], heap.first_block());
    assert_eq!(heap.address_next(blocks[0]), blocks[1]);
    assert_eq!(heap.address_next(blocks[1]), blocks[2]);
    assert_eq!(heap.address_next(blocks[2]), heap.epilogue());
    assert_eq!(heap.address_prev(blocks[2]), blocks[1]);
    assert_eq!(heap.address_prev(blocks[1]), blocks[0]);
    assert_eq!(heap.address_prev(blocks[0]), heap.prologue());
  }

  #[test]
  fn test_payload_round_trip() {
    let (heap, blocks) = heap_with_free_blocks(&[16, 32]);

    for block in blocks {
      let payload = heap.payload(block);

      assert_eq!(payload.as_ptr() as usize % ALIGNMENT, 0);
      assert_eq!(heap.block_of(payload), block);
    }
  }

  #[test]
  fn test_state_views() {
    let (mut heap, blocks) = heap_with_free_blocks(&[16, 16]);

    heap.set_next_free(blocks[0], Some(blocks[1]));

    assert_eq!(
      heap.state(blocks[0]),
      BlockState::Free {
        prev_free: None,
        next_free: Some(blocks[1]),
      }
    );

    heap.stamp(blocks[1], 16, true);

    assert_eq!(
      heap.state(blocks[1]),
      BlockState::Allocated {
        payload: heap.payload(blocks[1]),
      }
    );
  }

  #[test]
  fn test_grow_failure_leaves_heap_untouched() {
    let mut heap = Heap::bootstrap(MmapRegion::reserve(4096).unwrap()).unwrap();

    assert_eq!(
      heap.grow(8192),
      Err(AllocError::OutOfMemory { requested: 8192 })
    );
    assert_eq!(heap.size(), 16);
    assert!(heap.is_allocated(heap.epilogue()));
  }

  #[test]
  fn test_bootstrap_refuses_misaligned_base() {
    let mut region = MmapRegion::reserve(4096).unwrap();
    region.grow(WORD_SIZE).unwrap();

    match Heap::bootstrap(region) {
      Err(AllocError::Misaligned { address }) => assert_eq!(address % ALIGNMENT, WORD_SIZE),
      Err(err) => panic!("unexpected error: {err}"),
      Ok(_) => panic!("misaligned base accepted"),
    }
  }
}
