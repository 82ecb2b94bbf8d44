//! Heap walking and consistency checks.

use std::{collections::BTreeSet, fmt, ptr::NonNull};

use crate::{
  ExplicitAllocator, HeapCheckError, HeapSource,
  block::{self, ALIGNMENT, Block, MIN_BLOCK_SIZE, PROLOGUE_SIZE, WORD_SIZE},
  heap::{BlockState, Heap},
};

/// One block as seen by an address-order walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  /// Header offset from the heap base.
  pub offset: usize,
  /// Size including header and footer.
  pub size: usize,
  pub allocated: bool,
  /// Payload pointer of an allocated block.
  pub payload: Option<NonNull<u8>>,
}

impl fmt::Display for BlockInfo {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let state = if self.allocated { "alloc" } else { "free" };
    write!(f, "@{:<6} {:>6} bytes  {}", self.offset, self.size, state)
  }
}

/// Totals gathered by [`ExplicitAllocator::check`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub heap_size: usize,
  pub free_blocks: usize,
  pub allocated_blocks: usize,
  pub free_bytes: usize,
  pub allocated_bytes: usize,
}

/// Address-order walk from the first block up to, not including, the epilogue.
pub struct Blocks<'a, S> {
  heap: &'a Heap<S>,
  cursor: Block,
}

impl<S> Iterator for Blocks<'_, S> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let size = self.heap.block_size(self.cursor);

    if size == 0 {
      return None;
    }

    let info = describe(self.heap, self.cursor);
    self.cursor = self.heap.address_next(self.cursor);

    Some(info)
  }
}

fn describe<S>(
  heap: &Heap<S>,
  block: Block,
) -> BlockInfo {
  let payload = match heap.state(block) {
    BlockState::Allocated { payload } => Some(payload),
    BlockState::Free { .. } => None,
  };

  BlockInfo {
    offset: block.offset(),
    size: heap.block_size(block),
    allocated: payload.is_some(),
    payload,
  }
}

impl<S: HeapSource> ExplicitAllocator<S> {
  /// Walks every block between the prologue and the epilogue.
  ///
  /// The walk trusts the block headers; run [`check`](Self::check) first when
  /// the heap may have been corrupted.
  pub fn blocks(&self) -> Blocks<'_, S> {
    Blocks {
      heap: &self.heap,
      cursor: self.heap.first_block(),
    }
  }

  /// Free blocks in free-list order, head to tail.
  pub fn free_blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self
      .free_list
      .iter(&self.heap)
      .map(|block| describe(&self.heap, block))
  }

  /// Verifies the heap invariants:
  ///
  /// - blocks tile the heap from prologue to epilogue with no gaps,
  /// - each block is aligned, at least the minimum size, and its header
  ///   matches its footer,
  /// - no two free blocks are adjacent,
  /// - the free list holds exactly the free blocks, once each, with
  ///   consistent links in both directions.
  pub fn check(&self) -> Result<HeapStats, HeapCheckError> {
    let heap = &self.heap;
    let prologue = heap.prologue();

    if heap.read_word(prologue.offset()) != block::pack(PROLOGUE_SIZE, true)
      || heap.read_word(prologue.offset() + WORD_SIZE) != block::pack(PROLOGUE_SIZE, true)
    {
      return Err(HeapCheckError::BadPrologue);
    }

    let epilogue_offset = heap.size() - WORD_SIZE;
    let mut stats = HeapStats {
      heap_size: heap.size(),
      ..HeapStats::default()
    };
    let mut free = BTreeSet::new();
    let mut offset = heap.first_block().offset();
    let mut prev_free = false;

    loop {
      let header = heap.read_word(offset);
      let size = block::unpack_size(header);
      let allocated = block::unpack_allocated(header);

      if size == 0 {
        if offset != epilogue_offset {
          return Err(HeapCheckError::MisplacedEpilogue {
            offset,
            expected: epilogue_offset,
          });
        }

        if !allocated {
          return Err(HeapCheckError::FreeEpilogue { offset });
        }

        break;
      }

      if size % ALIGNMENT != 0 || size < MIN_BLOCK_SIZE {
        return Err(HeapCheckError::BadSize { offset, size });
      }

      if size > epilogue_offset - offset {
        return Err(HeapCheckError::Overrun { offset, size });
      }

      let footer = heap.read_word(offset + size - WORD_SIZE);

      if footer != header {
        return Err(HeapCheckError::FooterMismatch {
          offset,
          header,
          footer,
        });
      }

      if allocated {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += size;
      } else {
        if prev_free {
          return Err(HeapCheckError::AdjacentFree { offset });
        }

        free.insert(offset);
        stats.free_blocks += 1;
        stats.free_bytes += size;
      }

      prev_free = !allocated;
      offset += size;
    }

    self.check_free_list(&free)?;

    Ok(stats)
  }

  fn check_free_list(
    &self,
    free: &BTreeSet<usize>,
  ) -> Result<(), HeapCheckError> {
    let heap = &self.heap;
    let mut seen = BTreeSet::new();
    let mut prev = None;
    let mut cursor = self.free_list.head();

    while let Some(block) = cursor {
      let offset = block.offset();

      if !free.contains(&offset) {
        if offset % WORD_SIZE != 0 || offset + WORD_SIZE > heap.size() {
          return Err(HeapCheckError::NotABlock { offset });
        }

        return match heap.state(block) {
          BlockState::Allocated { .. } => Err(HeapCheckError::ListedAllocated { offset }),
          BlockState::Free { .. } => Err(HeapCheckError::NotABlock { offset }),
        };
      }

      if !seen.insert(offset) {
        return Err(HeapCheckError::DuplicateEntry { offset });
      }

      let BlockState::Free {
        prev_free,
        next_free,
      } = heap.state(block)
      else {
        return Err(HeapCheckError::ListedAllocated { offset });
      };

      if prev_free != prev {
        return Err(HeapCheckError::BrokenLink { offset });
      }

      prev = Some(block);
      cursor = next_free;
    }

    if self.free_list.tail() != prev {
      return Err(HeapCheckError::TailMismatch);
    }

    if seen.len() != free.len() || self.free_list.len() != free.len() {
      return Err(HeapCheckError::CountMismatch {
        marked: free.len(),
        listed: seen.len(),
      });
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::allocator::tests::allocator;

  #[test]
  fn test_fresh_heap_passes() {
    let allocator = allocator();

    assert_eq!(
      allocator.check(),
      Ok(HeapStats {
        heap_size: 5016,
        free_blocks: 1,
        allocated_blocks: 0,
        free_bytes: 5000,
        allocated_bytes: 0,
      })
    );
  }

  #[test]
  fn test_blocks_tile_heap() {
    let mut allocator = allocator();

    for size in [10, 200, 3000, 40] {
      allocator.allocate(size).unwrap().unwrap();
    }

    let total: usize = allocator.blocks().map(|info| info.size).sum();

    assert_eq!(total + WORD_SIZE + PROLOGUE_SIZE + WORD_SIZE, allocator.heap_size());
    assert!(allocator.blocks().filter(|info| info.allocated).all(|info| info.payload.is_some()));
  }

  #[test]
  fn test_detects_footer_mismatch() {
    let mut allocator = allocator();
    let block = allocator.heap.first_block();

    allocator.heap.set_header(block, 5000, true);

    assert_eq!(
      allocator.check(),
      Err(HeapCheckError::FooterMismatch {
        offset: 12,
        header: block::pack(5000, true),
        footer: block::pack(5000, false),
      })
    );
  }

  #[test]
  fn test_detects_adjacent_free_blocks() {
    let mut allocator = allocator();
    let block = allocator.heap.first_block();

    allocator.heap.stamp(block, 2496, false);
    let upper = allocator.heap.address_next(block);
    allocator.heap.stamp(upper, 2504, false);

    assert_eq!(
      allocator.check(),
      Err(HeapCheckError::AdjacentFree {
        offset: upper.offset(),
      })
    );
  }

  #[test]
  fn test_detects_unlisted_free_block() {
    let mut allocator = allocator();
    let block = allocator.heap.first_block();

    allocator.free_list.remove(&mut allocator.heap, block);

    assert_eq!(
      allocator.check(),
      Err(HeapCheckError::CountMismatch {
        marked: 1,
        listed: 0,
      })
    );
  }

  #[test]
  fn test_detects_allocated_block_on_list() {
    let mut allocator = allocator();
    let block = allocator.heap.first_block();

    allocator.heap.stamp(block, 5000, true);

    assert_eq!(
      allocator.check(),
      Err(HeapCheckError::ListedAllocated { offset: 12 })
    );
  }

  #[test]
  fn test_free_blocks_follow_list_order() {
    let mut allocator = allocator();

    let large = allocator.allocate(2000).unwrap().unwrap();
    allocator.allocate(8).unwrap().unwrap();
    unsafe { allocator.free(large.as_ptr()) };

    let offsets: Vec<_> = allocator.free_blocks().map(|info| info.offset).collect();

    assert_eq!(offsets, vec![12, 3004]);
    assert!(allocator.free_blocks().all(|info| !info.allocated));
  }
}
