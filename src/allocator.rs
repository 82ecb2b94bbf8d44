use std::{alloc::Layout, ptr::NonNull};

use crate::{
  ALIGNMENT, AllocError, HeapConfig, HeapSource, Sbrk,
  block::{Block, OVERHEAD, required_block_size},
  free_list::FreeList,
  heap::Heap,
};

/// An explicit free-list allocator over one growable heap.
///
/// All state lives in the value itself, so independent heaps can coexist and
/// tests never need to reset globals. The allocator is single-threaded and
/// not reentrant.
pub struct ExplicitAllocator<S: HeapSource = Sbrk> {
  pub(crate) heap: Heap<S>,
  pub(crate) free_list: FreeList,
  pub(crate) config: HeapConfig,
}

impl ExplicitAllocator<Sbrk> {
  /// Bootstraps a heap on the process data segment.
  pub fn with_sbrk() -> Result<Self, AllocError> {
    Self::init(Sbrk::new())
  }
}

impl<S: HeapSource> ExplicitAllocator<S> {
  /// Bootstraps a heap with the default configuration.
  pub fn init(source: S) -> Result<Self, AllocError> {
    Self::with_config(source, HeapConfig::default())
  }

  /// Writes the prologue and epilogue, then creates the initial free block.
  pub fn with_config(
    source: S,
    config: HeapConfig,
  ) -> Result<Self, AllocError> {
    config.validate()?;

    let mut allocator = Self {
      heap: Heap::bootstrap(source)?,
      free_list: FreeList::default(),
      config,
    };

    allocator.free_list.init();
    allocator.extend_heap(config.initial_extension)?;

    log::debug!(
      "heap bootstrapped with {} bytes of free space",
      config.initial_extension
    );

    Ok(allocator)
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  /// Bytes currently managed, sentinels included.
  pub fn heap_size(&self) -> usize {
    self.heap.size()
  }

  /// Allocates a payload of at least `size` bytes, aligned to 8.
  ///
  /// Returns `Ok(None)` for `size == 0`: nothing is allocated and nothing
  /// went wrong.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    if size == 0 {
      return Ok(None);
    }

    let block = self.allocate_block(size)?;

    Ok(Some(self.heap.payload(block)))
  }

  /// Like [`allocate`](Self::allocate) for a [`Layout`]. Alignments above 8
  /// bytes are refused.
  pub fn allocate_layout(
    &mut self,
    layout: Layout,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    if layout.align() > ALIGNMENT {
      return Err(AllocError::UnsupportedAlignment {
        align: layout.align(),
      });
    }

    self.allocate(layout.size())
  }

  pub(crate) fn allocate_block(
    &mut self,
    size: usize,
  ) -> Result<Block, AllocError> {
    let required = required_block_size(size).ok_or(AllocError::OutOfMemory { requested: size })?;

    let block = match self.find_fit(required) {
      Some(block) => block,
      None => self.extend_heap(required.max(self.config.growth_chunk))?,
    };

    Ok(self.place(block, required))
  }

  /// Returns a payload to the heap, merging it with free neighbors.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a payload pointer returned by this allocator that
  /// has not been freed since. Null is ignored.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    let Some(payload) = NonNull::new(ptr) else {
      return;
    };

    let block = self.heap.block_of(payload);
    self.coalesce(block);
  }

  /// Payload bytes available behind `ptr`, at least what was requested.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live payload pointer returned by this allocator.
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    self.heap.block_size(self.heap.block_of(ptr)) - OVERHEAD
  }
}
