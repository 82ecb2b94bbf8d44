use std::ptr::{self, NonNull};

use crate::{
  AllocError, ExplicitAllocator, HeapSource,
  block::{OVERHEAD, required_block_size},
};

impl<S: HeapSource> ExplicitAllocator<S> {
  /// Resizes the allocation behind `ptr` to at least `size` payload bytes.
  ///
  /// * A null `ptr` allocates.
  /// * A `size` of 0 frees `ptr` and returns `Ok(None)`.
  /// * A block that is already large enough is returned unchanged; blocks
  ///   never shrink.
  /// * A free block directly above is absorbed in place when that is enough.
  /// * Otherwise the payload moves to a new block and the old one is freed.
  ///
  /// On error the original allocation is left untouched.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live payload pointer returned by this allocator.
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> Result<Option<NonNull<u8>>, AllocError> {
    let Some(payload) = NonNull::new(ptr) else {
      return self.allocate(size);
    };

    if size == 0 {
      unsafe { self.free(ptr) };
      return Ok(None);
    }

    let required = required_block_size(size).ok_or(AllocError::OutOfMemory { requested: size })?;
    let block = self.heap.block_of(payload);
    let current = self.heap.block_size(block);

    if current >= required {
      return Ok(Some(payload));
    }

    let next = self.heap.address_next(block);

    if !self.heap.is_allocated(next) {
      let merged = current + self.heap.block_size(next);

      if merged >= required {
        self.free_list.remove(&mut self.heap, next);
        self.heap.stamp(block, merged, true);

        log::trace!(
          "grew block @{} in place from {} to {} bytes",
          block.offset(),
          current,
          merged
        );

        return Ok(Some(payload));
      }
    }

    let moved = self.allocate_block(size)?;
    let destination = self.heap.payload(moved);
    let length = (current - OVERHEAD).min(required - OVERHEAD);

    unsafe {
      ptr::copy_nonoverlapping(payload.as_ptr(), destination.as_ptr(), length);
      self.free(ptr);
    }

    Ok(Some(destination))
  }
}

#[cfg(test)]
mod tests {
  use std::ptr;

  use crate::{AllocError, ExplicitAllocator, MmapRegion, allocator::tests::allocator};

  fn fill(
    ptr: *mut u8,
    len: usize,
  ) {
    for i in 0..len {
      unsafe { ptr.add(i).write(i as u8) };
    }
  }

  fn assert_filled(
    ptr: *const u8,
    len: usize,
  ) {
    for i in 0..len {
      assert_eq!(unsafe { ptr.add(i).read() }, i as u8, "byte {i}");
    }
  }

  #[test]
  fn test_null_pointer_allocates() {
    let mut allocator = allocator();

    let ptr = unsafe { allocator.reallocate(ptr::null_mut(), 100) }
      .unwrap()
      .unwrap();

    assert_eq!(unsafe { allocator.usable_size(ptr) }, 104);
    allocator.check().unwrap();
  }

  #[test]
  fn test_zero_size_frees() {
    let mut allocator = allocator();
    let ptr = allocator.allocate(100).unwrap().unwrap();

    let result = unsafe { allocator.reallocate(ptr.as_ptr(), 0) };

    assert_eq!(result, Ok(None));
    assert_eq!(allocator.check().unwrap().allocated_blocks, 0);
  }

  #[test]
  fn test_shrink_keeps_pointer() {
    let mut allocator = allocator();
    let ptr = allocator.allocate(100).unwrap().unwrap();

    let shrunk = unsafe { allocator.reallocate(ptr.as_ptr(), 50) }
      .unwrap()
      .unwrap();

    assert_eq!(shrunk, ptr);
    assert_eq!(unsafe { allocator.usable_size(shrunk) }, 104);
  }

  #[test]
  fn test_grows_into_free_successor() {
    let mut allocator = allocator();

    let upper = allocator.allocate(100).unwrap().unwrap();
    let lower = allocator.allocate(100).unwrap().unwrap();
    fill(lower.as_ptr(), 100);
    unsafe { allocator.free(upper.as_ptr()) };

    let grown = unsafe { allocator.reallocate(lower.as_ptr(), 200) }
      .unwrap()
      .unwrap();

    assert_eq!(grown, lower);
    assert_eq!(unsafe { allocator.usable_size(grown) }, 224 - 8);
    assert_filled(grown.as_ptr(), 100);

    let stats = allocator.check().unwrap();
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.allocated_blocks, 1);
  }

  #[test]
  fn test_moves_when_successor_is_allocated() {
    let mut allocator = allocator();

    let ptr = allocator.allocate(100).unwrap().unwrap();
    fill(ptr.as_ptr(), 100);

    let moved = unsafe { allocator.reallocate(ptr.as_ptr(), 300) }
      .unwrap()
      .unwrap();

    assert_ne!(moved, ptr);
    assert_filled(moved.as_ptr(), 100);
    assert!(unsafe { allocator.usable_size(moved) } >= 300);

    let stats = allocator.check().unwrap();
    assert_eq!(stats.allocated_blocks, 1);
    assert_eq!(stats.free_blocks, 2);
  }

  #[test]
  fn test_failed_move_keeps_original() {
    let mut allocator = ExplicitAllocator::init(MmapRegion::reserve(8192).unwrap()).unwrap();

    let ptr = allocator.allocate(100).unwrap().unwrap();
    fill(ptr.as_ptr(), 100);

    let result = unsafe { allocator.reallocate(ptr.as_ptr(), 6000) };

    assert!(matches!(result, Err(AllocError::OutOfMemory { .. })));
    assert_filled(ptr.as_ptr(), 100);
    assert_eq!(allocator.check().unwrap().allocated_blocks, 1);
  }
}
