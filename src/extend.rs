use crate::{AllocError, ExplicitAllocator, HeapSource, block::Block};

impl<S: HeapSource> ExplicitAllocator<S> {
  /// Grows the heap by `size` bytes and folds the new space into the free
  /// block at the old end of the heap, if there is one.
  ///
  /// A failed growth leaves the heap as it was.
  pub(crate) fn extend_heap(
    &mut self,
    size: usize,
  ) -> Result<Block, AllocError> {
    let block = self.heap.grow(size).inspect_err(|err| {
      log::warn!("heap growth by {size} bytes failed: {err}");
    })?;

    self.heap.stamp(block, size, false);
    let epilogue = self.heap.address_next(block);
    self.heap.set_header(epilogue, 0, true);

    log::debug!(
      "heap grew by {} bytes to {} bytes",
      size,
      self.heap.size()
    );

    Ok(self.coalesce(block))
  }
}
