//! Raw heap growth.
//!
//! A [`HeapSource`] hands out address space the way `sbrk(2)` does: every
//! successful call returns the start of `increment` fresh bytes that directly
//! follow the bytes returned by the previous call.

use std::ptr::{self, NonNull};

use libc::{c_void, intptr_t, sbrk};

use crate::{ALIGNMENT, AllocError};

/// Contiguous, grow-only address space backing a heap.
pub trait HeapSource {
  /// Extends the region by `increment` bytes and returns the start of the new
  /// space. A failed call must leave the region unchanged.
  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, AllocError>;
}

/// Grows the process data segment with `sbrk(2)`.
///
/// Anything else in the process that moves the program break between two
/// calls (the system allocator included) breaks contiguity; the next
/// [`grow`](HeapSource::grow) then reports [`AllocError::Discontiguous`].
#[derive(Debug, Default)]
pub struct Sbrk {
  end: Option<usize>,
}

impl Sbrk {
  pub const fn new() -> Self {
    Self { end: None }
  }

  /// Moves the break forward so the first region starts 8-byte aligned.
  unsafe fn align_break(&mut self) -> Result<(), AllocError> {
    let current = unsafe { sbrk(0) } as usize;
    let pad = current.wrapping_neg() & (ALIGNMENT - 1);

    if pad != 0 && unsafe { sbrk(pad as intptr_t) } == usize::MAX as *mut c_void {
      return Err(AllocError::OutOfMemory { requested: pad });
    }

    Ok(())
  }
}

impl HeapSource for Sbrk {
  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let out_of_memory = AllocError::OutOfMemory {
      requested: increment,
    };
    let delta = intptr_t::try_from(increment).map_err(|_| out_of_memory.clone())?;

    if self.end.is_none() {
      unsafe { self.align_break()? };
    }

    let address = unsafe { sbrk(delta) };

    if address == usize::MAX as *mut c_void {
      return Err(out_of_memory);
    }

    let start = address as usize;

    match self.end {
      Some(expected) if expected != start => {
        // Hand the bytes back so the failed call leaves the break where it was.
        unsafe { sbrk(-delta) };

        return Err(AllocError::Discontiguous {
          expected,
          actual: start,
        });
      }
      _ => {}
    }

    self.end = Some(start + increment);

    NonNull::new(address.cast::<u8>()).ok_or(out_of_memory)
  }
}

/// A fixed reservation made once with `mmap(2)` and handed out front to back.
///
/// Several independent heaps can live side by side in one process, and a
/// heap backed by a region cannot collide with the system allocator's use of
/// the program break. The mapping is released when the region is dropped.
#[derive(Debug)]
pub struct MmapRegion {
  base: NonNull<u8>,
  capacity: usize,
  brk: usize,
}

impl MmapRegion {
  /// Reserves `capacity` bytes of zeroed, read-write memory.
  pub fn reserve(capacity: usize) -> Result<Self, AllocError> {
    let out_of_memory = AllocError::OutOfMemory {
      requested: capacity,
    };

    if capacity == 0 {
      return Err(out_of_memory);
    }

    let address = unsafe {
      libc::mmap(
        ptr::null_mut(),
        capacity,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
        -1,
        0,
      )
    };

    if address == libc::MAP_FAILED {
      return Err(out_of_memory);
    }

    let base = NonNull::new(address.cast::<u8>()).ok_or(out_of_memory)?;

    Ok(Self {
      base,
      capacity,
      brk: 0,
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.brk
  }
}

impl HeapSource for MmapRegion {
  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    if increment > self.capacity - self.brk {
      return Err(AllocError::OutOfMemory {
        requested: increment,
      });
    }

    let start = unsafe { self.base.add(self.brk) };
    self.brk += increment;

    Ok(start)
  }
}

impl Drop for MmapRegion {
  fn drop(&mut self) {
    unsafe { libc::munmap(self.base.as_ptr().cast(), self.capacity) };
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Mutex, MutexGuard, PoisonError};

  use super::*;
  use crate::{ExplicitAllocator, HeapConfig};

  /// The program break is process-wide; tests that move it take turns.
  static BREAK: Mutex<()> = Mutex::new(());

  fn lock_break() -> MutexGuard<'static, ()> {
    BREAK.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn current_break() -> usize {
    unsafe { sbrk(0) as usize }
  }

  #[test]
  fn test_region_grows_contiguously() {
    let mut region = MmapRegion::reserve(4096).unwrap();

    let first = region.grow(16).unwrap();
    let second = region.grow(64).unwrap();

    assert_eq!(first.as_ptr() as usize % ALIGNMENT, 0);
    assert_eq!(unsafe { first.add(16) }, second);
    assert_eq!(region.used(), 80);
  }

  #[test]
  fn test_region_refuses_past_capacity() {
    let mut region = MmapRegion::reserve(4096).unwrap();

    assert_eq!(region.capacity(), 4096);
    region.grow(4000).unwrap();

    assert_eq!(
      region.grow(100),
      Err(AllocError::OutOfMemory { requested: 100 })
    );
    assert_eq!(region.used(), 4000);

    region.grow(96).unwrap();
    assert_eq!(region.used(), 4096);
  }

  #[test]
  fn test_region_memory_is_writable() {
    let mut region = MmapRegion::reserve(4096).unwrap();
    let start = region.grow(128).unwrap();

    unsafe {
      ptr::write_bytes(start.as_ptr(), 0xAB, 128);
      assert_eq!(*start.as_ptr().add(127), 0xAB);
    }
  }

  #[test]
  fn test_sbrk_first_region_is_aligned_and_contiguous() {
    let _guard = lock_break();
    let mut source = Sbrk::new();

    let first = source.grow(16).unwrap();
    let second = source.grow(32).unwrap();

    assert_eq!(first.as_ptr() as usize % ALIGNMENT, 0);
    assert_eq!(unsafe { first.add(16) }, second);
    assert_eq!(current_break(), second.as_ptr() as usize + 32);
  }

  #[test]
  fn test_sbrk_foreign_move_is_rolled_back() {
    let _guard = lock_break();
    let mut source = Sbrk::new();

    let first = source.grow(16).unwrap();
    unsafe { sbrk(8) };
    let before = current_break();

    for _ in 0..2 {
      assert_eq!(
        source.grow(16),
        Err(AllocError::Discontiguous {
          expected: first.as_ptr() as usize + 16,
          actual: before,
        })
      );
      assert_eq!(current_break(), before);
    }
  }

  #[test]
  fn test_with_sbrk_bootstraps_heap() {
    let _guard = lock_break();
    let mut allocator = ExplicitAllocator::with_sbrk().unwrap();

    assert_eq!(allocator.config(), &HeapConfig::default());
    assert_eq!(allocator.heap_size(), 5016);

    let ptr = allocator.allocate(100).unwrap().unwrap();
    assert_eq!(ptr.as_ptr() as usize % ALIGNMENT, 0);
    allocator.check().unwrap();
  }
}
