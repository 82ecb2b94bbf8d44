//! # explicit-alloc - An Explicit Free-List Memory Allocator
//!
//! This crate provides a dynamic memory allocator with `allocate`, `free` and
//! `reallocate` over a single growable heap region, grown with `sbrk(2)` or
//! carved out of an `mmap(2)` reservation.
//!
//! ## Overview
//!
//! Blocks tile the heap with no gaps. Each carries a boundary tag (header and
//! footer), and free blocks are additionally linked into a doubly-linked list
//! stored inside their own payload:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬──────────┬─────────┬────────┬───────────┬──────────┬──────────┐
//!   │ pad │ prologue │  free   │ alloc  │   free    │  alloc   │ epilogue │
//!   │     │  8 | 1   │         │        │           │          │  0 | 1   │
//!   └─────┴──────────┴────┬────┴────────┴─────┬─────┴──────────┴──────────┘
//!                         │      ▲            │
//!                         └──────┼────────────┘ next_free
//!                                │
//!                          head ─┘   free list (insertion order)
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   explicit_alloc
//!   ├── align       - Alignment macros (align!, align_to!)
//!   ├── block       - Header/footer encoding, block sizes
//!   ├── heap        - Heap region, block accessors, address adjacency
//!   ├── source      - Heap growth: Sbrk, MmapRegion
//!   ├── free_list   - Explicit doubly-linked free list
//!   ├── coalesce    - Boundary-tag merging of free neighbors
//!   ├── extend      - Heap extension on a failed fit
//!   ├── placement   - Fit search and split policy
//!   ├── realloc     - In-place growth and move-and-copy
//!   ├── check       - Heap walk and invariant checks
//!   └── allocator   - ExplicitAllocator entry points
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use explicit_alloc::{ExplicitAllocator, MmapRegion};
//!
//! let region = MmapRegion::reserve(1 << 20).unwrap();
//! let mut allocator = ExplicitAllocator::init(region).unwrap();
//!
//! let ptr = allocator.allocate(100).unwrap().unwrap();
//!
//! unsafe {
//!     ptr.as_ptr().write_bytes(0x2A, 100);
//!     let ptr = allocator.reallocate(ptr.as_ptr(), 400).unwrap().unwrap();
//!     assert_eq!(*ptr.as_ptr().add(99), 0x2A);
//!     allocator.free(ptr.as_ptr());
//! }
//!
//! allocator.check().unwrap();
//! ```
//!
//! ## How It Works
//!
//! ```text
//!   allocate ──► find_fit ──hit──► place ──► payload
//!                   │                ▲
//!                  miss              │
//!                   ▼                │
//!              extend_heap ──► coalesce
//!
//!   free ──────► coalesce ──► free list
//!
//!   reallocate ──► fits already? ──► same pointer
//!                  next block free and big enough? ──► absorb, same pointer
//!                  otherwise ──► allocate, copy, free
//! ```
//!
//! Small requests scan the free list from its tail, large ones (above 1024
//! bytes) from its head. A remainder above 1024 bytes stays free in the lower
//! part of the block, one above 512 bytes is split off above the allocation,
//! and anything smaller is left inside the allocated block.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Grow-only**: The heap is never returned to the operating system
//! - **8-byte alignment**: Wider alignments are refused
//! - **4 GiB heap**: Offsets and sizes are stored in 32-bit words
//! - **Unix-only**: Requires `libc` (`sbrk`, `mmap`)
//!
//! ## Safety
//!
//! `free`, `reallocate` and `usable_size` trust their pointer argument: passing
//! anything but a live payload pointer from the same allocator is undefined
//! behavior. No tagging or validation of payload pointers is performed.

pub mod align;
mod allocator;
mod block;
mod check;
mod coalesce;
mod config;
mod error;
mod extend;
mod free_list;
mod heap;
mod placement;
mod realloc;
mod source;

pub use allocator::ExplicitAllocator;
pub use block::{ALIGNMENT, MIN_BLOCK_SIZE, OVERHEAD, required_block_size};
pub use check::{BlockInfo, Blocks, HeapStats};
pub use config::{
  FRONT_SPLIT_THRESHOLD, GROWTH_CHUNK, HeapConfig, INITIAL_EXTENSION, PlacementPolicy,
  SEARCH_THRESHOLD, SPLIT_THRESHOLD,
};
pub use error::{AllocError, ConfigError, HeapCheckError};
pub use free_list::ListEnd;
pub use source::{HeapSource, MmapRegion, Sbrk};
