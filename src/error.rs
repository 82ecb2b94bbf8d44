use thiserror::Error;

/// Failures surfaced by the allocation entry points.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocError {
  #[error("out of heap memory (requested: {requested} bytes)")]
  OutOfMemory { requested: usize },

  #[error("heap growth returned {actual:#x}, expected a contiguous extension at {expected:#x}")]
  Discontiguous { expected: usize, actual: usize },

  #[error("heap region starts at misaligned address {address:#x}")]
  Misaligned { address: usize },

  #[error("alignment of {align} bytes is not supported by this heap")]
  UnsupportedAlignment { align: usize },

  #[error(transparent)]
  Config(#[from] ConfigError),
}

/// Rejected [`HeapConfig`](crate::HeapConfig) values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("{field} = {value} is not a multiple of the heap alignment")]
  Unaligned { field: &'static str, value: usize },

  #[error("{field} = {value} is below the minimum of {min}")]
  TooSmall {
    field: &'static str,
    value: usize,
    min: usize,
  },

  #[error("{field} = {value} exceeds the maximum heap size")]
  TooLarge { field: &'static str, value: usize },

  #[error("split threshold {split} is above the front split threshold {front_split}")]
  ThresholdOrder { split: usize, front_split: usize },
}

/// Heap consistency violations reported by
/// [`ExplicitAllocator::check`](crate::ExplicitAllocator::check).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapCheckError {
  #[error("prologue block is damaged")]
  BadPrologue,

  #[error("epilogue expected at offset {expected}, found a zero-size header at {offset}")]
  MisplacedEpilogue { offset: usize, expected: usize },

  #[error("epilogue at offset {offset} is not marked allocated")]
  FreeEpilogue { offset: usize },

  #[error("block at offset {offset} has invalid size {size}")]
  BadSize { offset: usize, size: usize },

  #[error("block at offset {offset} with size {size} runs past the end of the heap")]
  Overrun { offset: usize, size: usize },

  #[error("block at offset {offset}: header {header:#x} does not match footer {footer:#x}")]
  FooterMismatch {
    offset: usize,
    header: u32,
    footer: u32,
  },

  #[error("free blocks at offset {offset} and its predecessor are adjacent")]
  AdjacentFree { offset: usize },

  #[error("free list entry at offset {offset} is marked allocated")]
  ListedAllocated { offset: usize },

  #[error("free list entry at offset {offset} is not a block boundary")]
  NotABlock { offset: usize },

  #[error("free list entry at offset {offset} appears more than once")]
  DuplicateEntry { offset: usize },

  #[error("free list back link of the entry at offset {offset} is broken")]
  BrokenLink { offset: usize },

  #[error("free list tail does not match the last reachable entry")]
  TailMismatch,

  #[error("{marked} blocks are marked free but the free list holds {listed}")]
  CountMismatch { marked: usize, listed: usize },
}
