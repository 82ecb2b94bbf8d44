use crate::{
  ConfigError, ListEnd, align,
  block::{MAX_HEAP_SIZE, MIN_BLOCK_SIZE},
};

/// Free space requested from the source when the heap is bootstrapped.
pub const INITIAL_EXTENSION: usize = 5000;

/// Smallest amount the heap grows by when no free block fits.
pub const GROWTH_CHUNK: usize = 4096;

/// Block sizes above this are searched for head to tail, the rest tail to head.
pub const SEARCH_THRESHOLD: usize = 1024;

/// Remainders above this keep the lower part free and hand out the upper part.
pub const FRONT_SPLIT_THRESHOLD: usize = 1024;

/// Remainders at or below this are not split off at all.
pub const SPLIT_THRESHOLD: usize = 512;

/// Fit and split heuristics.
///
/// The defaults are empirically chosen; they are kept as data so they can be
/// tuned and tested one at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementPolicy {
  /// Requests with a block size above this scan the free list from its head,
  /// the others from its tail.
  pub search_threshold: usize,

  /// Remainders above this stay free in the lower part of the block.
  pub front_split_threshold: usize,

  /// Remainders at or below this are left inside the allocated block.
  pub split_threshold: usize,

  /// Where freed blocks without a free lower neighbor join the free list.
  pub release_end: ListEnd,
}

impl Default for PlacementPolicy {
  fn default() -> Self {
    Self {
      search_threshold: SEARCH_THRESHOLD,
      front_split_threshold: FRONT_SPLIT_THRESHOLD,
      split_threshold: SPLIT_THRESHOLD,
      release_end: ListEnd::Back,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapConfig {
  /// Bytes of free space created by bootstrap. Default: 5000.
  pub initial_extension: usize,

  /// Minimum heap growth on a failed fit. Default: 4096.
  pub growth_chunk: usize,

  pub policy: PlacementPolicy,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      initial_extension: INITIAL_EXTENSION,
      growth_chunk: GROWTH_CHUNK,
      policy: PlacementPolicy::default(),
    }
  }
}

impl HeapConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    check_extension("initial_extension", self.initial_extension)?;
    check_extension("growth_chunk", self.growth_chunk)?;

    let policy = &self.policy;

    // Anything split off must be able to hold a free block.
    if policy.split_threshold < MIN_BLOCK_SIZE {
      return Err(ConfigError::TooSmall {
        field: "split_threshold",
        value: policy.split_threshold,
        min: MIN_BLOCK_SIZE,
      });
    }

    if policy.split_threshold > policy.front_split_threshold {
      return Err(ConfigError::ThresholdOrder {
        split: policy.split_threshold,
        front_split: policy.front_split_threshold,
      });
    }

    Ok(())
  }
}

fn check_extension(
  field: &'static str,
  value: usize,
) -> Result<(), ConfigError> {
  if value > MAX_HEAP_SIZE {
    return Err(ConfigError::TooLarge { field, value });
  }

  if align!(value) != value {
    return Err(ConfigError::Unaligned { field, value });
  }

  if value < MIN_BLOCK_SIZE {
    return Err(ConfigError::TooSmall {
      field,
      value,
      min: MIN_BLOCK_SIZE,
    });
  }

  Ok(())
}
