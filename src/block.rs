//! Block encoding.
//!
//! Every block starts with a 4-byte header and ends with a 4-byte footer,
//! both holding `size | allocated`. Sizes are multiples of [`ALIGNMENT`], so
//! the low bit is free to carry the flag.
//!
//! ```text
//!   Allocated block:                     Free block:
//!   ┌────────────────────┐               ┌────────────────────┐
//!   │ header: size | 1   │               │ header: size | 0   │
//!   ├────────────────────┤ ◄─ payload    ├────────────────────┤
//!   │                    │               │ prev_free (offset) │
//!   │      payload       │               │ next_free (offset) │
//!   │                    │               │      (unused)      │
//!   ├────────────────────┤               ├────────────────────┤
//!   │ footer: size | 1   │               │ footer: size | 0   │
//!   └────────────────────┘               └────────────────────┘
//! ```

use std::num::NonZeroU32;

use static_assertions::const_assert;

use crate::align;

/// Width of a header, footer or free-list link.
pub const WORD_SIZE: usize = 4;

/// Payload alignment and block size granularity.
pub const ALIGNMENT: usize = 8;

/// Bytes every block spends on its header and footer.
pub const OVERHEAD: usize = 2 * WORD_SIZE;

/// Smallest block able to hold a header, two free-list links and a footer.
pub const MIN_BLOCK_SIZE: usize = OVERHEAD + 2 * WORD_SIZE;

/// The prologue is a header and footer with no payload.
pub const PROLOGUE_SIZE: usize = OVERHEAD;

/// Largest heap whose offsets and sizes still fit in a 32-bit word.
pub const MAX_HEAP_SIZE: usize = (u32::MAX as usize) & !(ALIGNMENT - 1);

const ALLOCATED_BIT: u32 = 0x1;
const SIZE_MASK: u32 = !(ALIGNMENT as u32 - 1);

const_assert!(ALIGNMENT.is_power_of_two());
const_assert!(MIN_BLOCK_SIZE % ALIGNMENT == 0);
const_assert!(PROLOGUE_SIZE % ALIGNMENT == 0);

/// A block on the heap, named by the byte offset of its header from the
/// start of the heap region.
///
/// Offset 0 holds the alignment pad and is never a header, so it doubles as
/// the "no block" value inside free-list links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block(NonZeroU32);

impl Block {
  pub(crate) fn at(offset: usize) -> Option<Self> {
    u32::try_from(offset).ok().and_then(NonZeroU32::new).map(Self)
  }

  /// Byte offset of the block header from the heap base.
  pub fn offset(self) -> usize {
    self.0.get() as usize
  }

  pub(crate) fn from_link(link: u32) -> Option<Self> {
    NonZeroU32::new(link).map(Self)
  }

  pub(crate) fn to_link(block: Option<Self>) -> u32 {
    block.map_or(0, |block| block.0.get())
  }
}

pub(crate) fn pack(
  size: usize,
  allocated: bool,
) -> u32 {
  debug_assert!(size <= MAX_HEAP_SIZE && size % ALIGNMENT == 0);
  size as u32 | if allocated { ALLOCATED_BIT } else { 0 }
}

pub(crate) fn unpack_size(word: u32) -> usize {
  (word & SIZE_MASK) as usize
}

pub(crate) fn unpack_allocated(word: u32) -> bool {
  word & ALLOCATED_BIT != 0
}

/// Block size needed to serve a payload of `payload` bytes, or `None` when
/// the result cannot be encoded in a header.
///
/// ```rust
/// use explicit_alloc::required_block_size;
///
/// assert_eq!(required_block_size(1), Some(16));
/// assert_eq!(required_block_size(100), Some(112));
/// assert_eq!(required_block_size(usize::MAX), None);
/// ```
pub fn required_block_size(payload: usize) -> Option<usize> {
  let padded = payload.checked_add(OVERHEAD)?;

  // MAX_HEAP_SIZE is itself aligned, so rounding cannot push past it.
  (padded <= MAX_HEAP_SIZE).then(|| align!(padded).max(MIN_BLOCK_SIZE))
}
