//! Explicit free list.
//!
//! A doubly-linked list threaded through the payloads of free blocks. The
//! list order is insertion order only; it says nothing about addresses or
//! sizes.
//!
//! ```text
//!          head                                        tail
//!           │                                           │
//!           ▼                                           ▼
//!        ┌──────┐  next   ┌──────┐  next   ┌──────┐
//!  None ◄┤ free ├────────►│ free ├────────►│ free ├► None
//!        │ @4900│◄────────┤ @12  │◄────────┤ @2988│
//!        └──────┘  prev   └──────┘  prev   └──────┘
//! ```

use crate::{block::Block, heap::Heap};

/// Which end of the free list a block is inserted at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListEnd {
  Front,
  Back,
}

#[derive(Debug, Default)]
pub(crate) struct FreeList {
  head: Option<Block>,
  tail: Option<Block>,
  len: usize,
}

impl FreeList {
  pub(crate) const fn new() -> Self {
    Self {
      head: None,
      tail: None,
      len: 0,
    }
  }

  pub(crate) fn init(&mut self) {
    *self = Self::new();
  }

  pub(crate) fn head(&self) -> Option<Block> {
    self.head
  }

  pub(crate) fn tail(&self) -> Option<Block> {
    self.tail
  }

  pub(crate) fn len(&self) -> usize {
    self.len
  }

  pub(crate) fn insert<S>(
    &mut self,
    heap: &mut Heap<S>,
    block: Block,
    end: ListEnd,
  ) {
    match end {
      ListEnd::Front => self.insert_front(heap, block),
      ListEnd::Back => self.insert_back(heap, block),
    }
  }

  pub(crate) fn insert_front<S>(
    &mut self,
    heap: &mut Heap<S>,
    block: Block,
  ) {
    heap.set_prev_free(block, None);
    heap.set_next_free(block, self.head);

    match self.head {
      Some(head) => heap.set_prev_free(head, Some(block)),
      None => self.tail = Some(block),
    }

    self.head = Some(block);
    self.len += 1;
  }

  pub(crate) fn insert_back<S>(
    &mut self,
    heap: &mut Heap<S>,
    block: Block,
  ) {
    heap.set_prev_free(block, self.tail);
    heap.set_next_free(block, None);

    match self.tail {
      Some(tail) => heap.set_next_free(tail, Some(block)),
      None => self.head = Some(block),
    }

    self.tail = Some(block);
    self.len += 1;
  }

  /// Unlinks `block`, which must currently be on the list.
  pub(crate) fn remove<S>(
    &mut self,
    heap: &mut Heap<S>,
    block: Block,
  ) {
    debug_assert!(self.len > 0);

    let prev = heap.prev_free(block);
    let next = heap.next_free(block);

    match prev {
      Some(prev) => heap.set_next_free(prev, next),
      None => {
        debug_assert_eq!(self.head, Some(block));
        self.head = next;
      }
    }

    match next {
      Some(next) => heap.set_prev_free(next, prev),
      None => {
        debug_assert_eq!(self.tail, Some(block));
        self.tail = prev;
      }
    }

    self.len -= 1;
  }

  pub(crate) fn prev<S>(
    &self,
    heap: &Heap<S>,
    block: Block,
  ) -> Option<Block> {
    heap.prev_free(block)
  }

  pub(crate) fn next<S>(
    &self,
    heap: &Heap<S>,
    block: Block,
  ) -> Option<Block> {
    heap.next_free(block)
  }

  /// Walks the list head to tail.
  pub(crate) fn iter<'a, S>(
    &'a self,
    heap: &'a Heap<S>,
  ) -> Iter<'a, S> {
    Iter {
      list: self,
      heap,
      cursor: self.head,
      end: ListEnd::Front,
    }
  }

  /// Walks the list tail to head.
  pub(crate) fn iter_rev<'a, S>(
    &'a self,
    heap: &'a Heap<S>,
  ) -> Iter<'a, S> {
    Iter {
      list: self,
      heap,
      cursor: self.tail,
      end: ListEnd::Back,
    }
  }
}

pub(crate) struct Iter<'a, S> {
  list: &'a FreeList,
  heap: &'a Heap<S>,
  cursor: Option<Block>,
  /// The end the walk started from.
  end: ListEnd,
}

impl<S> Iterator for Iter<'_, S> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    let current = self.cursor?;

    self.cursor = match self.end {
      ListEnd::Front => self.list.next(self.heap, current),
      ListEnd::Back => self.list.prev(self.heap, current),
    };

    Some(current)
  }
}
