//! Item providers: paged, lazily sorted views over nodes and edges.
//!
//! A provider holds an iteration order (item positions in some underlying
//! buffer) and the comparator it was last asked to sort by. Serializing a
//! window sorts only the part of the still-unsorted middle that the window
//! touches; the sorted prefix and suffix are never revisited until the
//! comparator changes.

pub mod comparator;
pub mod edges;
pub mod nodes;
pub mod sort_range;

use std::cmp::Ordering;
use std::ops::Range;

use crate::snapshot_error::SnapshotError;

pub use comparator::{ComparatorConfig, SortField};
pub use edges::{EdgesProvider, EdgesProviderKind};
pub use nodes::NodesProvider;

/// Item order with the bookkeeping of what is already sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IterationOrder {
    items: Vec<usize>,
    sorted_prefix: usize,
    sorted_suffix: usize,
}

/// Resolved window of a range request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub range: Range<usize>,
    pub clamped: bool,
}

impl IterationOrder {
    pub fn new(items: Vec<usize>) -> Self {
        Self {
            items,
            sorted_prefix: 0,
            sorted_suffix: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[usize] {
        &self.items
    }

    /// Forget what is sorted; the next window is sorted from scratch.
    pub fn rewind(&mut self) {
        self.sorted_prefix = 0;
        self.sorted_suffix = 0;
    }

    pub fn sorted_bounds(&self) -> (usize, usize) {
        (self.sorted_prefix, self.sorted_suffix)
    }

    /// Make `[begin, end)` final under `cmp` and return the window.
    ///
    /// `end` past the last item is clamped and the clamping reported; with
    /// `cmp == None` the items keep their natural order.
    ///
    /// # Errors
    /// [`SnapshotError::InvalidRange`] when `begin > end`.
    pub fn prepare<C>(&mut self, begin: usize, end: usize, cmp: Option<C>) -> Result<Window, SnapshotError>
    where
        C: FnMut(&usize, &usize) -> Ordering,
    {
        if begin > end {
            return Err(SnapshotError::InvalidRange { begin, end });
        }
        let len = self.items.len();
        let clamped = end > len;
        let end = end.min(len);
        let begin = begin.min(end);
        if self.sorted_prefix < end && begin < len - self.sorted_suffix {
            if let Some(cmp) = cmp {
                sort_range::sort_range(
                    &mut self.items,
                    cmp,
                    self.sorted_prefix,
                    len - 1 - self.sorted_suffix,
                    begin,
                    end - 1,
                );
            }
            if begin <= self.sorted_prefix {
                self.sorted_prefix = end;
            }
            if end >= len - self.sorted_suffix {
                self.sorted_suffix = len - begin;
            }
        }
        Ok(Window {
            range: begin..end,
            clamped,
        })
    }
}
