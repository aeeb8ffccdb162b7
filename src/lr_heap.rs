//! Pending-L min-heap (`lr` in the original), processed in strict
//! elimination order so a row's L-multipliers are always applied before
//! that row's own U is scattered into the accumulator.
//!
//! `parilut.c` packs the tag into the low bit of a plain integer
//! (`Local(i)` as `2*i`, `Remote(o)` as `2*o+1`) and does a linear scan for
//! the minimum. The spec's Design Notes render this directly as a tagged
//! union over a real heap; we keep the original's raw-key ordering so the
//! two stay behaviourally identical, even though the relative order between
//! a `Local` and a `Remote` entry carries no meaning beyond "process the
//! smaller encoded key first".

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LEntry {
    /// A dependency on a row this PE is itself eliminating this level,
    /// carrying that row's position in `newperm`.
    Local(usize),
    /// A dependency on a row received from a neighbor this level, carrying
    /// its offset into the flattened incoming-row buffer.
    Remote(usize),
}

impl LEntry {
    fn key(self) -> usize {
        match self {
            LEntry::Local(i) => i * 2,
            LEntry::Remote(o) => o * 2 + 1,
        }
    }
}

impl PartialOrd for LEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// The per-row pending-L heap, reused across rows within a level.
#[derive(Debug, Default)]
pub struct PendingL {
    heap: BinaryHeap<Reverse<LEntry>>,
}

impl PendingL {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, entry: LEntry) {
        self.heap.push(Reverse(entry));
    }

    pub fn pop(&mut self) -> Option<LEntry> {
        self.heap.pop().map(|Reverse(e)| e)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
