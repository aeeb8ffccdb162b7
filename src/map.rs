//! The globally-indexed membership map (§3 "Membership map `map[0..N]`").
//!
//! Rendered directly as the tagged union the original's LSB-packed integer
//! always meant, per the spec's Design Notes: not selected, selected by this
//! PE for the current level's independent set, or received from a neighbor
//! this level at a given offset into the incoming-row buffer.

/// One slot of the global membership map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEntry {
    NotSelected,
    LocalSelected,
    Received(usize),
}

impl MapEntry {
    pub fn is_selected(&self) -> bool {
        !matches!(self, MapEntry::NotSelected)
    }
}

/// Owns the per-PE `map[0..N]` array. Reused across levels; invariant:
/// every slot is `NotSelected` at the start and end of every level
/// (property 6, §8).
#[derive(Debug, Clone)]
pub struct Membership {
    slots: Vec<MapEntry>,
}

impl Membership {
    pub fn new(n: usize) -> Self {
        Self {
            slots: vec![MapEntry::NotSelected; n],
        }
    }

    pub fn get(&self, global_col: usize) -> MapEntry {
        self.slots[global_col]
    }

    pub fn set(&mut self, global_col: usize, entry: MapEntry) {
        self.slots[global_col] = entry;
    }

    pub fn clear(&mut self, global_col: usize) {
        self.slots[global_col] = MapEntry::NotSelected;
    }

    /// Property 6 (§8): the map is clear everywhere at a level boundary.
    pub fn is_all_clear(&self) -> bool {
        self.slots.iter().all(|e| matches!(e, MapEntry::NotSelected))
    }
}
