//! Sparse accumulator (C1, §4.1): the dense-indexed scratch workspace used
//! to assemble one row at a time during local factorization and reduction.
//!
//! Grounded on `src/columns/vec.rs`'s `VecColumn`, which keeps a sparse
//! `Vec<usize>` and merges two columns by scanning and inserting — the same
//! "sparse vector, explicit merge" idiom, generalized here from a Z_2
//! XOR-merge over column entries to a real-valued scatter/threshold-drop
//! over a row, per `parilut.c`'s `SecondDropSmall`/`SeperateLU_by*`.

/// `jr[c]` is the position of global column `c` in `jw`/`w`, if column `c`
/// is currently populated in the accumulator.
pub struct Spa {
    jr: Vec<Option<usize>>,
    jw: Vec<usize>,
    w: Vec<f64>,
}

impl Spa {
    pub fn new(n: usize) -> Self {
        Self {
            jr: vec![None; n],
            jw: Vec::new(),
            w: Vec::new(),
        }
    }

    /// Loads a row into the accumulator. `cols[0]`/`vals[0]` is the
    /// diagonal entry and always occupies position 0.
    pub fn seed(&mut self, cols: &[usize], vals: &[f64]) {
        debug_assert_eq!(cols.len(), vals.len());
        self.jw.clear();
        self.w.clear();
        for (pos, (&c, &v)) in cols.iter().zip(vals).enumerate() {
            debug_assert!(self.jr[c].is_none(), "seed called on a dirty accumulator");
            self.jr[c] = Some(pos);
            self.jw.push(c);
            self.w.push(v);
        }
    }

    pub fn len(&self) -> usize {
        self.jw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jw.is_empty()
    }

    pub fn cols(&self) -> &[usize] {
        &self.jw
    }

    pub fn vals(&self) -> &[f64] {
        &self.w
    }

    pub fn position_of(&self, global_col: usize) -> Option<usize> {
        self.jr[global_col]
    }

    pub fn value_at(&self, pos: usize) -> f64 {
        self.w[pos]
    }

    pub fn set_value_at(&mut self, pos: usize, value: f64) {
        self.w[pos] = value;
    }

    /// Scatters `mult * vals[k]` into column `cols[k]` for every `k`,
    /// subtracting from an existing entry or creating a new one above
    /// `rtol` (the row's relative drop threshold). Returns the *global
    /// column ids* of newly-created entries, so the caller can decide
    /// whether each belongs in the pending-L heap.
    pub fn scatter_update(&mut self, cols: &[usize], vals: &[f64], mult: f64, rtol: f64) -> Vec<usize> {
        let mut created = Vec::new();
        for (&c, &v) in cols.iter().zip(vals) {
            let delta = -mult * v;
            if let Some(pos) = self.jr[c] {
                self.w[pos] += delta;
            } else if delta.abs() >= rtol {
                self.jr[c] = Some(self.jw.len());
                self.jw.push(c);
                self.w.push(delta);
                created.push(c);
            }
        }
        created
    }

    /// Drops every entry but the diagonal (position 0) whose magnitude is
    /// below `rtol`, and clears `jr` for the whole row first (mirrors
    /// `SecondDropSmall`, which resets the membership map before
    /// compacting).
    pub fn drop_below(&mut self, rtol: f64) {
        for &c in &self.jw {
            self.jr[c] = None;
        }
        let mut i = 1;
        while i < self.jw.len() {
            if self.w[i].abs() < rtol {
                let last = self.jw.len() - 1;
                self.jw.swap(i, last);
                self.w.swap(i, last);
                self.jw.pop();
                self.w.pop();
            } else {
                i += 1;
            }
        }
    }

    /// Partitions `jw`/`w[1..]` so that entries satisfying `predicate`
    /// (given the entry's global column) come first, and returns the split
    /// index `m`: `[1, m)` satisfies `predicate`, `[m, len())` does not.
    pub fn partition(&mut self, predicate: impl Fn(usize) -> bool) -> usize {
        let mut m = 1;
        for i in 1..self.jw.len() {
            if predicate(self.jw[i]) {
                self.jw.swap(i, m);
                self.w.swap(i, m);
                m += 1;
            }
        }
        m
    }

    /// Selects the `count` largest-magnitude entries from `[start, len())`,
    /// swapping each to the tail of that range as it's picked (the repeated
    /// arg-max/swap-out scan of `FormDU`/`FormNRmat`), and returns them.
    /// The selected entries are removed from the accumulator's live range.
    pub fn take_largest(&mut self, start: usize, count: usize) -> (Vec<usize>, Vec<f64>) {
        let mut end = self.jw.len();
        let take = count.min(end.saturating_sub(start));
        let mut cols = Vec::with_capacity(take);
        let mut vals = Vec::with_capacity(take);
        for _ in 0..take {
            let (max_idx, _) = self.w[start..end]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
                .map(|(i, v)| (i + start, v))
                .unwrap();
            cols.push(self.jw[max_idx]);
            vals.push(self.w[max_idx]);
            end -= 1;
            self.jw.swap(max_idx, end);
            self.w.swap(max_idx, end);
        }
        (cols, vals)
    }
}
