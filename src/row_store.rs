//! Row storage (C2, §4.2): the reduced-matrix rows passed between levels,
//! and the `L`/`U`/`D` factor pools each PE accumulates as it eliminates
//! its local rows.
//!
//! Grounded on `src/matrix.rs`'s `VecMatrix`/`IndexableMatrix` (an indexed
//! pool of row vectors with push/width accessors); the reuse-in-place
//! storage discipline of `parilut.c`'s `rmat`/`ldu` structures is realized
//! here with `Vec::clear()` + refill rather than manual pointer/capacity
//! bookkeeping.

use tracing::warn;

/// One row of the active reduced matrix. `cols[0]`/`vals[0]` is always the
/// diagonal entry.
#[derive(Debug, Clone, Default)]
pub struct ReducedRow {
    pub cols: Vec<usize>,
    pub vals: Vec<f64>,
}

impl ReducedRow {
    pub fn diag(&self) -> usize {
        self.cols[0]
    }

    pub fn refill(&mut self, cols: impl IntoIterator<Item = usize>, vals: impl IntoIterator<Item = f64>) {
        self.cols.clear();
        self.cols.extend(cols);
        self.vals.clear();
        self.vals.extend(vals);
    }
}

/// The active reduced matrix for one level, indexed by old-permutation
/// position within the active region.
#[derive(Debug, Clone, Default)]
pub struct ReducedMatrix {
    pub rows: Vec<ReducedRow>,
}

/// One off-diagonal row of `L` or `U` (the diagonal of `L` is implicitly 1;
/// the diagonal of `U` lives in `LduFactor::dvalues`).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FactorRow {
    pub cols: Vec<usize>,
    pub vals: Vec<f64>,
}

impl FactorRow {
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }
}

/// CSR-style pointer/array quadruple for one of `L`/`U` (§6 external
/// interface).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FactorCsr {
    pub srowptr: Vec<usize>,
    pub erowptr: Vec<usize>,
    pub colind: Vec<usize>,
    pub values: Vec<f64>,
}

pub fn to_csr(rows: &[FactorRow]) -> FactorCsr {
    let mut srowptr = Vec::with_capacity(rows.len());
    let mut erowptr = Vec::with_capacity(rows.len());
    let mut colind = Vec::new();
    let mut values = Vec::new();
    for row in rows {
        srowptr.push(colind.len());
        colind.extend_from_slice(&row.cols);
        values.extend_from_slice(&row.vals);
        erowptr.push(colind.len());
    }
    FactorCsr {
        srowptr,
        erowptr,
        colind,
        values,
    }
}

/// A PE's accumulated `L`, `U` and `D` factor pools, indexed by local row.
#[derive(Debug, Clone, Default)]
pub struct LduFactor {
    pub l: Vec<FactorRow>,
    pub u: Vec<FactorRow>,
    pub dvalues: Vec<f64>,
    pub nnodes: Vec<usize>,
    pub nlevels: usize,
}

impl LduFactor {
    pub fn new(lnrows: usize) -> Self {
        Self {
            l: vec![FactorRow::default(); lnrows],
            u: vec![FactorRow::default(); lnrows],
            dvalues: vec![0.0; lnrows],
            nnodes: vec![0],
            nlevels: 0,
        }
    }

    /// `UpdateL` (§4.5/§4.7): insert `cols`/`vals` into `L[row]`, replacing
    /// the smallest-magnitude existing entry once the row is at `maxnz`
    /// capacity and the incoming entry is larger.
    pub fn update_l(&mut self, row: usize, cols: &[usize], vals: &[f64], maxnz: usize) {
        let l = &mut self.l[row];
        for (&c, &v) in cols.iter().zip(vals) {
            if l.cols.len() < maxnz {
                l.cols.push(c);
                l.vals.push(v);
            } else if maxnz > 0 {
                let (min_idx, _) = l.vals.iter().enumerate().min_by(|a, b| a.1.abs().total_cmp(&b.1.abs())).unwrap();
                if l.vals[min_idx].abs() < v.abs() {
                    l.cols[min_idx] = c;
                    l.vals[min_idx] = v;
                }
            }
        }
    }

    /// `FormDU` (§4.5): stores the pivot reciprocal (substituting `1/tol`
    /// and warning on a zero pivot) and the already-selected `U` entries
    /// for `row`.
    pub fn form_du(&mut self, row: usize, diag: f64, tol: f64, u_cols: &[usize], u_vals: &[f64]) {
        self.dvalues[row] = if diag == 0.0 {
            warn!(row, "zero pivot encountered; substituting 1/tol");
            1.0 / tol
        } else {
            1.0 / diag
        };
        self.u[row].refill(u_cols.iter().copied(), u_vals.iter().copied());
    }
}
