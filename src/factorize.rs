//! Local factorization (C5, §4.5), grounded on `parilut.c`'s `FactorLocal`:
//! for each row in this level's independent set, apply every already-known
//! local L-multiplier in strict elimination order, threshold-drop, and
//! split the survivors into `L`'s new entries and the selected `U` row.

use crate::lr_heap::{LEntry, PendingL};
use crate::options::ParilutOptions;
use crate::perm::Permutation;
use crate::row_store::{LduFactor, ReducedRow};
use crate::spa::Spa;

#[allow(clippy::too_many_arguments)]
pub fn factor_local(
    ldu: &mut LduFactor,
    spa: &mut Spa,
    lr: &mut PendingL,
    active: &[ReducedRow],
    perm: &Permutation,
    newperm: &[usize],
    newiperm: &[usize],
    ndone: usize,
    nmis: usize,
    nrm2: &[f64],
    firstrow: usize,
    options: &ParilutOptions,
) {
    let lnrows = perm.len();

    for ir in ndone..ndone + nmis {
        let i = newperm[ir];
        let diag_pos = ir;
        let rtol = nrm2[i] * options.tol;

        let k = perm.iperm[i] - ndone;
        let row = &active[k];

        spa.seed(&row.cols, &row.vals);
        lr.clear();
        push_local_deps(lr, &row.cols[1..], firstrow, lnrows, newiperm, diag_pos);

        while let Some(entry) = lr.pop() {
            let LEntry::Local(local_idx) = entry else {
                unreachable!("factor_local only ever queues Local dependencies")
            };
            let kk = newperm[local_idx];
            let global_k = kk + firstrow;
            let Some(pos) = spa.position_of(global_k) else {
                continue;
            };
            let mult = spa.value_at(pos) * ldu.dvalues[kk];
            spa.set_value_at(pos, mult);
            if mult.abs() < rtol {
                continue;
            }

            let u_row = &ldu.u[kk];
            let created = spa.scatter_update(&u_row.cols, &u_row.vals, mult, rtol);
            push_local_deps(lr, &created, firstrow, lnrows, newiperm, diag_pos);
        }

        spa.drop_below(rtol);
        let m = spa.partition(|col| {
            col >= firstrow && col < firstrow + lnrows && newiperm[col - firstrow] < diag_pos
        });

        ldu.update_l(i, &spa.cols()[1..m], &spa.vals()[1..m], options.maxnz);

        let diag_val = spa.vals()[0];
        let (u_cols, u_vals) = spa.take_largest(m, options.maxnz);
        ldu.form_du(i, diag_val, options.tol, &u_cols, &u_vals);
    }
}

/// Queues any column in `cols` that is both local and strictly earlier in
/// elimination order than `diag_pos` as a pending L-dependency.
fn push_local_deps(lr: &mut PendingL, cols: &[usize], firstrow: usize, lnrows: usize, newiperm: &[usize], diag_pos: usize) {
    for &c in cols {
        if c >= firstrow && c < firstrow + lnrows {
            let local_c = c - firstrow;
            if newiperm[local_c] < diag_pos {
                lr.push(LEntry::Local(newiperm[local_c]));
            }
        }
    }
}
