//! Reduction (C7, §4.7), grounded on `parilut.c`'s `ComputeRmat`: every row
//! not in this level's independent set absorbs the L-multipliers of rows
//! that just got eliminated — whether local or received from a neighbor —
//! and is re-emitted, shrunk, as next level's reduced matrix.

use crate::comm::ReceivedRows;
use crate::lr_heap::{LEntry, PendingL};
use crate::map::{MapEntry, Membership};
use crate::options::ParilutOptions;
use crate::perm::Permutation;
use crate::row_store::{LduFactor, ReducedMatrix, ReducedRow};
use crate::spa::Spa;

#[allow(clippy::too_many_arguments)]
pub fn reduce(
    ldu: &mut LduFactor,
    spa: &mut Spa,
    lr: &mut PendingL,
    map: &Membership,
    received: &ReceivedRows,
    active: &mut [ReducedRow],
    perm: &Permutation,
    newperm: &[usize],
    newiperm: &[usize],
    ndone: usize,
    nmis: usize,
    nrm2: &[f64],
    firstrow: usize,
    options: &ParilutOptions,
    next: &mut ReducedMatrix,
) {
    let lnrows = perm.len();
    let flattened = received.flattened();

    for ir in (ndone + nmis)..lnrows {
        let i = newperm[ir];
        let rtol = nrm2[i] * options.tol;

        let k = perm.iperm[i] - ndone;
        let row_diag = active[k].diag();
        debug_assert_eq!(row_diag, i + firstrow);

        spa.seed(&active[k].cols, &active[k].vals);
        lr.clear();
        for &c in &active[k].cols[1..] {
            match map.get(c) {
                MapEntry::LocalSelected => lr.push(LEntry::Local(newiperm[c - firstrow])),
                MapEntry::Received(offset) => lr.push(LEntry::Remote(offset)),
                MapEntry::NotSelected => {}
            }
        }

        while let Some(entry) = lr.pop() {
            match entry {
                LEntry::Local(local_idx) => {
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
                    for col in created {
                        // a locally-factored row's U entries only ever fill
                        // other local rows (parilut.c asserts this too).
                        debug_assert!(!matches!(map.get(col), MapEntry::Received(_)));
                        if map.get(col) == MapEntry::LocalSelected {
                            lr.push(LEntry::Local(newiperm[col - firstrow]));
                        }
                    }
                }
                LEntry::Remote(offset) => {
                    let frow = flattened[offset];
                    let Some(pos) = spa.position_of(frow.global_row) else {
                        continue;
                    };
                    let mult = spa.value_at(pos) * frow.diag_recip;
                    spa.set_value_at(pos, mult);
                    if mult.abs() < rtol {
                        continue;
                    }
                    let created = spa.scatter_update(&frow.cols, &frow.vals, mult, rtol);
                    for col in created {
                        debug_assert!(!matches!(map.get(col), MapEntry::LocalSelected));
                        if let MapEntry::Received(roffset) = map.get(col) {
                            lr.push(LEntry::Remote(roffset));
                        }
                    }
                }
            }
        }

        spa.drop_below(rtol);
        let m = spa.partition(|col| map.get(col).is_selected());
        // step 6 (§4.7): the multipliers just resolved against this level's
        // independent set are final and belong in L now, even though row `i`
        // itself won't be selected until a later level.
        ldu.update_l(i, &spa.cols()[1..m], &spa.vals()[1..m], options.maxnz);
        finish_row(spa, m, options, &mut active[k], next);
    }
}

/// `FormNRmat`: keep the diagonal plus up to `min(maxnz, len - m + 1) - 1`
/// largest-magnitude `U`-side survivors, reusing the row's own storage
/// (§3's reuse-in-place contract).
fn finish_row(spa: &mut Spa, m: usize, options: &ParilutOptions, row: &mut ReducedRow, next: &mut ReducedMatrix) {
    let total_len = options.maxnz.min(spa.len() - m + 1);
    let u_count = total_len.saturating_sub(1);
    let (u_cols, u_vals) = spa.take_largest(m, u_count);

    row.cols.clear();
    row.vals.clear();
    row.cols.push(spa.cols()[0]);
    row.vals.push(spa.vals()[0]);
    row.cols.extend(u_cols);
    row.vals.extend(u_vals);

    next.rows.push(std::mem::take(row));
}
