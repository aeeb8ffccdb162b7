//! Independent-set selector (C3, §4.3), grounded directly on `parilut.c`'s
//! `SelectSet`: a row is a MIS candidate if none of its off-PE column
//! dependencies are owned by a lower-ranked PE, with a tie-break pass that
//! defers to lower-ranked PEs when two neighbors both claim the same row.

use crate::comm::owning_pe;
use crate::map::{MapEntry, Membership};
use crate::perm::Permutation;
use crate::row_store::ReducedRow;

/// This level's independent set: the new permutation/inverse pair and how
/// many rows were selected.
#[derive(Debug, Clone)]
pub struct IndependentSet {
    pub newperm: Vec<usize>,
    pub newiperm: Vec<usize>,
    pub nmis: usize,
}

/// `active[ir]` must be the reduced row for local row `perm.perm[ndone + ir]`.
#[allow(clippy::too_many_arguments)]
pub fn select_independent_set(
    mype: usize,
    firstrow: usize,
    lastrow: usize,
    rowdist: &[usize],
    active: &[ReducedRow],
    perm: &Permutation,
    ndone: usize,
    send_rows_by_peer: &[(usize, Vec<usize>)],
    map: &mut Membership,
) -> IndependentSet {
    let lnrows = perm.len();
    let ntogo = lnrows - ndone;

    let mut candidates: Vec<usize> = Vec::new();
    for ir in 0..ntogo {
        let local_row = perm.perm[ndone + ir];
        let global_row = local_row + firstrow;
        let row = &active[ir];
        // A row qualifies only if every off-PE dependency is owned by a
        // strictly higher-ranked PE: depending on a lower-ranked PE's row
        // would require data this level can't yet have (`parilut.c`'s
        // `SelectSet`, `mype > Idx2PE(col)` rejects).
        let eligible = row.cols[1..]
            .iter()
            .all(|&c| !((c < firstrow || c >= lastrow) && owning_pe(rowdist, c) < mype));
        if eligible {
            candidates.push(global_row);
            map.set(global_row, MapEntry::LocalSelected);
        }
    }

    // Symmetry fix: a lower-ranked neighbor's claim on a row this PE asked
    // it for always wins, so drop any candidate a lower PE also requested.
    for (peer, rows) in send_rows_by_peer {
        if *peer < mype {
            for &r in rows {
                if map.get(r) == MapEntry::LocalSelected {
                    map.clear(r);
                    if let Some(pos) = candidates.iter().position(|&x| x == r) {
                        candidates.swap_remove(pos);
                    }
                }
            }
        }
    }

    let (newperm, newiperm, nmis) = perm.split_active(ndone, |local_row| {
        map.get(local_row + firstrow) == MapEntry::LocalSelected
    });
    debug_assert_eq!(nmis, candidates.len());

    IndependentSet {
        newperm,
        newiperm,
        nmis,
    }
}
