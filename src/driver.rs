//! Per-PE level driver (C8, §4.8): the main loop each PE thread runs,
//! alternating communication planning, independent-set selection, local
//! factorization, row exchange and reduction until no PE has any row left.
//!
//! Grounded on `src/algorithms/{serial,lock_free,locking}.rs`'s shared
//! `DecompositionAlgo`/`Decomposition` shape (one state machine, run to
//! completion, handed back as an owned result) and on `parilut.c`'s
//! top-level `ParILUT` loop.

use tracing::{info, info_span};

use crate::comm::Communicator;
use crate::error::ParilutError;
use crate::factorize::factor_local;
use crate::independent_set::select_independent_set;
use crate::lr_heap::PendingL;
use crate::map::Membership;
use crate::options::ParilutOptions;
use crate::perm::Permutation;
use crate::reduce::reduce;
use crate::row_store::{FactorCsr, LduFactor, ReducedMatrix, ReducedRow};
use crate::spa::Spa;

/// A single PE's finished factorization: its permutation, `L`/`U`/`D` pools
/// and the level count it took (§6 external interface).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decomposition {
    pub perm: Vec<usize>,
    pub iperm: Vec<usize>,
    pub l: Vec<crate::row_store::FactorRow>,
    pub u: Vec<crate::row_store::FactorRow>,
    pub dvalues: Vec<f64>,
    pub nnodes: Vec<usize>,
    pub nlevels: usize,
}

impl Decomposition {
    pub fn l_csr(&self) -> FactorCsr {
        crate::row_store::to_csr(&self.l)
    }

    pub fn u_csr(&self) -> FactorCsr {
        crate::row_store::to_csr(&self.u)
    }
}

/// Validates that every row's declared shape fits the global/local row
/// ranges before any PE starts work (§7's `InvalidBounds`).
pub fn validate_rows(rows: &[ReducedRow], nrm2: &[f64], n: usize, firstrow: usize, lastrow: usize) -> Result<(), ParilutError> {
    if nrm2.len() != lastrow - firstrow {
        return Err(ParilutError::AllocationFailure {
            row: firstrow,
            reason: format!("nrm2 has {} entries, expected {}", nrm2.len(), lastrow - firstrow),
        });
    }
    if rows.len() != lastrow - firstrow {
        return Err(ParilutError::AllocationFailure {
            row: firstrow,
            reason: format!("{} rows supplied, expected {}", rows.len(), lastrow - firstrow),
        });
    }
    for (i, row) in rows.iter().enumerate() {
        let expected_diag = firstrow + i;
        if row.cols.is_empty() || row.diag() != expected_diag {
            return Err(ParilutError::InvalidBounds {
                index: row.cols.first().copied().unwrap_or(usize::MAX),
                bound: n,
            });
        }
        for &c in &row.cols {
            if c >= n {
                return Err(ParilutError::InvalidBounds { index: c, bound: n });
            }
        }
    }
    Ok(())
}

fn gather_factored_rows(
    ldu: &LduFactor,
    newperm: &[usize],
    ndone: usize,
    nmis: usize,
    firstrow: usize,
) -> Vec<crate::comm::FactoredRow> {
    (ndone..ndone + nmis)
        .map(|ir| {
            let k = newperm[ir];
            crate::comm::FactoredRow {
                global_row: k + firstrow,
                diag_recip: ldu.dvalues[k],
                cols: ldu.u[k].cols.clone(),
                vals: ldu.u[k].vals.clone(),
            }
        })
        .collect()
}

fn erase_map(map: &mut Membership, newperm: &[usize], ndone: usize, nmis: usize, firstrow: usize, received: &crate::comm::ReceivedRows) {
    for ir in ndone..ndone + nmis {
        map.clear(newperm[ir] + firstrow);
    }
    received.erase(map);
}

/// Runs one PE's share of the factorization to completion. `initial_rows`
/// and `nrm2` must already describe exactly this PE's local rows
/// `[firstrow, lastrow)` in order.
///
/// Wraps the actual work in `catch_unwind` so a panicking PE still signals
/// the shared abort flag before its thread dies — otherwise every other PE's
/// `recv_one` (`comm.rs`) would block forever on a peer that will never send
/// again (§5/§7's fail-stop collective abort covers panics, not just `Err`).
#[allow(clippy::too_many_arguments)]
pub fn run_pe(
    comm: Communicator,
    rowdist: Vec<usize>,
    firstrow: usize,
    lastrow: usize,
    n: usize,
    initial_rows: Vec<ReducedRow>,
    nrm2: Vec<f64>,
    options: ParilutOptions,
) -> Result<Decomposition, ParilutError> {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        run_pe_inner(&comm, rowdist, firstrow, lastrow, n, initial_rows, nrm2, options)
    }));
    match outcome {
        Ok(result) => {
            if result.is_err() {
                comm.signal_abort();
            }
            result
        }
        Err(payload) => {
            comm.signal_abort();
            std::panic::resume_unwind(payload);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_pe_inner(
    comm: &Communicator,
    rowdist: Vec<usize>,
    firstrow: usize,
    lastrow: usize,
    n: usize,
    initial_rows: Vec<ReducedRow>,
    nrm2: Vec<f64>,
    options: ParilutOptions,
) -> Result<Decomposition, ParilutError> {
    let lnrows = lastrow - firstrow;
    validate_rows(&initial_rows, &nrm2, n, firstrow, lastrow)?;

    let mut perm = Permutation::identity(lnrows);
    let mut ldu = LduFactor::new(lnrows);
    let mut map = Membership::new(n);
    let mut spa = Spa::new(n);
    let mut lr = PendingL::new();

    let mut cur = ReducedMatrix { rows: initial_rows };
    let mut next = ReducedMatrix::default();

    let mut ndone = 0usize;
    let mut ntogo = lnrows;
    let mut nlevel = 0usize;
    let mut nleft = comm.all_reduce_sum(ntogo)?;

    while nleft > 0 {
        if nlevel >= options.max_nlevel {
            return Err(ParilutError::LevelOverflow {
                max_nlevel: options.max_nlevel,
            });
        }

        let span = info_span!("level", level = nlevel, pe = comm.mype, ntogo);
        let _enter = span.enter();

        let plan = comm.plan_communication(&rowdist, &cur.rows, firstrow, lastrow, &mut map)?;
        let iset = select_independent_set(
            comm.mype,
            firstrow,
            lastrow,
            &rowdist,
            &cur.rows,
            &perm,
            ndone,
            &plan.send_rows_by_peer,
            &mut map,
        );

        factor_local(
            &mut ldu,
            &mut spa,
            &mut lr,
            &cur.rows,
            &perm,
            &iset.newperm,
            &iset.newiperm,
            ndone,
            iset.nmis,
            &nrm2,
            firstrow,
            &options,
        );

        let outgoing = gather_factored_rows(&ldu, &iset.newperm, ndone, iset.nmis, firstrow);
        for (peer, _) in &plan.send_rows_by_peer {
            comm.send_rows(*peer, outgoing.clone())?;
        }
        let recv_peers: Vec<usize> = plan.recv_rows_by_peer.iter().map(|(p, _)| *p).collect();
        let received = comm.recv_rows_from_each(&recv_peers)?;
        received.install(&mut map);

        reduce(
            &mut ldu,
            &mut spa,
            &mut lr,
            &map,
            &received,
            &mut cur.rows,
            &perm,
            &iset.newperm,
            &iset.newiperm,
            ndone,
            iset.nmis,
            &nrm2,
            firstrow,
            &options,
            &mut next,
        );

        erase_map(&mut map, &iset.newperm, ndone, iset.nmis, firstrow, &received);
        debug_assert!(map.is_all_clear());

        perm.commit(ndone, ntogo, &iset.newperm, &iset.newiperm);
        ndone += iset.nmis;
        ntogo -= iset.nmis;
        ldu.nnodes.push(ndone);

        info!(selected = iset.nmis, "level complete");

        std::mem::swap(&mut cur, &mut next);
        next.rows.clear();
        nlevel += 1;
        nleft = comm.all_reduce_sum(ntogo)?;
    }

    Ok(Decomposition {
        perm: perm.perm,
        iperm: perm.iperm,
        l: ldu.l,
        u: ldu.u,
        dvalues: ldu.dvalues,
        nnodes: ldu.nnodes,
        nlevels: nlevel,
    })
}
