//! # parilut
//! `parilut` implements a parallel, threshold-dropping incomplete LU
//! factorization (ParILUT) for row-distributed sparse matrices.
//!
//! Each PE owns a contiguous block of rows; the factorization proceeds in
//! levels, alternately selecting an independent set of rows it can
//! eliminate without waiting on a higher-ranked neighbor, factoring them
//! locally, exchanging the results, and reducing everything left over into
//! the next level's working set, until every PE has eliminated all of its
//! rows.
//!
//! The primary entry point is [`decompose`], which simulates the whole
//! distributed computation within one process: one [`std::thread`] per PE,
//! communicating over [`crossbeam::channel`]s in place of MPI.

mod comm;
mod driver;
mod error;
mod factorize;
mod independent_set;
mod lr_heap;
mod map;
mod options;
mod perm;
mod reduce;
mod row_store;
mod spa;

use comm::Communicator;

pub use driver::Decomposition;
pub use error::ParilutError;
pub use options::ParilutOptions;
pub use row_store::{FactorCsr, FactorRow, ReducedRow};

/// One PE's share of the distributed input: its local rows (in row order,
/// diagonal-first) and the corresponding row 2-norms used to scale the
/// drop tolerance.
#[derive(Debug, Clone, Default)]
pub struct PeInput {
    pub rows: Vec<ReducedRow>,
    pub nrm2: Vec<f64>,
}

/// The full distributed input: the monotone row-distribution boundaries
/// (`rowdist[p]` is the first global row owned by PE `p`, `rowdist[npes]`
/// is the matrix dimension `n`) and each PE's local share.
#[derive(Debug, Clone, Default)]
pub struct DistributedInput {
    pub rowdist: Vec<usize>,
    pub pes: Vec<PeInput>,
}

/// Runs ParILUT to completion, returning one [`Decomposition`] per PE in
/// PE order, or the first fatal error observed on any PE.
///
/// Every PE's work happens in lockstep, level by level: if any PE's thread
/// returns an error, every other PE's next blocking communication call
/// observes the shared abort flag and fails fast with
/// [`ParilutError::CommunicationFailure`] rather than hanging forever
/// waiting on a peer that will never respond (§5/§7's fail-stop collective
/// abort).
pub fn decompose(input: &DistributedInput, options: ParilutOptions) -> Result<Vec<Decomposition>, ParilutError> {
    let npes = input.rowdist.len().saturating_sub(1);
    if input.pes.len() != npes {
        return Err(ParilutError::AllocationFailure {
            row: 0,
            reason: format!("{} PE inputs supplied for {} PEs", input.pes.len(), npes),
        });
    }
    let n = *input.rowdist.last().unwrap_or(&0);

    let comms = Communicator::build(npes);
    let rowdist = input.rowdist.clone();

    let results: Vec<Result<Decomposition, ParilutError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .zip(input.pes.iter())
            .enumerate()
            .map(|(mype, (comm, pe))| {
                let rowdist = rowdist.clone();
                let firstrow = rowdist[mype];
                let lastrow = rowdist[mype + 1];
                let rows = pe.rows.clone();
                let nrm2 = pe.nrm2.clone();
                let handle = scope.spawn(move || driver::run_pe(comm, rowdist, firstrow, lastrow, n, rows, nrm2, options));
                (mype, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(mype, h)| {
                h.join().unwrap_or_else(|_| {
                    Err(ParilutError::CommunicationFailure {
                        peer: mype,
                        reason: "PE thread panicked".into(),
                    })
                })
            })
            .collect()
    });

    results.into_iter().collect()
}
