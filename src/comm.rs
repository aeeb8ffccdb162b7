//! Communication planner and collectives (C4, §4.4).
//!
//! `parilut.c` speaks MPI: blocking point-to-point sends/receives tagged by
//! message type, plus `MPI_Alltoall`/`MPI_Allreduce` collectives. This crate
//! has one process, so each PE becomes a `std::thread` and each MPI message
//! tag becomes its own `crossbeam::channel` network — keeping tags on
//! separate channels (rather than one multiplexed inbox) is what lets a
//! fast PE race ahead on one phase without its messages being mistaken for
//! another phase's, the same safety MPI gets from matching on `(source,
//! tag)`. Generalizes the teacher's `crossbeam::atomic::AtomicCell` (same
//! crate, a different primitive, because the unit of concurrency moved from
//! "one matrix column" to "one PE").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use hashbrown::HashMap;

use crate::error::ParilutError;
use crate::map::{MapEntry, Membership};
use crate::row_store::{FactorRow, ReducedRow};

/// A factored row as sent over the wire during row exchange (C6, §4.6).
/// Replaces the original's packed `int`/`double` send buffers (and the
/// §9 Open Question's alignment slot) with an owned, separately-typed
/// column/value pair.
#[derive(Debug, Clone)]
pub struct FactoredRow {
    pub global_row: usize,
    pub diag_recip: f64,
    pub cols: Vec<usize>,
    pub vals: Vec<f64>,
}

impl From<(usize, &FactorRow, f64)> for FactoredRow {
    fn from((global_row, u_row, diag_recip): (usize, &FactorRow, f64)) -> Self {
        Self {
            global_row,
            diag_recip,
            cols: u_row.cols.clone(),
            vals: u_row.vals.clone(),
        }
    }
}

/// This level's communication plan: which rows to fetch from which
/// neighbors, and which of this PE's rows which neighbors asked for.
#[derive(Debug, Clone, Default)]
pub struct CommPlan {
    pub recv_rows_by_peer: Vec<(usize, Vec<usize>)>,
    pub send_rows_by_peer: Vec<(usize, Vec<usize>)>,
}

/// Rows received from neighbors this level, grouped by sender in arrival
/// order. Offsets into the flattened view are what `map::MapEntry::Received`
/// carries.
#[derive(Debug, Clone, Default)]
pub struct ReceivedRows {
    pub by_peer: Vec<(usize, Vec<FactoredRow>)>,
}

impl ReceivedRows {
    pub fn flattened(&self) -> Vec<&FactoredRow> {
        self.by_peer.iter().flat_map(|(_, rows)| rows.iter()).collect()
    }

    /// Installs each row into the membership map at its flattened offset.
    pub fn install(&self, map: &mut Membership) {
        let mut offset = 0;
        for (_, rows) in &self.by_peer {
            for row in rows {
                map.set(row.global_row, MapEntry::Received(offset));
                offset += 1;
            }
        }
    }

    /// Clears every received row's map entry (part of `EraseMap`, §4.8).
    pub fn erase(&self, map: &mut Membership) {
        for (_, rows) in &self.by_peer {
            for row in rows {
                map.clear(row.global_row);
            }
        }
    }
}

/// `Idx2PE`: the owning PE of a global row, from the monotone `rowdist`
/// boundaries (`rowdist[p]` is the first global row owned by PE `p`,
/// `rowdist[npes]` is `n`).
pub fn owning_pe(rowdist: &[usize], global_row: usize) -> usize {
    match rowdist.binary_search(&global_row) {
        Ok(idx) => idx,
        Err(idx) => idx - 1,
    }
}

struct ChannelSet<T> {
    senders: Vec<Sender<(usize, T)>>,
    receiver: Receiver<(usize, T)>,
}

impl<T> ChannelSet<T> {
    fn build(npes: usize) -> Vec<ChannelSet<T>> {
        let mut txs = Vec::with_capacity(npes);
        let mut rxs = Vec::with_capacity(npes);
        for _ in 0..npes {
            let (tx, rx) = unbounded();
            txs.push(tx);
            rxs.push(rx);
        }
        rxs.into_iter()
            .map(|receiver| ChannelSet {
                senders: txs.clone(),
                receiver,
            })
            .collect()
    }
}

/// One PE's view of the network: an inbox per message tag, plus a shared
/// abort flag so a PE that errors out doesn't leave its peers blocked
/// waiting on a message that will never arrive (§5/§7 fail-stop collective
/// abort).
pub struct Communicator {
    pub mype: usize,
    pub npes: usize,
    abort: Arc<AtomicBool>,
    plan: ChannelSet<usize>,
    req: ChannelSet<Vec<usize>>,
    row: ChannelSet<Vec<FactoredRow>>,
    term: ChannelSet<usize>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn send<T>(chan: &ChannelSet<T>, mype: usize, peer: usize, payload: T) -> Result<(), ParilutError> {
    chan.senders[peer]
        .send((mype, payload))
        .map_err(|_| ParilutError::CommunicationFailure {
            peer,
            reason: "peer inbox disconnected".into(),
        })
}

fn recv_one<T>(chan: &ChannelSet<T>, mype: usize, abort: &AtomicBool) -> Result<(usize, T), ParilutError> {
    loop {
        match chan.receiver.recv_timeout(POLL_INTERVAL) {
            Ok(msg) => return Ok(msg),
            Err(RecvTimeoutError::Timeout) => {
                if abort.load(Ordering::Relaxed) {
                    return Err(ParilutError::CommunicationFailure {
                        peer: mype,
                        reason: "factorization aborted on another PE".into(),
                    });
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ParilutError::CommunicationFailure {
                    peer: mype,
                    reason: "inbox disconnected".into(),
                })
            }
        }
    }
}

impl Communicator {
    /// Builds one `Communicator` per PE, all sharing one abort flag.
    pub fn build(npes: usize) -> Vec<Communicator> {
        let plan = ChannelSet::build(npes);
        let req = ChannelSet::build(npes);
        let row = ChannelSet::build(npes);
        let term = ChannelSet::build(npes);
        let abort = Arc::new(AtomicBool::new(false));

        plan.into_iter()
            .zip(req)
            .zip(row)
            .zip(term)
            .enumerate()
            .map(|(mype, (((plan, req), row), term))| Communicator {
                mype,
                npes,
                abort: abort.clone(),
                plan,
                req,
                row,
                term,
            })
            .collect()
    }

    pub fn signal_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// `MPI_Alltoall` over per-peer wanted-row counts (§4.4 step 3).
    pub fn all_to_all_counts(&self, want: &[usize]) -> Result<Vec<usize>, ParilutError> {
        for peer in 0..self.npes {
            if peer != self.mype {
                send(&self.plan, self.mype, peer, want[peer])?;
            }
        }
        let mut got = vec![0usize; self.npes];
        for _ in 0..self.npes.saturating_sub(1) {
            let (from, count) = recv_one(&self.plan, self.mype, &self.abort)?;
            got[from] = count;
        }
        Ok(got)
    }

    /// `MPI_Allreduce` sum, used for the level-boundary remaining-row count
    /// (§4.8 step: "global sum of `ntogo` across all PEs").
    pub fn all_reduce_sum(&self, local: usize) -> Result<usize, ParilutError> {
        for peer in 0..self.npes {
            if peer != self.mype {
                send(&self.term, self.mype, peer, local)?;
            }
        }
        let mut total = local;
        for _ in 0..self.npes.saturating_sub(1) {
            let (_, v) = recv_one(&self.term, self.mype, &self.abort)?;
            total += v;
        }
        Ok(total)
    }

    fn send_req(&self, peer: usize, rows: Vec<usize>) -> Result<(), ParilutError> {
        send(&self.req, self.mype, peer, rows)
    }

    fn recv_req_from_each(&self, peers: &[usize]) -> Result<HashMap<usize, Vec<usize>>, ParilutError> {
        let mut out = HashMap::new();
        for _ in 0..peers.len() {
            let (from, rows) = recv_one(&self.req, self.mype, &self.abort)?;
            out.insert(from, rows);
        }
        Ok(out)
    }

    pub fn send_rows(&self, peer: usize, rows: Vec<FactoredRow>) -> Result<(), ParilutError> {
        send(&self.row, self.mype, peer, rows)
    }

    pub fn recv_rows_from_each(&self, peers: &[usize]) -> Result<ReceivedRows, ParilutError> {
        let mut by_peer = Vec::with_capacity(peers.len());
        for _ in 0..peers.len() {
            let (from, rows) = recv_one(&self.row, self.mype, &self.abort)?;
            by_peer.push((from, rows));
        }
        Ok(ReceivedRows { by_peer })
    }

    /// C4 communication planner: which remote rows are referenced by this
    /// PE's active rows, bucketed by owner, then exchanged so every owner
    /// learns who's asking for which of its rows.
    pub fn plan_communication(
        &self,
        rowdist: &[usize],
        active_rows: &[ReducedRow],
        firstrow: usize,
        lastrow: usize,
        map: &mut Membership,
    ) -> Result<CommPlan, ParilutError> {
        let mut needed: Vec<usize> = Vec::new();
        for row in active_rows {
            for &c in &row.cols[1..] {
                if (c < firstrow || c >= lastrow) && !map.get(c).is_selected() {
                    map.set(c, MapEntry::LocalSelected);
                    needed.push(c);
                }
            }
        }
        needed.sort_unstable();

        let mut recv_rows_by_peer: Vec<(usize, Vec<usize>)> = Vec::new();
        for &row in &needed {
            let owner = owning_pe(rowdist, row);
            match recv_rows_by_peer.last_mut() {
                Some((p, rows)) if *p == owner => rows.push(row),
                _ => recv_rows_by_peer.push((owner, vec![row])),
            }
        }
        for &row in &needed {
            map.clear(row);
        }

        let mut want = vec![0usize; self.npes];
        for (peer, rows) in &recv_rows_by_peer {
            want[*peer] = rows.len();
        }
        let got_counts = self.all_to_all_counts(&want)?;

        for (peer, rows) in &recv_rows_by_peer {
            self.send_req(*peer, rows.clone())?;
        }
        let senders: Vec<usize> = (0..self.npes).filter(|&p| got_counts[p] > 0).collect();
        let mut received = self.recv_req_from_each(&senders)?;
        let send_rows_by_peer: Vec<(usize, Vec<usize>)> = senders
            .into_iter()
            .map(|p| (p, received.remove(&p).unwrap_or_default()))
            .collect();

        Ok(CommPlan {
            recv_rows_by_peer,
            send_rows_by_peer,
        })
    }
}
