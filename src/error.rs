use thiserror::Error;

/// Fatal conditions that abort the factorization on every PE.
///
/// Nothing here is retried: the public entry point either returns
/// `Ok(Decomposition)` after every PE finished, or the first `Err` observed,
/// having signalled all other PE threads to stop.
#[derive(Debug, Error)]
pub enum ParilutError {
    /// A column index fell outside `[0, n)`, or a local row index fell
    /// outside `[0, lnrows)`.
    #[error("index {index} out of bounds for range [0, {bound})")]
    InvalidBounds { index: usize, bound: usize },

    /// The number of levels exceeded `ParilutOptions::max_nlevel`.
    #[error("factorization exceeded the maximum of {max_nlevel} levels")]
    LevelOverflow { max_nlevel: usize },

    /// A row's declared shape disagreed with the data backing it, in a way
    /// that would otherwise force an unbounded reallocation.
    #[error("failed to size storage for row {row}: {reason}")]
    AllocationFailure { row: usize, reason: String },

    /// A peer PE's channel disconnected mid-level (its thread died or
    /// panicked), or a collective did not hear back from every PE.
    #[error("communication with PE {peer} failed: {reason}")]
    CommunicationFailure { peer: usize, reason: String },
}
