/// A simple struct for specifying options for a [`crate::decompose`] call.
///
/// * `maxnz` - the target maximum number of off-diagonal nonzeros kept per
///   row of each of `L` and `U`. Entries beyond this bound are dropped by
///   magnitude (smallest first).
/// * `tol` - the relative drop tolerance. An entry in row `i` is dropped if
///   its magnitude falls below `nrm2[i] * tol`.
/// * `max_nlevel` - an upper bound on the number of levels the factorization
///   may take. Exceeding it is a fatal [`crate::ParilutError::LevelOverflow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParilutOptions {
    pub maxnz: usize,
    pub tol: f64,
    pub max_nlevel: usize,
}

impl Default for ParilutOptions {
    fn default() -> Self {
        Self {
            maxnz: 10,
            tol: 1e-3,
            max_nlevel: 1000,
        }
    }
}
