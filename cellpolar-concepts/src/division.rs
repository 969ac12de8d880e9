use serde::{Deserialize, Serialize};

/// Read-only view on the simulation handed to a [DivisionDecider].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DivisionInfo {
    /// Current number of cells
    pub n_cells: usize,
    /// Time increment of one step
    pub dt: f64,
    /// Sum of all division rates $\sum_i\beta_i$
    pub total_beta: f64,
}

impl DivisionInfo {
    /// Absolute time after `tstep` steps.
    pub fn time(&self, tstep: u64) -> f64 {
        self.dt * tstep as f64
    }
}

/// Decides in which steps cells are allowed to divide.
///
/// If the decider returns `true`, the individual cells still divide stochastically according
/// to their division rates $\beta_i$.
/// Any closure of the form `FnMut(&DivisionInfo, u64) -> bool` is a decider.
/// ```
/// # use cellpolar_concepts::{DivisionDecider, DivisionInfo};
/// let mut every_other = |_: &DivisionInfo, tstep: u64| tstep % 2 == 0;
/// let info = DivisionInfo { n_cells: 10, dt: 0.1, total_beta: 1.0 };
/// assert!(every_other.decide(&info, 4));
/// assert!(!every_other.decide(&info, 5));
/// ```
pub trait DivisionDecider {
    /// Return `true` if division may take place in step `tstep`.
    fn decide(&mut self, info: &DivisionInfo, tstep: u64) -> bool;
}

impl<F> DivisionDecider for F
where
    F: FnMut(&DivisionInfo, u64) -> bool,
{
    fn decide(&mut self, info: &DivisionInfo, tstep: u64) -> bool {
        self(info, tstep)
    }
}
