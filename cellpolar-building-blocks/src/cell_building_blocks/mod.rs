/// Deciders which gate cell division
pub mod cycle;

/// Collection of pairwise potentials between cells.
pub mod interaction;
