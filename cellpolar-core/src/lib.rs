#![deny(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! This crate advances aggregates of polarized cells which satisfy the
//! [concepts](cellpolar_concepts) in time.
//!
//! ## Cells and Neighbors
//! All per-cell quantities are owned by a [CellState].
//! Cells only interact with their true neighbors which are obtained by first searching the `k`
//! nearest cells with a k-d tree and afterwards removing all candidates which are shadowed by
//! another candidate (see [find_true_neighbours]).
//! The number `k` adapts to the observed number of true neighbors.
//!
//! ## Integration
//! Positions and polarities follow a stochastic gradient descent on the total potential.
//! Gradients are obtained by evaluating the [Potential](cellpolar_concepts::Potential) with
//! [Dual](cellpolar_concepts::Dual) numbers.
//!
//! ## Morphogen and Reaction-Diffusion
//! Optionally, cells carry a morphogen which biases their planar cell polarity (see
//! [WntSettings]) and which can in turn be driven by a ligand diffusing on an extracellular grid
//! (see [ReactionDiffusion]).
//!
//! ## Simulation
//! The [Simulation] combines all parts and yields a [Snapshot] every few steps.

mod cell_state;
mod division;
mod errors;
mod integrator;
#[cfg(feature = "tracing")]
mod logging;
mod morphogen;
mod neighbours;
mod progress;
mod reaction_diffusion;
mod settings;
mod simulation;

pub use cell_state::*;
pub use division::*;
pub use errors::*;
pub use integrator::*;
#[cfg(feature = "tracing")]
#[cfg_attr(docsrs, doc(cfg(feature = "tracing")))]
pub use logging::*;
pub use morphogen::*;
pub use neighbours::*;
pub use progress::*;
pub use reaction_diffusion::*;
pub use settings::*;
pub use simulation::*;

#[doc(hidden)]
pub use rayon;

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use tracing;
