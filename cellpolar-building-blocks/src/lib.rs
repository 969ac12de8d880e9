#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
//! # cellpolar - Building Blocks
//!
//! Ready-made [Potential](cellpolar_concepts::Potential)s and
//! [DivisionDecider](cellpolar_concepts::DivisionDecider)s.
//! ```rust
//! # use cellpolar_building_blocks::prelude::*;
//! # use cellpolar_concepts::{DivisionDecider, DivisionInfo, PairContext, Potential};
//! let potential = PolarPotential::default();
//! let lambda = [0.0, 1.0, 0.0, 0.0];
//! let ctx = PairContext {
//!     position: [0.0; 3],
//!     distance: 1.0,
//!     direction: [1.0, 0.0, 0.0],
//!     lambda_i: &lambda,
//!     lambda_j: &lambda,
//!     polarity_i: [0.0, 0.0, 1.0],
//!     polarity_j: [0.0, 0.0, 1.0],
//!     pcp_i: [0.0, 1.0, 0.0],
//!     pcp_j: [0.0, 1.0, 0.0],
//!     gradient: [0.0; 3],
//! };
//! let v: f64 = potential.eval(&ctx);
//! assert!(v < 0.0);
//!
//! let mut decider = RateDivisionDecider {
//!     start_time: 0.0,
//!     rate: 1.0,
//!     max_cells: 500,
//! };
//! let info = DivisionInfo { n_cells: 10, dt: 0.1, total_beta: 1.0 };
//! assert!(decider.decide(&info, 10));
//! ```

/// Potentials and division deciders
pub mod cell_building_blocks;

/// Handy re-exports of every building block.
pub mod prelude;
