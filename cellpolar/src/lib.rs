#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! [cellpolar](crate) simulates growing aggregates of cells which carry an apical-basal polarity
//! and a planar cell polarity.
//! Cells interact with their true neighbors through a pairwise potential, move by noisy gradient
//! descent and divide stochastically.
//! Optionally, a morphogen gradient and a ligand diffusing on an extracellular grid bias the
//! planar cell polarity.
//!
//! ```
//! use cellpolar::prelude::*;
//!
//! let cells = CellState::new(
//!     vec![Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)],
//!     vec![Vector3::z(); 3],
//!     vec![Vector3::y(); 3],
//!     Lambda::Shared(vec![0.0, 0.5, 0.4, 0.1]),
//!     vec![0.0; 3],
//! )?;
//! let settings = SimulationSettings {
//!     eta: 0.05,
//!     yield_every: 10,
//!     ..Default::default()
//! };
//! let mut sim = Simulation::new(cells, settings, PolarPotential::default())?
//!     .with_decider(NeverDivide);
//! let snapshots = sim.run(5, 100)?;
//! assert_eq!(snapshots.len(), 5);
//! assert_eq!(snapshots[4].iteration, 50);
//! # Ok::<(), SimulationError>(())
//! ```

pub use cellpolar_building_blocks as building_blocks;

pub use cellpolar_concepts as concepts;

pub use cellpolar_core as core;

/// Re-exports the default simulation types and traits.
pub mod prelude;
