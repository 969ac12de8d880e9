#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
//! This crate encapsulates concepts which govern the polarity model simulated by
//! [cellpolar](https://docs.rs/cellpolar).
//!
//! Cells interact through a pairwise [Potential] which is evaluated in a generic [Scalar] type.
//! Evaluating it with [Dual] numbers yields all derivatives needed for the gradient step.
//! Division events are gated by a [DivisionDecider].

mod division;
mod errors;
mod potential;
mod scalar;

pub use division::*;
pub use errors::*;
pub use potential::*;
pub use scalar::*;
