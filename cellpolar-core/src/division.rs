use cellpolar_concepts::{DivisionError, RngError};
use nalgebra::Vector3;
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::cell_state::{CellIndex, CellState, NORM_EPSILON};
use crate::settings::SimulationSettings;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parent and daughter of every division which took place.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DivisionOutcome {
    /// Pairs of `(parent, daughter)`
    pub pairs: Vec<(CellIndex, CellIndex)>,
}

impl DivisionOutcome {
    /// Returns `true` if no cell divided
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of divisions
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Draws a uniformly distributed unit vector.
pub fn random_direction<R: Rng>(rng: &mut R) -> Vector3<f64> {
    loop {
        let v = Vector3::from_fn(|_, _| rng.sample::<f64, _>(StandardNormal));
        let norm = v.norm();
        if norm > NORM_EPSILON {
            return v / norm;
        }
    }
}

/// Samples which cells divide and places their daughters.
///
/// Nothing happens if $\sum_i\beta_i$ is below `do_nothing_threshold`.
/// Otherwise every cell divides with probability $\beta_i\Delta t$ or, if `divide_single` is set,
/// exactly one cell is chosen with probability proportional to $\beta_i$.
/// Parent and daughter are separated by a random unit vector.
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub fn divide<R: Rng>(
    cells: &mut CellState,
    settings: &SimulationSettings,
    rng: &mut R,
) -> Result<DivisionOutcome, DivisionError> {
    let total_beta: f64 = cells.beta().iter().sum();
    if total_beta < settings.do_nothing_threshold {
        return Ok(DivisionOutcome::default());
    }
    let parents: Vec<usize> = if settings.divide_single {
        let distr = WeightedIndex::new(cells.beta())
            .map_err(|e| RngError(format!("Could not sample dividing cell: {e}")))?;
        vec![rng.sample(distr)]
    } else {
        let dt = settings.dt;
        cells
            .beta()
            .iter()
            .enumerate()
            .filter(|(_, beta)| rng.gen::<f64>() < *beta * dt)
            .map(|(i, _)| i)
            .collect()
    };

    let mut outcome = DivisionOutcome {
        pairs: Vec::with_capacity(parents.len()),
    };
    for parent in parents.into_iter().map(CellIndex) {
        let direction = random_direction(rng);
        let daughter = cells
            .split(parent, direction, settings.beta_decay)
            .map_err(|e| DivisionError(format!("{e}")))?;
        outcome.pairs.push((parent, daughter));
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(
        divisions = outcome.len(),
        n_cells = cells.len(),
        "cells divided"
    );
    Ok(outcome)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cell_state::Lambda;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cells(beta: Vec<f64>) -> CellState {
        let n = beta.len();
        CellState::new(
            (0..n).map(|i| Vector3::new(2.0 * i as f64, 0.0, 0.0)).collect(),
            vec![Vector3::z(); n],
            vec![Vector3::y(); n],
            Lambda::Shared(vec![0.0, 1.0, 0.0, 0.0]),
            beta,
        )
        .unwrap()
    }

    #[test]
    fn random_directions_are_unit() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..100 {
            assert_abs_diff_eq!(random_direction(&mut rng).norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn multi_mode_adds_one_cell_per_division() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut cells = cells(vec![2.0; 50]);
        let settings = SimulationSettings {
            dt: 0.25,
            ..Default::default()
        };
        let before = cells.clone();
        let outcome = divide(&mut cells, &settings, &mut rng).unwrap();
        assert!(!outcome.is_empty());
        assert_eq!(cells.len(), 50 + outcome.len());
        assert!(cells.is_consistent());
        for (parent, daughter) in outcome.pairs.iter() {
            let x = before.positions()[parent.0];
            let p = cells.positions()[parent.0];
            let d = cells.positions()[daughter.0];
            assert_abs_diff_eq!((d - p).norm(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!((p + d) / 2.0, x, epsilon = 1e-12);
            assert_eq!(cells.lambda().row(daughter.0), before.lambda().row(parent.0));
            assert_eq!(cells.polarity()[daughter.0], before.polarity()[parent.0]);
        }
    }

    #[test]
    fn single_mode_adds_exactly_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut cells = cells(vec![0.0, 0.0, 1.0, 0.0]);
        let settings = SimulationSettings {
            divide_single: true,
            beta_decay: 0.5,
            ..Default::default()
        };
        let outcome = divide(&mut cells, &settings, &mut rng).unwrap();
        assert_eq!(outcome.pairs, vec![(CellIndex(2), CellIndex(4))]);
        assert_eq!(cells.len(), 5);
        assert_eq!(cells.beta(), &[0.0, 0.0, 0.5, 0.0, 0.5]);
    }

    #[test]
    fn small_total_rate_does_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut cells = cells(vec![1e-7; 10]);
        for divide_single in [true, false] {
            let settings = SimulationSettings {
                divide_single,
                ..Default::default()
            };
            let outcome = divide(&mut cells, &settings, &mut rng).unwrap();
            assert!(outcome.is_empty());
            assert_eq!(cells.len(), 10);
        }
    }

    #[test]
    fn morphogen_is_split() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut cells = cells(vec![1.0]);
        cells.enable_wnt(&[0]).unwrap();
        let settings = SimulationSettings {
            divide_single: true,
            ..Default::default()
        };
        divide(&mut cells, &settings, &mut rng).unwrap();
        let wnt = cells.wnt().unwrap();
        assert_abs_diff_eq!(wnt[0] + wnt[1], 1.0);
        assert_eq!(wnt[0], wnt[1]);
    }
}
