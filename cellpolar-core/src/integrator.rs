use cellpolar_concepts::*;
use nalgebra::Vector3;
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cell_state::CellState;
use crate::neighbours::TrueNeighbours;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Pairs closer than this distance do not interact.
pub const DISTANCE_EPSILON: f64 = 1e-10;

/// Number of independent variables of one pair:
/// $x_i, x_j, p_i, p_j, q_i, q_j$ with three components each.
const PAIR_VARIABLES: usize = 18;

type PairDual = Dual<PAIR_VARIABLES>;

/// Result of a single [gradient_step].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StepReport {
    /// Total potential $V$ before the update
    pub potential: f64,
    /// Largest number of true neighbors of any cell
    pub true_neighbour_max: usize,
}

/// Gradient $\nabla V$ with respect to all cell quantities.
#[derive(Clone, Debug, PartialEq)]
pub struct PotentialGradient {
    /// Total potential $V$
    pub potential: f64,
    /// $\nabla_{x_i} V$
    pub positions: Vec<Vector3<f64>>,
    /// $\nabla_{p_i} V$
    pub polarity: Vec<Vector3<f64>>,
    /// $\nabla_{q_i} V$
    pub pcp: Vec<Vector3<f64>>,
}

fn seeded(v: &Vector3<f64>, offset: usize) -> Vec3<PairDual> {
    [
        Dual::variable(v.x, offset),
        Dual::variable(v.y, offset + 1),
        Dual::variable(v.z, offset + 2),
    ]
}

fn plain(v: &Vector3<f64>) -> Vec3<f64> {
    [v.x, v.y, v.z]
}

fn gradient_at<S: Scalar>(gradients: Option<&[Vector3<f64>]>, i: usize) -> Vec3<S> {
    gradients
        .and_then(|g| g.get(i))
        .map_or([S::zero(); 3], |g| lift([g.x, g.y, g.z]))
}

/// Assembles the [PairContext] of cells `i` and `j` from variables given in the scalar type `S`.
///
/// Returns [None] if both cells are closer than [DISTANCE_EPSILON].
#[allow(clippy::too_many_arguments)]
fn pair_context<'a, S: Scalar>(
    x_i: Vec3<S>,
    x_j: Vec3<S>,
    polarity_i: Vec3<S>,
    polarity_j: Vec3<S>,
    pcp_i: Vec3<S>,
    pcp_j: Vec3<S>,
    lambda_i: &'a [f64],
    lambda_j: &'a [f64],
    gradient: Vec3<S>,
) -> Option<PairContext<'a, S>> {
    let dx = [x_i[0] - x_j[0], x_i[1] - x_j[1], x_i[2] - x_j[2]];
    let distance = dot(&dx, &dx).sqrt();
    if distance.re() < DISTANCE_EPSILON {
        #[cfg(feature = "tracing")]
        tracing::warn!("skipping pair of cells at zero distance");
        return None;
    }
    Some(PairContext {
        position: x_i,
        distance,
        direction: [dx[0] / distance, dx[1] / distance, dx[2] / distance],
        lambda_i,
        lambda_j,
        polarity_i,
        polarity_j,
        pcp_i,
        pcp_j,
        gradient,
    })
}

fn check_finite(value: f64, i: usize, j: usize) -> Result<f64, CalcError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError(format!(
            "Potential between cells {i} and {j} evaluated to {value}"
        )))
    }
}

/// Calculates the total potential $V=\sum_i\sum_{j\in\mathcal{N}(i)}V_{ij}$.
///
/// Returns $V$ together with the shared width $m$ of the true neighbor arrays.
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub fn potential<P>(
    cells: &CellState,
    neighbours: &TrueNeighbours,
    gradients: Option<&[Vector3<f64>]>,
    potential: &P,
) -> Result<(f64, usize), CalcError>
where
    P: Potential + Sync,
{
    let lambda = cells.lambda();
    let total = (0..cells.len())
        .into_par_iter()
        .map(|i| {
            neighbours.of(i).try_fold(0.0, |acc, (_, j)| {
                let ctx = pair_context::<f64>(
                    plain(&cells.positions[i]),
                    plain(&cells.positions[j]),
                    plain(&cells.polarity[i]),
                    plain(&cells.polarity[j]),
                    plain(&cells.pcp[i]),
                    plain(&cells.pcp[j]),
                    lambda.row(i),
                    lambda.row(j),
                    gradient_at(gradients, i),
                );
                let v = ctx.map_or(0.0, |ctx| potential.eval(&ctx));
                Ok::<f64, CalcError>(acc + check_finite(v, i, j)?)
            })
        })
        .try_reduce(|| 0.0, |a, b| Ok(a + b))?;
    Ok((total, neighbours.width()))
}

/// Calculates $V$ and its gradient by evaluating every true neighbor pair with [Dual] numbers.
///
/// Pairs are evaluated in parallel while the results are scattered into the gradient arrays
/// sequentially.
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub fn potential_gradient<P>(
    cells: &CellState,
    neighbours: &TrueNeighbours,
    gradients: Option<&[Vector3<f64>]>,
    potential: &P,
) -> Result<PotentialGradient, CalcError>
where
    P: Potential + Sync,
{
    let n_cells = cells.len();
    let lambda = cells.lambda();
    let pairs = (0..n_cells)
        .into_par_iter()
        .map(|i| {
            neighbours
                .of(i)
                .filter_map(|(_, j)| {
                    let ctx = pair_context::<PairDual>(
                        seeded(&cells.positions[i], 0),
                        seeded(&cells.positions[j], 3),
                        seeded(&cells.polarity[i], 6),
                        seeded(&cells.polarity[j], 9),
                        seeded(&cells.pcp[i], 12),
                        seeded(&cells.pcp[j], 15),
                        lambda.row(i),
                        lambda.row(j),
                        gradient_at(gradients, i),
                    )?;
                    Some((i, j, potential.eval(&ctx)))
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut result = PotentialGradient {
        potential: 0.0,
        positions: vec![Vector3::zeros(); n_cells],
        polarity: vec![Vector3::zeros(); n_cells],
        pcp: vec![Vector3::zeros(); n_cells],
    };
    for (i, j, v) in pairs.into_iter().flatten() {
        result.potential += check_finite(v.re, i, j)?;
        if let Some(e) = v.eps.iter().find(|e| !e.is_finite()) {
            return Err(CalcError(format!(
                "Gradient of potential between cells {i} and {j} contains {e}"
            )));
        }
        let part = |offset: usize| Vector3::new(v.eps[offset], v.eps[offset + 1], v.eps[offset + 2]);
        result.positions[i] += part(0);
        result.positions[j] += part(3);
        result.polarity[i] += part(6);
        result.polarity[j] += part(9);
        result.pcp[i] += part(12);
        result.pcp[j] += part(15);
    }
    Ok(result)
}

fn langevin_update<R: Rng>(
    values: &mut [Vector3<f64>],
    gradient: &[Vector3<f64>],
    dt: f64,
    eta: f64,
    rng: &mut R,
) {
    let noise_strength = eta * dt.sqrt();
    for (v, g) in values.iter_mut().zip(gradient) {
        *v -= g * dt;
        if eta != 0.0 {
            let noise = Vector3::from_fn(|_, _| rng.sample::<f64, _>(StandardNormal));
            *v += noise * noise_strength;
        }
    }
}

/// Performs one stochastic gradient descent step
/// \\begin{equation}
///     y \leftarrow y - \nabla_y V \Delta t + \eta\sqrt{\Delta t}\xi
/// \\end{equation}
/// for $y\in\{x, p, q\}$ where $\xi$ are independent standard normal numbers.
///
/// Polarities must be normalized before calling this function.
/// Afterwards they are normalized again and a polarity which collapsed to zero keeps its value
/// from before the step.
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub fn gradient_step<P, R>(
    cells: &mut CellState,
    neighbours: &TrueNeighbours,
    gradients: Option<&[Vector3<f64>]>,
    potential: &P,
    dt: f64,
    eta: f64,
    rng: &mut R,
) -> Result<StepReport, CalcError>
where
    P: Potential + Sync,
    R: Rng,
{
    let grad = potential_gradient(cells, neighbours, gradients, potential)?;
    let previous_polarity = cells.polarity.clone();
    let previous_pcp = cells.pcp.clone();
    langevin_update(&mut cells.positions, &grad.positions, dt, eta, rng);
    langevin_update(&mut cells.polarity, &grad.polarity, dt, eta, rng);
    langevin_update(&mut cells.pcp, &grad.pcp, dt, eta, rng);
    cells.normalize_orientations(&previous_polarity, &previous_pcp);
    Ok(StepReport {
        potential: grad.potential,
        true_neighbour_max: neighbours.max_count(),
    })
}
