use itertools::{Itertools, MinMaxResult};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::cell_state::{CellState, NORM_EPSILON};
use crate::integrator::DISTANCE_EPSILON;
use crate::neighbours::TrueNeighbours;

/// Gradients shorter than this value are set to zero.
pub const GRADIENT_CUTOFF: f64 = 1e-3;

/// Determines how the morphogen gradient $G_i$ is estimated from the neighbors of a cell.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub enum GradientMode {
    /// Sum of unit displacements weighted by the morphogen levels and projected onto the plane
    /// perpendicular to the polarity:
    /// \\begin{align}
    ///     G_i &= \sum_{j\in\mathcal{N}(i)} (w_i + \tilde{w}_{ij})\hat{r}_{ij}\\\\
    ///     \tilde{G}_i &= -(G_i\times p_i)\times p_i
    /// \\end{align}
    /// where $\tilde{w}_{ij}=w_j$ if cell $i$ is weighted and zero otherwise.
    #[default]
    Projected,
    /// Mean over all neighbor slots of the finite difference
    /// \\begin{equation}
    ///     G_i = \frac{1}{m}\sum_{j\in\mathcal{N}(i)}(w_j - w_i)\frac{x_i-x_j}{|x_i-x_j|^2}.
    /// \\end{equation}
    DistanceWeighted,
}

/// Parameters of the morphogen (WNT) signalling.
///
/// | Struct Field | Default | Description |
/// | --- | --- | --- |
/// | `source_cells` | `[]` | Cells which are kept at $w=1$ |
/// | `threshold` | `1e-2` | Cells with $w\geq$ `threshold` are weighted |
/// | `decay` | `0.0` | Rate of the exponential change of $w$ |
/// | `gradient_mode` | [GradientMode::Projected] | Estimation of $G_i$ |
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WntSettings {
    /// Cells which are kept at $w=1$
    pub source_cells: Vec<usize>,
    /// Cells with $w\geq$ `threshold` are weighted
    pub threshold: f64,
    /// Rate of the exponential change of $w$
    pub decay: f64,
    /// Estimation of $G_i$
    pub gradient_mode: GradientMode,
}

impl Default for WntSettings {
    fn default() -> Self {
        Self {
            source_cells: Vec::new(),
            threshold: 1e-2,
            decay: 0.0,
            gradient_mode: GradientMode::default(),
        }
    }
}

/// Estimates the morphogen gradient $G_i$ of every cell.
///
/// See [GradientMode] for the available methods.
pub fn gradient_vectors(
    wnt: &[f64],
    polarity: &[Vector3<f64>],
    neighbours: &TrueNeighbours,
    threshold: f64,
    mode: GradientMode,
) -> Vec<Vector3<f64>> {
    let width = neighbours.width();
    (0..wnt.len())
        .map(|i| {
            let weighted = wnt[i] >= threshold;
            let slots = neighbours.of(i).filter(|(slot, _)| {
                neighbours.distances[(i, *slot)] >= DISTANCE_EPSILON
            });
            match mode {
                GradientMode::Projected => {
                    let g: Vector3<f64> = slots
                        .map(|(slot, j)| {
                            let w_tilde = if weighted { wnt[j] } else { 0.0 };
                            let direction = neighbours.displacement[(i, slot)]
                                / neighbours.distances[(i, slot)];
                            direction * (wnt[i] + w_tilde)
                        })
                        .sum();
                    let p = polarity[i];
                    let projected = -(g.cross(&p)).cross(&p);
                    cutoff(projected, weighted, |norm| norm < GRADIENT_CUTOFF)
                }
                GradientMode::DistanceWeighted => {
                    let g: Vector3<f64> = slots
                        .map(|(slot, j)| {
                            let d = neighbours.distances[(i, slot)];
                            neighbours.displacement[(i, slot)] * (wnt[j] - wnt[i]) / (d * d)
                        })
                        .sum();
                    let g = if width > 0 { g / width as f64 } else { g };
                    cutoff(g, weighted, |norm| norm <= GRADIENT_CUTOFF)
                }
            }
        })
        .collect()
}

fn cutoff(g: Vector3<f64>, normalize: bool, too_small: impl Fn(f64) -> bool) -> Vector3<f64> {
    let norm = g.norm();
    if too_small(norm) {
        Vector3::zeros()
    } else if normalize {
        g / norm
    } else {
        g
    }
}

/// Smooths the morphogen levels by averaging over every cell and its true neighbors
/// \\begin{equation}
///     w_i \leftarrow \frac{w_i + \sum_{j\in\mathcal{N}(i)} w_j}{1 + c_i}
/// \\end{equation}
/// and resets the source cells to $w=1$ afterwards.
pub fn gradient_averaging(wnt: &mut [f64], neighbours: &TrueNeighbours, source_cells: &[usize]) {
    let averaged: Vec<f64> = (0..wnt.len())
        .map(|i| {
            let (sum, count) = neighbours
                .of(i)
                .fold((wnt[i], 1usize), |(s, c), (_, j)| (s + wnt[j], c + 1));
            sum / count as f64
        })
        .collect();
    wnt.copy_from_slice(&averaged);
    replenish_sources(wnt, source_cells);
}

/// Sets $w=1$ for all source cells.
pub fn replenish_sources(wnt: &mut [f64], source_cells: &[usize]) {
    for &c in source_cells {
        if let Some(w) = wnt.get_mut(c) {
            *w = 1.0;
        }
    }
}

/// Applies $w_i\leftarrow w_i e^{\Delta t\,r}$.
pub fn decay(wnt: &mut [f64], dt: f64, rate: f64) {
    let factor = (dt * rate).exp();
    wnt.iter_mut().for_each(|w| *w *= factor);
}

/// Sets the division rates to the rescaled morphogen levels
/// \\begin{equation}
///     \beta_i = \left(\frac{w_i - \min_j w_j}{\max_j w_j - \min_j w_j}\right)^e.
/// \\end{equation}
/// The rates are left unchanged if all cells carry the same amount of morphogen.
pub fn beta_from_wnt(wnt: &[f64], beta: &mut [f64], exponent: f64) {
    let (min, max) = match wnt.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::MinMax(min, max) => (min, max),
        MinMaxResult::OneElement(_) | MinMaxResult::NoElements => return,
    };
    let range = max - min;
    if range < NORM_EPSILON {
        return;
    }
    for (b, w) in beta.iter_mut().zip(wnt) {
        *b = ((w - min) / range).powf(exponent);
    }
}

/// Morphogen signalling attached to a simulation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WntSignalling {
    settings: WntSettings,
    gradients: Vec<Vector3<f64>>,
}

impl WntSignalling {
    /// Initializes the morphogen levels of the cells.
    pub(crate) fn attach(
        settings: WntSettings,
        cells: &mut CellState,
    ) -> Result<Self, cellpolar_concepts::SetupError> {
        cells.enable_wnt(&settings.source_cells)?;
        Ok(Self {
            gradients: vec![Vector3::zeros(); cells.len()],
            settings,
        })
    }

    /// Parameters of the signalling
    pub fn settings(&self) -> &WntSettings {
        &self.settings
    }

    /// Most recently estimated gradients $G_i$
    pub fn gradients(&self) -> &[Vector3<f64>] {
        &self.gradients
    }

    /// Recomputes the gradients $G_i$ of all cells.
    pub(crate) fn update_gradients(&mut self, cells: &CellState, neighbours: &TrueNeighbours) {
        self.gradients = match cells.wnt() {
            Some(wnt) => gradient_vectors(
                wnt,
                cells.polarity(),
                neighbours,
                self.settings.threshold,
                self.settings.gradient_mode,
            ),
            None => vec![Vector3::zeros(); cells.len()],
        };
    }

    pub(crate) fn replenish(&self, cells: &mut CellState) {
        if let Some(wnt) = cells.wnt_mut() {
            replenish_sources(wnt, &self.settings.source_cells);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::neighbours::{find_potential_neighbours, find_true_neighbours};
    use approx::assert_abs_diff_eq;

    fn line(n: usize, spacing: f64) -> (Vec<Vector3<f64>>, TrueNeighbours) {
        let positions: Vec<_> = (0..n)
            .map(|i| Vector3::new(spacing * i as f64, 0.0, 0.0))
            .collect();
        let candidates = find_potential_neighbours(&positions, n - 1);
        let neighbours = find_true_neighbours(&positions, &candidates).unwrap();
        (positions, neighbours)
    }

    #[test]
    fn projected_gradient() {
        let (_, neighbours) = line(2, 1.0);
        let polarity = vec![Vector3::z(); 2];
        let g = gradient_vectors(
            &[1.0, 1.0],
            &polarity,
            &neighbours,
            1e-2,
            GradientMode::Projected,
        );
        assert_abs_diff_eq!(g[0], Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(g[1], Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);

        // The component parallel to the polarity is removed
        let polarity = vec![Vector3::x(); 2];
        let g = gradient_vectors(
            &[1.0, 1.0],
            &polarity,
            &neighbours,
            1e-2,
            GradientMode::Projected,
        );
        assert!(g.iter().all(|g| *g == Vector3::zeros()));
    }

    #[test]
    fn unweighted_projected_gradient_is_not_normalized() {
        let (_, neighbours) = line(2, 1.0);
        let polarity = vec![Vector3::z(); 2];
        let g = gradient_vectors(
            &[0.005, 0.5],
            &polarity,
            &neighbours,
            1e-2,
            GradientMode::Projected,
        );
        assert_abs_diff_eq!(g[0], Vector3::new(-0.005, 0.0, 0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(g[1].norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn distance_weighted_gradient() {
        let (_, neighbours) = line(2, 2.0);
        let polarity = vec![Vector3::z(); 2];
        let g = gradient_vectors(
            &[0.0, 1.0],
            &polarity,
            &neighbours,
            1e-2,
            GradientMode::DistanceWeighted,
        );
        assert_abs_diff_eq!(g[0], Vector3::new(-0.5, 0.0, 0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(g[1], Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);

        let g = gradient_vectors(
            &[1.0, 1.0],
            &polarity,
            &neighbours,
            1e-2,
            GradientMode::DistanceWeighted,
        );
        assert!(g.iter().all(|g| *g == Vector3::zeros()));
    }

    #[test]
    fn averaging_over_neighbours() {
        let (_, neighbours) = line(3, 1.0);
        let mut wnt = vec![1.0, 0.0, 0.0];
        gradient_averaging(&mut wnt, &neighbours, &[0]);
        assert_abs_diff_eq!(wnt[0], 1.0);
        assert_abs_diff_eq!(wnt[1], 1.0 / 3.0);
        assert_abs_diff_eq!(wnt[2], 0.0);
    }

    #[test]
    fn exponential_decay() {
        let mut wnt = vec![1.0, 0.5];
        decay(&mut wnt, 0.1, -2.0);
        assert_abs_diff_eq!(wnt[0], (-0.2f64).exp());
        assert_abs_diff_eq!(wnt[1], 0.5 * (-0.2f64).exp());
    }

    #[test]
    fn beta_follows_wnt() {
        let mut beta = vec![0.3; 3];
        beta_from_wnt(&[0.0, 0.5, 1.0], &mut beta, 2.0);
        assert_abs_diff_eq!(beta[0], 0.0);
        assert_abs_diff_eq!(beta[1], 0.25);
        assert_abs_diff_eq!(beta[2], 1.0);

        let mut beta = vec![0.3; 3];
        beta_from_wnt(&[0.7; 3], &mut beta, 2.0);
        assert_eq!(beta, vec![0.3; 3]);
    }
}
