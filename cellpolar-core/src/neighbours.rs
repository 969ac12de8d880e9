use cellpolar_concepts::IndexError;
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::Vector3;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// The `k` nearest other cells of every cell together with their distances.
///
/// Row `i` is sorted by increasing distance and never contains `i` itself.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CandidateNeighbours {
    /// Indices of shape `[N, k]`
    pub indices: Array2<usize>,
    /// Euclidean distances of shape `[N, k]`
    pub distances: Array2<f64>,
}

impl CandidateNeighbours {
    /// Number of candidates per cell
    pub fn k(&self) -> usize {
        self.indices.ncols()
    }

    /// Number of cells for which candidates were computed
    pub fn n_cells(&self) -> usize {
        self.indices.nrows()
    }
}

/// Candidates which are not shadowed by any other candidate.
///
/// Within every row the true neighbors come first.
/// All rows share the same width $m=\min(\max_i|\mathcal{N}(i)|, k)$ such that
/// some rows contain trailing entries with `mask == false`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TrueNeighbours {
    /// `true` if the entry is a true neighbor
    pub mask: Array2<bool>,
    /// Displacements $x_i - x_j$
    pub displacement: Array2<Vector3<f64>>,
    /// Index $j$ of the neighbor
    pub indices: Array2<usize>,
    /// Distances $|x_i - x_j|$
    pub distances: Array2<f64>,
}

impl TrueNeighbours {
    /// Shared width $m$ of all rows
    pub fn width(&self) -> usize {
        self.mask.ncols()
    }

    /// Number of true neighbors $c_i$ of cell `i`
    pub fn count(&self, i: usize) -> usize {
        self.mask.row(i).iter().filter(|m| **m).count()
    }

    /// Largest number of true neighbors of any cell
    pub fn max_count(&self) -> usize {
        (0..self.mask.nrows())
            .map(|i| self.count(i))
            .max()
            .unwrap_or(0)
    }

    /// Iterates over all `(slot, j)` pairs which are true neighbors of cell `i`.
    pub fn of(&self, i: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.mask
            .row(i)
            .into_iter()
            .zip(self.indices.row(i))
            .enumerate()
            .filter_map(|(slot, (m, j))| m.then_some((slot, *j)))
    }
}

/// Finds the `k` nearest other cells of every cell with a freshly built static k-d tree.
///
/// `k` is clamped to $N-1$ such that every row is empty for a single cell.
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub fn find_potential_neighbours(positions: &[Vector3<f64>], k: usize) -> CandidateNeighbours {
    let n_cells = positions.len();
    let k = k.min(n_cells.saturating_sub(1));
    if n_cells == 0 {
        return CandidateNeighbours {
            indices: Array2::zeros((0, 0)),
            distances: Array2::zeros((0, 0)),
        };
    }
    // Items are the indices into this slice
    let points: Vec<[f64; 3]> = positions.iter().map(|x| [x.x, x.y, x.z]).collect();
    let tree: ImmutableKdTree<f64, 3> = ImmutableKdTree::new_from_slice(&points);
    let rows: Vec<Vec<(usize, f64)>> = positions
        .par_iter()
        .enumerate()
        .map(|(i, x)| {
            let mut row: Vec<(usize, f64)> = tree
                .nearest_n::<SquaredEuclidean>(&[x.x, x.y, x.z], std::num::NonZero::new(k + 1).unwrap())
                .into_iter()
                .map(|nn| (nn.item as usize, nn.distance.sqrt()))
                .filter(|(j, _)| *j != i)
                .collect();
            row.sort_by(|a, b| a.1.total_cmp(&b.1));
            row.truncate(k);
            row
        })
        .collect();
    CandidateNeighbours {
        indices: Array2::from_shape_fn((n_cells, k), |(i, s)| rows[i][s].0),
        distances: Array2::from_shape_fn((n_cells, k), |(i, s)| rows[i][s].1),
    }
}

/// A candidate $j$ of cell $i$ is a true neighbor if no other candidate $l$ lies within the
/// sphere which has the connection $x_i - x_j$ as its diameter:
/// \\begin{equation}
///     \left|\frac{\Delta x_{ij}}{2} - \Delta x_{il}\right|^2 \geq \frac{|\Delta x_{ij}|^2}{4}
///     \hspace{1em}\forall l\neq j.
/// \\end{equation}
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub fn find_true_neighbours(
    positions: &[Vector3<f64>],
    candidates: &CandidateNeighbours,
) -> Result<TrueNeighbours, IndexError> {
    let n_cells = positions.len();
    if candidates.n_cells() != n_cells {
        return Err(IndexError(format!(
            "Candidates were computed for {} cells but {} cells are present",
            candidates.n_cells(),
            n_cells
        )));
    }
    if let Some(j) = candidates.indices.iter().find(|j| **j >= n_cells) {
        return Err(IndexError(format!(
            "Candidate neighbor {j} does not exist in a population of {n_cells} cells"
        )));
    }
    let k = candidates.k();

    let rows: Vec<Vec<(bool, Vector3<f64>, usize)>> = (0..n_cells)
        .into_par_iter()
        .map(|i| {
            let dx: Vec<Vector3<f64>> = candidates
                .indices
                .row(i)
                .iter()
                .map(|j| positions[i] - positions[*j])
                .collect();
            let mut row: Vec<(bool, Vector3<f64>, usize)> = (0..k)
                .map(|s| {
                    let quarter = dx[s].norm_squared() / 4.0;
                    let unshadowed = (0..k)
                        .filter(|l| *l != s)
                        .all(|l| (dx[s] / 2.0 - dx[l]).norm_squared() >= quarter);
                    (unshadowed, dx[s], candidates.indices[(i, s)])
                })
                .collect();
            // Stable such that true neighbors remain sorted by distance
            row.sort_by_key(|(m, _, _)| !m);
            row
        })
        .collect();

    let m = rows
        .iter()
        .map(|row| row.iter().filter(|(mask, _, _)| *mask).count())
        .max()
        .unwrap_or(0)
        .min(k);
    let displacement = Array2::from_shape_fn((n_cells, m), |(i, s)| rows[i][s].1);
    Ok(TrueNeighbours {
        mask: Array2::from_shape_fn((n_cells, m), |(i, s)| rows[i][s].0),
        distances: displacement.map(|d| d.norm()),
        indices: Array2::from_shape_fn((n_cells, m), |(i, s)| rows[i][s].2),
        displacement,
    })
}

/// Adapts the number of candidate neighbors to the observed number of true neighbors.
///
/// Returns the new `k` together with the number of steps `n_update` after which the candidates
/// are recomputed.
///
/// | Condition | New `k` |
/// | --- | --- |
/// | `true_neighbour_max/k < 0.25` | $\lfloor 0.75k\rfloor$ |
/// | `true_neighbour_max/k > 0.75` | $\lfloor 1.5k\rfloor$ |
/// | otherwise | $k$ |
///
/// Afterwards `k` is clamped to $[1, N-1]$.
/// For the first 50 steps `n_update` is 1, afterwards it is
/// $\max(1, \lfloor 20\tanh(t/200)\rfloor)$.
pub fn adapt_neighbour_count(
    k: usize,
    true_neighbour_max: usize,
    tstep: u64,
    n_cells: usize,
) -> (usize, u64) {
    let fraction = true_neighbour_max as f64 / k.max(1) as f64;
    let k = if fraction < 0.25 {
        (0.75 * k as f64) as usize
    } else if fraction > 0.75 {
        (1.5 * k as f64) as usize
    } else {
        k
    };
    let k = k.min(n_cells.saturating_sub(1)).max(1);
    let n_update = if tstep < 50 {
        1
    } else {
        ((20.0 * (tstep as f64 / 200.0).tanh()) as u64).max(1)
    };
    (k, n_update)
}

/// Keeps the candidate neighbors together with the adaptive parameters `k` and `n_update`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NeighborIndex {
    k: usize,
    n_update: u64,
    true_neighbour_max: usize,
    candidates: Option<CandidateNeighbours>,
}

impl NeighborIndex {
    /// Starts with `k = init_k` and assumes that half of the candidates are true neighbors.
    pub fn new(init_k: usize) -> Self {
        Self {
            k: init_k,
            n_update: 1,
            true_neighbour_max: init_k / 2,
            candidates: None,
        }
    }

    /// Current number of candidates per cell
    pub fn k(&self) -> usize {
        self.k
    }

    /// Current refresh interval
    pub fn n_update(&self) -> u64 {
        self.n_update
    }

    /// Largest number of true neighbors found in the last step
    pub fn true_neighbour_max(&self) -> usize {
        self.true_neighbour_max
    }

    /// Most recently computed candidates
    pub fn candidates(&self) -> Option<&CandidateNeighbours> {
        self.candidates.as_ref()
    }

    /// Applies [adapt_neighbour_count] to the stored values.
    pub fn update_k(&mut self, tstep: u64, n_cells: usize) {
        let (k, n_update) = adapt_neighbour_count(self.k, self.true_neighbour_max, tstep, n_cells);
        #[cfg(feature = "tracing")]
        if k != self.k {
            tracing::trace!(old = self.k, new = k, n_update, "adapted neighbor count");
        }
        self.k = k;
        self.n_update = n_update;
    }

    /// Recomputes the candidates after a division, every `n_update` steps or when none exist.
    ///
    /// Returns `true` if the candidates were rebuilt.
    pub fn refresh_if_needed(
        &mut self,
        positions: &[Vector3<f64>],
        divided: bool,
        tstep: u64,
    ) -> bool {
        let stale = self
            .candidates
            .as_ref()
            .map_or(true, |c| c.n_cells() != positions.len());
        if divided || stale || tstep % self.n_update == 0 {
            #[cfg(feature = "tracing")]
            tracing::trace!(k = self.k, n_cells = positions.len(), "refreshing candidates");
            self.candidates = Some(find_potential_neighbours(positions, self.k));
            true
        } else {
            false
        }
    }

    /// Filters the current candidates and records the largest true neighbor count.
    pub fn true_neighbours(
        &mut self,
        positions: &[Vector3<f64>],
    ) -> Result<TrueNeighbours, IndexError> {
        let candidates = self.candidates.as_ref().ok_or(IndexError(
            "Candidate neighbors were not computed before filtering".to_owned(),
        ))?;
        let neighbours = find_true_neighbours(positions, candidates)?;
        self.true_neighbour_max = neighbours.max_count();
        Ok(neighbours)
    }
}
