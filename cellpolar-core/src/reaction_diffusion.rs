use cellpolar_concepts::{BoundaryError, SetupError};
use itertools::iproduct;
use nalgebra::Vector3;
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};

use crate::integrator::DISTANCE_EPSILON;
use crate::neighbours::TrueNeighbours;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters of the ligand-receptor reaction-diffusion model.
///
/// # Parameters & Variables
/// | Symbol | Struct Field | Default | Description |
/// |:---:| --- | --- | --- |
/// | | `bounding_radius_factor` | `2` | Sources lie outside this multiple of the aggregate radius |
/// | $R_0$ | `receptor_init` | `1` | Initial receptor levels are drawn from $2R_0\mathcal{U}(0,1)$ |
/// | $a$ | `a` | `0.8` | Basal receptor production |
/// | $\gamma$ | `gamma` | `0.1` | Reaction rate |
/// | $b$ | `b` | `1` | Ligand production at source gridpoints |
/// | $D$ | `diffusion_ratio` | `100` | Diffusion constant of the ligand |
/// | $n$ | `hill_coefficient` | `8` | Exponent of the Hill function |
/// | $k$ | `hill_k` | `0.55` | Half-saturation of the Hill function |
/// | $N$ | `grid_n` | `100` | Gridpoints per dimension |
/// | $\Delta x$ | `grid_dx` | `0.5` | Grid spacing |
/// | | `ligand_decay` | `true` | Include the decay $-\gamma L$ |
/// | $D_R$ | `receptor_diffusion` | `0` | Exchange of receptor between neighbors |
/// | | `wnt_from_receptor` | `false` | Set $w_i=h(R_i)$ in every step |
/// | $e$ | `beta_from_wnt` | `None` | Set $\beta_i$ from the rescaled morphogen levels |
///
/// The dynamics are given by
/// \\begin{align}
///     \partial_t L &= D\Delta L - \gamma L - \gamma\sum_i \delta_{g_i}R_i^2L + \gamma b\chi_S\\\\
///     \partial_t R_i &= D_R\Delta_{\mathcal{N}} R_i + \gamma\left(a - R_i + h(R_i^2L(g_i))\right)\\\\
///     h(x) &= \frac{x^n}{k^n + x^n}
/// \\end{align}
/// where $g_i$ is the closest gridpoint of cell $i$ and $\chi_S$ indicates the source gridpoints.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ReactionDiffusionSettings {
    /// Sources lie outside this multiple of the aggregate radius
    pub bounding_radius_factor: f64,
    /// Scale of the initial receptor levels
    pub receptor_init: f64,
    /// Basal receptor production
    pub a: f64,
    /// Reaction rate
    pub gamma: f64,
    /// Ligand production at source gridpoints
    pub b: f64,
    /// Diffusion constant of the ligand
    pub diffusion_ratio: f64,
    /// Exponent of the Hill function
    pub hill_coefficient: i32,
    /// Half-saturation of the Hill function
    pub hill_k: f64,
    /// Gridpoints per dimension
    pub grid_n: usize,
    /// Grid spacing
    pub grid_dx: f64,
    /// Include the decay $-\gamma L$
    pub ligand_decay: bool,
    /// Exchange of receptor between neighbors
    pub receptor_diffusion: f64,
    /// Set $w_i=h(R_i)$ in every step
    pub wnt_from_receptor: bool,
    /// Set $\beta_i$ from the rescaled morphogen levels with this exponent
    pub beta_from_wnt: Option<f64>,
}

impl Default for ReactionDiffusionSettings {
    fn default() -> Self {
        Self {
            bounding_radius_factor: 2.0,
            receptor_init: 1.0,
            a: 0.8,
            gamma: 0.1,
            b: 1.0,
            diffusion_ratio: 100.0,
            hill_coefficient: 8,
            hill_k: 0.55,
            grid_n: 100,
            grid_dx: 0.5,
            ligand_decay: true,
            receptor_diffusion: 0.0,
            wnt_from_receptor: false,
            beta_from_wnt: None,
        }
    }
}

impl ReactionDiffusionSettings {
    /// Hill function $h(x)=x^n/(k^n+x^n)$ with the stored parameters
    pub fn hill(&self, x: f64) -> f64 {
        hill(x, self.hill_coefficient, self.hill_k)
    }
}

/// Hill function $h(x)=x^n/(k^n+x^n)$.
///
/// ```
/// # use cellpolar_core::hill;
/// assert_eq!(hill(0.55, 8, 0.55), 0.5);
/// assert_eq!(hill(0.0, 8, 0.55), 0.0);
/// ```
pub fn hill(x: f64, n: i32, k: f64) -> f64 {
    let xn = x.powi(n);
    let denominator = k.powi(n) + xn;
    if denominator == 0.0 {
        0.0
    } else {
        xn / denominator
    }
}

/// Sphere around the aggregate outside of which ligand is produced.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BoundingSphere {
    /// Mean position of all cells
    pub center: Vector3<f64>,
    /// Multiple of the largest distance of any cell to the center
    pub radius: f64,
}

impl BoundingSphere {
    /// Calculates the sphere for the given positions.
    pub fn from_positions(positions: &[Vector3<f64>], factor: f64) -> Self {
        let center = if positions.is_empty() {
            Vector3::zeros()
        } else {
            positions.iter().sum::<Vector3<f64>>() / positions.len() as f64
        };
        let max_distance = positions
            .iter()
            .map(|x| (x - center).norm())
            .fold(0.0, f64::max);
        Self {
            center,
            radius: factor * max_distance,
        }
    }
}

/// Weight of a neighbor in the 27-point stencil by the number of non-zero offsets.
const STENCIL_27_WEIGHTS: [f64; 4] = [-88.0, 6.0, 3.0, 2.0];

/// Ligand concentration on a cubic grid centered at the origin.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReactionDiffusion {
    settings: ReactionDiffusionSettings,
    ligand: Array3<f64>,
    // Ligand padded by one gridpoint on every side
    helper: Array3<f64>,
}

impl ReactionDiffusion {
    /// Creates a grid without any ligand.
    pub fn new(settings: ReactionDiffusionSettings) -> Result<Self, SetupError> {
        if settings.grid_n == 0 {
            return Err(SetupError(
                "Extracellular grid needs at least one gridpoint".to_owned(),
            ));
        }
        if !(settings.grid_dx.is_finite() && settings.grid_dx > 0.0) {
            return Err(SetupError(format!(
                "Grid spacing {} needs to be positive",
                settings.grid_dx
            )));
        }
        let n = settings.grid_n;
        Ok(Self {
            ligand: Array3::zeros((n, n, n)),
            helper: Array3::zeros((n + 2, n + 2, n + 2)),
            settings,
        })
    }

    /// Parameters of the model
    pub fn settings(&self) -> &ReactionDiffusionSettings {
        &self.settings
    }

    /// Ligand concentration $L$
    pub fn ligand(&self) -> &Array3<f64> {
        &self.ligand
    }

    /// Mutable access to the ligand concentration $L$
    pub fn ligand_mut(&mut self) -> &mut Array3<f64> {
        &mut self.ligand
    }

    /// Sum of the ligand concentration over all gridpoints
    pub fn total_mass(&self) -> f64 {
        self.ligand.sum()
    }

    fn offset(&self) -> f64 {
        (self.settings.grid_n as f64 - 1.0) / 2.0
    }

    /// Coordinate $(i - (N-1)/2)\Delta x$ of the gridpoint with index `i` along any axis.
    pub fn grid_coordinate(&self, index: usize) -> f64 {
        (index as f64 - self.offset()) * self.settings.grid_dx
    }

    /// Maps every position to the index of its closest gridpoint.
    ///
    /// Fails if any coordinate lies outside of $\pm\Delta x(N-1)/2$.
    pub fn closest_gridpoints(
        &self,
        positions: &[Vector3<f64>],
    ) -> Result<Vec<[usize; 3]>, BoundaryError> {
        let dx = self.settings.grid_dx;
        let offset = self.offset();
        let half_width = dx * offset;
        let max_index = self.settings.grid_n - 1;
        positions
            .iter()
            .enumerate()
            .map(|(i, x)| {
                if x.iter().any(|c| !(c.abs() <= half_width)) {
                    return Err(BoundaryError(format!(
                        "Cell {i} at position {:?} lies outside of the grid [{}, {}]^3",
                        [x.x, x.y, x.z],
                        -half_width,
                        half_width
                    )));
                }
                let index = |c: f64| ((c / dx + offset).round() as usize).min(max_index);
                Ok([index(x.x), index(x.y), index(x.z)])
            })
            .collect()
    }

    /// Gridpoints which lie outside of the [BoundingSphere] of the given positions.
    pub fn source_gridpoints(&self, positions: &[Vector3<f64>]) -> Vec<[usize; 3]> {
        let sphere = BoundingSphere::from_positions(positions, self.settings.bounding_radius_factor);
        let n = self.settings.grid_n;
        iproduct!(0..n, 0..n, 0..n)
            .filter(|(i, j, k)| {
                let coordinate = Vector3::new(
                    self.grid_coordinate(*i),
                    self.grid_coordinate(*j),
                    self.grid_coordinate(*k),
                );
                (coordinate - sphere.center).norm() > sphere.radius
            })
            .map(|(i, j, k)| [i, j, k])
            .collect()
    }

    /// Copies the ligand into the helper array and replicates the outermost gridpoints into its
    /// padding.
    fn fill_helper(&mut self) {
        self.helper
            .slice_mut(s![1..-1, 1..-1, 1..-1])
            .assign(&self.ligand);
        // Axes are padded one after another such that edges and corners are filled as well
        const BORDERS: [(isize, isize); 2] = [(0, 1), (-1, -2)];
        for (dst, src) in BORDERS {
            let (mut target, source) = self
                .helper
                .multi_slice_mut((s![dst, .., ..], s![src, .., ..]));
            target.assign(&source);
        }
        for (dst, src) in BORDERS {
            let (mut target, source) = self
                .helper
                .multi_slice_mut((s![.., dst, ..], s![.., src, ..]));
            target.assign(&source);
        }
        for (dst, src) in BORDERS {
            let (mut target, source) = self
                .helper
                .multi_slice_mut((s![.., .., dst], s![.., .., src]));
            target.assign(&source);
        }
    }

    fn apply_stencil(&mut self, weight: impl Fn(usize) -> f64) -> Array3<f64> {
        self.fill_helper();
        let n = self.settings.grid_n;
        let mut laplacian = Array3::zeros((n, n, n));
        for (o0, o1, o2) in iproduct!(0..3, 0..3, 0..3) {
            let non_zero = [o0, o1, o2].iter().filter(|o| **o != 1).count();
            let w = weight(non_zero);
            if w != 0.0 {
                laplacian.scaled_add(
                    w,
                    &self
                        .helper
                        .slice(s![o0..o0 + n, o1..o1 + n, o2..o2 + n]),
                );
            }
        }
        laplacian
    }

    /// 7-point Laplacian $\Delta L$ with replicating boundary conditions.
    pub fn laplacian_7_point(&mut self) -> Array3<f64> {
        let dx2 = self.settings.grid_dx.powi(2);
        self.apply_stencil(|non_zero| match non_zero {
            0 => -6.0 / dx2,
            1 => 1.0 / dx2,
            _ => 0.0,
        })
    }

    /// Isotropic 27-point Laplacian $\Delta L$ with replicating boundary conditions.
    ///
    /// The stencil in units of $1/(26\Delta x^2)$ is
    /// \\begin{equation}
    ///     \begin{bmatrix}2&3&2\\\\3&6&3\\\\2&3&2\end{bmatrix},
    ///     \begin{bmatrix}3&6&3\\\\6&-88&6\\\\3&6&3\end{bmatrix},
    ///     \begin{bmatrix}2&3&2\\\\3&6&3\\\\2&3&2\end{bmatrix}.
    /// \\end{equation}
    pub fn laplacian_27_point(&mut self) -> Array3<f64> {
        let norm = 26.0 * self.settings.grid_dx.powi(2);
        self.apply_stencil(|non_zero| STENCIL_27_WEIGHTS[non_zero] / norm)
    }

    /// Advances ligand and receptor levels by one explicit Euler step.
    ///
    /// Consumption of cells which share a gridpoint accumulates.
    /// Receptor exchange between neighbors is only calculated when `receptor_diffusion` is
    /// non-zero and neighbors are given.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    pub fn reaction_diffusion_dynamics(
        &mut self,
        positions: &[Vector3<f64>],
        receptor: &mut [f64],
        neighbours: Option<&TrueNeighbours>,
        dt: f64,
    ) -> Result<(), BoundaryError> {
        let gridpoints = self.closest_gridpoints(positions)?;
        let sources = self.source_gridpoints(positions);
        let ReactionDiffusionSettings {
            gamma,
            a,
            b,
            diffusion_ratio,
            ligand_decay,
            receptor_diffusion,
            ..
        } = self.settings;

        let mut d_ligand = self.laplacian_27_point() * (dt * diffusion_ratio);
        if ligand_decay {
            d_ligand.scaled_add(-dt * gamma, &self.ligand);
        }
        for (g, r) in gridpoints.iter().zip(receptor.iter()) {
            d_ligand[*g] -= dt * gamma * r * r * self.ligand[*g];
        }
        for g in sources.iter() {
            d_ligand[*g] += dt * gamma * b;
        }

        let receptor_laplacian = match neighbours {
            Some(neighbours) if receptor_diffusion != 0.0 => {
                Some(laplacian_receptor(receptor, neighbours))
            }
            _ => None,
        };
        let d_receptor: Vec<f64> = gridpoints
            .iter()
            .zip(receptor.iter())
            .enumerate()
            .map(|(i, (g, r))| {
                let exchange = receptor_laplacian
                    .as_ref()
                    .map_or(0.0, |lap| receptor_diffusion * lap[i]);
                let bound = self.settings.hill(r * r * self.ligand[*g]);
                dt * (exchange + gamma * (a - r + bound))
            })
            .collect();

        self.ligand += &d_ligand;
        receptor
            .iter_mut()
            .zip(d_receptor)
            .for_each(|(r, dr)| *r += dr);
        Ok(())
    }
}

/// Graph Laplacian of the receptor levels over true neighbors
/// \\begin{equation}
///     \Delta_{\mathcal{N}} R_i = \frac{4}{c_i}\sum_{j\in\mathcal{N}(i)}
///         \frac{R_j - R_i}{|x_i - x_j|^2}
/// \\end{equation}
/// which vanishes for cells without neighbors.
pub fn laplacian_receptor(receptor: &[f64], neighbours: &TrueNeighbours) -> Vec<f64> {
    (0..receptor.len())
        .map(|i| {
            let c = neighbours.count(i);
            if c == 0 {
                return 0.0;
            }
            let sum: f64 = neighbours
                .of(i)
                .filter_map(|(slot, j)| {
                    let d = neighbours.distances[(i, slot)];
                    (d >= DISTANCE_EPSILON).then(|| (receptor[j] - receptor[i]) / (d * d))
                })
                .sum();
            4.0 * sum / c as f64
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::neighbours::{find_potential_neighbours, find_true_neighbours};
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn small_grid(n: usize, dx: f64) -> ReactionDiffusion {
        ReactionDiffusion::new(ReactionDiffusionSettings {
            grid_n: n,
            grid_dx: dx,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn constant_field_has_zero_laplacian() {
        let mut rd = small_grid(6, 0.5);
        rd.ligand_mut().fill(3.0);
        assert!(rd.laplacian_27_point().iter().all(|v| v.abs() < 1e-12));
        assert!(rd.laplacian_7_point().iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn quadratic_field_interior() {
        let mut rd = small_grid(7, 0.5);
        let field = Array3::from_shape_fn((7, 7, 7), |(i, _, _)| rd.grid_coordinate(i).powi(2));
        rd.ligand_mut().assign(&field);
        let lap27 = rd.laplacian_27_point();
        let lap7 = rd.laplacian_7_point();
        for (i, j, k) in iproduct!(1..6, 1..6, 1..6) {
            assert_abs_diff_eq!(lap27[(i, j, k)], 2.0, epsilon = 1e-10);
            assert_abs_diff_eq!(lap7[(i, j, k)], 2.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn diffusion_conserves_mass() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut rd = ReactionDiffusion::new(ReactionDiffusionSettings {
            grid_n: 8,
            grid_dx: 1.0,
            gamma: 0.0,
            diffusion_ratio: 1.0,
            ..Default::default()
        })
        .unwrap();
        let field = Array3::from_shape_fn((8, 8, 8), |_| rng.gen_range(0.0..1.0));
        rd.ligand_mut().assign(&field);
        let mass = rd.total_mass();
        let positions = vec![Vector3::zeros()];
        let mut receptor = vec![1.0];
        for _ in 0..10 {
            rd.reaction_diffusion_dynamics(&positions, &mut receptor, None, 0.1)
                .unwrap();
        }
        assert_abs_diff_eq!(rd.total_mass(), mass, epsilon = 1e-9);
        assert_eq!(receptor, vec![1.0]);
    }

    #[test]
    fn gridpoints_are_idempotent() {
        let rd = small_grid(10, 0.5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let positions: Vec<_> = (0..50)
            .map(|_| Vector3::from_fn(|_, _| rng.gen_range(-2.2..2.2)))
            .collect();
        let gridpoints = rd.closest_gridpoints(&positions).unwrap();
        let snapped: Vec<_> = gridpoints
            .iter()
            .map(|g| {
                Vector3::new(
                    rd.grid_coordinate(g[0]),
                    rd.grid_coordinate(g[1]),
                    rd.grid_coordinate(g[2]),
                )
            })
            .collect();
        assert_eq!(rd.closest_gridpoints(&snapped).unwrap(), gridpoints);
        for (x, s) in positions.iter().zip(snapped.iter()) {
            assert!((x - s).amax() <= 0.25 + 1e-12);
        }
    }

    #[test]
    fn outside_grid_is_an_error() {
        let rd = small_grid(10, 0.5);
        assert!(rd
            .closest_gridpoints(&[Vector3::new(0.0, 2.3, 0.0)])
            .is_err());
        assert!(rd
            .closest_gridpoints(&[Vector3::new(f64::NAN, 0.0, 0.0)])
            .is_err());
        assert_eq!(
            rd.closest_gridpoints(&[Vector3::new(-2.25, 2.25, 0.1)])
                .unwrap(),
            vec![[0, 9, 5]]
        );
    }

    #[test]
    fn sources_lie_outside_sphere() {
        let rd = small_grid(12, 0.5);
        let positions = vec![Vector3::new(0.3, 0.0, 0.0), Vector3::new(-0.3, 0.2, 0.0)];
        let sphere = BoundingSphere::from_positions(&positions, 2.0);
        let sources = rd.source_gridpoints(&positions);
        assert!(!sources.is_empty());
        assert!(sources.len() < 12usize.pow(3));
        for g in sources {
            let x = Vector3::new(
                rd.grid_coordinate(g[0]),
                rd.grid_coordinate(g[1]),
                rd.grid_coordinate(g[2]),
            );
            assert!((x - sphere.center).norm() > sphere.radius);
        }
    }

    #[test]
    fn receptor_exchange() {
        let positions = vec![Vector3::zeros(), Vector3::new(2.0, 0.0, 0.0)];
        let candidates = find_potential_neighbours(&positions, 1);
        let neighbours = find_true_neighbours(&positions, &candidates).unwrap();
        let lap = laplacian_receptor(&[1.0, 3.0], &neighbours);
        assert_abs_diff_eq!(lap[0], 2.0);
        assert_abs_diff_eq!(lap[1], -2.0);
    }

    #[test]
    fn consumption_accumulates() {
        let mut rd = ReactionDiffusion::new(ReactionDiffusionSettings {
            grid_n: 5,
            grid_dx: 1.0,
            diffusion_ratio: 0.0,
            ligand_decay: false,
            bounding_radius_factor: 1e3,
            ..Default::default()
        })
        .unwrap();
        rd.ligand_mut().fill(1.0);
        let positions = vec![Vector3::zeros(), Vector3::new(0.1, 0.0, 0.0)];
        let mut receptor = vec![1.0, 2.0];
        rd.reaction_diffusion_dynamics(&positions, &mut receptor, None, 0.1)
            .unwrap();
        let gamma = rd.settings().gamma;
        assert_abs_diff_eq!(rd.ligand()[(2, 2, 2)], 1.0 - 0.1 * gamma * 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rd.ligand()[(0, 0, 0)], 1.0);
    }
}
