use cellpolar_concepts::{IndexError, SetupError};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Handle of a single cell inside a [CellState].
///
/// Cells are never removed such that a handle stays valid for the whole simulation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct CellIndex(pub usize);

/// Lengths below this value are treated as zero when normalizing vectors.
pub const NORM_EPSILON: f64 = 1e-10;

/// Initial potential weights of the cells.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Lambda {
    /// Every cell obtains the same weights
    Shared(Vec<f64>),
    /// Individual weights for every cell
    PerCell(Vec<Vec<f64>>),
}

/// Potential weights of all cells stored row-by-row in one contiguous buffer.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Lambdas {
    values: Vec<f64>,
    width: usize,
    n_cells: usize,
}

impl Lambdas {
    fn from_lambda(lambda: Lambda, n_cells: usize) -> Result<Self, SetupError> {
        match lambda {
            Lambda::Shared(row) => Ok(Self {
                width: row.len(),
                values: (0..n_cells).flat_map(|_| row.iter().copied()).collect(),
                n_cells,
            }),
            Lambda::PerCell(rows) => {
                if rows.len() != n_cells {
                    return Err(SetupError(format!(
                        "Got {} rows of lambda weights for {} cells",
                        rows.len(),
                        n_cells
                    )));
                }
                let width = rows.first().map_or(0, |r| r.len());
                if let Some(row) = rows.iter().find(|r| r.len() != width) {
                    return Err(SetupError(format!(
                        "All rows of lambda weights need to have length {} but found length {}",
                        width,
                        row.len()
                    )));
                }
                Ok(Self {
                    values: rows.into_iter().flatten().collect(),
                    width,
                    n_cells,
                })
            }
        }
    }

    /// Number of weights per cell
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.n_cells
    }

    /// Returns `true` if no cells are stored
    pub fn is_empty(&self) -> bool {
        self.n_cells == 0
    }

    /// Weights of cell `i`.
    ///
    /// # Panics
    /// If `i` is out of bounds.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.width..(i + 1) * self.width]
    }

    /// Iterates over the weights of all cells
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_cells).map(|i| self.row(i))
    }

    /// Copies the weights into one vector per cell
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(|r| r.to_vec()).collect()
    }

    fn duplicate(&mut self, i: usize) {
        self.values.extend_from_within(i * self.width..(i + 1) * self.width);
        self.n_cells += 1;
    }
}

/// Owns all per-cell quantities.
///
/// All arrays have the same length at all times.
/// When cells divide, every array grows by pushing the daughter's values to the end such that
/// the backing storage is over-allocated geometrically.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CellState {
    pub(crate) positions: Vec<Vector3<f64>>,
    pub(crate) polarity: Vec<Vector3<f64>>,
    pub(crate) pcp: Vec<Vector3<f64>>,
    pub(crate) lambda: Lambdas,
    pub(crate) beta: Vec<f64>,
    pub(crate) wnt: Option<Vec<f64>>,
    pub(crate) receptor: Option<Vec<f64>>,
}

impl CellState {
    /// Checks all initial values for consistency and constructs a new [CellState].
    ///
    /// ```
    /// # use cellpolar_core::{CellState, Lambda};
    /// # use nalgebra::Vector3;
    /// let cells = CellState::new(
    ///     vec![Vector3::zeros(), Vector3::x()],
    ///     vec![Vector3::z(); 2],
    ///     vec![Vector3::y(); 2],
    ///     Lambda::Shared(vec![0.0, 1.0, 0.0, 0.0]),
    ///     vec![0.1; 2],
    /// )?;
    /// assert_eq!(cells.len(), 2);
    /// assert_eq!(cells.lambda().row(1), &[0.0, 1.0, 0.0, 0.0]);
    /// # Ok::<(), cellpolar_concepts::SetupError>(())
    /// ```
    pub fn new(
        positions: Vec<Vector3<f64>>,
        polarity: Vec<Vector3<f64>>,
        pcp: Vec<Vector3<f64>>,
        lambda: Lambda,
        beta: Vec<f64>,
    ) -> Result<Self, SetupError> {
        let n_cells = positions.len();
        if n_cells == 0 {
            return Err(SetupError("Cannot simulate without any cells".to_owned()));
        }
        for (name, len) in [
            ("polarity", polarity.len()),
            ("pcp", pcp.len()),
            ("beta", beta.len()),
        ] {
            if len != n_cells {
                return Err(SetupError(format!(
                    "Length of {name} ({len}) does not match number of positions ({n_cells})"
                )));
            }
        }
        let all_finite = positions
            .iter()
            .chain(polarity.iter())
            .chain(pcp.iter())
            .all(|v| v.iter().all(|x| x.is_finite()));
        if !all_finite {
            return Err(SetupError(
                "Initial positions and orientations need to be finite".to_owned(),
            ));
        }
        if let Some((name, i)) = polarity
            .iter()
            .enumerate()
            .map(|(i, p)| ("polarity", i, p))
            .chain(pcp.iter().enumerate().map(|(i, q)| ("pcp", i, q)))
            .find_map(|(name, i, v)| (v.norm() <= NORM_EPSILON).then_some((name, i)))
        {
            return Err(SetupError(format!(
                "Initial {name} of cell {i} has vanishing length and cannot be normalized"
            )));
        }
        if beta.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(SetupError(
                "Division rates need to be finite and non-negative".to_owned(),
            ));
        }
        let lambda = Lambdas::from_lambda(lambda, n_cells)?;
        Ok(Self {
            positions,
            polarity,
            pcp,
            lambda,
            beta,
            wnt: None,
            receptor: None,
        })
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if there are no cells
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions $x_i$
    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    /// Mutable access to the positions $x_i$
    pub fn positions_mut(&mut self) -> &mut [Vector3<f64>] {
        &mut self.positions
    }

    /// Apical-basal polarities $p_i$
    pub fn polarity(&self) -> &[Vector3<f64>] {
        &self.polarity
    }

    /// Mutable access to the polarities $p_i$
    pub fn polarity_mut(&mut self) -> &mut [Vector3<f64>] {
        &mut self.polarity
    }

    /// Planar cell polarities $q_i$
    pub fn pcp(&self) -> &[Vector3<f64>] {
        &self.pcp
    }

    /// Mutable access to the planar cell polarities $q_i$
    pub fn pcp_mut(&mut self) -> &mut [Vector3<f64>] {
        &mut self.pcp
    }

    /// Potential weights $\lambda_i$
    pub fn lambda(&self) -> &Lambdas {
        &self.lambda
    }

    /// Division rates $\beta_i$
    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Mutable access to the division rates $\beta_i$
    pub fn beta_mut(&mut self) -> &mut [f64] {
        &mut self.beta
    }

    /// Morphogen levels $w_i$ if the morphogen is simulated
    pub fn wnt(&self) -> Option<&[f64]> {
        self.wnt.as_deref()
    }

    /// Mutable access to the morphogen levels $w_i$
    pub fn wnt_mut(&mut self) -> Option<&mut [f64]> {
        self.wnt.as_deref_mut()
    }

    /// Receptor levels $R_i$ if reaction-diffusion is simulated
    pub fn receptor(&self) -> Option<&[f64]> {
        self.receptor.as_deref()
    }

    /// Mutable access to the receptor levels $R_i$
    pub fn receptor_mut(&mut self) -> Option<&mut [f64]> {
        self.receptor.as_deref_mut()
    }

    /// Initializes the morphogen with $w=1$ at the source cells and $w=0$ elsewhere.
    pub(crate) fn enable_wnt(&mut self, source_cells: &[usize]) -> Result<(), SetupError> {
        let mut wnt = vec![0.0; self.len()];
        for &c in source_cells {
            *wnt.get_mut(c).ok_or(SetupError(format!(
                "Morphogen source cell {c} does not exist in a population of {} cells",
                self.len()
            )))? = 1.0;
        }
        self.wnt = Some(wnt);
        Ok(())
    }

    pub(crate) fn enable_receptor(&mut self, receptor: Vec<f64>) -> Result<(), SetupError> {
        if receptor.len() != self.len() {
            return Err(SetupError(format!(
                "Got {} receptor levels for {} cells",
                receptor.len(),
                self.len()
            )));
        }
        self.receptor = Some(receptor);
        Ok(())
    }

    /// Normalizes polarity and planar cell polarity to unit length.
    ///
    /// Vectors shorter than [NORM_EPSILON] cannot be normalized and are replaced by `fallback`.
    pub(crate) fn normalize_orientations(
        &mut self,
        fallback_polarity: &[Vector3<f64>],
        fallback_pcp: &[Vector3<f64>],
    ) {
        normalize_all(&mut self.polarity, fallback_polarity);
        normalize_all(&mut self.pcp, fallback_pcp);
    }

    /// Divides cell `parent` along `direction`.
    ///
    /// The parent is moved to $x - m/2$ and the daughter is placed at $x + m/2$.
    /// Morphogen and receptor levels are split evenly while the division rate of both cells is
    /// multiplied by `beta_decay`.
    pub(crate) fn split(
        &mut self,
        parent: CellIndex,
        direction: Vector3<f64>,
        beta_decay: f64,
    ) -> Result<CellIndex, IndexError> {
        let i = parent.0;
        let x = *self.positions.get(i).ok_or(IndexError(format!(
            "Cannot divide cell {i} in a population of {} cells",
            self.len()
        )))?;
        self.positions[i] = x - direction / 2.0;
        self.positions.push(x + direction / 2.0);
        self.polarity.push(self.polarity[i]);
        self.pcp.push(self.pcp[i]);
        self.lambda.duplicate(i);
        self.beta[i] *= beta_decay;
        self.beta.push(self.beta[i]);
        for values in [self.wnt.as_mut(), self.receptor.as_mut()]
            .into_iter()
            .flatten()
        {
            values[i] /= 2.0;
            values.push(values[i]);
        }
        debug_assert!(self.is_consistent());
        Ok(CellIndex(self.len() - 1))
    }

    /// Checks that all per-cell arrays have the same length.
    pub fn is_consistent(&self) -> bool {
        let n = self.len();
        self.polarity.len() == n
            && self.pcp.len() == n
            && self.lambda.len() == n
            && self.beta.len() == n
            && self.wnt.as_ref().map_or(true, |w| w.len() == n)
            && self.receptor.as_ref().map_or(true, |r| r.len() == n)
    }
}

fn normalize_all(vectors: &mut [Vector3<f64>], fallback: &[Vector3<f64>]) {
    for (i, v) in vectors.iter_mut().enumerate() {
        let norm = v.norm();
        if norm > NORM_EPSILON && norm.is_finite() {
            *v /= norm;
        } else if let Some(f) = fallback.get(i) {
            *v = *f;
        }
    }
}
