use crate::scalar::{Scalar, Vec3};

/// Everything a [Potential] may depend on for the pair of cells $i$ and $j$.
///
/// All vector quantities are given in the [Scalar] type `S` such that a potential written once
/// can be evaluated with plain floats or differentiated automatically.
/// The unit displacement points from $j$ to $i$, i.e.
/// $\hat{r}_{ij} = (x_i - x_j)/|x_i - x_j|$.
#[derive(Clone, Debug)]
pub struct PairContext<'a, S> {
    /// Position $x_i$ of the own cell
    pub position: Vec3<S>,
    /// Distance $d_{ij}$ between both cells
    pub distance: S,
    /// Unit displacement $\hat{r}_{ij}$
    pub direction: Vec3<S>,
    /// Potential weights $\lambda_i$ of the own cell
    pub lambda_i: &'a [f64],
    /// Potential weights $\lambda_j$ of the neighbor
    pub lambda_j: &'a [f64],
    /// Apical-basal polarity $p_i$
    pub polarity_i: Vec3<S>,
    /// Apical-basal polarity $p_j$
    pub polarity_j: Vec3<S>,
    /// Planar cell polarity $q_i$
    pub pcp_i: Vec3<S>,
    /// Planar cell polarity $q_j$
    pub pcp_j: Vec3<S>,
    /// Morphogen gradient $G_i$ at the own cell.
    /// Identically zero when no morphogen is simulated.
    pub gradient: Vec3<S>,
}

/// Pairwise potential $V_{ij}$ between two neighboring cells.
///
/// The total potential of the aggregate is
/// \\begin{equation}
///     V = \sum_i\sum_{j\in\mathcal{N}(i)} V_{ij}
/// \\end{equation}
/// where $\mathcal{N}(i)$ are the true neighbors of cell $i$.
/// Implementors must only use operations provided by [Scalar] such that the gradient of $V$ with
/// respect to positions, polarities and planar polarities can be obtained by evaluating with
/// [Dual](crate::Dual) numbers.
pub trait Potential {
    /// Calculates $V_{ij}$ for the given pair.
    fn eval<S: Scalar>(&self, ctx: &PairContext<S>) -> S;
}

impl<P> Potential for &P
where
    P: Potential + ?Sized,
{
    fn eval<S: Scalar>(&self, ctx: &PairContext<S>) -> S {
        (**self).eval(ctx)
    }
}
