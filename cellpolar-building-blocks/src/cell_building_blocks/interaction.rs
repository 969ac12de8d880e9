use cellpolar_concepts::*;

use serde::{Deserialize, Serialize};

/// Purely repulsive potential which ignores all polarities.
///
/// # Parameters & Variables
/// | Symbol | Struct Field | Description |
/// |:---:| --- | --- |
/// | $V_0$ | `strength` | Interaction strength |
/// | $\ell$ | `length` | Decay length of the repulsion |
/// | | | |
/// | $r$ | | Distance between interacting cells |
///
/// \\begin{equation}
///     V(r) = V_0 e^{-r/\ell}
/// \\end{equation}
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExponentialRepulsion {
    /// Interaction strength
    pub strength: f64,
    /// Decay length of the repulsion
    pub length: f64,
}

impl Default for ExponentialRepulsion {
    fn default() -> Self {
        Self {
            strength: 1.0,
            length: 1.0,
        }
    }
}

impl Potential for ExponentialRepulsion {
    fn eval<S: Scalar>(&self, ctx: &PairContext<S>) -> S {
        (ctx.distance / -self.length).exp() * self.strength
    }
}

/// Polarity potential of the form
/// \\begin{align}
///     V_{ij} &= e^{-r/\ell_r} - S e^{-r/\ell_a}\\\\
///     S &= \lambda_0 + \lambda_1 S_1 + \lambda_2 S_2 + \lambda_3 S_3 + \lambda_4 S_4
/// \\end{align}
/// with the polarity terms
/// \\begin{align}
///     S_1 &= (p_i\times\hat{r})\cdot(p_j\times\hat{r})\\\\
///     S_2 &= (p_i\times q_i)\cdot(p_j\times q_j)\\\\
///     S_3 &= (q_i\times\hat{r})\cdot(q_j\times\hat{r})\\\\
///     S_4 &= (q_i\cdot G_i)(q_j\cdot G_i).
/// \\end{align}
/// The weights $\lambda_k$ are the mean of both cells' weights.
/// Missing entries count as zero, such that cells with three weights never feel the
/// morphogen gradient $G_i$.
///
/// # Parameters & Variables
/// | Symbol | Struct Field | Description |
/// |:---:| --- | --- |
/// | $\ell_r$ | `repulsion_length` | Decay length of the repulsive part |
/// | $\ell_a$ | `attraction_length` | Decay length of the attractive part |
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PolarPotential {
    /// Decay length of the repulsive part
    pub repulsion_length: f64,
    /// Decay length of the attractive part
    pub attraction_length: f64,
}

impl Default for PolarPotential {
    fn default() -> Self {
        Self {
            repulsion_length: 1.0,
            attraction_length: 5.0,
        }
    }
}

fn mean_weight(ctx: &PairContext<impl Scalar>, k: usize) -> f64 {
    let li = ctx.lambda_i.get(k).copied().unwrap_or(0.0);
    let lj = ctx.lambda_j.get(k).copied().unwrap_or(0.0);
    0.5 * (li + lj)
}

impl Potential for PolarPotential {
    fn eval<S: Scalar>(&self, ctx: &PairContext<S>) -> S {
        let r = &ctx.direction;
        let s1 = dot(
            &cross(&ctx.polarity_i, r),
            &cross(&ctx.polarity_j, r),
        );
        let s2 = dot(
            &cross(&ctx.polarity_i, &ctx.pcp_i),
            &cross(&ctx.polarity_j, &ctx.pcp_j),
        );
        let s3 = dot(&cross(&ctx.pcp_i, r), &cross(&ctx.pcp_j, r));
        let s4 = dot(&ctx.pcp_i, &ctx.gradient) * dot(&ctx.pcp_j, &ctx.gradient);
        let s = s1 * mean_weight(ctx, 1)
            + s2 * mean_weight(ctx, 2)
            + s3 * mean_weight(ctx, 3)
            + s4 * mean_weight(ctx, 4)
            + mean_weight(ctx, 0);
        (ctx.distance / -self.repulsion_length).exp()
            - s * (ctx.distance / -self.attraction_length).exp()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn context<'a>(
        distance: f64,
        polarity_j: [f64; 3],
        lambda: &'a [f64],
    ) -> PairContext<'a, f64> {
        PairContext {
            position: [0.0; 3],
            distance,
            direction: [1.0, 0.0, 0.0],
            lambda_i: lambda,
            lambda_j: lambda,
            polarity_i: [0.0, 0.0, 1.0],
            polarity_j,
            pcp_i: [0.0, 1.0, 0.0],
            pcp_j: [0.0, 1.0, 0.0],
            gradient: [0.0; 3],
        }
    }

    #[test]
    fn repulsion_decays_with_distance() {
        let pot = ExponentialRepulsion::default();
        let lambda: [f64; 0] = [];
        let v1 = pot.eval(&context(1.0, [0.0, 0.0, 1.0], &lambda));
        let v2 = pot.eval(&context(2.0, [0.0, 0.0, 1.0], &lambda));
        assert_abs_diff_eq!(v1, (-1.0f64).exp());
        assert!(v2 < v1);
    }

    #[test]
    fn repulsion_derivative_by_distance() {
        let pot = ExponentialRepulsion {
            strength: 2.0,
            length: 0.5,
        };
        let lambda: [f64; 0] = [];
        let zero = Dual::<1>::constant(0.0);
        let ctx = PairContext {
            position: [zero; 3],
            distance: Dual::variable(1.3, 0),
            direction: lift([1.0, 0.0, 0.0]),
            lambda_i: &lambda,
            lambda_j: &lambda,
            polarity_i: [zero; 3],
            polarity_j: [zero; 3],
            pcp_i: [zero; 3],
            pcp_j: [zero; 3],
            gradient: [zero; 3],
        };
        let v = pot.eval(&ctx);
        let expected = -2.0 / 0.5 * (-1.3f64 / 0.5).exp();
        assert_abs_diff_eq!(v.eps[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn aligned_polarities_attract_stronger() {
        let pot = PolarPotential::default();
        let lambda = [0.0, 1.0, 0.0, 0.0];
        let aligned = pot.eval(&context(2.0, [0.0, 0.0, 1.0], &lambda));
        let opposed = pot.eval(&context(2.0, [0.0, 0.0, -1.0], &lambda));
        assert!(aligned < opposed);
        let expected = (-2.0f64).exp() - (-2.0f64 / 5.0).exp();
        assert_abs_diff_eq!(aligned, expected, epsilon = 1e-12);
    }

    #[test]
    fn missing_gradient_weight_ignores_gradient() {
        let pot = PolarPotential::default();
        let lambda = [0.5, 0.5, 0.0, 0.0];
        let mut ctx = context(1.5, [0.0, 0.0, 1.0], &lambda);
        let without = pot.eval(&ctx);
        ctx.gradient = [0.0, 1.0, 0.0];
        assert_abs_diff_eq!(pot.eval(&ctx), without);

        let lambda = [0.5, 0.5, 0.0, 0.0, 1.0];
        ctx.lambda_i = &lambda;
        ctx.lambda_j = &lambda;
        assert!(pot.eval(&ctx) < without);
    }
}
