use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Number type in which [Potential](crate::Potential)s are evaluated.
///
/// Implemented by [f64] for plain evaluation and by [Dual] for forward-mode automatic
/// differentiation. Potentials written against this trait can be differentiated with respect to
/// every quantity contained in a [PairContext](crate::PairContext) without any additional code.
pub trait Scalar:
    Copy
    + Send
    + Sync
    + core::fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + AddAssign
    + num::Zero
    + num::One
{
    /// Lifts a constant into this number type.
    fn from_f64(value: f64) -> Self;
    /// Real part of the value, i.e. the value without derivative information.
    fn re(&self) -> f64;
    /// Square root
    fn sqrt(self) -> Self;
    /// Exponential function $e^x$
    fn exp(self) -> Self;
    /// Natural logarithm
    fn ln(self) -> Self;
    /// Integer power
    fn powi(self, n: i32) -> Self;
    /// Floating point power
    fn powf(self, n: f64) -> Self;
    /// Hyperbolic tangent
    fn tanh(self) -> Self;
    /// Absolute value
    fn abs(self) -> Self;
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn re(&self) -> f64 {
        *self
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }

    fn powf(self, n: f64) -> Self {
        f64::powf(self, n)
    }

    fn tanh(self) -> Self {
        f64::tanh(self)
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }
}

/// Vector with three components of a generic [Scalar].
pub type Vec3<S> = [S; 3];

/// Euclidean inner product of two [Vec3].
pub fn dot<S: Scalar>(a: &Vec3<S>, b: &Vec3<S>) -> S {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product $a\times b$ of two [Vec3].
pub fn cross<S: Scalar>(a: &Vec3<S>, b: &Vec3<S>) -> Vec3<S> {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Lifts a constant vector into the given [Scalar] type.
pub fn lift<S: Scalar>(v: [f64; 3]) -> Vec3<S> {
    [S::from_f64(v[0]), S::from_f64(v[1]), S::from_f64(v[2])]
}

/// Dual number carrying the value and all `N` partial derivatives of an expression.
///
/// A variable $x_k$ is seeded with a unit vector in the `eps` part.
/// Every arithmetic operation then propagates derivatives via the chain rule
/// \\begin{equation}
///     f(a + \epsilon) = f(a) + f'(a)\epsilon
/// \\end{equation}
/// such that the final result contains $\partial f/\partial x_k$ in `eps[k]`.
///
/// ```
/// # use cellpolar_concepts::{Dual, Scalar};
/// let x = Dual::<2>::variable(3.0, 0);
/// let y = Dual::<2>::variable(4.0, 1);
/// let r = (x * x + y * y).sqrt();
/// assert_eq!(r.re, 5.0);
/// assert!((r.eps[0] - 0.6).abs() < 1e-12);
/// assert!((r.eps[1] - 0.8).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dual<const N: usize> {
    /// Value of the expression
    pub re: f64,
    /// Partial derivatives with respect to the seeded variables
    pub eps: [f64; N],
}

impl<const N: usize> Dual<N> {
    /// Value without any derivative information.
    pub fn constant(re: f64) -> Self {
        Self { re, eps: [0.0; N] }
    }

    /// Independent variable with index `index`.
    ///
    /// Indices outside of `0..N` produce a constant.
    pub fn variable(re: f64, index: usize) -> Self {
        let mut eps = [0.0; N];
        if let Some(e) = eps.get_mut(index) {
            *e = 1.0;
        }
        Self { re, eps }
    }

    /// Applies $f$ with $f(a)$=`value` and $f'(a)$=`derivative`.
    fn chain(self, value: f64, derivative: f64) -> Self {
        Self {
            re: value,
            eps: self.eps.map(|e| e * derivative),
        }
    }
}

impl<const N: usize> Add for Dual<N> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            re: self.re + rhs.re,
            eps: core::array::from_fn(|i| self.eps[i] + rhs.eps[i]),
        }
    }
}

impl<const N: usize> Sub for Dual<N> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            re: self.re - rhs.re,
            eps: core::array::from_fn(|i| self.eps[i] - rhs.eps[i]),
        }
    }
}

impl<const N: usize> Mul for Dual<N> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self {
            re: self.re * rhs.re,
            eps: core::array::from_fn(|i| self.eps[i] * rhs.re + rhs.eps[i] * self.re),
        }
    }
}

impl<const N: usize> Div for Dual<N> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.re;
        let re = self.re * inv;
        Self {
            re,
            eps: core::array::from_fn(|i| (self.eps[i] - re * rhs.eps[i]) * inv),
        }
    }
}

impl<const N: usize> Neg for Dual<N> {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            re: -self.re,
            eps: self.eps.map(|e| -e),
        }
    }
}

impl<const N: usize> AddAssign for Dual<N> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const N: usize> Add<f64> for Dual<N> {
    type Output = Self;
    fn add(self, rhs: f64) -> Self {
        Self {
            re: self.re + rhs,
            eps: self.eps,
        }
    }
}

impl<const N: usize> Sub<f64> for Dual<N> {
    type Output = Self;
    fn sub(self, rhs: f64) -> Self {
        Self {
            re: self.re - rhs,
            eps: self.eps,
        }
    }
}

impl<const N: usize> Mul<f64> for Dual<N> {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        self.chain(self.re * rhs, rhs)
    }
}

impl<const N: usize> Div<f64> for Dual<N> {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        let inv = 1.0 / rhs;
        self.chain(self.re * inv, inv)
    }
}

impl<const N: usize> Add<Dual<N>> for f64 {
    type Output = Dual<N>;
    fn add(self, rhs: Dual<N>) -> Dual<N> {
        rhs + self
    }
}

impl<const N: usize> Sub<Dual<N>> for f64 {
    type Output = Dual<N>;
    fn sub(self, rhs: Dual<N>) -> Dual<N> {
        -rhs + self
    }
}

impl<const N: usize> Mul<Dual<N>> for f64 {
    type Output = Dual<N>;
    fn mul(self, rhs: Dual<N>) -> Dual<N> {
        rhs * self
    }
}

impl<const N: usize> Div<Dual<N>> for f64 {
    type Output = Dual<N>;
    fn div(self, rhs: Dual<N>) -> Dual<N> {
        Dual::constant(self) / rhs
    }
}

impl<const N: usize> num::Zero for Dual<N> {
    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.eps.iter().all(|e| *e == 0.0)
    }
}

impl<const N: usize> num::One for Dual<N> {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl<const N: usize> Scalar for Dual<N> {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }

    fn re(&self) -> f64 {
        self.re
    }

    fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        self.chain(s, 0.5 / s)
    }

    fn exp(self) -> Self {
        let e = self.re.exp();
        self.chain(e, e)
    }

    fn ln(self) -> Self {
        self.chain(self.re.ln(), 1.0 / self.re)
    }

    fn powi(self, n: i32) -> Self {
        match n {
            0 => Self::constant(1.0),
            _ => self.chain(self.re.powi(n), n as f64 * self.re.powi(n - 1)),
        }
    }

    fn powf(self, n: f64) -> Self {
        if n == 0.0 {
            return Self::constant(1.0);
        }
        self.chain(self.re.powf(n), n * self.re.powf(n - 1.0))
    }

    fn tanh(self) -> Self {
        let t = self.re.tanh();
        self.chain(t, 1.0 - t * t)
    }

    fn abs(self) -> Self {
        self.chain(self.re.abs(), self.re.signum())
    }
}
