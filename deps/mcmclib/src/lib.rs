/* Credit to the "sample" module goes to Keith O'hara, which released the original
C++ implementation of mcmclib via Apache 2.0. Original source at https://github.com/kthohr/mcmc */

use nalgebra::*;
use rand::Rng;
use thiserror::Error;
use indicatif::{ProgressBar, ProgressStyle};
use std::marker::PhantomData;

mod rwmh;

mod hmc;

mod nuts;

pub use rwmh::*;

pub use hmc::*;

pub use nuts::*;

/// Errors raised by the samplers themselves. Errors raised by the target
/// log-kernel are not wrapped: every sampler is generic over the kernel error E,
/// which only needs to absorb McmcError, so kernel failures reach the caller unchanged.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum McmcError {

    #[error("Informed matrix is not positive-definite")]
    NotPositiveDefinite,

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected : usize, found : usize },

    #[error("Invalid sampler settings: {0}")]
    InvalidSettings(String)

}

/// Support of a single coordinate of the parameter vector. Bounded coordinates
/// are sampled over an unconstrained scale (log for one-sided bounds;
/// logit for two-sided bounds), and the log-kernel is corrected by the
/// log-determinant of the Jacobian of the inverse transformation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {

    Unbounded,

    Lower(f64),

    Upper(f64),

    Both(f64, f64)

}

fn sigmoid(z : f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

// ln(1 + exp(z)) without overflow.
fn softplus(z : f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

impl Bound {

    /// Maps a value at the constrained scale to the unconstrained scale.
    pub fn transform(&self, x : f64) -> f64 {
        match *self {
            Bound::Unbounded => x,
            Bound::Lower(l) => (x - l).ln(),
            Bound::Upper(u) => -(u - x).ln(),
            Bound::Both(l, u) => (x - l).ln() - (u - x).ln()
        }
    }

    /// Exact inverse of transform.
    pub fn inv_transform(&self, z : f64) -> f64 {
        match *self {
            Bound::Unbounded => z,
            Bound::Lower(l) => l + z.exp(),
            Bound::Upper(u) => u - (-z).exp(),
            Bound::Both(l, u) => l + (u - l) * sigmoid(z)
        }
    }

    /// dx/dz of the inverse transformation.
    pub fn jacobian(&self, z : f64) -> f64 {
        match *self {
            Bound::Unbounded => 1.0,
            Bound::Lower(_) => z.exp(),
            Bound::Upper(_) => (-z).exp(),
            Bound::Both(l, u) => {
                let s = sigmoid(z);
                (u - l) * s * (1.0 - s)
            }
        }
    }

    /// ln |dx/dz|
    pub fn log_jacobian(&self, z : f64) -> f64 {
        match *self {
            Bound::Unbounded => 0.0,
            Bound::Lower(_) => z,
            Bound::Upper(_) => -z,
            Bound::Both(l, u) => (u - l).ln() - softplus(-z) - softplus(z)
        }
    }

    /// d ln |dx/dz| / dz
    pub fn log_jacobian_grad(&self, z : f64) -> f64 {
        match *self {
            Bound::Unbounded => 0.0,
            Bound::Lower(_) => 1.0,
            Bound::Upper(_) => -1.0,
            Bound::Both(_, _) => 1.0 - 2.0 * sigmoid(z)
        }
    }

}

pub fn transform(vals : &DVector<f64>, bounds : &[Bound]) -> DVector<f64> {
    DVector::from_iterator(vals.nrows(), vals.iter().zip(bounds.iter()).map(|(v, b)| b.transform(*v)))
}

pub fn inv_transform(vals_trans : &DVector<f64>, bounds : &[Bound]) -> DVector<f64> {
    DVector::from_iterator(vals_trans.nrows(), vals_trans.iter().zip(bounds.iter()).map(|(z, b)| b.inv_transform(*z)))
}

pub fn log_jacobian(vals_trans : &DVector<f64>, bounds : &[Bound]) -> f64 {
    vals_trans.iter().zip(bounds.iter()).map(|(z, b)| b.log_jacobian(*z)).sum()
}

/// Target log-kernel as seen by the samplers. The wrapped kernel receives values
/// at the constrained scale and writes its gradient (when asked for) into the
/// second argument; if bounds were informed, evaluations happen at the unconstrained
/// scale and the gradient is adjusted by the chain rule plus the Jacobian correction.
pub(crate) struct Target<'a, F, E> {

    kernel : F,

    bounds : Option<&'a [Bound]>,

    _err : PhantomData<fn() -> E>

}

impl<'a, F, E> Target<'a, F, E>
where
    F : FnMut(&DVector<f64>, Option<&mut DVector<f64>>) -> Result<f64, E>
{

    pub(crate) fn new(kernel : F, bounds : Option<&'a [Bound]>, n_vals : usize) -> Result<Self, McmcError> {
        if let Some(b) = bounds {
            if b.len() != n_vals {
                return Err(McmcError::DimensionMismatch { expected : n_vals, found : b.len() });
            }
        }
        Ok(Self { kernel, bounds, _err : PhantomData })
    }

    pub(crate) fn to_sampling_scale(&self, vals : &DVector<f64>) -> DVector<f64> {
        match self.bounds {
            Some(b) => transform(vals, b),
            None => vals.clone()
        }
    }

    pub(crate) fn to_original_scale(&self, vals_trans : &DVector<f64>) -> DVector<f64> {
        match self.bounds {
            Some(b) => inv_transform(vals_trans, b),
            None => vals_trans.clone()
        }
    }

    pub(crate) fn eval(&mut self, vals : &DVector<f64>, grad : Option<&mut DVector<f64>>) -> Result<f64, E> {
        let bounds = match self.bounds {
            Some(b) => b,
            None => return (self.kernel)(vals, grad)
        };
        let x = inv_transform(vals, bounds);
        let lp = match grad {
            Some(grad) => {
                let mut grad_x = DVector::zeros(vals.nrows());
                let lp = (self.kernel)(&x, Some(&mut grad_x))?;
                for (i, b) in bounds.iter().enumerate() {
                    grad[i] = grad_x[i] * b.jacobian(vals[i]) + b.log_jacobian_grad(vals[i]);
                }
                lp
            },
            None => (self.kernel)(&x, None)?
        };
        Ok(lp + log_jacobian(vals, bounds))
    }

}

fn fill_with_std_normal<R>(v : &mut DVector<f64>, rng : &mut R)
where
    R : Rng + ?Sized
{
    v.iter_mut().for_each(|d| *d = rng.sample(rand_distr::StandardNormal) );
}

fn progress_bar(len : usize, enabled : bool, label : &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
    );
    bar.set_prefix(label.to_string());
    bar
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_relative_eq;

    const BOUNDS : [Bound; 4] = [Bound::Unbounded, Bound::Lower(1.0), Bound::Upper(-2.0), Bound::Both(0.0, 1.0)];

    #[test]
    fn transform_roundtrip() {
        let x = DVector::from_column_slice(&[-3.0, 1.5, -2.5, 0.2]);
        let z = transform(&x, &BOUNDS);
        let back = inv_transform(&z, &BOUNDS);
        for i in 0..4 {
            assert_relative_eq!(x[i], back[i], epsilon = 1E-12);
        }
    }

    #[test]
    fn jacobian_matches_finite_difference() {
        let h = 1E-6;
        for b in BOUNDS.iter() {
            for z in [-1.3, 0.0, 0.7].iter() {
                let fd = (b.inv_transform(z + h) - b.inv_transform(z - h)) / (2.0 * h);
                assert_relative_eq!(b.jacobian(*z), fd, epsilon = 1E-6);
                assert_relative_eq!(b.log_jacobian(*z), b.jacobian(*z).ln(), epsilon = 1E-10);
                let fd_lj = (b.log_jacobian(z + h) - b.log_jacobian(z - h)) / (2.0 * h);
                assert_relative_eq!(b.log_jacobian_grad(*z), fd_lj, epsilon = 1E-6);
            }
        }
    }

    #[test]
    fn logit_transform_is_stable_at_extremes() {
        let b = Bound::Both(0.0, 1.0);
        assert!(b.log_jacobian(800.0).is_finite());
        assert!(b.log_jacobian(-800.0).is_finite());
        assert!((b.inv_transform(800.0) - 1.0).abs() < 1E-12);
    }

    #[test]
    fn target_rejects_wrong_bounds_length() {
        let kernel = |_ : &DVector<f64>, _ : Option<&mut DVector<f64>>| -> Result<f64, McmcError> { Ok(0.0) };
        let bounds = [Bound::Unbounded];
        let res = Target::new(kernel, Some(&bounds[..]), 2);
        assert_eq!(res.err(), Some(McmcError::DimensionMismatch { expected : 2, found : 1 }));
    }

}
