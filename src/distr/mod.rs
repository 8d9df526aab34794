use nalgebra::DVector;
use rand::Rng;
use mcmclib::Bound;
use crate::error::ModelError;
use crate::graph::VertexId;
use crate::tensor;

pub mod uniform;

pub use uniform::*;

pub mod exponential;

pub use exponential::*;

pub mod beta;

pub use beta::*;

pub mod gaussian;

pub use gaussian::*;

pub mod half_cauchy;

pub use half_cauchy::*;

pub mod binomial;

pub use binomial::*;

/// Scalar behaviour of a parametric distribution family. Every method receives
/// a single value and the parameters at the same position (p has exactly
/// N_PARAMS entries); the vectorized versions at Distr broadcast length-1
/// parameters against the vertex value.
pub trait Family {

    const NAME : &'static str;

    const N_PARAMS : usize;

    const DISCRETE : bool = false;

    /// Log-density (or log-mass) of x. Invalid parameters yield NaN, values
    /// outside the support yield negative infinity.
    fn ln_density(x : f64, p : &[f64]) -> f64;

    /// Partial derivatives of the log-density with respect to x and to each
    /// parameter, in parameter order. None if the family is not differentiable.
    fn partials(x : f64, p : &[f64]) -> Option<(f64, [f64; 2])>;

    fn draw<R>(p : &[f64], rng : &mut R) -> Result<f64, ModelError>
    where
        R : Rng + ?Sized;

    /// Deterministic starting value at the center of the support.
    fn initial(p : &[f64]) -> f64;

    /// Support of a value, given the parameters when they are known to stay
    /// fixed during inference (None otherwise).
    fn support(p : Option<&[f64]>) -> Bound;

}

/// Tagged set of distributions a probabilistic vertex can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distr {

    /// Parameters: lower, upper
    Uniform,

    /// Parameters: rate
    Exponential,

    /// Parameters: alpha, beta
    Beta,

    /// Parameters: mu, sigma
    Gaussian,

    /// Parameters: scale
    HalfCauchy,

    /// Parameters: p, n
    Binomial

}

macro_rules! dispatch {
    ($distr:expr, $f:ident($($arg:expr),*)) => {
        match $distr {
            Distr::Uniform => Uniform::$f($($arg),*),
            Distr::Exponential => Exponential::$f($($arg),*),
            Distr::Beta => Beta::$f($($arg),*),
            Distr::Gaussian => Gaussian::$f($($arg),*),
            Distr::HalfCauchy => HalfCauchy::$f($($arg),*),
            Distr::Binomial => Binomial::$f($($arg),*)
        }
    }
}

// Copies the parameters at position i into buf, returning the used slice.
fn params_at<'a>(params : &[&DVector<f64>], i : usize, buf : &'a mut [f64; 2]) -> &'a [f64] {
    for (j, p) in params.iter().enumerate() {
        buf[j] = tensor::at(p, i);
    }
    &buf[..params.len()]
}

/// Partial derivatives of a log-density evaluated over a whole vertex: one
/// elementwise vector with respect to the vertex value and one per parameter
/// (still at the vertex length; callers reduce them to the parameter length).
#[derive(Debug, Clone)]
pub struct Partials {
    pub wrt_value : DVector<f64>,
    pub wrt_params : Vec<DVector<f64>>
}

impl Distr {

    pub fn name(&self) -> &'static str {
        match self {
            Distr::Uniform => Uniform::NAME,
            Distr::Exponential => Exponential::NAME,
            Distr::Beta => Beta::NAME,
            Distr::Gaussian => Gaussian::NAME,
            Distr::HalfCauchy => HalfCauchy::NAME,
            Distr::Binomial => Binomial::NAME
        }
    }

    pub fn n_params(&self) -> usize {
        match self {
            Distr::Uniform => Uniform::N_PARAMS,
            Distr::Exponential => Exponential::N_PARAMS,
            Distr::Beta => Beta::N_PARAMS,
            Distr::Gaussian => Gaussian::N_PARAMS,
            Distr::HalfCauchy => HalfCauchy::N_PARAMS,
            Distr::Binomial => Binomial::N_PARAMS
        }
    }

    pub fn is_discrete(&self) -> bool {
        match self {
            Distr::Uniform => Uniform::DISCRETE,
            Distr::Exponential => Exponential::DISCRETE,
            Distr::Beta => Beta::DISCRETE,
            Distr::Gaussian => Gaussian::DISCRETE,
            Distr::HalfCauchy => HalfCauchy::DISCRETE,
            Distr::Binomial => Binomial::DISCRETE
        }
    }

    /// Sum of the elementwise log-densities of x.
    pub fn log_prob(&self, params : &[&DVector<f64>], x : &DVector<f64>) -> f64 {
        let mut buf = [0.0; 2];
        let mut lp = 0.0;
        for i in 0..x.nrows() {
            let p = params_at(params, i, &mut buf);
            lp += dispatch!(self, ln_density(x[i], p));
        }
        lp
    }

    /// Elementwise partial derivatives of the log-density at x. Fails for
    /// families without a closed-form gradient, informing the vertex which
    /// holds the distribution.
    pub fn partials(&self, params : &[&DVector<f64>], x : &DVector<f64>, vertex : VertexId) -> Result<Partials, ModelError> {
        let n = x.nrows();
        let mut wrt_value = DVector::zeros(n);
        let mut wrt_params = vec![DVector::zeros(n); params.len()];
        let mut buf = [0.0; 2];
        for i in 0..n {
            let p = params_at(params, i, &mut buf);
            let (dx, dp) = dispatch!(self, partials(x[i], p))
                .ok_or(ModelError::UnsupportedGradient { vertex, distribution : self.name() })?;
            wrt_value[i] = dx;
            for (j, g) in wrt_params.iter_mut().enumerate() {
                g[i] = dp[j];
            }
        }
        Ok(Partials { wrt_value, wrt_params })
    }

    /// Draws len independent values, each with the parameters at its position.
    pub fn sample<R>(&self, params : &[&DVector<f64>], len : usize, rng : &mut R) -> Result<DVector<f64>, ModelError>
    where
        R : Rng + ?Sized
    {
        let mut buf = [0.0; 2];
        let mut out = DVector::zeros(len);
        for i in 0..len {
            let p = params_at(params, i, &mut buf);
            out[i] = dispatch!(self, draw(p, rng))?;
        }
        Ok(out)
    }

    pub fn initial_value(&self, params : &[&DVector<f64>], len : usize) -> DVector<f64> {
        let mut buf = [0.0; 2];
        DVector::from_fn(len, |i, _| {
            let p = params_at(params, i, &mut buf);
            dispatch!(self, initial(p))
        })
    }

    /// Per-element support of a vertex with this distribution. Parameter-dependent
    /// supports are only resolved when fixed is true.
    pub fn bounds(&self, params : &[&DVector<f64>], len : usize, fixed : bool) -> Vec<Bound> {
        let mut buf = [0.0; 2];
        (0..len).map(|i| {
            if fixed {
                let p = params_at(params, i, &mut buf);
                dispatch!(self, support(Some(p)))
            } else {
                dispatch!(self, support(None))
            }
        }).collect()
    }

}
