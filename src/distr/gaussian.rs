use rand::Rng;
use rand::distributions::Distribution;
use mcmclib::Bound;
use statslib::dens;
use crate::error::ModelError;
use super::Family;

/// Gaussian parameterized by mean and standard deviation.
#[derive(Debug, Clone, Copy)]
pub struct Gaussian;

impl Family for Gaussian {

    const NAME : &'static str = "Gaussian";

    const N_PARAMS : usize = 2;

    fn ln_density(x : f64, p : &[f64]) -> f64 {
        dens::dnorm(x, p[0], p[1], true)
    }

    fn partials(x : f64, p : &[f64]) -> Option<(f64, [f64; 2])> {
        let (mu, sd) = (p[0], p[1]);
        let var = sd.powi(2);
        let dev = x - mu;
        Some((-dev / var, [dev / var, (dev.powi(2) - var) / (var * sd)]))
    }

    fn draw<R>(p : &[f64], rng : &mut R) -> Result<f64, ModelError>
    where
        R : Rng + ?Sized
    {
        let distr = rand_distr::Normal::new(p[0], p[1]).map_err(|e| ModelError::InvalidParameter {
            distribution : Self::NAME,
            reason : e.to_string()
        })?;
        Ok(distr.sample(rng))
    }

    fn initial(p : &[f64]) -> f64 {
        p[0]
    }

    fn support(_p : Option<&[f64]>) -> Bound {
        Bound::Unbounded
    }

}
