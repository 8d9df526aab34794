use rand::Rng;
use rand::distributions::Distribution;
use mcmclib::Bound;
use statslib::dens;
use crate::error::ModelError;
use super::Family;

/// Exponential with the rate parameterization.
#[derive(Debug, Clone, Copy)]
pub struct Exponential;

impl Family for Exponential {

    const NAME : &'static str = "Exponential";

    const N_PARAMS : usize = 1;

    fn ln_density(x : f64, p : &[f64]) -> f64 {
        dens::dexp(x, p[0], true)
    }

    fn partials(x : f64, p : &[f64]) -> Option<(f64, [f64; 2])> {
        let rate = p[0];
        Some((-rate, [1.0 / rate - x, 0.0]))
    }

    fn draw<R>(p : &[f64], rng : &mut R) -> Result<f64, ModelError>
    where
        R : Rng + ?Sized
    {
        let distr = rand_distr::Exp::new(p[0]).map_err(|e| ModelError::InvalidParameter {
            distribution : Self::NAME,
            reason : e.to_string()
        })?;
        Ok(distr.sample(rng))
    }

    fn initial(p : &[f64]) -> f64 {
        1.0 / p[0]
    }

    fn support(_p : Option<&[f64]>) -> Bound {
        Bound::Lower(0.0)
    }

}
