use rand::Rng;
use rand::distributions::Distribution;
use mcmclib::Bound;
use statslib::dens;
use crate::error::ModelError;
use super::Family;

/// Continuous uniform over [lower, upper].
#[derive(Debug, Clone, Copy)]
pub struct Uniform;

impl Family for Uniform {

    const NAME : &'static str = "Uniform";

    const N_PARAMS : usize = 2;

    fn ln_density(x : f64, p : &[f64]) -> f64 {
        dens::dunif(x, p[0], p[1], true)
    }

    // The density is flat, so only the width depends on the parameters.
    fn partials(x : f64, p : &[f64]) -> Option<(f64, [f64; 2])> {
        if x < p[0] || x > p[1] {
            return Some((0.0, [0.0, 0.0]));
        }
        let w = p[1] - p[0];
        Some((0.0, [1.0 / w, -1.0 / w]))
    }

    fn draw<R>(p : &[f64], rng : &mut R) -> Result<f64, ModelError>
    where
        R : Rng + ?Sized
    {
        if !(p[1] > p[0]) || !p[0].is_finite() || !p[1].is_finite() {
            return Err(ModelError::InvalidParameter {
                distribution : Self::NAME,
                reason : format!("bounds [{}, {}] do not form a finite interval", p[0], p[1])
            });
        }
        Ok(rand_distr::Uniform::new(p[0], p[1]).sample(rng))
    }

    fn initial(p : &[f64]) -> f64 {
        (p[0] + p[1]) / 2.0
    }

    fn support(p : Option<&[f64]>) -> Bound {
        match p {
            Some(p) if p[1] > p[0] => Bound::Both(p[0], p[1]),
            _ => Bound::Unbounded
        }
    }

}
