use rand::Rng;
use rand::distributions::Distribution;
use mcmclib::Bound;
use statslib::dens;
use crate::error::ModelError;
use super::Family;

/// Binomial count of successes over n trials with success probability p.
/// Values and trial counts are stored as floating point numbers holding
/// non-negative integers. The stock family has no gradient; see
/// crate::gradient::FixedTrialsBinomial for the fixed-trials case.
#[derive(Debug, Clone, Copy)]
pub struct Binomial;

fn as_count(v : f64) -> Option<u64> {
    if v >= 0.0 && v.fract() == 0.0 && v.is_finite() {
        Some(v as u64)
    } else {
        None
    }
}

impl Family for Binomial {

    const NAME : &'static str = "Binomial";

    const N_PARAMS : usize = 2;

    const DISCRETE : bool = true;

    fn ln_density(x : f64, p : &[f64]) -> f64 {
        match (as_count(x), as_count(p[1])) {
            (Some(k), Some(n)) => dens::dbinom(k, n, p[0], true),
            (None, Some(_)) => f64::NEG_INFINITY,
            (_, None) => f64::NAN
        }
    }

    fn partials(_x : f64, _p : &[f64]) -> Option<(f64, [f64; 2])> {
        None
    }

    fn draw<R>(p : &[f64], rng : &mut R) -> Result<f64, ModelError>
    where
        R : Rng + ?Sized
    {
        let n = as_count(p[1]).ok_or_else(|| ModelError::InvalidParameter {
            distribution : Self::NAME,
            reason : format!("trial count {} is not a non-negative integer", p[1])
        })?;
        let distr = rand_distr::Binomial::new(n, p[0]).map_err(|e| ModelError::InvalidParameter {
            distribution : Self::NAME,
            reason : e.to_string()
        })?;
        Ok(distr.sample(rng) as f64)
    }

    fn initial(p : &[f64]) -> f64 {
        (p[0] * p[1]).floor()
    }

    fn support(p : Option<&[f64]>) -> Bound {
        match p {
            Some(p) => Bound::Both(0.0, p[1]),
            None => Bound::Lower(0.0)
        }
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn binomial_mass() {
        let expected = (10.0f64).ln() + 3.0 * (0.5f64).ln() + 2.0 * (0.5f64).ln();
        assert!((Binomial::ln_density(3.0, &[0.5, 5.0]) - expected).abs() < 1E-10);
        assert_eq!(Binomial::ln_density(2.5, &[0.5, 5.0]), f64::NEG_INFINITY);
        assert_eq!(Binomial::ln_density(6.0, &[0.5, 5.0]), f64::NEG_INFINITY);
        assert!(Binomial::ln_density(2.0, &[0.5, 4.5]).is_nan());
    }

}
