use rand::Rng;
use rand::distributions::Distribution;
use mcmclib::Bound;
use statslib::dens;
use crate::error::ModelError;
use super::Family;

/// Cauchy centered at zero, folded over the non-negative reals.
#[derive(Debug, Clone, Copy)]
pub struct HalfCauchy;

impl Family for HalfCauchy {

    const NAME : &'static str = "HalfCauchy";

    const N_PARAMS : usize = 1;

    fn ln_density(x : f64, p : &[f64]) -> f64 {
        dens::dhalfcauchy(x, p[0], true)
    }

    fn partials(x : f64, p : &[f64]) -> Option<(f64, [f64; 2])> {
        let s = p[0];
        let denom = s.powi(2) + x.powi(2);
        Some((-2.0 * x / denom, [(x.powi(2) - s.powi(2)) / (s * denom), 0.0]))
    }

    fn draw<R>(p : &[f64], rng : &mut R) -> Result<f64, ModelError>
    where
        R : Rng + ?Sized
    {
        let distr = rand_distr::Cauchy::new(0.0, p[0]).map_err(|e| ModelError::InvalidParameter {
            distribution : Self::NAME,
            reason : e.to_string()
        })?;
        Ok(distr.sample(rng).abs())
    }

    fn initial(p : &[f64]) -> f64 {
        p[0]
    }

    fn support(_p : Option<&[f64]>) -> Bound {
        Bound::Lower(0.0)
    }

}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::distr::tests::check_partials;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn half_cauchy_partials() {
        check_partials::<HalfCauchy>(4.0, &[25.0]);
        check_partials::<HalfCauchy>(30.0, &[2.5]);
    }

    #[test]
    fn half_cauchy_median_is_scale() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 4_000;
        let below = (0..n).filter(|_| HalfCauchy::draw(&[2.0], &mut rng).unwrap() < 2.0 ).count();
        assert!((below as f64 / n as f64 - 0.5).abs() < 0.03);
    }

}
