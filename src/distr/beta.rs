use rand::Rng;
use rand::distributions::Distribution;
use special::Gamma;
use mcmclib::Bound;
use statslib::dens;
use crate::error::ModelError;
use super::Family;

/// Beta(alpha, beta) over the unit interval.
#[derive(Debug, Clone, Copy)]
pub struct Beta;

impl Family for Beta {

    const NAME : &'static str = "Beta";

    const N_PARAMS : usize = 2;

    fn ln_density(x : f64, p : &[f64]) -> f64 {
        dens::dbeta(x, p[0], p[1], true)
    }

    fn partials(x : f64, p : &[f64]) -> Option<(f64, [f64; 2])> {
        let (a, b) = (p[0], p[1]);
        let dg_ab = (a + b).digamma();
        let dx = (a - 1.0) / x - (b - 1.0) / (1.0 - x);
        let da = x.ln() - a.digamma() + dg_ab;
        let db = (1.0 - x).ln() - b.digamma() + dg_ab;
        Some((dx, [da, db]))
    }

    // Draws are kept away from 0 and 1, where the density of the
    // transformed value used by the samplers is not defined.
    fn draw<R>(p : &[f64], rng : &mut R) -> Result<f64, ModelError>
    where
        R : Rng + ?Sized
    {
        let distr = rand_distr::Beta::new(p[0], p[1]).map_err(|e| ModelError::InvalidParameter {
            distribution : Self::NAME,
            reason : e.to_string()
        })?;
        Ok(distr.sample(rng).max(f64::EPSILON).min(1.0 - f64::EPSILON))
    }

    fn initial(p : &[f64]) -> f64 {
        p[0] / (p[0] + p[1])
    }

    fn support(_p : Option<&[f64]>) -> Bound {
        Bound::Both(0.0, 1.0)
    }

}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::distr::tests::check_partials;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn beta_partials() {
        check_partials::<Beta>(0.3, &[2.0, 5.0]);
        check_partials::<Beta>(0.9, &[0.7, 1.3]);
    }

    #[test]
    fn beta_draw_mean() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 5_000;
        let m = (0..n).map(|_| Beta::draw(&[2.0, 6.0], &mut rng).unwrap() ).sum::<f64>() / n as f64;
        assert!((m - 0.25).abs() < 0.02);
        assert!(Beta::draw(&[-1.0, 2.0], &mut rng).is_err());
    }

}
