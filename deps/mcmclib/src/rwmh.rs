/* Credit goes to mcmclib (Keith O'hara), which released the original C++ implementation via Apache 2.0 */

use super::*;

#[derive(Debug, Clone)]
pub struct RWMHSettings {
    pub n_draws : usize,
    pub n_burnin : usize,
    pub par_scale : f64,
    pub cov_mat : Option<DMatrix<f64>>,
    pub bounds : Option<Vec<Bound>>,
    pub progress : bool
}

impl Default for RWMHSettings {

    fn default() -> Self {
        Self {
            n_draws : 10_000,
            n_burnin : 0,
            par_scale : 1.0,
            cov_mat : None,
            bounds : None,
            progress : false
        }
    }

}

#[derive(Debug, Clone)]
pub struct RWMHOutput {
    pub draws_out : DMatrix<f64>,
    pub accept_rate : f64
}

/// Random-walk Metropolis-Hastings. At each step, the proposal is the previous draw
/// incremented by a zero-centered gaussian with covariance par_scale^2 * cov_mat;
/// the proposal is accepted with probability min(1, p(new)/p(prev)). Since the
/// increment is symmetric, no correction term for the proposal density is required.
/// Draws are arranged over the rows of the output matrix.
pub fn rwmh<E, R>(
    initial_vals : &DVector<f64>,
    target_log_kernel : impl FnMut(&DVector<f64>, Option<&mut DVector<f64>>)->Result<f64, E>,
    settings : &RWMHSettings,
    rng : &mut R
) -> Result<RWMHOutput, E>
where
    E : From<McmcError>,
    R : Rng + ?Sized
{
    let n_vals = initial_vals.nrows();
    let n_draws_keep = settings.n_draws;
    let n_draws_burnin = settings.n_burnin;
    if !(settings.par_scale > 0.0) {
        return Err(McmcError::InvalidSettings(format!("par_scale must be positive (got {})", settings.par_scale)).into());
    }
    let cov_mcmc : DMatrix<f64> = settings.cov_mat.clone().unwrap_or(DMatrix::identity(n_vals, n_vals));
    if cov_mcmc.nrows() != n_vals || cov_mcmc.ncols() != n_vals {
        return Err(McmcError::DimensionMismatch { expected : n_vals, found : cov_mcmc.nrows() }.into());
    }
    let cov_mcmc_sc = settings.par_scale * settings.par_scale * cov_mcmc;
    let cov_mcmc_chol = linalg::Cholesky::new(cov_mcmc_sc)
        .ok_or(McmcError::NotPositiveDefinite)?
        .l();

    let mut target = Target::new(target_log_kernel, settings.bounds.as_deref(), n_vals)?;
    let first_draw = target.to_sampling_scale(initial_vals);

    let mut draws_out = DMatrix::zeros(n_draws_keep, n_vals);
    let mut prev_lp = target.eval(&first_draw, None)?;
    let mut prev_draw = first_draw;
    let mut n_accept = 0;
    let mut krand = DVector::zeros(n_vals);

    let bar = progress_bar(n_draws_keep + n_draws_burnin, settings.progress, "rwmh");
    for jj in 0..(n_draws_keep + n_draws_burnin) {
        fill_with_std_normal(&mut krand, rng);
        let new_draw = &prev_draw + &cov_mcmc_chol * &krand;
        let mut prop_lp = target.eval(&new_draw, None)?;

        if !prop_lp.is_finite() {
            prop_lp = f64::NEG_INFINITY;
        }

        let comp_val = (prop_lp - prev_lp).min(0.0);
        let z : f64 = rng.gen();
        if z < comp_val.exp() {
            prev_draw = new_draw;
            prev_lp = prop_lp;
            if jj >= n_draws_burnin {
                n_accept += 1;
            }
        }
        if jj >= n_draws_burnin {
            draws_out.row_mut(jj - n_draws_burnin).tr_copy_from(&target.to_original_scale(&prev_draw));
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    let accept_rate = if n_draws_keep > 0 { n_accept as f64 / n_draws_keep as f64 } else { 0.0 };
    tracing::debug!(accept_rate, n_draws = n_draws_keep, "rwmh finished");
    Ok(RWMHOutput { draws_out, accept_rate })
}

#[cfg(test)]
mod tests {

    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn std_normal_kernel(x : &DVector<f64>, _ : Option<&mut DVector<f64>>) -> Result<f64, McmcError> {
        Ok(-0.5 * x.dot(x))
    }

    #[test]
    fn rwmh_recovers_gaussian_moments() {
        let mut rng = StdRng::seed_from_u64(11);
        let settings = RWMHSettings { n_draws : 20_000, n_burnin : 1_000, par_scale : 1.5, ..Default::default() };
        let out = rwmh(&DVector::from_element(2, 0.0), std_normal_kernel, &settings, &mut rng).unwrap();
        assert_eq!(out.draws_out.shape(), (20_000, 2));
        for c in 0..2 {
            let col = out.draws_out.column(c);
            assert!(col.mean().abs() < 0.1);
            assert!((col.variance() - 1.0).abs() < 0.2);
        }
        assert!(out.accept_rate > 0.2 && out.accept_rate < 0.8);
    }

    #[test]
    fn rwmh_respects_bounds() {
        // Exponential(1) target over x > 0.
        let mut rng = StdRng::seed_from_u64(3);
        let settings = RWMHSettings {
            n_draws : 20_000,
            n_burnin : 1_000,
            par_scale : 1.0,
            bounds : Some(vec![Bound::Lower(0.0)]),
            ..Default::default()
        };
        let kernel = |x : &DVector<f64>, _ : Option<&mut DVector<f64>>| -> Result<f64, McmcError> {
            if x[0] < 0.0 { Ok(f64::NEG_INFINITY) } else { Ok(-x[0]) }
        };
        let out = rwmh(&DVector::from_element(1, 1.0), kernel, &settings, &mut rng).unwrap();
        assert!(out.draws_out.iter().all(|d| *d > 0.0));
        assert!((out.draws_out.column(0).mean() - 1.0).abs() < 0.1);
    }

    #[test]
    fn rwmh_propagates_kernel_errors() {
        let mut rng = StdRng::seed_from_u64(0);
        let kernel = |_ : &DVector<f64>, _ : Option<&mut DVector<f64>>| -> Result<f64, McmcError> {
            Err(McmcError::InvalidSettings(String::from("kernel failure")))
        };
        let res = rwmh(&DVector::from_element(1, 0.0), kernel, &RWMHSettings::default(), &mut rng);
        assert_eq!(res.err(), Some(McmcError::InvalidSettings(String::from("kernel failure"))));
    }

}
