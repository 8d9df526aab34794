/* Credit goes to mcmclib (Keith O'hara), which released the original C++ implementation via Apache 2.0 */

use super::*;

#[derive(Debug, Clone)]
pub struct HMCSettings {
    pub n_draws : usize,
    pub n_burnin : usize,
    pub step_size : f64,
    pub n_leap_steps : usize,
    pub precond_mat : Option<DMatrix<f64>>,
    pub bounds : Option<Vec<Bound>>,
    pub progress : bool
}

impl Default for HMCSettings {

    fn default() -> Self {
        Self {
            n_draws : 1_000,
            n_burnin : 0,
            step_size : 0.1,
            n_leap_steps : 10,
            precond_mat : None,
            bounds : None,
            progress : false
        }
    }

}

#[derive(Debug, Clone)]
pub struct HMCOutput {
    pub draws_out : DMatrix<f64>,
    pub accept_rate : f64
}

/// Hamiltonian Monte Carlo with a fixed step size and number of leapfrog steps.
/// Momentum is drawn from N(0, M) where M is the preconditioning matrix (identity
/// if not informed); the potential energy is the negative log-kernel, and the final
/// position of each trajectory is accepted with probability min(1, exp(H_prev - H_new)).
/// Trajectories reaching a non-finite log-kernel are cut short and rejected.
pub fn hmc<E, R>(
    initial_vals : &DVector<f64>,
    target_log_kernel : impl FnMut(&DVector<f64>, Option<&mut DVector<f64>>)->Result<f64, E>,
    settings : &HMCSettings,
    rng : &mut R
) -> Result<HMCOutput, E>
where
    E : From<McmcError>,
    R : Rng + ?Sized
{
    let n_vals = initial_vals.nrows();
    if !(settings.step_size > 0.0) || settings.n_leap_steps == 0 {
        return Err(McmcError::InvalidSettings(
            format!("step size ({}) and leapfrog steps ({}) must be positive", settings.step_size, settings.n_leap_steps)
        ).into());
    }
    let precond_matrix = settings.precond_mat.clone().unwrap_or(DMatrix::identity(n_vals, n_vals));
    if precond_matrix.nrows() != n_vals || precond_matrix.ncols() != n_vals {
        return Err(McmcError::DimensionMismatch { expected : n_vals, found : precond_matrix.nrows() }.into());
    }
    let precond_chol = Cholesky::new(precond_matrix).ok_or(McmcError::NotPositiveDefinite)?;
    let sqrt_precond_matrix = precond_chol.l();
    let inv_precond_matrix = precond_chol.inverse();
    let step_size = settings.step_size;

    let mut target = Target::new(target_log_kernel, settings.bounds.as_deref(), n_vals)?;
    let mut prev_draw = target.to_sampling_scale(initial_vals);
    let mut prev_grad = DVector::zeros(n_vals);
    let mut prev_lp = target.eval(&prev_draw, Some(&mut prev_grad))?;

    let mut draws_out = DMatrix::zeros(settings.n_draws, n_vals);
    let mut n_accept = 0;
    let mut r = DVector::zeros(n_vals);

    let bar = progress_bar(settings.n_draws + settings.n_burnin, settings.progress, "hmc");
    for jj in 0..(settings.n_draws + settings.n_burnin) {
        fill_with_std_normal(&mut r, rng);
        let mut new_mntm = &sqrt_precond_matrix * &r;
        let prev_k = new_mntm.dot(&(&inv_precond_matrix * &new_mntm)) / 2.0;

        let mut new_draw = prev_draw.clone();
        let mut new_grad = prev_grad.clone();
        let mut new_lp = prev_lp;
        for _ in 0..settings.n_leap_steps {
            new_mntm += &new_grad * (0.5 * step_size);
            new_draw += (&inv_precond_matrix * &new_mntm) * step_size;
            new_lp = target.eval(&new_draw, Some(&mut new_grad))?;
            new_mntm += &new_grad * (0.5 * step_size);
            if !new_lp.is_finite() {
                break;
            }
        }
        let prop_k = new_mntm.dot(&(&inv_precond_matrix * &new_mntm)) / 2.0;

        let log_ratio = (new_lp - prop_k) - (prev_lp - prev_k);
        let comp_val = if log_ratio.is_finite() { log_ratio.min(0.0) } else { f64::NEG_INFINITY };
        let z : f64 = rng.gen();

        if z < comp_val.exp() {
            prev_draw = new_draw;
            prev_grad = new_grad;
            prev_lp = new_lp;
            if jj >= settings.n_burnin {
                n_accept += 1;
            }
        }
        if jj >= settings.n_burnin {
            draws_out.row_mut(jj - settings.n_burnin).tr_copy_from(&target.to_original_scale(&prev_draw));
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    let accept_rate = if settings.n_draws > 0 { n_accept as f64 / settings.n_draws as f64 } else { 0.0 };
    tracing::debug!(accept_rate, n_draws = settings.n_draws, "hmc finished");
    Ok(HMCOutput { draws_out, accept_rate })
}

#[cfg(test)]
mod tests {

    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    // N(mu, diag(sd^2)) log-kernel with gradient.
    fn gaussian_kernel(mu : DVector<f64>, sd : DVector<f64>) -> impl FnMut(&DVector<f64>, Option<&mut DVector<f64>>) -> Result<f64, McmcError> {
        move |x : &DVector<f64>, grad : Option<&mut DVector<f64>>| {
            let z = (x - &mu).component_div(&sd);
            if let Some(g) = grad {
                g.copy_from(&(-z.component_div(&sd)));
            }
            Ok(-0.5 * z.dot(&z))
        }
    }

    #[test]
    fn hmc_recovers_gaussian_moments() {
        let mut rng = StdRng::seed_from_u64(42);
        let mu = DVector::from_column_slice(&[1.0, -2.0]);
        let sd = DVector::from_column_slice(&[0.5, 2.0]);
        let settings = HMCSettings { n_draws : 4_000, n_burnin : 200, step_size : 0.2, n_leap_steps : 10, ..Default::default() };
        let out = hmc(&DVector::zeros(2), gaussian_kernel(mu.clone(), sd.clone()), &settings, &mut rng).unwrap();
        for c in 0..2 {
            let col = out.draws_out.column(c);
            assert!((col.mean() - mu[c]).abs() < 0.15 * sd[c] + 0.05);
            assert!((col.variance().sqrt() - sd[c]).abs() < 0.2 * sd[c]);
        }
        assert!(out.accept_rate > 0.5);
    }

    #[test]
    fn hmc_rejects_non_positive_step() {
        let mut rng = StdRng::seed_from_u64(0);
        let settings = HMCSettings { step_size : 0.0, ..Default::default() };
        let res = hmc(&DVector::zeros(1), gaussian_kernel(DVector::zeros(1), DVector::from_element(1, 1.0)), &settings, &mut rng);
        assert!(matches!(res, Err(McmcError::InvalidSettings(_))));
    }

    #[test]
    fn hmc_rejects_indefinite_preconditioner() {
        let mut rng = StdRng::seed_from_u64(0);
        let settings = HMCSettings { precond_mat : Some(DMatrix::from_element(1, 1, -1.0)), ..Default::default() };
        let res = hmc(&DVector::zeros(1), gaussian_kernel(DVector::zeros(1), DVector::from_element(1, 1.0)), &settings, &mut rng);
        assert!(matches!(res, Err(McmcError::NotPositiveDefinite)));
    }

}
