use super::*;

// Energy error above which a trajectory is flagged as divergent.
const MAX_DELTA_H : f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct NUTSSettings {
    pub n_draws : usize,

    /// Number of initial draws during which the step size is adapted. Those
    /// draws are still returned; callers usually drop them afterwards.
    pub n_adapt : usize,

    pub target_accept : f64,
    pub max_tree_depth : usize,

    /// Initial step size. If None, a heuristic search doubles/halves a unit
    /// step until the acceptance probability of one leapfrog step crosses 0.5.
    pub step_size : Option<f64>,

    pub bounds : Option<Vec<Bound>>,
    pub progress : bool
}

impl Default for NUTSSettings {

    fn default() -> Self {
        Self {
            n_draws : 1_000,
            n_adapt : 100,
            target_accept : 0.8,
            max_tree_depth : 10,
            step_size : None,
            bounds : None,
            progress : false
        }
    }

}

#[derive(Debug, Clone)]
pub struct NUTSOutput {
    pub draws_out : DMatrix<f64>,

    /// Mean acceptance statistic over all draws.
    pub accept_rate : f64,

    /// Step size in use at the end of the run.
    pub step_size : f64,

    /// Divergent trajectories after adaptation.
    pub n_divergences : usize,

    /// Divergent trajectories while the step size was being adapted.
    pub n_adapt_divergences : usize
}

#[derive(Clone)]
struct PhasePoint {
    q : DVector<f64>,
    p : DVector<f64>,
    grad : DVector<f64>,
    logp : f64
}

impl PhasePoint {

    fn energy(&self) -> f64 {
        -self.logp + 0.5 * self.p.dot(&self.p)
    }

}

struct Subtree {
    left : PhasePoint,
    right : PhasePoint,
    proposal : PhasePoint,
    log_sum_weight : f64,
    sum_accept : f64,
    n_leaves : usize,
    turning : bool,
    diverging : bool
}

fn log_sum_exp(a : f64, b : f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

// (q_right - q_left) . p_left < 0 or (q_right - q_left) . p_right < 0
fn is_turning(left : &PhasePoint, right : &PhasePoint) -> bool {
    let dq = &right.q - &left.q;
    dq.dot(&left.p) < 0.0 || dq.dot(&right.p) < 0.0
}

fn leapfrog<F, E>(target : &mut Target<'_, F, E>, point : &PhasePoint, eps : f64) -> Result<PhasePoint, E>
where
    F : FnMut(&DVector<f64>, Option<&mut DVector<f64>>) -> Result<f64, E>
{
    let mut p = &point.p + &point.grad * (0.5 * eps);
    let q = &point.q + &p * eps;
    let mut grad = DVector::zeros(q.nrows());
    let logp = target.eval(&q, Some(&mut grad))?;
    p += &grad * (0.5 * eps);
    Ok(PhasePoint { q, p, grad, logp })
}

/// Builds a balanced subtree of 2^depth leapfrog steps starting from point,
/// in the direction given by the sign of eps.
fn build_subtree<F, E, R>(
    target : &mut Target<'_, F, E>,
    point : &PhasePoint,
    eps : f64,
    h0 : f64,
    depth : usize,
    rng : &mut R
) -> Result<Subtree, E>
where
    F : FnMut(&DVector<f64>, Option<&mut DVector<f64>>) -> Result<f64, E>,
    R : Rng + ?Sized
{
    if depth == 0 {
        let next = leapfrog(target, point, eps)?;
        let delta_h = next.energy() - h0;
        let diverging = !delta_h.is_finite() || delta_h > MAX_DELTA_H;
        let log_weight = if diverging { f64::NEG_INFINITY } else { -delta_h };
        let sum_accept = if diverging { 0.0 } else { (-delta_h).min(0.0).exp() };
        return Ok(Subtree {
            left : next.clone(),
            right : next.clone(),
            proposal : next,
            log_sum_weight : log_weight,
            sum_accept,
            n_leaves : 1,
            turning : false,
            diverging
        });
    }

    let inner = build_subtree(target, point, eps, h0, depth - 1, rng)?;
    if inner.diverging || inner.turning {
        return Ok(inner);
    }

    let start = if eps > 0.0 { &inner.right } else { &inner.left };
    let outer = build_subtree(target, start, eps, h0, depth - 1, rng)?;

    let sum_accept = inner.sum_accept + outer.sum_accept;
    let n_leaves = inner.n_leaves + outer.n_leaves;
    if outer.diverging || outer.turning {
        return Ok(Subtree {
            sum_accept,
            n_leaves,
            turning : outer.turning,
            diverging : outer.diverging,
            ..inner
        });
    }

    let log_sum = log_sum_exp(inner.log_sum_weight, outer.log_sum_weight);
    let accept_outer = (outer.log_sum_weight - log_sum).exp();
    let proposal = if rng.gen::<f64>() < accept_outer {
        outer.proposal
    } else {
        inner.proposal
    };

    let (left, right) = if eps > 0.0 {
        (inner.left, outer.right)
    } else {
        (outer.left, inner.right)
    };
    let turning = is_turning(&left, &right);

    Ok(Subtree {
        left,
        right,
        proposal,
        log_sum_weight : log_sum,
        sum_accept,
        n_leaves,
        turning,
        diverging : false
    })
}

struct Transition {
    next : PhasePoint,
    accept_stat : f64,
    diverging : bool
}

/// One NUTS transition: the trajectory is doubled in a random direction until
/// it makes a U-turn, diverges or reaches the maximum depth. The next state is
/// drawn from the trajectory leaves with multinomial weights exp(-H).
fn transition<F, E, R>(
    target : &mut Target<'_, F, E>,
    current : &PhasePoint,
    eps : f64,
    max_depth : usize,
    rng : &mut R
) -> Result<Transition, E>
where
    F : FnMut(&DVector<f64>, Option<&mut DVector<f64>>) -> Result<f64, E>,
    R : Rng + ?Sized
{
    let h0 = current.energy();
    let mut left = current.clone();
    let mut right = current.clone();
    let mut proposal = current.clone();
    let mut log_sum_weight = 0.0;
    let mut sum_accept = 0.0;
    let mut n_leaves = 0;
    let mut diverging = false;

    for depth in 0..max_depth {
        let forward = rng.gen::<bool>();
        let subtree = if forward {
            build_subtree(target, &right, eps, h0, depth, rng)?
        } else {
            build_subtree(target, &left, -eps, h0, depth, rng)?
        };
        sum_accept += subtree.sum_accept;
        n_leaves += subtree.n_leaves;

        if subtree.diverging {
            diverging = true;
            break;
        }
        if subtree.turning {
            break;
        }

        // Biased progressive sampling towards the new subtree.
        let accept_prob = (subtree.log_sum_weight - log_sum_weight).min(0.0).exp();
        if rng.gen::<f64>() < accept_prob {
            proposal = subtree.proposal;
        }
        log_sum_weight = log_sum_exp(log_sum_weight, subtree.log_sum_weight);

        if forward {
            right = subtree.right;
        } else {
            left = subtree.left;
        }
        if is_turning(&left, &right) {
            break;
        }
    }

    let accept_stat = if n_leaves > 0 { sum_accept / n_leaves as f64 } else { 0.0 };
    Ok(Transition { next : proposal, accept_stat, diverging })
}

fn find_reasonable_step_size<F, E, R>(
    target : &mut Target<'_, F, E>,
    current : &PhasePoint,
    rng : &mut R
) -> Result<f64, E>
where
    F : FnMut(&DVector<f64>, Option<&mut DVector<f64>>) -> Result<f64, E>,
    R : Rng + ?Sized
{
    let mut start = current.clone();
    fill_with_std_normal(&mut start.p, rng);
    let h0 = start.energy();
    let log_half = 0.5f64.ln();
    let mut eps = 1.0;
    let log_ratio = h0 - leapfrog(target, &start, eps)?.energy();
    let direction = if log_ratio.is_finite() && log_ratio > log_half { 1.0 } else { -1.0 };
    for _ in 0..50 {
        let lr = h0 - leapfrog(target, &start, eps)?.energy();
        if direction > 0.0 && !(lr > log_half) {
            break;
        }
        if direction < 0.0 && lr.is_finite() && lr > log_half {
            break;
        }
        eps *= 2.0f64.powf(direction);
    }
    Ok(eps.clamp(1E-10, 1E3))
}

/// Dual-averaging step size adaptation (Hoffman & Gelman, 2014).
struct DualAveraging {
    mu : f64,
    target : f64,
    h_bar : f64,
    log_eps_bar : f64,
    count : f64
}

impl DualAveraging {

    const GAMMA : f64 = 0.05;

    const T0 : f64 = 10.0;

    const KAPPA : f64 = 0.75;

    fn new(eps : f64, target : f64) -> Self {
        Self { mu : (10.0 * eps).ln(), target, h_bar : 0.0, log_eps_bar : eps.ln(), count : 0.0 }
    }

    /// Returns the step size for the next adaptation step.
    fn update(&mut self, accept_stat : f64) -> f64 {
        self.count += 1.0;
        let m = self.count;
        let w = 1.0 / (m + Self::T0);
        self.h_bar = (1.0 - w) * self.h_bar + w * (self.target - accept_stat);
        let log_eps = self.mu - (m.sqrt() / Self::GAMMA) * self.h_bar;
        let m_pow = m.powf(-Self::KAPPA);
        self.log_eps_bar = m_pow * log_eps + (1.0 - m_pow) * self.log_eps_bar;
        log_eps.exp()
    }

    fn final_step_size(&self) -> f64 {
        self.log_eps_bar.exp()
    }

}

/// No-U-Turn sampler with multinomial trajectory sampling and unit mass matrix.
pub fn nuts<E, R>(
    initial_vals : &DVector<f64>,
    target_log_kernel : impl FnMut(&DVector<f64>, Option<&mut DVector<f64>>)->Result<f64, E>,
    settings : &NUTSSettings,
    rng : &mut R
) -> Result<NUTSOutput, E>
where
    E : From<McmcError>,
    R : Rng + ?Sized
{
    let n_vals = initial_vals.nrows();
    if !(settings.target_accept > 0.0 && settings.target_accept < 1.0) {
        return Err(McmcError::InvalidSettings(format!("target acceptance must lie in (0, 1) (got {})", settings.target_accept)).into());
    }
    if settings.max_tree_depth == 0 {
        return Err(McmcError::InvalidSettings(String::from("maximum tree depth must be positive")).into());
    }
    if let Some(eps) = settings.step_size {
        if !(eps > 0.0) {
            return Err(McmcError::InvalidSettings(format!("step size must be positive (got {})", eps)).into());
        }
    }

    let mut target = Target::new(target_log_kernel, settings.bounds.as_deref(), n_vals)?;
    let q = target.to_sampling_scale(initial_vals);
    let mut grad = DVector::zeros(n_vals);
    let logp = target.eval(&q, Some(&mut grad))?;
    let mut current = PhasePoint { q, p : DVector::zeros(n_vals), grad, logp };

    let mut step_size = match settings.step_size {
        Some(eps) => eps,
        None => find_reasonable_step_size(&mut target, &current, rng)?
    };
    let mut adaptation = DualAveraging::new(step_size, settings.target_accept);

    let mut draws_out = DMatrix::zeros(settings.n_draws, n_vals);
    let mut sum_accept = 0.0;
    let mut n_divergences = 0;
    let mut n_adapt_divergences = 0;

    let bar = progress_bar(settings.n_draws, settings.progress, "nuts");
    for jj in 0..settings.n_draws {
        fill_with_std_normal(&mut current.p, rng);
        let tr = transition(&mut target, &current, step_size, settings.max_tree_depth, rng)?;
        current = tr.next;
        if tr.diverging {
            if jj < settings.n_adapt {
                n_adapt_divergences += 1;
            } else {
                n_divergences += 1;
            }
        }
        sum_accept += tr.accept_stat;

        if jj < settings.n_adapt {
            step_size = adaptation.update(tr.accept_stat);
            if jj + 1 == settings.n_adapt {
                step_size = adaptation.final_step_size();
                tracing::debug!(step_size, "nuts adaptation finished");
            }
        }

        draws_out.row_mut(jj).tr_copy_from(&target.to_original_scale(&current.q));
        bar.inc(1);
    }
    bar.finish_and_clear();

    let accept_rate = if settings.n_draws > 0 { sum_accept / settings.n_draws as f64 } else { 0.0 };
    if n_divergences > 0 {
        tracing::warn!(n_divergences, "nuts trajectories diverged");
    }
    tracing::debug!(accept_rate, step_size, n_adapt_divergences, n_draws = settings.n_draws, "nuts finished");
    Ok(NUTSOutput { draws_out, accept_rate, step_size, n_divergences, n_adapt_divergences })
}
