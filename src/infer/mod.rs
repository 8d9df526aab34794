use nalgebra::DVector;
use rand::Rng;
use std::collections::HashMap;
use mcmclib::{Bound, RWMHSettings, HMCSettings, NUTSSettings};
use crate::config::SamplerConfig;
use crate::error::ModelError;
use crate::graph::{BayesNet, VertexId};

mod samples;

pub use samples::*;

/// Position of each latent vertex within the flat parameter vector the
/// samplers work with. Vertex values are concatenated in the informed order.
#[derive(Debug, Clone)]
struct LatentLayout {
    ids : Vec<VertexId>,
    lens : Vec<usize>,
    total : usize
}

impl LatentLayout {

    fn new(net : &BayesNet, latents : &[VertexId]) -> Result<Self, ModelError> {
        if latents.is_empty() {
            return Err(ModelError::NoLatents);
        }
        let mut lens = Vec::with_capacity(latents.len());
        for id in latents.iter() {
            let vertex = net.vertex(*id)?;
            let distr = vertex.distr().ok_or(ModelError::NotProbabilistic(*id))?;
            if distr.is_discrete() {
                return Err(ModelError::DiscreteLatent(*id));
            }
            if vertex.observed {
                return Err(ModelError::InvalidState(format!("Vertex {} is observed and cannot be sampled", id)));
            }
            lens.push(vertex.len());
        }
        let total = lens.iter().sum();
        Ok(Self { ids : latents.to_vec(), lens, total })
    }

    fn values(&self, net : &BayesNet) -> Result<DVector<f64>, ModelError> {
        let mut out = DVector::zeros(self.total);
        let mut offset = 0;
        for (id, len) in self.ids.iter().zip(self.lens.iter()) {
            out.rows_mut(offset, *len).copy_from(net.value(*id)?);
            offset += len;
        }
        Ok(out)
    }

    /// Sets every latent from the flat vector, then updates the deterministic
    /// vertices downstream of them.
    fn write(&self, net : &mut BayesNet, vals : &DVector<f64>) -> Result<(), ModelError> {
        let mut offset = 0;
        for (id, len) in self.ids.iter().zip(self.lens.iter()) {
            net.set_value(*id, vals.rows(offset, *len).clone_owned())?;
            offset += len;
        }
        net.cascade_from(&self.ids)
    }

    fn gather(&self, grads : &HashMap<VertexId, DVector<f64>>, out : &mut DVector<f64>) {
        let mut offset = 0;
        for (id, len) in self.ids.iter().zip(self.lens.iter()) {
            match grads.get(id) {
                Some(g) => out.rows_mut(offset, *len).copy_from(g),
                None => out.rows_mut(offset, *len).fill(0.0)
            }
            offset += len;
        }
    }

    /// Supports of the latents. Parameter-dependent supports (e.g. the bounds
    /// of a uniform) are only used when all parameters are constants.
    fn bounds(&self, net : &BayesNet) -> Result<Vec<Bound>, ModelError> {
        let mut bounds = Vec::with_capacity(self.total);
        for id in self.ids.iter() {
            let view = net.view(*id)?;
            let fixed = view.params.iter().all(|p| p.constant );
            let params : Vec<_> = view.params.iter().map(|p| p.value ).collect();
            bounds.extend(view.distr.bounds(&params, view.value.nrows(), fixed));
        }
        Ok(bounds)
    }

}

// Flat log-kernel over the latents: writes the proposal into the network, then
// evaluates the joint log-probability (and its gradient, when asked for).
fn log_kernel<'a>(
    net : &'a mut BayesNet,
    layout : &'a LatentLayout
) -> impl FnMut(&DVector<f64>, Option<&mut DVector<f64>>) -> Result<f64, ModelError> + 'a {
    move |vals : &DVector<f64>, grad : Option<&mut DVector<f64>>| {
        layout.write(net, vals)?;
        match grad {
            Some(g) => {
                let (lp, grads) = net.log_prob_gradient(&layout.ids)?;
                layout.gather(&grads, g);
                Ok(lp)
            },
            None => net.log_prob()
        }
    }
}

fn prepare(net : &BayesNet, latents : &[VertexId], transform_bounds : bool) -> Result<(LatentLayout, DVector<f64>, Option<Vec<Bound>>), ModelError> {
    let layout = LatentLayout::new(net, latents)?;
    let lp = net.log_prob()?;
    if !lp.is_finite() {
        return Err(ModelError::InvalidState(format!("Initial state has log-probability {}", lp)));
    }
    let init = layout.values(net)?;
    let bounds = if transform_bounds {
        Some(layout.bounds(net)?)
    } else {
        None
    };
    Ok((layout, init, bounds))
}

// Leaves the network at the last draw of the chain.
fn finish(net : &mut BayesNet, layout : &LatentLayout, draws : &nalgebra::DMatrix<f64>) -> Result<(), ModelError> {
    if draws.nrows() > 0 {
        let last = draws.row(draws.nrows() - 1).transpose();
        layout.write(net, &last)?;
    }
    Ok(())
}

/// Posterior samples of the latents by random-walk Metropolis-Hastings. The chain
/// starts at the current values of the latents, which must have finite joint
/// log-probability; at the end, the network is left at the last draw.
pub fn metropolis_hastings<R>(
    net : &mut BayesNet,
    latents : &[VertexId],
    config : &SamplerConfig,
    rng : &mut R
) -> Result<NetworkSamples, ModelError>
where
    R : Rng + ?Sized
{
    let cfg = &config.metropolis;
    let (layout, init, bounds) = prepare(net, latents, cfg.transform_bounds)?;
    let settings = RWMHSettings {
        n_draws : cfg.sample_count,
        n_burnin : 0,
        par_scale : cfg.proposal_scale,
        cov_mat : None,
        bounds,
        progress : config.progress
    };
    tracing::info!(n_latents = layout.total, n_draws = cfg.sample_count, "starting metropolis-hastings");
    let out = mcmclib::rwmh(&init, log_kernel(net, &layout), &settings, rng)?;
    tracing::info!(accept_rate = out.accept_rate, "metropolis-hastings finished");
    finish(net, &layout, &out.draws_out)?;
    Ok(NetworkSamples::from_draws(&layout.ids, &layout.lens, &out.draws_out, out.accept_rate))
}

/// Posterior samples of the latents by Hamiltonian Monte Carlo with a fixed
/// step size and number of leapfrog steps. Every latent (and every vertex
/// depending on them) must provide a log-probability gradient.
pub fn hamiltonian<R>(
    net : &mut BayesNet,
    latents : &[VertexId],
    config : &SamplerConfig,
    rng : &mut R
) -> Result<NetworkSamples, ModelError>
where
    R : Rng + ?Sized
{
    let cfg = &config.hamiltonian;
    let (layout, init, bounds) = prepare(net, latents, cfg.transform_bounds)?;
    let settings = HMCSettings {
        n_draws : cfg.sample_count,
        n_burnin : 0,
        step_size : cfg.step_size,
        n_leap_steps : cfg.leapfrog_count,
        precond_mat : None,
        bounds,
        progress : config.progress
    };
    tracing::info!(n_latents = layout.total, n_draws = cfg.sample_count, "starting hamiltonian monte carlo");
    let out = mcmclib::hmc(&init, log_kernel(net, &layout), &settings, rng)?;
    tracing::info!(accept_rate = out.accept_rate, "hamiltonian monte carlo finished");
    finish(net, &layout, &out.draws_out)?;
    Ok(NetworkSamples::from_draws(&layout.ids, &layout.lens, &out.draws_out, out.accept_rate))
}

/// Posterior samples of the latents with the No-U-Turn sampler. The step size is
/// adapted over the first adapt_count draws, which are kept in the output.
pub fn nuts<R>(
    net : &mut BayesNet,
    latents : &[VertexId],
    config : &SamplerConfig,
    rng : &mut R
) -> Result<NetworkSamples, ModelError>
where
    R : Rng + ?Sized
{
    let cfg = &config.nuts;
    let (layout, init, bounds) = prepare(net, latents, cfg.transform_bounds)?;
    let settings = NUTSSettings {
        n_draws : cfg.sample_count,
        n_adapt : cfg.adapt_count,
        target_accept : cfg.target_acceptance,
        max_tree_depth : cfg.max_tree_depth,
        step_size : cfg.initial_step_size,
        bounds,
        progress : config.progress
    };
    tracing::info!(n_latents = layout.total, n_draws = cfg.sample_count, "starting nuts");
    let out = mcmclib::nuts(&init, log_kernel(net, &layout), &settings, rng)?;
    tracing::info!(accept_rate = out.accept_rate, step_size = out.step_size, n_divergences = out.n_divergences, "nuts finished");
    finish(net, &layout, &out.draws_out)?;
    Ok(NetworkSamples::from_draws(&layout.ids, &layout.lens, &out.draws_out, out.accept_rate))
}
