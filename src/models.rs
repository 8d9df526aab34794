use nalgebra::DVector;
use rand::Rng;
use crate::error::ModelError;
use crate::gradient::FixedTrialsBinomial;
use crate::graph::{BayesNet, VertexId};

/// Hierarchical model of batting averages (Efron & Morris, 1975). The ability of
/// each player is Beta-distributed around a population mean phi, with a
/// concentration kappa sharing a Pareto-like tail:
///
/// phi ~ U(0, 1)
/// k_base ~ Exp(1), kappa = 1.5 exp(k_base)
/// theta[i] ~ Beta(kappa phi, kappa (1 - phi))
/// hits[i] ~ Binomial(theta[i], at_bats[i])
///
/// The hit counts use the fixed-trials gradient, so gradient-based samplers
/// can move the abilities.
#[derive(Debug, Clone)]
pub struct Baseball {
    pub net : BayesNet,
    pub phi : VertexId,
    pub k_base : VertexId,
    pub kappa : VertexId,
    pub thetas : VertexId,
    pub ys : VertexId
}

impl Baseball {

    pub fn build(hits : &[u32], at_bats : &[u32]) -> Result<Self, ModelError> {
        let n = hits.len();
        let mut net = BayesNet::new();
        let phi = net.uniform(1, 0.0, 1.0)?;
        let k_base = net.exponential(1, 1.0)?;
        let e = net.exp(k_base)?;
        let kappa = net.mul(e, 1.5)?;
        let alpha = net.mul(kappa, phi)?;
        let one_minus_phi = net.sub(1.0, phi)?;
        let beta = net.mul(kappa, one_minus_phi)?;
        let thetas = net.beta(n, alpha, beta)?;
        let trials = net.constant(DVector::from_iterator(at_bats.len(), at_bats.iter().map(|a| *a as f64 )));
        let ys = net.binomial(n, thetas, trials)?;
        net.observe(ys, DVector::from_iterator(n, hits.iter().map(|h| *h as f64 )))?;
        net.override_d_log_prob(ys, FixedTrialsBinomial)?;
        for (id, name) in [(phi, "phi"), (k_base, "k_base"), (kappa, "kappa"), (thetas, "thetas"), (ys, "ys")] {
            net.label(id, name)?;
        }
        Ok(Self { net, phi, k_base, kappa, thetas, ys })
    }

    /// Latents connected to the hit counts: phi, k_base and thetas.
    pub fn latents(&self) -> Vec<VertexId> {
        self.net.connected_latents(self.ys).unwrap_or_default()
    }

    /// Draws a new starting state from the priors, one latent at a time (so
    /// each latent is drawn conditional on the ones before it).
    pub fn shuffle<R>(&mut self, rng : &mut R) -> Result<(), ModelError>
    where
        R : Rng + ?Sized
    {
        for id in self.latents() {
            let v = self.net.sample(id, rng)?;
            self.net.set_and_cascade(id, v)?;
        }
        Ok(())
    }

    /// Concentration implied by a value of k_base.
    pub fn kappa_of(k_base : f64) -> f64 {
        1.5 * k_base.exp()
    }

}

/// Observed treatment effects (y) and their standard errors (sigma) for the
/// eight schools of Rubin (1981).
pub const SCHOOLS_Y : [f64; 8] = [28.0, 8.0, -3.0, 7.0, -1.0, 1.0, 18.0, 12.0];

pub const SCHOOLS_SIGMA : [f64; 8] = [15.0, 10.0, 16.0, 11.0, 9.0, 11.0, 10.0, 18.0];

/// Eight schools model, with the non-centered parameterization of the school effects:
///
/// eta[j] ~ N(0, 1)
/// mu ~ N(0, 1e6)
/// tau ~ HalfCauchy(25)
/// theta[j] = mu + tau eta[j]
/// y[j] ~ N(theta[j], sigma[j])
#[derive(Debug, Clone)]
pub struct EightSchools {
    pub net : BayesNet,
    pub eta : VertexId,
    pub mu : VertexId,
    pub tau : VertexId,
    pub theta : VertexId,
    pub obs : VertexId
}

impl EightSchools {

    pub fn build(y : &[f64], sigma : &[f64]) -> Result<Self, ModelError> {
        let n = y.len();
        let mut net = BayesNet::new();
        let eta = net.gaussian(n, 0.0, 1.0)?;
        let mu = net.gaussian(1, 0.0, 1e6)?;
        let tau = net.half_cauchy(1, 25.0)?;
        let scaled = net.mul(tau, eta)?;
        let theta = net.add(mu, scaled)?;
        let sigma = net.constant(DVector::from_column_slice(sigma));
        let obs = net.gaussian(n, theta, sigma)?;
        net.observe(obs, DVector::from_column_slice(y))?;
        for (id, name) in [(eta, "eta"), (mu, "mu"), (tau, "tau"), (theta, "theta"), (obs, "obs")] {
            net.label(id, name)?;
        }
        Ok(Self { net, eta, mu, tau, theta, obs })
    }

    pub fn schools() -> Result<Self, ModelError> {
        Self::build(&SCHOOLS_Y, &SCHOOLS_SIGMA)
    }

    pub fn latents(&self) -> Vec<VertexId> {
        self.net.connected_latents(self.obs).unwrap_or_default()
    }

}
