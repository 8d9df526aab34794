use nalgebra::DVector;
use std::collections::HashMap;
use std::fmt::Debug;
use crate::distr::Distr;
use crate::error::ModelError;
use crate::graph::VertexId;
use crate::tensor;

/// Parameter of a probabilistic vertex, as seen by a gradient override.
#[derive(Debug, Clone)]
pub struct ParamView<'a> {

    pub id : VertexId,

    pub value : &'a DVector<f64>,

    /// Whether the parameter is a constant vertex (as opposed to a random
    /// variable or a function of random variables).
    pub constant : bool

}

/// Probabilistic vertex, as seen by a gradient override.
#[derive(Debug, Clone)]
pub struct VertexView<'a> {

    pub id : VertexId,

    pub distr : Distr,

    pub value : &'a DVector<f64>,

    pub observed : bool,

    /// Parameters, in the order of the distribution.
    pub params : Vec<ParamView<'a>>

}

/// Extension point for the log-probability gradient of a probabilistic vertex.
/// An implementor returns the partial derivatives of the vertex log-density with
/// respect to any subset of the vertices it reads from (or itself), keyed by
/// vertex. Gradients may have the length of the vertex value; they are summed
/// over broadcast positions when the target is shorter.
pub trait DLogProb
where
    Self : Debug + Send + Sync
{

    fn d_log_prob(&self, vertex : &VertexView<'_>) -> Result<HashMap<VertexId, DVector<f64>>, ModelError>;

}

/// Elementwise d ln Binomial(k | n, p) / dp, that is, k/p - (n-k)/(1-p). It is evaluated as
/// k/p + (n-k)/(p-1). No guard is applied at p = 0 or p = 1, where the division yields
/// infinity or NaN.
pub fn binomial_d_log_prob_dp(p : &DVector<f64>, n : &DVector<f64>, k : &DVector<f64>) -> Result<DVector<f64>, ModelError> {
    let len = tensor::broadcast_len(&[p.nrows(), n.nrows(), k.nrows()])?;
    Ok(DVector::from_fn(len, |i, _| {
        let (p, n, k) = (tensor::at(p, i), tensor::at(n, i), tensor::at(k, i));
        k / p + (n - k) / (p - 1.0)
    }))
}

/// Inputs of the binomial gradient, together with the conditions under which
/// it is defined.
#[derive(Debug, Clone)]
pub struct GradientRequest<'a> {
    pub p : &'a DVector<f64>,
    pub n : &'a DVector<f64>,
    pub k : &'a DVector<f64>,
    pub n_constant : bool,
    pub k_observed : bool
}

impl<'a> GradientRequest<'a> {

    /// Gradient with respect to p, with the length of p.
    pub fn d_log_prob_dp(&self) -> Result<DVector<f64>, ModelError> {
        if !self.k_observed || !self.n_constant {
            return Err(ModelError::InvalidState(
                String::from("Can only calculate dLogProb if n is constant and k is observed")
            ));
        }
        let grad = binomial_d_log_prob_dp(self.p, self.n, self.k)?;
        Ok(tensor::reduce_to(grad, self.p.nrows()))
    }

}

/// Binomial gradient with respect to the success probability, for a count
/// that is observed over a constant number of trials. Installed over a
/// Binomial vertex with BayesNet::override_d_log_prob, this makes the
/// success probabilities reachable by gradient-based samplers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTrialsBinomial;

impl DLogProb for FixedTrialsBinomial {

    fn d_log_prob(&self, vertex : &VertexView<'_>) -> Result<HashMap<VertexId, DVector<f64>>, ModelError> {
        if vertex.distr != Distr::Binomial || vertex.params.len() != 2 {
            return Err(ModelError::InvalidState(format!("Vertex {} does not hold a binomial distribution", vertex.id)));
        }
        let (p, n) = (&vertex.params[0], &vertex.params[1]);
        let req = GradientRequest {
            p : p.value,
            n : n.value,
            k : vertex.value,
            n_constant : n.constant,
            k_observed : vertex.observed
        };
        let mut out = HashMap::new();
        out.insert(p.id, req.d_log_prob_dp()?);
        Ok(out)
    }

}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::BayesNet;
    use approx::assert_abs_diff_eq;

    fn scalar(v : f64) -> DVector<f64> {
        DVector::from_element(1, v)
    }

    fn request<'a>(p : &'a DVector<f64>, n : &'a DVector<f64>, k : &'a DVector<f64>) -> GradientRequest<'a> {
        GradientRequest { p, n, k, n_constant : true, k_observed : true }
    }

    #[test]
    fn agrees_with_textbook_form() {
        for &(p, n, k) in &[(0.1, 10.0, 3.0), (0.73, 45.0, 18.0), (0.5, 1.0, 0.0), (0.99, 7.0, 7.0)] {
            let (pv, nv, kv) = (scalar(p), scalar(n), scalar(k));
            let g = request(&pv, &nv, &kv).d_log_prob_dp().unwrap()[0];
            let expected = k / p - (n - k) / (1.0 - p);
            assert!((g - expected).abs() < 1E-9 * expected.abs().max(1.0));
        }
    }

    #[test]
    fn zero_at_symmetric_point() {
        let (p, n, k) = (scalar(0.5), scalar(10.0), scalar(5.0));
        assert_abs_diff_eq!(request(&p, &n, &k).d_log_prob_dp().unwrap()[0], 0.0, epsilon = 1E-12);
    }

    #[test]
    fn zero_at_likelihood_optimum() {
        let (p, n, k) = (scalar(0.2), scalar(100.0), scalar(20.0));
        assert_abs_diff_eq!(request(&p, &n, &k).d_log_prob_dp().unwrap()[0], 0.0, epsilon = 1E-9);
    }

    #[test]
    fn pulls_towards_maximum_likelihood() {
        let (n, k) = (scalar(10.0), scalar(2.0));
        let low = scalar(0.01);
        let high = scalar(0.99);
        assert!(request(&low, &n, &k).d_log_prob_dp().unwrap()[0] > 0.0);
        assert!(request(&high, &n, &k).d_log_prob_dp().unwrap()[0] < 0.0);
    }

    #[test]
    fn elementwise_over_arrays() {
        let p = DVector::from_column_slice(&[0.2, 0.5, 0.8]);
        let n = DVector::from_column_slice(&[10.0, 10.0, 20.0]);
        let k = DVector::from_column_slice(&[1.0, 5.0, 4.0]);
        let g = request(&p, &n, &k).d_log_prob_dp().unwrap();
        assert_eq!(g.nrows(), 3);
        for i in 0..3 {
            let expected = k[i] / p[i] - (n[i] - k[i]) / (1.0 - p[i]);
            assert!((g[i] - expected).abs() < 1E-9);
        }
    }

    #[test]
    fn shared_probability_sums_over_counts() {
        let p = scalar(0.3);
        let n = scalar(10.0);
        let k = DVector::from_column_slice(&[1.0, 4.0]);
        let g = request(&p, &n, &k).d_log_prob_dp().unwrap();
        let expected = (1.0 / 0.3 - 9.0 / 0.7) + (4.0 / 0.3 - 6.0 / 0.7);
        assert_eq!(g.nrows(), 1);
        assert!((g[0] - expected).abs() < 1E-9);
    }

    #[test]
    fn boundaries_are_not_guarded() {
        let (n, k) = (scalar(10.0), scalar(3.0));
        let zero = scalar(0.0);
        assert!(!request(&zero, &n, &k).d_log_prob_dp().unwrap()[0].is_finite());
    }

    #[test]
    fn fails_unless_observed_over_constant_trials() {
        let (p, n, k) = (scalar(0.4), scalar(10.0), scalar(3.0));
        let mut req = request(&p, &n, &k);
        req.k_observed = false;
        assert!(matches!(req.d_log_prob_dp(), Err(ModelError::InvalidState(_))));
        req.k_observed = true;
        req.n_constant = false;
        assert!(matches!(req.d_log_prob_dp(), Err(ModelError::InvalidState(_))));
    }

    #[test]
    fn override_reads_vertex_state() {
        let mut net = BayesNet::new();
        let p = net.beta(2, 2.0, 2.0).unwrap();
        let n = net.constant(DVector::from_column_slice(&[10.0, 20.0]));
        let k = net.binomial(2, p, n).unwrap();
        net.set_value(p, DVector::from_column_slice(&[0.25, 0.6])).unwrap();
        net.set_value(k, DVector::from_column_slice(&[3.0, 11.0])).unwrap();

        // Not observed yet.
        let view = net.view(k).unwrap();
        assert!(matches!(FixedTrialsBinomial.d_log_prob(&view), Err(ModelError::InvalidState(_))));

        net.observe(k, DVector::from_column_slice(&[3.0, 11.0])).unwrap();
        let grads = FixedTrialsBinomial.d_log_prob(&net.view(k).unwrap()).unwrap();
        assert_eq!(grads.len(), 1);
        let g = &grads[&p];
        assert!((g[0] - (3.0 / 0.25 - 7.0 / 0.75)).abs() < 1E-9);
        assert!((g[1] - (11.0 / 0.6 - 9.0 / 0.4)).abs() < 1E-9);
    }

    #[test]
    fn override_rejects_random_trial_count() {
        let mut net = BayesNet::new();
        let p = net.uniform(1, 0.0, 1.0).unwrap();
        let n = net.exponential(1, 0.1).unwrap();
        let k = net.binomial(1, p, n).unwrap();
        net.observe(k, scalar(3.0)).unwrap();
        let res = FixedTrialsBinomial.d_log_prob(&net.view(k).unwrap());
        assert_eq!(res.unwrap_err(), ModelError::InvalidState(String::from("Can only calculate dLogProb if n is constant and k is observed")));
    }

}
