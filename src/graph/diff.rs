use nalgebra::DVector;
use std::collections::HashMap;
use crate::error::ModelError;
use crate::tensor;
use super::{BayesNet, VertexId, Op};

// Reverse accumulation of the joint log-probability. Every probabilistic vertex
// contributes the partials of its log-density to its own adjoint and to the
// adjoints of its parameters; the adjoints of deterministic vertices are then
// pushed to their operands in reverse topological order. Only vertices whose
// value depends on some vertex at wrt carry an adjoint.
pub(crate) fn log_prob_gradient(
    net : &BayesNet,
    wrt : &[VertexId]
) -> Result<(f64, HashMap<VertexId, DVector<f64>>), ModelError> {
    let n = net.len();
    let mut depends = vec![false; n];
    for id in wrt {
        if !net.vertex(*id)?.is_probabilistic() {
            return Err(ModelError::NotProbabilistic(*id));
        }
        depends[id.index()] = true;
    }
    for id in net.ids() {
        let vertex = net.vertex(id)?;
        if vertex.op.is_deterministic() {
            depends[id.index()] = vertex.op.parents().iter().any(|p| depends[p.index()] );
        }
    }

    let mut adjoints : Vec<Option<DVector<f64>>> = net.ids()
        .map(|id| {
            if depends[id.index()] {
                net.vertex(id).ok().map(|v| DVector::zeros(v.len()) )
            } else {
                None
            }
        })
        .collect();

    let mut lp = 0.0;
    for id in net.ids() {
        let vertex = net.vertex(id)?;
        let (distr, params) = match &vertex.op {
            Op::Probabilistic { distr, params } => (distr, params),
            _ => continue
        };
        let param_vals = net.values_of(params)?;
        lp += distr.log_prob(&param_vals, &vertex.value);

        let needs_grad = depends[id.index()] || params.iter().any(|p| depends[p.index()] );
        if !needs_grad {
            continue;
        }

        if let Some(d_log_prob) = &vertex.d_log_prob {
            let partials = d_log_prob.d_log_prob(&net.view(id)?)?;
            for (target, grad) in partials {
                accumulate(net, &mut adjoints, target, grad)?;
            }
        } else {
            let partials = distr.partials(&param_vals, &vertex.value, id)?;
            accumulate(net, &mut adjoints, id, partials.wrt_value)?;
            for (p, grad) in params.iter().zip(partials.wrt_params.into_iter()) {
                accumulate(net, &mut adjoints, *p, grad)?;
            }
        }
    }

    let det : Vec<VertexId> = net.ids().filter(|id| depends[id.index()] ).collect();
    for id in det.into_iter().rev() {
        let vertex = net.vertex(id)?;
        let adj = match (&vertex.op, &adjoints[id.index()]) {
            (Op::Unary(..), Some(adj)) | (Op::Binary(..), Some(adj)) => adj.clone(),
            _ => continue
        };
        match &vertex.op {
            Op::Unary(op, a) => {
                let va = net.value(*a)?;
                let grad = DVector::from_fn(adj.nrows(), |i, _| adj[i] * op.derivative(va[i]) );
                accumulate(net, &mut adjoints, *a, grad)?;
            },
            Op::Binary(op, a, b) => {
                let (va, vb) = (net.value(*a)?, net.value(*b)?);
                let mut ga = DVector::zeros(adj.nrows());
                let mut gb = DVector::zeros(adj.nrows());
                for i in 0..adj.nrows() {
                    let (da, db) = op.derivatives(tensor::at(va, i), tensor::at(vb, i));
                    ga[i] = adj[i] * da;
                    gb[i] = adj[i] * db;
                }
                accumulate(net, &mut adjoints, *a, ga)?;
                accumulate(net, &mut adjoints, *b, gb)?;
            },
            _ => { }
        }
    }

    let mut grads = HashMap::new();
    for id in wrt {
        if let Some(adj) = adjoints[id.index()].take() {
            grads.insert(*id, adj);
        }
    }
    Ok((lp, grads))
}

// Adds a gradient to the adjoint of target, summing over broadcast positions.
// Targets that do not depend on the differentiation variables are skipped.
fn accumulate(
    net : &BayesNet,
    adjoints : &mut [Option<DVector<f64>>],
    target : VertexId,
    grad : DVector<f64>
) -> Result<(), ModelError> {
    let len = net.vertex(target)?.len();
    if let Some(adj) = adjoints[target.index()].as_mut() {
        if grad.nrows() != len && grad.nrows() != 1 && len != 1 {
            return Err(ModelError::ShapeMismatch { vertex : target, expected : len, found : grad.nrows() });
        }
        *adj += tensor::reduce_to(grad, len);
    }
    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;

    fn numeric_gradient(net : &mut BayesNet, id : VertexId) -> DVector<f64> {
        let h = 1E-6;
        let x0 = net.value(id).unwrap().clone();
        let mut out = DVector::zeros(x0.nrows());
        for i in 0..x0.nrows() {
            let mut up = x0.clone();
            up[i] += h;
            net.set_and_cascade(id, up).unwrap();
            let lp_up = net.log_prob().unwrap();
            let mut down = x0.clone();
            down[i] -= h;
            net.set_and_cascade(id, down).unwrap();
            let lp_down = net.log_prob().unwrap();
            out[i] = (lp_up - lp_down) / (2.0 * h);
        }
        net.set_and_cascade(id, x0).unwrap();
        out
    }

    #[test]
    fn gradient_through_deterministic_operators() {
        let mut net = BayesNet::new();
        let a = net.gaussian(1, 0.5, 1.0).unwrap();
        let b = net.exponential(1, 2.0).unwrap();
        let ea = net.exp(a).unwrap();
        let scale = net.div(ea, b).unwrap();
        let one_minus = net.sub(1.0, b).unwrap();
        let mu = net.mul(one_minus, a).unwrap();
        let m = net.neg(mu).unwrap();
        let x = net.gaussian(3, m, scale).unwrap();
        net.observe(x, DVector::from_column_slice(&[0.3, -0.2, 1.1])).unwrap();
        net.set_and_cascade(a, DVector::from_element(1, 0.2)).unwrap();
        net.set_and_cascade(b, DVector::from_element(1, 0.7)).unwrap();

        let (lp, grads) = net.log_prob_gradient(&[a, b]).unwrap();
        assert!((lp - net.log_prob().unwrap()).abs() < 1E-12);
        for id in [a, b] {
            let expected = numeric_gradient(&mut net, id);
            assert!((&grads[&id] - expected).amax() < 1E-5);
        }
    }

    #[test]
    fn gradient_of_vector_latent_with_scalar_hyperparameter() {
        let mut net = BayesNet::new();
        let tau = net.half_cauchy(1, 2.0).unwrap();
        let eta = net.gaussian(4, 0.0, 1.0).unwrap();
        let theta = net.mul(tau, eta).unwrap();
        let y = net.gaussian(4, theta, 1.5).unwrap();
        net.observe(y, DVector::from_column_slice(&[1.0, 2.0, -1.0, 0.0])).unwrap();
        net.set_and_cascade(eta, DVector::from_column_slice(&[0.1, 0.5, -0.3, 0.2])).unwrap();

        let (_, grads) = net.log_prob_gradient(&[tau, eta]).unwrap();
        assert_eq!(grads[&tau].nrows(), 1);
        assert_eq!(grads[&eta].nrows(), 4);
        for id in [tau, eta] {
            let expected = numeric_gradient(&mut net, id);
            assert!((&grads[&id] - expected).amax() < 1E-5);
        }
    }

    #[test]
    fn gradient_requires_probabilistic_targets() {
        let mut net = BayesNet::new();
        let a = net.gaussian(1, 0.0, 1.0).unwrap();
        let b = net.exp(a).unwrap();
        assert_eq!(net.log_prob_gradient(&[b]).unwrap_err(), ModelError::NotProbabilistic(b));
    }

}
