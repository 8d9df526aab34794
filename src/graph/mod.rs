use nalgebra::DVector;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rand::Rng;
use std::collections::{HashMap, BTreeSet};
use std::sync::Arc;
use crate::distr::Distr;
use crate::error::ModelError;
use crate::gradient::{DLogProb, VertexView, ParamView};
use crate::tensor;

mod vertex;

pub use vertex::*;

mod diff;

/// Parameter of a builder: either a plain value, which becomes a new constant
/// vertex of length 1, or an existing vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    Value(f64),
    Vertex(VertexId)
}

impl From<f64> for Param {

    fn from(v : f64) -> Self {
        Param::Value(v)
    }

}

impl From<VertexId> for Param {

    fn from(id : VertexId) -> Self {
        Param::Vertex(id)
    }

}

/// Directed acyclic graph of random variables and deterministic operations over them.
/// Edges point from parents (parameters and operands) to children. Since a vertex
/// can only be created after its parents, the insertion order of the vertices is
/// a topological order, which is what value propagation and differentiation iterate over.
///
/// Vertex values are column vectors. A value of length one broadcasts against
/// values of any length, so a scalar prior can parameterize a vector of
/// random variables.
#[derive(Debug, Clone, Default)]
pub struct BayesNet {
    graph : DiGraph<Vertex, ()>
}

impl BayesNet {

    pub fn new() -> Self {
        Self { graph : DiGraph::new() }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All vertex identifiers, in topological order.
    pub fn ids(&self) -> impl Iterator<Item=VertexId> + '_ {
        self.graph.node_indices().map(VertexId)
    }

    pub fn vertex(&self, id : VertexId) -> Result<&Vertex, ModelError> {
        self.graph.node_weight(id.0).ok_or(ModelError::UnknownVertex(id))
    }

    fn vertex_mut(&mut self, id : VertexId) -> Result<&mut Vertex, ModelError> {
        self.graph.node_weight_mut(id.0).ok_or(ModelError::UnknownVertex(id))
    }

    pub fn value(&self, id : VertexId) -> Result<&DVector<f64>, ModelError> {
        Ok(&self.vertex(id)?.value)
    }

    fn push(&mut self, vertex : Vertex) -> VertexId {
        let parents = vertex.op.parents();
        let ix = self.graph.add_node(vertex);
        for p in parents {
            self.graph.add_edge(p.0, ix, ());
        }
        VertexId(ix)
    }

    fn resolve(&mut self, param : Param) -> Result<VertexId, ModelError> {
        match param {
            Param::Value(v) => Ok(self.constant_scalar(v)),
            Param::Vertex(id) => {
                self.vertex(id)?;
                Ok(id)
            }
        }
    }

    // Parameter values, in the order they appear at params.
    pub(crate) fn values_of(&self, params : &[VertexId]) -> Result<Vec<&DVector<f64>>, ModelError> {
        params.iter().map(|p| self.value(*p) ).collect()
    }

    pub fn constant(&mut self, value : DVector<f64>) -> VertexId {
        self.push(Vertex::new(Op::Constant, value))
    }

    pub fn constant_scalar(&mut self, value : f64) -> VertexId {
        self.constant(DVector::from_element(1, value))
    }

    fn probabilistic(&mut self, distr : Distr, len : usize, params : Vec<Param>) -> Result<VertexId, ModelError> {
        if params.len() != distr.n_params() {
            return Err(ModelError::ParameterCount { distribution : distr.name(), expected : distr.n_params(), found : params.len() });
        }
        let mut ids = Vec::with_capacity(params.len());
        for p in params {
            ids.push(self.resolve(p)?);
        }
        for id in ids.iter() {
            let found = self.value(*id)?.nrows();
            if found != 1 && found != len {
                return Err(ModelError::ShapeMismatch { vertex : *id, expected : len, found });
            }
        }
        let value = distr.initial_value(&self.values_of(&ids)?, len);
        Ok(self.push(Vertex::new(Op::Probabilistic { distr, params : ids }, value)))
    }

    pub fn uniform(&mut self, len : usize, lower : impl Into<Param>, upper : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.probabilistic(Distr::Uniform, len, vec![lower.into(), upper.into()])
    }

    pub fn exponential(&mut self, len : usize, rate : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.probabilistic(Distr::Exponential, len, vec![rate.into()])
    }

    pub fn beta(&mut self, len : usize, alpha : impl Into<Param>, beta : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.probabilistic(Distr::Beta, len, vec![alpha.into(), beta.into()])
    }

    pub fn gaussian(&mut self, len : usize, mu : impl Into<Param>, sigma : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.probabilistic(Distr::Gaussian, len, vec![mu.into(), sigma.into()])
    }

    pub fn half_cauchy(&mut self, len : usize, scale : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.probabilistic(Distr::HalfCauchy, len, vec![scale.into()])
    }

    /// Number of successes over n trials with success probability p.
    pub fn binomial(&mut self, len : usize, p : impl Into<Param>, n : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.probabilistic(Distr::Binomial, len, vec![p.into(), n.into()])
    }

    fn deterministic(&mut self, op : Op) -> Result<VertexId, ModelError> {
        let value = self.evaluate(&op)?;
        Ok(self.push(Vertex::new(op, value)))
    }

    fn binary(&mut self, op : BinaryOp, a : Param, b : Param) -> Result<VertexId, ModelError> {
        let a = self.resolve(a)?;
        let b = self.resolve(b)?;
        self.deterministic(Op::Binary(op, a, b))
    }

    fn unary(&mut self, op : UnaryOp, a : VertexId) -> Result<VertexId, ModelError> {
        self.vertex(a)?;
        self.deterministic(Op::Unary(op, a))
    }

    pub fn add(&mut self, a : impl Into<Param>, b : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.binary(BinaryOp::Add, a.into(), b.into())
    }

    pub fn sub(&mut self, a : impl Into<Param>, b : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.binary(BinaryOp::Sub, a.into(), b.into())
    }

    pub fn mul(&mut self, a : impl Into<Param>, b : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.binary(BinaryOp::Mul, a.into(), b.into())
    }

    pub fn div(&mut self, a : impl Into<Param>, b : impl Into<Param>) -> Result<VertexId, ModelError> {
        self.binary(BinaryOp::Div, a.into(), b.into())
    }

    pub fn neg(&mut self, a : VertexId) -> Result<VertexId, ModelError> {
        self.unary(UnaryOp::Neg, a)
    }

    pub fn exp(&mut self, a : VertexId) -> Result<VertexId, ModelError> {
        self.unary(UnaryOp::Exp, a)
    }

    pub fn log(&mut self, a : VertexId) -> Result<VertexId, ModelError> {
        self.unary(UnaryOp::Log, a)
    }

    pub fn label(&mut self, id : VertexId, name : &str) -> Result<(), ModelError> {
        self.vertex_mut(id)?.label = Some(name.to_string());
        Ok(())
    }

    /// First vertex carrying the informed label.
    pub fn find(&self, name : &str) -> Option<VertexId> {
        self.graph.node_indices()
            .find(|ix| self.graph[*ix].label.as_deref() == Some(name) )
            .map(VertexId)
    }

    /// Fixes a random variable at the informed data. Observed vertices keep
    /// contributing to the log-probability but are not sampled.
    pub fn observe(&mut self, id : VertexId, value : DVector<f64>) -> Result<(), ModelError> {
        if !self.vertex(id)?.is_probabilistic() {
            return Err(ModelError::NotProbabilistic(id));
        }
        self.set_value(id, value)?;
        self.vertex_mut(id)?.observed = true;
        self.cascade_from(&[id])
    }

    /// Replaces the log-probability gradient of a probabilistic vertex.
    pub fn override_d_log_prob(&mut self, id : VertexId, d_log_prob : impl DLogProb + 'static) -> Result<(), ModelError> {
        let vertex = self.vertex_mut(id)?;
        if !vertex.is_probabilistic() {
            return Err(ModelError::NotProbabilistic(id));
        }
        let d_log_prob : Arc<dyn DLogProb> = Arc::new(d_log_prob);
        vertex.d_log_prob = Some(d_log_prob);
        Ok(())
    }

    /// Sets the value of a constant or probabilistic vertex, without updating
    /// its descendants. The length of the vertex cannot change.
    pub fn set_value(&mut self, id : VertexId, value : DVector<f64>) -> Result<(), ModelError> {
        let vertex = self.vertex_mut(id)?;
        if vertex.op.is_deterministic() {
            return Err(ModelError::InvalidState(format!("Value of deterministic vertex {} cannot be set", id)));
        }
        if vertex.len() != value.nrows() {
            return Err(ModelError::ShapeMismatch { vertex : id, expected : vertex.len(), found : value.nrows() });
        }
        vertex.value = value;
        Ok(())
    }

    /// Sets a value, then recomputes every deterministic vertex downstream of it.
    pub fn set_and_cascade(&mut self, id : VertexId, value : DVector<f64>) -> Result<(), ModelError> {
        self.set_value(id, value)?;
        self.cascade_from(&[id])
    }

    /// Recomputes the deterministic descendants of the informed vertices. The
    /// search stops at non-deterministic vertices, whose values do not depend
    /// on their parents' values.
    pub fn cascade_from(&mut self, ids : &[VertexId]) -> Result<(), ModelError> {
        let mut stack = Vec::new();
        for id in ids {
            self.vertex(*id)?;
            stack.push(id.0);
        }
        let mut dirty = BTreeSet::new();
        while let Some(ix) = stack.pop() {
            for child in self.graph.neighbors_directed(ix, Direction::Outgoing) {
                if self.graph[child].op.is_deterministic() && dirty.insert(child) {
                    stack.push(child);
                }
            }
        }

        // Ascending indices respect the topological order.
        for ix in dirty {
            self.recompute(ix)?;
        }
        Ok(())
    }

    /// Recomputes every deterministic vertex.
    pub fn cascade_all(&mut self) -> Result<(), ModelError> {
        let ixs : Vec<_> = self.graph.node_indices().filter(|ix| self.graph[*ix].op.is_deterministic() ).collect();
        for ix in ixs {
            self.recompute(ix)?;
        }
        Ok(())
    }

    fn recompute(&mut self, ix : NodeIndex) -> Result<(), ModelError> {
        let op = self.graph[ix].op.clone();
        let value = self.evaluate(&op)?;
        self.graph[ix].value = value;
        Ok(())
    }

    fn evaluate(&self, op : &Op) -> Result<DVector<f64>, ModelError> {
        match op {
            Op::Unary(op, a) => Ok(self.value(*a)?.map(|v| op.apply(v) )),
            Op::Binary(op, a, b) => tensor::map_binary(self.value(*a)?, self.value(*b)?, |x, y| op.apply(x, y) ),
            _ => Err(ModelError::InvalidState(format!("{:?} is not a deterministic operation", op)))
        }
    }

    /// Draws a new value for a probabilistic vertex, conditional on the current
    /// values of its parameters. The network itself is left unchanged.
    pub fn sample<R>(&self, id : VertexId, rng : &mut R) -> Result<DVector<f64>, ModelError>
    where
        R : Rng + ?Sized
    {
        let vertex = self.vertex(id)?;
        match &vertex.op {
            Op::Probabilistic { distr, params } => distr.sample(&self.values_of(params)?, vertex.len(), rng),
            _ => Err(ModelError::NotProbabilistic(id))
        }
    }

    /// Unobserved probabilistic vertices, in topological order.
    pub fn latent_vertices(&self) -> Vec<VertexId> {
        self.graph.node_indices()
            .filter(|ix| self.graph[*ix].is_latent() )
            .map(VertexId)
            .collect()
    }

    /// Every vertex reachable from the informed vertex, following edges in
    /// both directions, in topological order.
    pub fn connected_graph(&self, id : VertexId) -> Result<Vec<VertexId>, ModelError> {
        self.vertex(id)?;
        let mut seen = BTreeSet::new();
        seen.insert(id.0);
        let mut stack = vec![id.0];
        while let Some(ix) = stack.pop() {
            for n in self.graph.neighbors_undirected(ix) {
                if seen.insert(n) {
                    stack.push(n);
                }
            }
        }
        Ok(seen.into_iter().map(VertexId).collect())
    }

    /// Unobserved probabilistic vertices connected to the informed vertex, in
    /// topological order. These are the latents a sampler needs to explain an
    /// observation, leaving out unrelated parts of the network.
    pub fn connected_latents(&self, id : VertexId) -> Result<Vec<VertexId>, ModelError> {
        Ok(self.connected_graph(id)?
            .into_iter()
            .filter(|v| self.graph[v.0].is_latent() )
            .collect())
    }

    /// Log-density of a single probabilistic vertex at its current value.
    pub fn log_prob_of(&self, id : VertexId) -> Result<f64, ModelError> {
        let vertex = self.vertex(id)?;
        match &vertex.op {
            Op::Probabilistic { distr, params } => Ok(distr.log_prob(&self.values_of(params)?, &vertex.value)),
            _ => Err(ModelError::NotProbabilistic(id))
        }
    }

    /// Joint log-probability of the network: the sum of the log-densities of
    /// all probabilistic vertices (observed and latent) at their current values.
    pub fn log_prob(&self) -> Result<f64, ModelError> {
        let mut lp = 0.0;
        for id in self.ids() {
            if self.graph[id.0].is_probabilistic() {
                lp += self.log_prob_of(id)?;
            }
        }
        Ok(lp)
    }

    /// Joint log-probability and its gradient with respect to each of the
    /// informed probabilistic vertices, by reverse accumulation over the graph.
    pub fn log_prob_gradient(&self, wrt : &[VertexId]) -> Result<(f64, HashMap<VertexId, DVector<f64>>), ModelError> {
        diff::log_prob_gradient(self, wrt)
    }

    /// Read-only view of a probabilistic vertex and its parameters, as seen by
    /// gradient overrides.
    pub fn view(&self, id : VertexId) -> Result<VertexView<'_>, ModelError> {
        let vertex = self.vertex(id)?;
        match &vertex.op {
            Op::Probabilistic { distr, params } => {
                let mut views = Vec::with_capacity(params.len());
                for p in params.iter() {
                    let pv = self.vertex(*p)?;
                    views.push(ParamView { id : *p, value : &pv.value, constant : pv.is_constant() });
                }
                Ok(VertexView { id, distr : *distr, value : &vertex.value, observed : vertex.observed, params : views })
            },
            _ => Err(ModelError::NotProbabilistic(id))
        }
    }

}
