use nalgebra::DVector;
use petgraph::graph::NodeIndex;
use std::fmt;
use std::sync::Arc;
use crate::distr::Distr;
use crate::gradient::DLogProb;

/// Stable identifier of a vertex within a BayesNet. Vertices are never removed,
/// so an identifier stays valid for the lifetime of the network that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub(crate) NodeIndex);

impl VertexId {

    pub fn index(&self) -> usize {
        self.0.index()
    }

    pub fn from_index(ix : usize) -> Self {
        VertexId(NodeIndex::new(ix))
    }

}

impl fmt::Display for VertexId {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Exp,
    Log
}

impl UnaryOp {

    pub fn apply(&self, a : f64) -> f64 {
        match self {
            UnaryOp::Neg => -a,
            UnaryOp::Exp => a.exp(),
            UnaryOp::Log => a.ln()
        }
    }

    /// d op(a) / da
    pub fn derivative(&self, a : f64) -> f64 {
        match self {
            UnaryOp::Neg => -1.0,
            UnaryOp::Exp => a.exp(),
            UnaryOp::Log => 1.0 / a
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div
}

impl BinaryOp {

    pub fn apply(&self, a : f64, b : f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b
        }
    }

    /// (d op(a, b) / da, d op(a, b) / db)
    pub fn derivatives(&self, a : f64, b : f64) -> (f64, f64) {
        match self {
            BinaryOp::Add => (1.0, 1.0),
            BinaryOp::Sub => (1.0, -1.0),
            BinaryOp::Mul => (b, a),
            BinaryOp::Div => (1.0 / b, -a / b.powi(2))
        }
    }

}

/// How the value of a vertex is produced.
#[derive(Debug, Clone)]
pub enum Op {

    /// Fixed value, never changed by inference.
    Constant,

    /// Random variable with the informed distribution, whose parameters are
    /// the values of other vertices (in the order of the distribution).
    Probabilistic { distr : Distr, params : Vec<VertexId> },

    Unary(UnaryOp, VertexId),

    Binary(BinaryOp, VertexId, VertexId)

}

impl Op {

    /// Vertices this operation reads from.
    pub fn parents(&self) -> Vec<VertexId> {
        match self {
            Op::Constant => Vec::new(),
            Op::Probabilistic { params, .. } => params.clone(),
            Op::Unary(_, a) => vec![*a],
            Op::Binary(_, a, b) => vec![*a, *b]
        }
    }

    /// Whether the value is a deterministic function of the parents.
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Op::Unary(..) | Op::Binary(..))
    }

}

/// Node of the model graph.
#[derive(Debug, Clone)]
pub struct Vertex {

    pub op : Op,

    pub value : DVector<f64>,

    pub observed : bool,

    pub label : Option<String>,

    /// Replaces the stock log-probability gradient of a probabilistic vertex.
    pub d_log_prob : Option<Arc<dyn DLogProb>>

}

impl Vertex {

    pub(crate) fn new(op : Op, value : DVector<f64>) -> Self {
        Self { op, value, observed : false, label : None, d_log_prob : None }
    }

    pub fn len(&self) -> usize {
        self.value.nrows()
    }

    pub fn distr(&self) -> Option<Distr> {
        match &self.op {
            Op::Probabilistic { distr, .. } => Some(*distr),
            _ => None
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.op, Op::Constant)
    }

    pub fn is_probabilistic(&self) -> bool {
        matches!(self.op, Op::Probabilistic { .. })
    }

    /// Unobserved random variable.
    pub fn is_latent(&self) -> bool {
        self.is_probabilistic() && !self.observed
    }

}
