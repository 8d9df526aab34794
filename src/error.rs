use thiserror::Error;
use mcmclib::McmcError;
use crate::graph::VertexId;

/// Errors raised while building, evaluating or sampling a model graph.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {

    /// A gradient (or other operation) was requested under conditions it is not defined for.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{distribution} at vertex {vertex} does not provide a log-probability gradient")]
    UnsupportedGradient { vertex : VertexId, distribution : &'static str },

    #[error("Shape mismatch at vertex {vertex}: expected length {expected}, found {found}")]
    ShapeMismatch { vertex : VertexId, expected : usize, found : usize },

    #[error("Lengths {0} and {1} cannot be broadcast together")]
    Broadcast(usize, usize),

    #[error("Unknown vertex {0}")]
    UnknownVertex(VertexId),

    #[error("Vertex {0} is not probabilistic")]
    NotProbabilistic(VertexId),

    #[error("Vertex {0} holds a discrete distribution and cannot be sampled as a continuous latent")]
    DiscreteLatent(VertexId),

    #[error("{distribution} expects {expected} parameters, found {found}")]
    ParameterCount { distribution : &'static str, expected : usize, found : usize },

    #[error("Invalid parameter for {distribution}: {reason}")]
    InvalidParameter { distribution : &'static str, reason : String },

    #[error("No latent vertices to sample")]
    NoLatents,

    #[error(transparent)]
    Sampler(#[from] McmcError)

}
