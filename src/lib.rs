/// Elementwise helpers over column vectors, with scalar broadcasting.
pub mod tensor;

/// Error type shared by graph construction, evaluation and sampling.
pub mod error;

/// Distribution families a random variable can follow: log-densities,
/// closed-form partial derivatives, random draws and supports.
pub mod distr;

/// Directed acyclic graph of random variables and deterministic operations,
/// with explicit value propagation and reverse-mode differentiation of the
/// joint log-probability.
pub mod graph;

/// Extension point for the log-probability gradient of a vertex, and the
/// binomial gradient for counts observed over a constant number of trials.
pub mod gradient;

/// Adapters running the samplers over the latent vertices of a graph, and
/// the resulting posterior samples.
pub mod infer;

/// Sampler settings, read from JSON.
pub mod config;

/// Reading batting records from tab-separated files.
pub mod data;

/// The batting-average and eight-schools hierarchical models.
pub mod models;

pub use error::ModelError;

pub use graph::{BayesNet, VertexId, Param};

pub use gradient::{DLogProb, FixedTrialsBinomial};

pub use infer::NetworkSamples;
