use serde::{Serialize, Deserialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {

    #[error("Could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error)

}

/// Random-walk Metropolis-Hastings. The default draw counts reproduce the
/// baseball example.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetropolisConfig {

    pub sample_count : usize,

    /// Standard deviation of the Gaussian random walk, over the unconstrained scale.
    pub proposal_scale : f64,

    pub drop_count : usize,

    pub down_sample : usize,

    /// Sample bounded latents over a log or logit scale.
    pub transform_bounds : bool

}

impl Default for MetropolisConfig {

    fn default() -> Self {
        Self { sample_count : 10_000, proposal_scale : 0.1, drop_count : 2_000, down_sample : 4, transform_bounds : true }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HamiltonianConfig {

    pub sample_count : usize,

    pub leapfrog_count : usize,

    pub step_size : f64,

    pub drop_count : usize,

    pub transform_bounds : bool

}

impl Default for HamiltonianConfig {

    fn default() -> Self {
        Self { sample_count : 1_000, leapfrog_count : 10, step_size : 0.1, drop_count : 200, transform_bounds : true }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NutsConfig {

    pub sample_count : usize,

    /// Draws at the start of the chain during which the step size is adapted.
    /// They are kept in the output.
    pub adapt_count : usize,

    pub target_acceptance : f64,

    pub max_tree_depth : usize,

    /// Starting step size. Found by a doubling/halving heuristic if absent.
    pub initial_step_size : Option<f64>,

    pub drop_count : usize,

    pub transform_bounds : bool

}

impl Default for NutsConfig {

    fn default() -> Self {
        Self {
            sample_count : 1_000,
            adapt_count : 10,
            target_acceptance : 0.99,
            max_tree_depth : 10,
            initial_step_size : None,
            drop_count : 200,
            transform_bounds : true
        }
    }

}

/// Settings of every sampler, read from a JSON file. Absent fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SamplerConfig {

    pub seed : Option<u64>,

    pub progress : bool,

    pub metropolis : MetropolisConfig,

    pub hamiltonian : HamiltonianConfig,

    pub nuts : NutsConfig

}

impl SamplerConfig {

    /// Defaults of the eight schools driver: NUTS with target acceptance 0.90,
    /// keeping every draw.
    pub fn eight_schools() -> Self {
        let mut cfg = Self::default();
        cfg.nuts.target_acceptance = 0.90;
        cfg.nuts.drop_count = 0;
        cfg
    }

    pub fn from_path(path : impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_path_over(path, &Self::default())
    }

    pub fn from_str(content : &str) -> Result<Self, ConfigError> {
        Self::from_str_over(content, &Self::default())
    }

    /// Reads a configuration file whose absent fields are taken from base.
    pub fn from_path_over(path : impl AsRef<Path>, base : &Self) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str_over(&content, base)
    }

    pub fn from_str_over(content : &str, base : &Self) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(base)?;
        merge_json(&mut merged, serde_json::from_str(content)?);
        Ok(serde_json::from_value(merged)?)
    }

}

// Overwrites the fields of base present in patch, recursing into objects.
fn merge_json(base : &mut Value, patch : Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(field) => merge_json(field, value),
                    None => { base.insert(key, value); }
                }
            }
        },
        (base, patch) => *base = patch
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = SamplerConfig::from_str(r#"{ "seed" : 3, "nuts" : { "target_acceptance" : 0.9 } }"#).unwrap();
        assert_eq!(cfg.seed, Some(3));
        assert_eq!(cfg.nuts.target_acceptance, 0.9);
        assert_eq!(cfg.nuts.adapt_count, 10);
        assert_eq!(cfg.metropolis, MetropolisConfig::default());
    }

    #[test]
    fn partial_config_over_driver_defaults() {
        let base = SamplerConfig::eight_schools();
        let cfg = SamplerConfig::from_str_over(r#"{"seed":1}"#, &base).unwrap();
        assert_eq!(cfg.seed, Some(1));
        assert_eq!(cfg.nuts.target_acceptance, 0.90);
        assert_eq!(cfg.nuts.drop_count, 0);
        assert_eq!(cfg.nuts.sample_count, 1_000);

        let cfg = SamplerConfig::from_str_over(r#"{ "nuts" : { "drop_count" : 50 } }"#, &base).unwrap();
        assert_eq!(cfg.nuts.drop_count, 50);
        assert_eq!(cfg.nuts.target_acceptance, 0.90);
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn invalid_config() {
        assert!(matches!(SamplerConfig::from_str("{ \"seed\" : \"a\" }"), Err(ConfigError::Parse(_))));
        assert!(matches!(SamplerConfig::from_path("/nonexistent/config.json"), Err(ConfigError::Io(_))));
    }

}
