use nalgebra::{DVector, DMatrix};
use std::collections::HashMap;
use crate::graph::VertexId;

/// Posterior draws of a set of vertices, one value per vertex per draw, in
/// the order the sampler produced them.
#[derive(Debug, Clone)]
pub struct NetworkSamples {
    ids : Vec<VertexId>,
    samples : HashMap<VertexId, Vec<DVector<f64>>>,
    n : usize,
    accept_rate : f64
}

impl NetworkSamples {

    /// Splits each row of draws (the concatenated values of the vertices at ids,
    /// with the informed lengths) into per-vertex samples.
    pub(crate) fn from_draws(ids : &[VertexId], lens : &[usize], draws : &DMatrix<f64>, accept_rate : f64) -> Self {
        let mut samples = HashMap::new();
        let mut offset = 0;
        for (id, len) in ids.iter().zip(lens.iter()) {
            let vals : Vec<_> = draws.row_iter()
                .map(|row| DVector::from_fn(*len, |i, _| row[offset + i] ))
                .collect();
            samples.insert(*id, vals);
            offset += len;
        }
        Self { ids : ids.to_vec(), samples, n : draws.nrows(), accept_rate }
    }

    /// Discards the first n draws (e.g. burn-in or adaptation).
    pub fn drop(mut self, n : usize) -> Self {
        let n = n.min(self.n);
        for vals in self.samples.values_mut() {
            vals.drain(..n);
        }
        self.n -= n;
        self
    }

    /// Keeps every k-th draw, starting from the first. Zero is taken as one.
    pub fn down_sample(mut self, k : usize) -> Self {
        let k = k.max(1);
        for vals in self.samples.values_mut() {
            *vals = vals.iter().step_by(k).cloned().collect();
        }
        self.n = (self.n + k - 1) / k;
        self
    }

    pub fn get(&self, id : VertexId) -> Option<&[DVector<f64>]> {
        self.samples.get(&id).map(|v| &v[..] )
    }

    pub fn ids(&self) -> &[VertexId] {
        &self.ids[..]
    }

    /// Number of draws.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Fraction of accepted proposals over the whole run.
    pub fn accept_rate(&self) -> f64 {
        self.accept_rate
    }

    /// Elementwise sample mean.
    pub fn mean(&self, id : VertexId) -> Option<DVector<f64>> {
        let vals = self.samples.get(&id)?;
        let first = vals.first()?;
        let mut sum = DVector::zeros(first.nrows());
        for v in vals.iter() {
            sum += v;
        }
        Some(sum / vals.len() as f64)
    }

    /// Elementwise sample variance (dividing by the number of draws).
    pub fn variance(&self, id : VertexId) -> Option<DVector<f64>> {
        let m = self.mean(id)?;
        let vals = self.samples.get(&id)?;
        let mut ss = DVector::zeros(m.nrows());
        for v in vals.iter() {
            ss += (v - &m).map(|d| d.powi(2) );
        }
        Some(ss / vals.len() as f64)
    }

    /// Mean of a scalar function of the vertex value over the draws.
    pub fn scalar_mean(&self, id : VertexId, f : impl Fn(&DVector<f64>) -> f64) -> Option<f64> {
        let vals = self.samples.get(&id)?;
        if vals.is_empty() {
            return None;
        }
        Some(vals.iter().map(|v| f(v) ).sum::<f64>() / vals.len() as f64)
    }

}
