use nalgebra::DVector;
use crate::error::ModelError;

// Elementwise helpers over DVector. A length-1 vector broadcasts against a
// vector of any length; any other pair of lengths must match exactly.

/// Length resulting from broadcasting all informed lengths together.
pub fn broadcast_len(lens : &[usize]) -> Result<usize, ModelError> {
    let mut out = 1;
    for l in lens.iter() {
        if *l == out || *l == 1 {
            continue;
        }
        if out == 1 {
            out = *l;
        } else {
            return Err(ModelError::Broadcast(out, *l));
        }
    }
    Ok(out)
}

/// Element i of v, repeating the single element of length-1 vectors.
pub fn at(v : &DVector<f64>, i : usize) -> f64 {
    if v.nrows() == 1 {
        v[0]
    } else {
        v[i]
    }
}

pub fn map_binary(a : &DVector<f64>, b : &DVector<f64>, f : impl Fn(f64, f64) -> f64) -> Result<DVector<f64>, ModelError> {
    let len = broadcast_len(&[a.nrows(), b.nrows()])?;
    Ok(DVector::from_fn(len, |i, _| f(at(a, i), at(b, i))))
}

/// Reduces an elementwise gradient to the length of the value it was taken
/// with respect to. Gradients of broadcast scalars are summed.
pub fn reduce_to(grad : DVector<f64>, len : usize) -> DVector<f64> {
    if grad.nrows() == len {
        grad
    } else if len == 1 {
        DVector::from_element(1, grad.sum())
    } else {
        // broadcast_len guarantees the gradient is either elementwise or scalar.
        DVector::from_element(len, grad[0])
    }
}
