use crate::error::{EngineError, EngineResult};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

pub type Vector = Vec<f64>;

pub const LAYER_NORM_EPS: f64 = 1e-5;

fn check_len(operation: &'static str, expected: usize, actual: usize) -> EngineResult<()> {
    if expected != actual {
        return Err(EngineError::DimensionMismatch {
            operation,
            expected,
            actual,
        });
    }
    Ok(())
}

pub fn dot(a: &[f64], b: &[f64]) -> EngineResult<f64> {
    check_len("dot", a.len(), b.len())?;
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

pub fn add(a: &[f64], b: &[f64]) -> EngineResult<Vector> {
    check_len("add", a.len(), b.len())?;
    Ok(a.iter().zip(b).map(|(x, y)| x + y).collect())
}

pub fn sub(a: &[f64], b: &[f64]) -> EngineResult<Vector> {
    check_len("sub", a.len(), b.len())?;
    Ok(a.iter().zip(b).map(|(x, y)| x - y).collect())
}

pub fn scale(v: &[f64], factor: f64) -> Vector {
    v.iter().map(|x| x * factor).collect()
}

pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// `matrix` is laid out as (output, input).
pub fn matvec(matrix: &Array2<f64>, v: &[f64]) -> EngineResult<Vector> {
    check_len("matvec", matrix.ncols(), v.len())?;
    Ok(matrix.dot(&ArrayView1::from(v)).to_vec())
}

/// `v` times `matrix`, where `matrix` is laid out as (input, output).
pub fn vecmat(v: &[f64], matrix: &Array2<f64>) -> EngineResult<Vector> {
    check_len("vecmat", matrix.nrows(), v.len())?;
    Ok(ArrayView1::from(v).dot(matrix).to_vec())
}

pub fn softmax(logits: &[f64]) -> Vector {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|x| (x - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

pub fn gelu(x: f64) -> f64 {
    let c = (2.0 / std::f64::consts::PI).sqrt();
    0.5 * x * (1.0 + (c * (x + 0.044715 * x.powi(3))).tanh())
}

pub fn swish(x: f64) -> f64 {
    x * sigmoid(x)
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    #[default]
    Gelu,
    Swish,
}

impl Activation {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => relu(x),
            Activation::Gelu => gelu(x),
            Activation::Swish => swish(x),
        }
    }

    pub fn apply_vec(&self, v: &[f64]) -> Vector {
        v.iter().map(|&x| self.apply(x)).collect()
    }
}

/// Population statistics (divide by `len`), `eps` added to the variance.
pub fn layer_normalize(v: &[f64], weight: &[f64], bias: &[f64]) -> EngineResult<Vector> {
    use statrs::statistics::Statistics;

    check_len("layer_normalize", v.len(), weight.len())?;
    check_len("layer_normalize", v.len(), bias.len())?;
    if v.is_empty() {
        return Ok(Vec::new());
    }
    let mean = v.iter().mean();
    let variance = v.iter().population_variance();
    let std = (variance + LAYER_NORM_EPS).sqrt();
    Ok(v
        .iter()
        .zip(weight.iter().zip(bias))
        .map(|(x, (w, b))| (x - mean) / std * w + b)
        .collect())
}

/// Shannon entropy in nats of `weights` after normalizing them to sum to 1.
pub fn entropy(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return 0.0;
    }
    weights
        .iter()
        .filter(|w| **w > 0.0)
        .map(|w| {
            let p = w / total;
            -p * p.ln()
        })
        .sum()
}

pub fn argmax(v: &[f64]) -> Option<(f64, usize)> {
    v.iter()
        .enumerate()
        .fold(None, |best: Option<(f64, usize)>, (i, &x)| match best {
            Some((b, _)) if b >= x => best,
            _ => Some((x, i)),
        })
}

pub fn is_finite(v: &[f64]) -> bool {
    v.iter().all(|x| x.is_finite())
}
