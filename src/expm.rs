//! branch-probability builder (§4.5): `P(t) = exp(Q·t)` via a differentiable
//! matrix exponential.
//!
//! Diagonal Padé approximants need a differentiable linear solve, which
//! `candle_core` does not expose; this uses scaling-and-squaring with a
//! truncated Taylor-series numerator instead, the same family of method
//! with a division-free numerator. Gradients flow through every matmul and
//! add, including through `t`.

use crate::error::EngineError;
use crate::NodeId;
use candle_core::Tensor;

const TAYLOR_TERMS: usize = 18;

/// `exp(Q * t)` for a square `Q` and scalar `t`.
pub fn expm(node_id: NodeId, q: &Tensor, t: &Tensor) -> Result<Tensor, EngineError> {
    let (n, n2) = q.dims2().map_err(EngineError::Tensor)?;
    debug_assert_eq!(n, n2);

    let a = q.broadcast_mul(t).map_err(EngineError::Tensor)?;
    let norm = inf_norm(&a).map_err(EngineError::Tensor)?;
    let squarings = squarings_for_norm(norm);
    let scale = 1.0f64 / 2f64.powi(squarings as i32);
    let a_scaled = a.affine(scale, 0.0).map_err(EngineError::Tensor)?;

    let mut term = Tensor::eye(n, a.dtype(), a.device()).map_err(EngineError::Tensor)?;
    let mut sum = term.clone();
    for k in 1..=TAYLOR_TERMS {
        term = term.matmul(&a_scaled).map_err(EngineError::Tensor)?.affine(1.0 / k as f64, 0.0).map_err(EngineError::Tensor)?;
        sum = sum.add(&term).map_err(EngineError::Tensor)?;
    }

    let mut p = sum;
    for _ in 0..squarings {
        p = p.matmul(&p).map_err(EngineError::Tensor)?;
    }

    let finite = all_finite(&p).map_err(EngineError::Tensor)?;
    if !finite {
        return Err(EngineError::NonFiniteBranchProbability { node_id });
    }
    Ok(p)
}

/// infinity norm (max absolute row sum) of a square matrix, read off as a
/// detached value purely to size the scaling-and-squaring schedule.
fn inf_norm(a: &Tensor) -> candle_core::Result<f64> {
    let abs = a.abs()?;
    let row_sums = abs.sum(1)?;
    let max = row_sums.max(0)?;
    max.to_scalar::<f64>()
}

fn squarings_for_norm(norm: f64) -> u32 {
    if norm <= 1.0 {
        0
    } else {
        (norm.log2().ceil() as i64 + 1).max(0) as u32
    }
}

fn all_finite(t: &Tensor) -> candle_core::Result<bool> {
    let v: Vec<f64> = t.flatten_all()?.to_vec1()?;
    Ok(v.iter().all(|x| x.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn expm_of_zero_matrix_is_identity() {
        let q = tensor::zeros(&[3, 3]).unwrap();
        let t = tensor::scalar(1.0).unwrap();
        let p = expm(0, &q, &t).unwrap();
        let rows: Vec<Vec<f64>> = p.to_vec2().unwrap();
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn expm_is_row_stochastic_for_a_valid_rate_matrix() {
        // a 2-state CTMC with rate 1 each way
        let q = Tensor::from_vec(vec![-1.0f64, 1.0, 1.0, -1.0], (2, 2), &tensor::device()).unwrap();
        let t = tensor::scalar(0.5).unwrap();
        let p = expm(0, &q, &t).unwrap();
        let rows: Vec<Vec<f64>> = p.to_vec2().unwrap();
        for row in rows {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
            assert!(row.iter().all(|&v| v >= -1e-9));
        }
    }
}
