//! transition-matrix assembler (§4.4): plugs hazards into a node's
//! [`crate::skeleton::TransitionSkeleton`] to build the instantaneous rate
//! matrix Q.

use crate::error::EngineError;
use crate::hazard::{hazard_away, hazard_event};
use crate::params::Parameters;
use crate::skeleton::TransitionSkeleton;
use crate::tensor;
use crate::{NodeId, INVARIANT_TOL};
use candle_core::Tensor;

/// builds Q of shape `(S+1, S+1)` for one node: row `i` holds the hazard of
/// every one-step-reachable end state, the remaining mass to the unlikely
/// sink at column `S`, and `-hazard_away` on the diagonal. Row `S` (the sink)
/// is all zeros.
pub fn build_q(
    node_id: NodeId,
    skeleton: &TransitionSkeleton,
    n_targets: usize,
    params: &Parameters,
) -> Result<Tensor, EngineError> {
    let s = skeleton.num_states();
    let dim = s + 1;
    let mut rows = Vec::with_capacity(dim);

    for i in 0..s {
        let start_tts = &skeleton.states()[i];
        let mut row = tensor::zeros(&[dim]).map_err(EngineError::Tensor)?;
        let mut likely_sum = tensor::scalar(0.0).map_err(EngineError::Tensor)?.reshape(1).map_err(EngineError::Tensor)?;

        for t in skeleton.transitions_from(i) {
            let h = hazard_event(&t.event, params).map_err(EngineError::Tensor)?;
            row = scatter_add(&row, t.end_index, &h).map_err(EngineError::Tensor)?;
            likely_sum = likely_sum.add(&h).map_err(EngineError::Tensor)?;
        }

        let away = hazard_away(start_tts, n_targets, params).map_err(EngineError::Tensor)?;
        let to_sink = away.sub(&likely_sum).map_err(EngineError::Tensor)?;

        let sink_val = to_sink.reshape(()).map_err(EngineError::Tensor)?.to_scalar::<f64>().map_err(EngineError::Tensor)?;
        if sink_val < -INVARIANT_TOL {
            return Err(EngineError::NegativeMassToUnlikely {
                node_id,
                row: i,
                mass: sink_val,
            });
        }
        row = scatter_add(&row, s, &to_sink).map_err(EngineError::Tensor)?;

        let neg_away = away.affine(-1.0, 0.0).map_err(EngineError::Tensor)?;
        row = scatter_add(&row, i, &neg_away).map_err(EngineError::Tensor)?;

        log::trace!("build_q: node {node_id} row {i} mass_to_unlikely={sink_val:.6}");

        let row_sum = row.sum_all().map_err(EngineError::Tensor)?.to_scalar::<f64>().map_err(EngineError::Tensor)?;
        if row_sum.abs() > INVARIANT_TOL {
            return Err(EngineError::RowSumNotZero {
                node_id,
                row: i,
                sum: row_sum,
                tol: INVARIANT_TOL,
            });
        }

        rows.push(row);
    }
    rows.push(tensor::zeros(&[dim]).map_err(EngineError::Tensor)?);

    Tensor::stack(&rows, 0).map_err(EngineError::Tensor)
}

/// adds scalar tensor `value` into position `index` of a 1-D `base` tensor,
/// by building a one-hot vector and summing — candle has no in-place
/// scatter-add for autodiff-tracked tensors.
fn scatter_add(base: &Tensor, index: usize, value: &Tensor) -> candle_core::Result<Tensor> {
    let dim = base.dims1()?;
    let mut onehot = vec![0.0f64; dim];
    onehot[index] = 1.0;
    let onehot = Tensor::from_vec(onehot, dim, base.device())?.to_dtype(base.dtype())?;
    let scalar = value.reshape(())?;
    base.add(&onehot.affine(1.0, 0.0)?.broadcast_mul(&scalar)?)
}
