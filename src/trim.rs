//! trim-probability builder (§4.6): for a parent/child branch, the matrix T
//! whose `(node_idx, child_idx)` entry is the product of `Singleton`
//! conditional probabilities for the events the branch must realize, and 1
//! everywhere conditioning doesn't apply.
//!
//! Concrete `Singleton` conditioning (exact trim/insert lengths) is only
//! available where the real allele was observed — leaf-incident branches.
//! Internal branches fall back to the unconditioned default of 1, since this
//! implementation's internal `AncState` bounds target-tracts, not concrete
//! singletons.

use crate::barcode::BarcodeMeta;
use crate::error::EngineError;
use crate::hazard::singleton_log_prob;
use crate::indel::{target_tract_repr_diff, Singleton};
use crate::params::Parameters;
use crate::skeleton::TransitionSkeleton;
use crate::tensor;
use candle_core::Tensor;

/// builds T of shape `(Sc+1, Sc+1)` for the branch into `child`: both axes
/// use the child's numbering, per §4.6. Leaves attach real conditional
/// probabilities for the singletons that must fire on the path from each
/// candidate parent-side state to the observed tuple; everything else
/// defaults to 1 (the matrix is dense because `candle_core` has no sparse
/// tensor type, but most off-diagonal-in-logic entries are exactly 1).
pub fn build_t(
    child_skeleton: &TransitionSkeleton,
    child_observed_singletons: Option<&[Singleton]>,
    meta: &BarcodeMeta,
    params: &Parameters,
) -> Result<Tensor, EngineError> {
    let sc = child_skeleton.num_states();
    let dim = sc + 1;
    let mut t = Tensor::ones(&[dim, dim], tensor::DTYPE, &tensor::device()).map_err(EngineError::Tensor)?;

    let Some(singletons) = child_observed_singletons else {
        return Ok(t);
    };

    for (row, parent_side_tts) in child_skeleton.states().iter().enumerate() {
        for (col, child_tts) in child_skeleton.states().iter().enumerate() {
            let diff = target_tract_repr_diff(parent_side_tts, child_tts);
            if diff.is_empty() {
                continue;
            }
            let matching: Vec<&Singleton> = diff
                .iter()
                .filter_map(|event| singletons.iter().find(|sg| &sg.target_tract == event))
                .collect();
            if matching.len() != diff.len() {
                // some fired event has no corresponding concrete singleton
                // observation (can't happen for a true leaf-incident branch,
                // but a partially-observed state sum entry should not be
                // silently conditioned on).
                continue;
            }
            let mut log_prob = tensor::scalar(0.0).map_err(EngineError::Tensor)?;
            for sg in matching {
                log_prob = log_prob
                    .add(&singleton_log_prob(sg, meta, params).map_err(EngineError::Tensor)?)
                    .map_err(EngineError::Tensor)?;
            }
            let prob = log_prob.exp().map_err(EngineError::Tensor)?;
            t = set_entry(&t, row, col, &prob).map_err(EngineError::Tensor)?;
        }
    }
    Ok(t)
}

fn set_entry(t: &Tensor, row: usize, col: usize, value: &Tensor) -> candle_core::Result<Tensor> {
    let (rows, cols) = t.dims2()?;
    let mut mask = vec![0.0f64; rows * cols];
    mask[row * cols + col] = 1.0;
    let mask = Tensor::from_vec(mask, (rows, cols), t.device())?.to_dtype(t.dtype())?;
    let keep = mask.affine(-1.0, 1.0)?; // 1 everywhere except (row, col)
    let scalar = value.reshape(())?;
    t.mul(&keep)?.add(&mask.broadcast_mul(&scalar)?)
}
