//! Felsenstein pruner (§4.7): postorder recursion combining branch
//! probabilities, the trim-probability matrix, and child partial
//! likelihoods; rescales to prevent underflow and extracts the root's
//! unedited-state entry.

use crate::ancestral as anc_mod;
use crate::barcode::BarcodeMeta;
use crate::error::EngineError;
use crate::indel::{AncState, TtsTuple};
use crate::matrix::build_q;
use crate::params::Parameters;
use crate::skeleton::TransitionSkeleton;
use crate::statesum::NodeStateSet;
use crate::tensor;
use crate::topology::Tree;
use crate::NodeId;
use candle_core::Tensor;
use std::collections::BTreeMap;

/// the build-once combinatorial preprocessing (§2 items 1-5): ancestral
/// states, per-node state sums, and transition skeletons. Immutable once
/// built, shared across every `log_lik` call.
pub struct Preprocessed {
    pub anc_states: BTreeMap<NodeId, AncState>,
    pub state_sets: BTreeMap<NodeId, NodeStateSet>,
    pub skeletons: BTreeMap<NodeId, TransitionSkeleton>,
}

impl Preprocessed {
    pub fn build(tree: &Tree, meta: &BarcodeMeta, max_extra_steps: usize) -> Self {
        let anc_states = anc_mod::annotate(tree);
        let mut state_sets = BTreeMap::new();
        let mut skeletons = BTreeMap::new();
        for node_id in tree.postorder() {
            let node = tree.node(node_id);
            let anc = &anc_states[&node_id];
            let set = NodeStateSet::build(&node, anc, meta, max_extra_steps);
            let skeleton = TransitionSkeleton::build(&set);
            state_sets.insert(node_id, set);
            skeletons.insert(node_id, skeleton);
        }
        Self { anc_states, state_sets, skeletons }
    }
}

/// the outcome of one pruning pass: either a differentiable log-likelihood,
/// or a signal that the topology is inconsistent with the data under the
/// current parameters (every entry of some node's partial likelihood scaled
/// to zero).
pub enum PruneOutcome {
    LogLik(Tensor),
    ZeroLikelihood { node_id: NodeId },
}

/// runs the postorder pruning recursion over the whole tree.
pub fn prune(
    tree: &Tree,
    meta: &BarcodeMeta,
    params: &Parameters,
    pre: &Preprocessed,
) -> Result<PruneOutcome, EngineError> {
    let mut partial_liks: BTreeMap<NodeId, Tensor> = BTreeMap::new();
    let mut log_scaler_total = tensor::scalar(0.0).map_err(EngineError::Tensor)?;

    for node_id in tree.postorder() {
        let node = tree.node(node_id);
        let skeleton = &pre.skeletons[&node_id];
        let dim = skeleton.num_states() + 1;

        let mut l_v = if node.is_leaf() {
            let tts = node
                .observed_tts()
                .expect("leaf nodes always carry an observed tuple after Tree::build");
            let idx = skeleton
                .index_of(tts)
                .expect("a leaf's own skeleton always numbers its observed tuple");
            indicator(dim, idx).map_err(EngineError::Tensor)?
        } else {
            Tensor::ones(&[dim], tensor::DTYPE, &tensor::device()).map_err(EngineError::Tensor)?
        };

        if !node.is_leaf() {
            for child in node.children() {
                let child_id = child.node_id();
                let child_skeleton = &pre.skeletons[&child_id];
                let l_c = &partial_liks[&child_id];

                let q_c = build_q(child_id, child_skeleton, meta.n_targets(), params)?;
                let branch_len = params.branch_len(child_id).map_err(EngineError::Tensor)?;
                let p_c = crate::expm::expm(child_id, &q_c, &branch_len)?;
                let t_c = crate::trim::build_t(child_skeleton, child.observed_singletons(), meta, params)?;

                let hadamard = p_c.mul(&t_c).map_err(EngineError::Tensor)?;
                let d_c = hadamard
                    .matmul(&l_c.reshape((child_skeleton.num_states() + 1, 1)).map_err(EngineError::Tensor)?)
                    .map_err(EngineError::Tensor)?
                    .reshape(child_skeleton.num_states() + 1)
                    .map_err(EngineError::Tensor)?;

                if node.is_root() {
                    let empty_idx = child_skeleton
                        .index_of(&TtsTuple::empty())
                        .expect("every node's skeleton includes the unedited tuple as a reachable state");
                    let scalar = d_c.narrow(0, empty_idx, 1).map_err(EngineError::Tensor)?;
                    l_v = l_v.broadcast_mul(&scalar).map_err(EngineError::Tensor)?;
                } else {
                    let mut gather_idx = Vec::new();
                    let mut target_idx = Vec::new();
                    for (i, t) in skeleton.states().iter().enumerate() {
                        if let Some(j) = child_skeleton.index_of(t) {
                            gather_idx.push(j);
                            target_idx.push(i);
                        }
                    }
                    let renumbered = scatter_gather(&d_c, dim, &target_idx, &gather_idx)
                        .map_err(EngineError::Tensor)?;
                    l_v = l_v.mul(&renumbered).map_err(EngineError::Tensor)?;
                }
            }
        }

        let scaler = l_v.max(0).map_err(EngineError::Tensor)?;
        let scaler_val = scaler.to_scalar::<f64>().map_err(EngineError::Tensor)?;
        if scaler_val.abs() < crate::INVARIANT_TOL {
            return Ok(PruneOutcome::ZeroLikelihood { node_id });
        }
        log::trace!("prune: node {node_id} rescaled by {scaler_val:.6e}");
        let l_v = l_v.broadcast_div(&scaler).map_err(EngineError::Tensor)?;
        log_scaler_total = log_scaler_total.add(&scaler.log().map_err(EngineError::Tensor)?).map_err(EngineError::Tensor)?;

        partial_liks.insert(node_id, l_v);
    }

    let root_id = tree.root().node_id();
    let root_skeleton = &pre.skeletons[&root_id];
    let root_l = &partial_liks[&root_id];
    let root_empty_idx = root_skeleton
        .index_of(&TtsTuple::empty())
        .expect("root's skeleton always includes the unedited tuple");
    let root_entry = root_l.narrow(0, root_empty_idx, 1).map_err(EngineError::Tensor)?;
    let log_root = root_entry.log().map_err(EngineError::Tensor)?;
    let log_lik = log_root.reshape(()).map_err(EngineError::Tensor)?.add(&log_scaler_total).map_err(EngineError::Tensor)?;

    Ok(PruneOutcome::LogLik(log_lik))
}

fn indicator(dim: usize, idx: usize) -> candle_core::Result<Tensor> {
    let mut v = vec![0.0f64; dim];
    v[idx] = 1.0;
    Tensor::from_vec(v, dim, &tensor::device())
}

/// builds a length-`dim` tensor whose entry `target_idx[k]` is
/// `source[gather_idx[k]]`, zero elsewhere. Used to move a child's partial
/// likelihood into the parent's state numbering.
fn scatter_gather(source: &Tensor, dim: usize, target_idx: &[usize], gather_idx: &[usize]) -> candle_core::Result<Tensor> {
    let mut out = Tensor::zeros(&[dim], source.dtype(), source.device())?;
    for (&t, &g) in target_idx.iter().zip(gather_idx.iter()) {
        let mut mask = vec![0.0f64; dim];
        mask[t] = 1.0;
        let mask = Tensor::from_vec(mask, dim, source.device())?.to_dtype(source.dtype())?;
        let value = source.narrow(0, g, 1)?.reshape(())?;
        out = out.add(&mask.broadcast_mul(&value)?)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indel::TargetTract;
    use crate::topology::NodeSpec;

    fn meta() -> BarcodeMeta {
        BarcodeMeta::new(vec![0, 10, 20], vec![5; 3], vec![5; 3], vec![2; 3], vec![2; 3]).unwrap()
    }

    #[test]
    fn prunes_a_cherry_to_a_finite_log_likelihood() {
        let tts = TtsTuple::empty();
        let tree = Tree::build(vec![
            NodeSpec { node_id: 0, is_leaf: false, children: vec![1, 2], observed_tts: None, observed_singletons: None },
            NodeSpec { node_id: 1, is_leaf: true, children: vec![], observed_tts: Some(tts.clone()), observed_singletons: None },
            NodeSpec { node_id: 2, is_leaf: true, children: vec![], observed_tts: Some(tts), observed_singletons: None },
        ])
        .unwrap();
        let meta = meta();
        let pre = Preprocessed::build(&tree, &meta, 1);
        let params = Parameters::random_init(3, 3, 0.5, 99);
        match prune(&tree, &meta, &params, &pre).unwrap() {
            PruneOutcome::LogLik(t) => {
                let v = t.to_scalar::<f64>().unwrap();
                assert!(v.is_finite());
                assert!(v <= 0.0 + 1e-6);
            }
            PruneOutcome::ZeroLikelihood { .. } => panic!("expected a finite log-likelihood for matching leaves"),
        }
    }

    #[test]
    fn unreachable_leaf_tract_yields_zero_likelihood() {
        // leaf observes a tract that the root's empty AncState cannot
        // possibly be consistent with unless an ancestor also carries it;
        // with a single other sibling that disagrees entirely, the
        // intersection at the parent collapses in a way that makes the
        // first leaf's exact tuple unreachable from the root's state sum.
        let t1 = TargetTract::focal(0);
        let t2 = TargetTract::focal(2);
        let tts1 = TtsTuple::new(vec![t1]).unwrap();
        let tts2 = TtsTuple::new(vec![t2]).unwrap();
        let tree = Tree::build(vec![
            NodeSpec { node_id: 0, is_leaf: false, children: vec![1, 2], observed_tts: None, observed_singletons: None },
            NodeSpec { node_id: 1, is_leaf: true, children: vec![], observed_tts: Some(tts1), observed_singletons: None },
            NodeSpec { node_id: 2, is_leaf: true, children: vec![], observed_tts: Some(tts2), observed_singletons: None },
        ])
        .unwrap();
        let meta = meta();
        // max_extra_steps = 0 forces the root's state sum to be exactly its
        // AncState minimum (empty), which cannot reach either leaf's tract
        // in zero extra steps once the other sibling has already consumed
        // the shared branch's one step.
        let pre = Preprocessed::build(&tree, &meta, 0);
        let params = Parameters::random_init(3, 3, 0.01, 5);
        let outcome = prune(&tree, &meta, &params, &pre).unwrap();
        match outcome {
            PruneOutcome::LogLik(t) => panic!(
                "expected ZeroLikelihood for a topology the zero-extra-step state sum can't \
                 reconcile, got a finite log-likelihood of {}",
                t.to_scalar::<f64>().unwrap()
            ),
            PruneOutcome::ZeroLikelihood { node_id } => assert_eq!(node_id, 0),
        }
    }
}
