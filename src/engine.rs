//! external interface (§6): wires the build-once combinatorial
//! preprocessing to the per-call differentiable likelihood, and exposes the
//! penalized objective the optimizer actually climbs.

use crate::barcode::BarcodeMeta;
use crate::error::EngineError;
use crate::expm::expm;
use crate::matrix::build_q;
use crate::params::Parameters;
use crate::pruner::{prune, PruneOutcome, Preprocessed};
use crate::topology::{NodeSpec, Tree};
use crate::LogLik;
use anyhow::Context;
use candle_core::Tensor;

/// an engine bound to one topology and barcode descriptor: the build-once
/// preprocessing (ancestral states, state sums, transition skeletons) has
/// already run and is reused by every `log_lik` call. Building one is
/// idempotent and pure — it performs no validation of its own beyond what
/// [`Tree::build`] and [`BarcodeMeta::new`] already enforce on their inputs.
pub struct Engine {
    tree: Tree,
    meta: BarcodeMeta,
    pre: Preprocessed,
}

/// runs ancestral annotation, state-sum enumeration, and transition-skeleton
/// construction once for `tree` under `bcode_meta`, bounding each node's
/// state sum to `max_extra_steps` beyond its ancestral minimum.
pub fn build_engine(tree: Tree, bcode_meta: BarcodeMeta, max_extra_steps: usize) -> Engine {
    log::debug!(
        "build_engine: {} nodes, {} targets, max_extra_steps={max_extra_steps}",
        tree.num_nodes(),
        bcode_meta.n_targets(),
    );
    let pre = Preprocessed::build(&tree, &bcode_meta, max_extra_steps);
    log::debug!("build_engine: preprocessing complete");
    Engine { tree, meta: bcode_meta, pre }
}

/// convenience entry point for callers who have raw topology/barcode fields
/// rather than already-validated [`Tree`]/[`BarcodeMeta`] values: builds both,
/// chaining `.context(...)` onto whichever [`crate::error::ConfigError`] fires
/// first, per §7's "fail fast at `build_engine`".
pub fn build_engine_from_parts(
    specs: Vec<NodeSpec>,
    abs_cut_sites: Vec<i64>,
    left_max_trim: Vec<i64>,
    right_max_trim: Vec<i64>,
    left_long_trim_min: Vec<i64>,
    right_long_trim_min: Vec<i64>,
    max_extra_steps: usize,
) -> anyhow::Result<Engine> {
    let bcode_meta = BarcodeMeta::new(
        abs_cut_sites,
        left_max_trim,
        right_max_trim,
        left_long_trim_min,
        right_long_trim_min,
    )
    .context("building barcode metadata for build_engine")?;
    let tree = Tree::build(specs).context("building topology for build_engine")?;
    Ok(build_engine(tree, bcode_meta, max_extra_steps))
}

impl Engine {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn meta(&self) -> &BarcodeMeta {
        &self.meta
    }

    /// evaluates the Felsenstein log-likelihood at `params` and its gradient
    /// with respect to every entry of the flat parameter vector. A
    /// [`PruneOutcome::ZeroLikelihood`] is surfaced as `-inf` with an
    /// all-zero gradient, matching §4.8's policy of letting the optimizer
    /// reject the step rather than aborting the call.
    pub fn log_lik(&self, params: &Parameters) -> Result<(LogLik, Vec<f64>), EngineError> {
        match prune(&self.tree, &self.meta, params, &self.pre)? {
            PruneOutcome::ZeroLikelihood { node_id } => {
                log::warn!("log_lik: zero likelihood at node {node_id}, surfacing -inf");
                Ok((f64::NEG_INFINITY, vec![0.0; params.tensor().dims1().map_err(EngineError::Tensor)?]))
            }
            PruneOutcome::LogLik(log_lik) => {
                let value = log_lik.to_scalar::<f64>().map_err(EngineError::Tensor)?;
                let grad = self.gradient_of(&log_lik, params)?;
                if value.is_finite() && grad.iter().any(|g| !g.is_finite()) {
                    return Err(EngineError::NonFiniteGradient);
                }
                Ok((value, grad))
            }
        }
    }

    /// `log_lik` plus a log-barrier on branch-length positivity (coefficient
    /// `log_barr`) and a penalty pulling every non-root branch's `P(t)`
    /// diagonal toward 0.5 (coefficient `dist_to_half_pen`), per §6.
    pub fn penalized_log_lik(
        &self,
        params: &Parameters,
        log_barr: f64,
        dist_to_half_pen: f64,
    ) -> Result<(LogLik, Vec<f64>), EngineError> {
        let log_lik = match prune(&self.tree, &self.meta, params, &self.pre)? {
            PruneOutcome::ZeroLikelihood { .. } => {
                let n = params.tensor().dims1().map_err(EngineError::Tensor)?;
                return Ok((f64::NEG_INFINITY, vec![0.0; n]));
            }
            PruneOutcome::LogLik(t) => t,
        };

        let barrier = self.branch_length_barrier(params, log_barr)?;
        let half_penalty = self.diag_half_penalty(params, dist_to_half_pen)?;
        let penalized = log_lik.add(&barrier).map_err(EngineError::Tensor)?.sub(&half_penalty).map_err(EngineError::Tensor)?;

        let value = penalized.to_scalar::<f64>().map_err(EngineError::Tensor)?;
        let grad = self.gradient_of(&penalized, params)?;
        Ok((value, grad))
    }

    fn gradient_of(&self, scalar: &Tensor, params: &Parameters) -> Result<Vec<f64>, EngineError> {
        let grads = scalar.backward().map_err(EngineError::Tensor)?;
        let grad_tensor = match grads.get(params.var().as_tensor()) {
            Some(g) => g.clone(),
            None => Tensor::zeros_like(params.tensor()).map_err(EngineError::Tensor)?,
        };
        grad_tensor.to_vec1::<f64>().map_err(EngineError::Tensor)
    }

    fn branch_length_barrier(&self, params: &Parameters, log_barr: f64) -> Result<Tensor, EngineError> {
        let lens = params.branch_lens().map_err(EngineError::Tensor)?;
        let log_lens = lens.log().map_err(EngineError::Tensor)?;
        log_lens.sum_all().map_err(EngineError::Tensor)?.affine(log_barr, 0.0).map_err(EngineError::Tensor)
    }

    fn diag_half_penalty(&self, params: &Parameters, dist_to_half_pen: f64) -> Result<Tensor, EngineError> {
        let mut total = crate::tensor::scalar(0.0).map_err(EngineError::Tensor)?;
        for node_id in self.tree.postorder() {
            let node = self.tree.node(node_id);
            if node.is_root() {
                continue;
            }
            let skeleton = &self.pre.skeletons[&node_id];
            let q = build_q(node_id, skeleton, self.meta.n_targets(), params)?;
            let branch_len = params.branch_len(node_id).map_err(EngineError::Tensor)?;
            let p = expm(node_id, &q, &branch_len)?;
            let s = skeleton.num_states();
            for i in 0..s {
                let entry = p.narrow(0, i, 1).map_err(EngineError::Tensor)?.narrow(1, i, 1).map_err(EngineError::Tensor)?.reshape(()).map_err(EngineError::Tensor)?;
                let deviation = entry.affine(1.0, -0.5).map_err(EngineError::Tensor)?;
                let squared = deviation.sqr().map_err(EngineError::Tensor)?;
                total = total.add(&squared).map_err(EngineError::Tensor)?;
            }
        }
        total.affine(dist_to_half_pen, 0.0).map_err(EngineError::Tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indel::TtsTuple;
    use crate::topology::NodeSpec;

    fn meta() -> BarcodeMeta {
        BarcodeMeta::new(vec![0, 10], vec![5; 2], vec![5; 2], vec![2; 2], vec![2; 2]).unwrap()
    }

    fn one_leaf_tree() -> Tree {
        Tree::build(vec![NodeSpec {
            node_id: 0,
            is_leaf: true,
            children: vec![],
            observed_tts: Some(TtsTuple::empty()),
            observed_singletons: None,
        }])
        .unwrap()
    }

    #[test]
    fn log_lik_is_finite_for_a_root_leaf_matching_the_unedited_state() {
        let tree = one_leaf_tree();
        let engine = build_engine(tree, meta(), 1);
        let params = Parameters::random_init(2, 1, 1.0, 0);
        let (value, grad) = engine.log_lik(&params).unwrap();
        assert!(value.is_finite());
        assert_eq!(grad.len(), params.tensor().dims1().unwrap());
    }

    #[test]
    fn log_lik_is_deterministic() {
        let tree = one_leaf_tree();
        let engine = build_engine(tree, meta(), 1);
        let params = Parameters::random_init(2, 1, 1.0, 7);
        let (v1, g1) = engine.log_lik(&params).unwrap();
        let (v2, g2) = engine.log_lik(&params).unwrap();
        assert_eq!(v1.to_bits(), v2.to_bits());
        assert_eq!(g1, g2);
    }

    #[test]
    fn penalized_log_lik_differs_from_plain_log_lik_when_coefficients_are_nonzero() {
        let tree = one_leaf_tree();
        let engine = build_engine(tree, meta(), 1);
        let params = Parameters::random_init(2, 1, 1.0, 3);
        let (plain, _) = engine.log_lik(&params).unwrap();
        let (penalized, grad) = engine.penalized_log_lik(&params, 0.1, 0.1).unwrap();
        assert_ne!(plain, penalized);
        assert_eq!(grad.len(), params.tensor().dims1().unwrap());
    }

    #[test]
    fn build_engine_from_parts_fails_fast_on_bad_barcode_meta() {
        let specs = vec![NodeSpec {
            node_id: 0,
            is_leaf: true,
            children: vec![],
            observed_tts: Some(TtsTuple::empty()),
            observed_singletons: None,
        }];
        let err = build_engine_from_parts(specs, vec![0, 10], vec![5, 5], vec![5, 5], vec![6, 2], vec![2, 2], 1);
        assert!(err.is_err());
    }
}
