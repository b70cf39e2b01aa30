use crate::NodeId;

/// configuration errors surfaced by [`crate::engine::build_engine`]. these are
/// fail-fast: the caller handed us a barcode descriptor or topology that can
/// never produce a consistent engine, regardless of parameters.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("barcode target {index} has negative abs_cut_site {value}")]
    NegativeCutSite { index: usize, value: i64 },

    #[error("barcode target {index} has left_long_trim_min {long} > left_max_trim {max}")]
    LeftLongExceedsMax { index: usize, long: i64, max: i64 },

    #[error("barcode target {index} has right_long_trim_min {long} > right_max_trim {max}")]
    RightLongExceedsMax { index: usize, long: i64, max: i64 },

    #[error("barcode metadata arrays have inconsistent lengths ({n_targets} targets expected)")]
    RaggedMeta { n_targets: usize },

    #[error("topology node ids are not a permutation of 0..{expected}")]
    NodeIdsNotContiguous { expected: usize },

    #[error("topology has {count} root nodes, expected exactly 1")]
    NotExactlyOneRoot { count: usize },

    #[error("leaf node {node_id} has no observed target-tract tuple")]
    LeafMissingObservation { node_id: NodeId },

    #[error("internal node {node_id} is marked as a leaf and has children")]
    LeafHasChildren { node_id: NodeId },

    #[error("node {node_id} references nonexistent child {child_id}")]
    DanglingChild { node_id: NodeId, child_id: NodeId },

    #[error("target tract is malformed: {0}")]
    BadTargetTract(String),
}

/// fatal invariant violations raised mid-[`crate::engine::Engine::log_lik`]. a
/// numeric degeneracy (zero likelihood) is *not* one of these — it is
/// surfaced to the optimizer as `-inf` rather than raised here. these are bugs
/// in the combinatorial preprocessing or in candidate parameters so extreme
/// they break the CTMC's algebra (e.g. a negative rate), not ordinary MLE noise.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("node {node_id} row {row} of Q sums to {sum}, expected 0 within {tol}")]
    RowSumNotZero {
        node_id: NodeId,
        row: usize,
        sum: f64,
        tol: f64,
    },

    #[error(
        "node {node_id} row {row} has negative mass to the unlikely sink ({mass}); \
         hazard_away must dominate the sum of likely-transition hazards"
    )]
    NegativeMassToUnlikely {
        node_id: NodeId,
        row: usize,
        mass: f64,
    },

    #[error("node {node_id} branch probability matrix has a non-finite entry after exp(Qt)")]
    NonFiniteBranchProbability { node_id: NodeId },

    #[error("gradient of log-likelihood is non-finite")]
    NonFiniteGradient,

    #[error("candle tensor op failed: {0}")]
    Tensor(#[from] candle_core::Error),
}
