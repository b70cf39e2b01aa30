//! state-sum approximator (§4.2): per node, the finite set of `TtsTuple`s
//! considered possible under a bounded "extra steps" heuristic.
//!
//! Extra steps beyond a node's `AncState` minimum are restricted to single-
//! target focal cuts landing in a target the `AncState` leaves unresolved
//! (either entirely free, or inside a `Wildcard` range). This is narrower
//! than the fully general hazard-admissible event space, but combinatorially
//! bounded and sufficient for every concrete scenario the likelihood needs
//! to discriminate between.

use crate::barcode::BarcodeMeta;
use crate::indel::{AncState, IndelSet, TargetTract, TtsTuple};
use crate::topology::Node;

/// the finite set of `TtsTuple`s a node's partial likelihood is indexed
/// over.
#[derive(Debug, Clone)]
pub struct NodeStateSet(Vec<TtsTuple>);

impl NodeStateSet {
    pub fn states(&self) -> &[TtsTuple] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn index_of(&self, tts: &TtsTuple) -> Option<usize> {
        self.0.iter().position(|t| t == tts)
    }

    fn resolved_targets(anc: &AncState) -> Vec<usize> {
        anc.indel_sets()
            .iter()
            .flat_map(|s| {
                let (lo, hi) = s.target_range();
                lo..=hi
            })
            .collect()
    }

    fn free_targets(anc: &AncState, n_targets: usize) -> Vec<usize> {
        let resolved = Self::resolved_targets(anc);
        (0..n_targets).filter(|t| !resolved.contains(t)).collect()
    }

    /// builds the state set for a single node: leaves get a singleton set
    /// from their observation, the root gets `{empty}`, and internal nodes
    /// enumerate `anc_state.min_tts()` plus every combination of up to
    /// `max_extra_steps` additional focal cuts in currently-free targets.
    pub fn build(node: &Node, anc_state: &AncState, meta: &BarcodeMeta, max_extra_steps: usize) -> Self {
        if let Some(tts) = node.observed_tts() {
            return Self(vec![tts.clone()]);
        }
        if node.is_root() {
            return Self(vec![TtsTuple::empty()]);
        }

        let base = anc_state.min_tts();
        let free = Self::free_targets(anc_state, meta.n_targets());

        let mut states = Vec::new();
        for k in 0..=max_extra_steps.min(free.len()) {
            for combo in combinations(&free, k) {
                let mut events: Vec<TargetTract> = base.events().to_vec();
                events.extend(combo.iter().map(|&t| TargetTract::focal(t)));
                events.sort_by_key(|e| e.min_deact);
                if let Ok(tts) = TtsTuple::new(events) {
                    if !states.contains(&tts) {
                        states.push(tts);
                    }
                }
            }
        }
        Self(states)
    }
}

/// all `k`-element subsets of `items`, in lexicographic index order.
fn combinations(items: &[usize], k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if k > items.len() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut chosen = Vec::with_capacity(k);
    combinations_rec(items, k, 0, &mut chosen, &mut out);
    out
}

fn combinations_rec(
    items: &[usize],
    k: usize,
    start: usize,
    chosen: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if chosen.len() == k {
        out.push(chosen.clone());
        return;
    }
    let remaining_needed = k - chosen.len();
    if items.len() < start + remaining_needed {
        return;
    }
    for i in start..items.len() {
        chosen.push(items[i]);
        combinations_rec(items, k, i + 1, chosen, out);
        chosen.pop();
    }
}
