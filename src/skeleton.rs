//! transition-matrix wrapper builder (§3, §4.2): a per-node numbering of a
//! [`crate::statesum::NodeStateSet`] plus the one-step reachability
//! relation between its entries, expressed purely in terms of node-local
//! dense indices so the numerical core never has to hash a `TtsTuple`.

use crate::indel::{target_tract_repr_diff, TargetTract, TtsTuple};
use crate::statesum::NodeStateSet;
use std::collections::BTreeMap;

/// a one-step transition out of a start state: which end state it lands on,
/// and the `TargetTract` event whose hazard drives it.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub end_index: usize,
    pub event: TargetTract,
}

/// per-node numbering of a `NodeStateSet` (`tts -> index`) plus, for each
/// start index, its complete list of one-step-reachable end states.
pub struct TransitionSkeleton {
    states: Vec<TtsTuple>,
    index_of: BTreeMap<TtsTuple, usize>,
    rows: Vec<Vec<Transition>>,
}

impl TransitionSkeleton {
    pub fn build(state_set: &NodeStateSet) -> Self {
        let states: Vec<TtsTuple> = state_set.states().to_vec();
        let index_of: BTreeMap<TtsTuple, usize> =
            states.iter().cloned().enumerate().map(|(i, t)| (t, i)).collect();

        let mut rows = vec![Vec::new(); states.len()];
        for (i, start) in states.iter().enumerate() {
            for (j, end) in states.iter().enumerate() {
                if i == j {
                    continue;
                }
                let lost: Vec<&TargetTract> = start
                    .events()
                    .iter()
                    .filter(|e| !end.events().contains(e))
                    .collect();
                if !lost.is_empty() {
                    continue;
                }
                let gained = target_tract_repr_diff(start, end);
                if gained.len() == 1 {
                    rows[i].push(Transition {
                        end_index: j,
                        event: gained[0],
                    });
                }
            }
        }

        Self { states, index_of, rows }
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// the index reserved for the "unlikely" sink state, one past every
    /// real state index.
    pub fn unlikely_index(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> &[TtsTuple] {
        &self.states
    }

    pub fn index_of(&self, tts: &TtsTuple) -> Option<usize> {
        self.index_of.get(tts).copied()
    }

    pub fn transitions_from(&self, start_index: usize) -> &[Transition] {
        &self.rows[start_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::BarcodeMeta;
    use crate::topology::{NodeSpec, Tree};
    use crate::indel::AncState;

    fn meta() -> BarcodeMeta {
        BarcodeMeta::new(vec![0, 10, 20], vec![5; 3], vec![5; 3], vec![2; 3], vec![2; 3]).unwrap()
    }

    #[test]
    fn indices_are_unique_and_dense() {
        let tree = Tree::build(vec![
            NodeSpec { node_id: 0, is_leaf: false, children: vec![1], observed_tts: None, observed_singletons: None },
            NodeSpec { node_id: 1, is_leaf: true, children: vec![], observed_tts: Some(TtsTuple::empty()), observed_singletons: None },
        ])
        .unwrap();
        let node = tree.node(0);
        let set = NodeStateSet::build(&node, &AncState::empty(), &meta(), 1);
        let skel = TransitionSkeleton::build(&set);
        assert_eq!(skel.num_states(), set.len());
        assert_eq!(skel.unlikely_index(), set.len());
        for (i, tts) in skel.states().iter().enumerate() {
            assert_eq!(skel.index_of(tts), Some(i));
        }
    }

    #[test]
    fn empty_to_single_focal_cut_is_one_step_reachable() {
        let tree = Tree::build(vec![
            NodeSpec { node_id: 0, is_leaf: false, children: vec![1], observed_tts: None, observed_singletons: None },
            NodeSpec { node_id: 1, is_leaf: true, children: vec![], observed_tts: Some(TtsTuple::empty()), observed_singletons: None },
        ])
        .unwrap();
        let node = tree.node(0);
        let set = NodeStateSet::build(&node, &AncState::empty(), &meta(), 1);
        let skel = TransitionSkeleton::build(&set);
        let empty_idx = skel.index_of(&TtsTuple::empty()).unwrap();
        let row = skel.transitions_from(empty_idx);
        assert_eq!(row.len(), 3);
    }
}
