use crate::error::ConfigError;
use crate::indel::{TargetTract, TtsTuple};
use crate::Target;
use serde::{Deserialize, Serialize};

/// one entry of an `AncState`: either a concrete `TargetTract` every
/// descendant agrees on (`SingletonWc`), or a looser bound naming only the
/// target range that is known to be edited somehow (`Wildcard`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndelSet {
    Wildcard { min_target: Target, max_target: Target },
    SingletonWc(TargetTract),
}

impl IndelSet {
    pub fn target_range(&self) -> (Target, Target) {
        match self {
            IndelSet::Wildcard { min_target, max_target } => (*min_target, *max_target),
            IndelSet::SingletonWc(tt) => (tt.min_deact, tt.max_deact),
        }
    }
}

/// a bound on an ancestral node's possible edit state: an ordered list of
/// pairwise non-overlapping `IndelSet`s. Narrower than "any TtsTuple" but
/// possibly looser than a single concrete tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncState(Vec<IndelSet>);

impl AncState {
    pub fn new(sets: Vec<IndelSet>) -> Result<Self, ConfigError> {
        for w in sets.windows(2) {
            let (_, hi0) = w[0].target_range();
            let (lo1, _) = w[1].target_range();
            if hi0 >= lo1 {
                return Err(ConfigError::BadTargetTract(
                    "anc_state indel-sets overlap in target coordinates".into(),
                ));
            }
        }
        Ok(Self(sets))
    }

    /// the root's ancestral state: fully unedited
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn indel_sets(&self) -> &[IndelSet] {
        &self.0
    }

    /// a leaf's AncState is fully resolved by its observed tuple: every
    /// event becomes a `SingletonWc`.
    pub fn from_tts(tts: &TtsTuple) -> Self {
        Self(tts.events().iter().copied().map(IndelSet::SingletonWc).collect())
    }

    /// the minimum TtsTuple compatible with this state: the `SingletonWc`
    /// entries, dropping any `Wildcard` (a wildcard imposes no fixed event).
    pub fn min_tts(&self) -> TtsTuple {
        let events: Vec<TargetTract> = self
            .0
            .iter()
            .filter_map(|s| match s {
                IndelSet::SingletonWc(tt) => Some(*tt),
                IndelSet::Wildcard { .. } => None,
            })
            .collect();
        TtsTuple::new(events).expect("AncState invariant guarantees non-overlap")
    }

    /// pairwise intersection of two children's states: a `SingletonWc` that
    /// appears (exactly) in both sides stays a `SingletonWc`; anything else
    /// that overlaps in target range collapses to a `Wildcard` spanning the
    /// union of the overlapping ranges. Entries present in only one side are
    /// dropped — a child with no information on a target contributes
    /// nothing to the intersection there.
    pub fn intersect(a: &AncState, b: &AncState) -> AncState {
        let mut out = Vec::new();
        for sa in &a.0 {
            let (lo_a, hi_a) = sa.target_range();
            for sb in &b.0 {
                let (lo_b, hi_b) = sb.target_range();
                if hi_a < lo_b || hi_b < lo_a {
                    continue;
                }
                match (sa, sb) {
                    (IndelSet::SingletonWc(ta), IndelSet::SingletonWc(tb)) if ta == tb => {
                        out.push(IndelSet::SingletonWc(*ta));
                    }
                    _ => {
                        out.push(IndelSet::Wildcard {
                            min_target: lo_a.min(lo_b),
                            max_target: hi_a.max(hi_b),
                        });
                    }
                }
            }
        }
        out.sort_by_key(|s| s.target_range());
        out.dedup();
        AncState(out)
    }

    /// intersection folded across an arbitrary number of children; an empty
    /// iterator yields the fully unconstrained state (no children means no
    /// bound is imposed by this rule — the caller is expected to supply at
    /// least one child for any internal node).
    pub fn intersect_all<'a, I: IntoIterator<Item = &'a AncState>>(children: I) -> AncState {
        let mut iter = children.into_iter();
        let Some(first) = iter.next() else {
            return AncState::empty();
        };
        let mut acc = first.clone();
        for next in iter {
            acc = AncState::intersect(&acc, next);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_state_is_empty() {
        assert!(AncState::empty().indel_sets().is_empty());
    }

    #[test]
    fn from_tts_round_trips_min_tts() {
        let tt = TargetTract::focal(1);
        let tts = TtsTuple::new(vec![tt]).unwrap();
        let anc = AncState::from_tts(&tts);
        assert_eq!(anc.min_tts(), tts);
    }

    #[test]
    fn intersect_keeps_agreeing_singleton() {
        let tt = TargetTract::focal(2);
        let a = AncState::from_tts(&TtsTuple::new(vec![tt]).unwrap());
        let b = a.clone();
        let i = AncState::intersect(&a, &b);
        assert_eq!(i.indel_sets(), &[IndelSet::SingletonWc(tt)]);
    }

    #[test]
    fn intersect_widens_disagreeing_singletons_to_wildcard() {
        let t1 = TargetTract::focal(2);
        let t2 = TargetTract::new(1, 2, 2, 3).unwrap();
        let a = AncState::from_tts(&TtsTuple::new(vec![t1]).unwrap());
        let b = AncState::from_tts(&TtsTuple::new(vec![t2]).unwrap());
        let i = AncState::intersect(&a, &b);
        assert_eq!(i.indel_sets(), &[IndelSet::Wildcard { min_target: 1, max_target: 3 }]);
    }

    #[test]
    fn intersect_all_of_one_child_is_identity() {
        let tt = TargetTract::focal(0);
        let a = AncState::from_tts(&TtsTuple::new(vec![tt]).unwrap());
        let i = AncState::intersect_all([&a]);
        assert_eq!(i, a);
    }
}
