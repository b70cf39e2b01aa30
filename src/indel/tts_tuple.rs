use crate::error::ConfigError;
use crate::indel::TargetTract;
use serde::{Deserialize, Serialize};

/// an ordered, non-overlapping sequence of `TargetTract`s: the full edit
/// state of a barcode at one point in the tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TtsTuple(Vec<TargetTract>);

impl TtsTuple {
    pub fn new(events: Vec<TargetTract>) -> Result<Self, ConfigError> {
        for w in events.windows(2) {
            if w[0].max_deact >= w[1].min_deact {
                return Err(ConfigError::BadTargetTract(format!(
                    "tts_tuple events overlap: {} then {}",
                    w[0], w[1]
                )));
            }
        }
        Ok(Self(events))
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn events(&self) -> &[TargetTract] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// targets still unedited under this tuple, as the set of gaps strictly
    /// between (and around) the deactivated ranges of consecutive events
    pub fn free_ranges(&self, n_targets: usize) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut cursor = 0usize;
        for e in &self.0 {
            if cursor < e.min_deact {
                ranges.push((cursor, e.min_deact - 1));
            }
            cursor = e.max_deact + 1;
        }
        if cursor < n_targets {
            ranges.push((cursor, n_targets - 1));
        }
        ranges
    }
}

impl std::ops::Index<usize> for TtsTuple {
    type Output = TargetTract;
    fn index(&self, i: usize) -> &TargetTract {
        &self.0[i]
    }
}

/// the ordered set of `TargetTract`s present in `child` but not in `parent`,
/// restricted to events whose deactivated range falls entirely inside a free
/// region of `parent` — i.e. the events a branch from `parent` to `child`
/// must have fired.
pub fn target_tract_repr_diff(parent: &TtsTuple, child: &TtsTuple) -> Vec<TargetTract> {
    let free: Vec<(usize, usize)> = {
        let max_target = parent
            .events()
            .iter()
            .chain(child.events())
            .map(|e| e.max_deact)
            .max()
            .unwrap_or(0);
        parent.free_ranges(max_target + 1)
    };
    child
        .events()
        .iter()
        .filter(|e| !parent.events().contains(e))
        .filter(|e| {
            free.iter()
                .any(|&(lo, hi)| e.min_deact >= lo && e.max_deact <= hi)
        })
        .copied()
        .collect()
}

impl crate::Arbitrary for TtsTuple {
    /// either the unedited tuple or a single random focal cut; enough
    /// variety to exercise permutation/ordering-sensitive property tests
    /// without risking an overlap.
    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        if rng.gen_bool(0.5) {
            TtsTuple::empty()
        } else {
            let target = rng.gen_range(0..4);
            TtsTuple::new(vec![TargetTract::focal(target)]).expect("a single focal cut never overlaps")
        }
    }
}
