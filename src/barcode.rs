use crate::error::ConfigError;
use crate::Target;
use serde::{Deserialize, Serialize};

/// static description of an unedited barcode: the number of targets, their
/// absolute cut-site positions, and the per-target trim bounds that gate
/// whether a trim counts as "long" for the hazard model (§4.3).
///
/// immutable once built; shared by reference across every node of a
/// [`crate::topology::Tree`] and every [`crate::engine::Engine`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeMeta {
    n_targets: usize,
    abs_cut_sites: Vec<i64>,
    left_max_trim: Vec<i64>,
    right_max_trim: Vec<i64>,
    left_long_trim_min: Vec<i64>,
    right_long_trim_min: Vec<i64>,
}

impl BarcodeMeta {
    pub fn new(
        abs_cut_sites: Vec<i64>,
        left_max_trim: Vec<i64>,
        right_max_trim: Vec<i64>,
        left_long_trim_min: Vec<i64>,
        right_long_trim_min: Vec<i64>,
    ) -> Result<Self, ConfigError> {
        let n_targets = abs_cut_sites.len();
        if left_max_trim.len() != n_targets
            || right_max_trim.len() != n_targets
            || left_long_trim_min.len() != n_targets
            || right_long_trim_min.len() != n_targets
        {
            return Err(ConfigError::RaggedMeta { n_targets });
        }
        for i in 0..n_targets {
            if abs_cut_sites[i] < 0 {
                return Err(ConfigError::NegativeCutSite {
                    index: i,
                    value: abs_cut_sites[i],
                });
            }
            if left_long_trim_min[i] > left_max_trim[i] {
                return Err(ConfigError::LeftLongExceedsMax {
                    index: i,
                    long: left_long_trim_min[i],
                    max: left_max_trim[i],
                });
            }
            if right_long_trim_min[i] > right_max_trim[i] {
                return Err(ConfigError::RightLongExceedsMax {
                    index: i,
                    long: right_long_trim_min[i],
                    max: right_max_trim[i],
                });
            }
        }
        Ok(Self {
            n_targets,
            abs_cut_sites,
            left_max_trim,
            right_max_trim,
            left_long_trim_min,
            right_long_trim_min,
        })
    }

    pub fn n_targets(&self) -> usize {
        self.n_targets
    }
    pub fn abs_cut_site(&self, target: Target) -> i64 {
        self.abs_cut_sites[target]
    }
    pub fn left_max_trim(&self, target: Target) -> i64 {
        self.left_max_trim[target]
    }
    pub fn right_max_trim(&self, target: Target) -> i64 {
        self.right_max_trim[target]
    }
    pub fn left_long_trim_min(&self, target: Target) -> i64 {
        self.left_long_trim_min[target]
    }
    pub fn right_long_trim_min(&self, target: Target) -> i64 {
        self.right_long_trim_min[target]
    }

    /// leftmost coordinate a trim starting at `target` could reach
    pub fn left_trim_floor(&self, target: Target) -> i64 {
        self.abs_cut_sites[target] - self.left_max_trim[target]
    }
    /// rightmost coordinate a trim starting at `target` could reach
    pub fn right_trim_ceiling(&self, target: Target) -> i64 {
        self.abs_cut_sites[target] + self.right_max_trim[target]
    }
}

impl crate::Arbitrary for BarcodeMeta {
    /// a small, always-valid barcode descriptor (2-5 targets, uniform trim
    /// bounds) for property tests that don't care about barcode size.
    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let n = rng.gen_range(2..=5usize);
        let cuts = (0..n as i64).map(|i| i * 10).collect();
        BarcodeMeta::new(cuts, vec![5; n], vec![5; n], vec![2; n], vec![2; n])
            .expect("fixed small dimensions satisfy BarcodeMeta::new's invariants")
    }
}
