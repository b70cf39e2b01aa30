use crate::error::ConfigError;
use crate::Target;
use serde::{Deserialize, Serialize};
use std::fmt;

/// an abstract cut-and-deactivation event: target `min_cut` and `max_cut` are
/// where the two cuts land, `min_deact`/`max_deact` the full span of targets
/// deactivated as a result (which can extend past the cuts when a trim is
/// "long" and eats into a neighbouring target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetTract {
    pub min_deact: Target,
    pub min_cut: Target,
    pub max_cut: Target,
    pub max_deact: Target,
    pub is_left_long: bool,
    pub is_right_long: bool,
}

impl TargetTract {
    /// builds a `TargetTract`, deriving the long-trim flags from the cut and
    /// deactivation bounds rather than trusting the caller to pass them
    /// consistently.
    pub fn new(
        min_deact: Target,
        min_cut: Target,
        max_cut: Target,
        max_deact: Target,
    ) -> Result<Self, ConfigError> {
        if !(min_deact <= min_cut && min_cut <= max_cut && max_cut <= max_deact) {
            return Err(ConfigError::BadTargetTract(format!(
                "require min_deact({min_deact}) <= min_cut({min_cut}) <= max_cut({max_cut}) <= max_deact({max_deact})"
            )));
        }
        Ok(Self {
            min_deact,
            min_cut,
            max_cut,
            max_deact,
            is_left_long: min_deact < min_cut,
            is_right_long: max_cut < max_deact,
        })
    }

    /// a tract whose single cut lands exactly on `target`, with no long trim
    /// on either side
    pub fn focal(target: Target) -> Self {
        Self {
            min_deact: target,
            min_cut: target,
            max_cut: target,
            max_deact: target,
            is_left_long: false,
            is_right_long: false,
        }
    }

    pub fn is_focal(&self) -> bool {
        self.min_cut == self.max_cut
    }

    /// targets in `min_deact..=max_deact`, inclusive
    pub fn deactivated_range(&self) -> (Target, Target) {
        (self.min_deact, self.max_deact)
    }
}

impl fmt::Display for TargetTract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}{},{}{}]",
            self.min_deact,
            if self.is_left_long { "L" } else { "" },
            self.max_deact,
            if self.is_right_long { "R" } else { "" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_long_flags() {
        let tt = TargetTract::new(0, 1, 1, 2).unwrap();
        assert!(tt.is_left_long);
        assert!(tt.is_right_long);
        assert!(!tt.is_focal());
    }

    #[test]
    fn focal_has_no_long_flags() {
        let tt = TargetTract::focal(3);
        assert!(!tt.is_left_long);
        assert!(!tt.is_right_long);
        assert!(tt.is_focal());
    }

    #[test]
    fn rejects_out_of_order_bounds() {
        assert!(TargetTract::new(2, 1, 1, 2).is_err());
        assert!(TargetTract::new(0, 2, 1, 3).is_err());
    }
}
