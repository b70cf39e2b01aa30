use crate::barcode::BarcodeMeta;
use crate::error::ConfigError;
use crate::indel::TargetTract;
use serde::{Deserialize, Serialize};

/// a concrete realization of a `TargetTract`: where the allele actually got
/// cut and trimmed, and what (if anything) got inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Singleton {
    pub target_tract: TargetTract,
    pub start_pos: i64,
    pub del_len: i64,
    pub insert_len: i64,
}

impl Singleton {
    pub fn new(
        target_tract: TargetTract,
        start_pos: i64,
        del_len: i64,
        insert_len: i64,
        meta: &BarcodeMeta,
    ) -> Result<Self, ConfigError> {
        if del_len < 0 || insert_len < 0 {
            return Err(ConfigError::BadTargetTract(format!(
                "singleton del_len({del_len}) and insert_len({insert_len}) must be non-negative"
            )));
        }
        let left_floor = meta.left_trim_floor(target_tract.min_cut);
        let right_ceiling = meta.right_trim_ceiling(target_tract.max_cut);
        if start_pos < left_floor || start_pos + del_len > right_ceiling + 1 {
            return Err(ConfigError::BadTargetTract(format!(
                "singleton span [{start_pos}, {}) falls outside barcode trim bounds [{left_floor}, {})",
                start_pos + del_len,
                right_ceiling + 1,
            )));
        }
        Ok(Self {
            target_tract,
            start_pos,
            del_len,
            insert_len,
        })
    }

    pub fn end_pos(&self) -> i64 {
        self.start_pos + self.del_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> BarcodeMeta {
        BarcodeMeta::new(vec![0, 10, 20], vec![5, 5, 5], vec![5, 5, 5], vec![2, 2, 2], vec![2, 2, 2])
            .unwrap()
    }

    #[test]
    fn accepts_span_within_bounds() {
        let tt = TargetTract::focal(1);
        let s = Singleton::new(tt, 6, 8, 0, &meta()).unwrap();
        assert_eq!(s.end_pos(), 14);
    }

    #[test]
    fn rejects_span_past_right_ceiling() {
        let tt = TargetTract::focal(1);
        assert!(Singleton::new(tt, 6, 20, 0, &meta()).is_err());
    }

    #[test]
    fn rejects_negative_lengths() {
        let tt = TargetTract::focal(1);
        assert!(Singleton::new(tt, 6, -1, 0, &meta()).is_err());
    }
}
