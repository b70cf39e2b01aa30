//! indel algebra: the combinatorial vocabulary every other module is built on.
//!
//! `TargetTract` is an abstract cut/deactivation event over a target range;
//! `Singleton` is a concrete realization of one (with trim and insertion
//! lengths); `TtsTuple` is an ordered, non-overlapping sequence of
//! `TargetTract`s describing a barcode's full edit state; `AncState` is a
//! coarser bound on a tuple, used for ancestral nodes whose exact state is
//! unknown.

mod anc_state;
mod singleton;
mod target_tract;
mod tts_tuple;

pub use anc_state::{AncState, IndelSet};
pub use singleton::Singleton;
pub use target_tract::TargetTract;
pub use tts_tuple::{target_tract_repr_diff, TtsTuple};
