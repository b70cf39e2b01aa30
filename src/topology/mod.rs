//! the caller-supplied rooted tree: node identifiers, parent/child
//! navigation, and the observed leaf alleles the likelihood is conditioned
//! on.

mod node;
mod tree;

pub use node::Node;
pub use tree::{NodeSpec, Tree};
