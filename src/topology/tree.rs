use crate::error::ConfigError;
use crate::indel::{Singleton, TtsTuple};
use crate::topology::Node;
use crate::NodeId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction::Incoming;

/// one caller-supplied node: its declared leaf-ness, its children by id, and
/// (for leaves) the observed target-tract tuple read off the real allele,
/// plus the concrete singletons that realize it (needed for trim/insertion
/// conditioning, since `TtsTuple` only records the abstract events).
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub node_id: NodeId,
    pub is_leaf: bool,
    pub children: Vec<NodeId>,
    pub observed_tts: Option<TtsTuple>,
    pub observed_singletons: Option<Vec<Singleton>>,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub node_id: NodeId,
    pub is_leaf: bool,
    pub observed_tts: Option<TtsTuple>,
    pub observed_singletons: Option<Vec<Singleton>>,
}

/// a rooted tree built from caller-supplied [`NodeSpec`]s. node ids are
/// preserved as `petgraph` indices, so `node_id` and `NodeIndex` coincide.
pub struct Tree {
    graph: DiGraph<NodeData, ()>,
    root: NodeIndex,
}

impl Tree {
    pub fn build(specs: Vec<NodeSpec>) -> Result<Self, ConfigError> {
        let n = specs.len();
        let mut by_id: Vec<Option<&NodeSpec>> = vec![None; n];
        for spec in &specs {
            if spec.node_id >= n || by_id[spec.node_id].is_some() {
                return Err(ConfigError::NodeIdsNotContiguous { expected: n });
            }
            by_id[spec.node_id] = Some(spec);
        }
        let ordered: Vec<&NodeSpec> = by_id
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(ConfigError::NodeIdsNotContiguous { expected: n })?;

        let mut graph = DiGraph::with_capacity(n, n.saturating_sub(1));
        for spec in &ordered {
            if spec.is_leaf && !spec.children.is_empty() {
                return Err(ConfigError::LeafHasChildren { node_id: spec.node_id });
            }
            if spec.is_leaf && spec.observed_tts.is_none() {
                return Err(ConfigError::LeafMissingObservation { node_id: spec.node_id });
            }
            let idx = graph.add_node(NodeData {
                node_id: spec.node_id,
                is_leaf: spec.is_leaf,
                observed_tts: spec.observed_tts.clone(),
                observed_singletons: spec.observed_singletons.clone(),
            });
            debug_assert_eq!(idx.index(), spec.node_id);
        }
        for spec in &ordered {
            for &child_id in &spec.children {
                if child_id >= n {
                    return Err(ConfigError::DanglingChild {
                        node_id: spec.node_id,
                        child_id,
                    });
                }
                graph.add_edge(NodeIndex::new(spec.node_id), NodeIndex::new(child_id), ());
            }
        }

        let roots: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|&idx| graph.neighbors_directed(idx, Incoming).next().is_none())
            .collect();
        if roots.len() != 1 {
            return Err(ConfigError::NotExactlyOneRoot { count: roots.len() });
        }

        Ok(Self { graph, root: roots[0] })
    }

    pub fn root(&self) -> Node<'_> {
        Node::from((self.root, &self.graph))
    }

    pub fn node(&self, node_id: NodeId) -> Node<'_> {
        Node::from((NodeIndex::new(node_id), &self.graph))
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub(crate) fn graph_ref(&self) -> &DiGraph<NodeData, ()> {
        &self.graph
    }

    /// node ids in postorder: every node appears after all of its children
    pub fn postorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.graph.node_count());
        let mut stack = vec![(self.root, false)];
        while let Some((idx, visited_children)) = stack.pop() {
            if visited_children {
                order.push(idx.index());
                continue;
            }
            stack.push((idx, true));
            for child in self.node(idx.index()).children() {
                stack.push((child.index(), false));
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cherry() -> Tree {
        Tree::build(vec![
            NodeSpec { node_id: 0, is_leaf: false, children: vec![1, 2], observed_tts: None, observed_singletons: None },
            NodeSpec { node_id: 1, is_leaf: true, children: vec![], observed_tts: Some(TtsTuple::empty()), observed_singletons: None },
            NodeSpec { node_id: 2, is_leaf: true, children: vec![], observed_tts: Some(TtsTuple::empty()), observed_singletons: None },
        ])
        .unwrap()
    }

    #[test]
    fn builds_cherry_with_one_root() {
        let tree = cherry();
        assert_eq!(tree.root().node_id(), 0);
        assert_eq!(tree.num_nodes(), 3);
    }

    #[test]
    fn postorder_visits_children_before_parent() {
        let tree = cherry();
        let order = tree.postorder();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn rejects_two_roots() {
        let err = Tree::build(vec![
            NodeSpec { node_id: 0, is_leaf: true, children: vec![], observed_tts: Some(TtsTuple::empty()), observed_singletons: None },
            NodeSpec { node_id: 1, is_leaf: true, children: vec![], observed_tts: Some(TtsTuple::empty()), observed_singletons: None },
        ]);
        assert!(matches!(err, Err(ConfigError::NotExactlyOneRoot { count: 2 })));
    }

    #[test]
    fn rejects_leaf_with_children() {
        let err = Tree::build(vec![
            NodeSpec { node_id: 0, is_leaf: true, children: vec![1], observed_tts: Some(TtsTuple::empty()), observed_singletons: None },
            NodeSpec { node_id: 1, is_leaf: true, children: vec![], observed_tts: Some(TtsTuple::empty()), observed_singletons: None },
        ]);
        assert!(matches!(err, Err(ConfigError::LeafHasChildren { node_id: 0 })));
    }

    #[test]
    fn rejects_dangling_child() {
        let err = Tree::build(vec![NodeSpec {
            node_id: 0,
            is_leaf: false,
            children: vec![7],
            observed_tts: None,
            observed_singletons: None,
        }]);
        assert!(matches!(err, Err(ConfigError::DanglingChild { node_id: 0, child_id: 7 })));
    }
}
