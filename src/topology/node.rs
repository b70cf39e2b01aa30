use crate::indel::{Singleton, TtsTuple};
use crate::topology::tree::NodeData;
use crate::NodeId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction::{Incoming, Outgoing};

/// a thin, `Copy` handle into a [`crate::topology::Tree`]'s graph: cheap to
/// pass around, holds a reference back to the graph for navigation.
#[derive(Debug, Clone, Copy)]
pub struct Node<'tree> {
    index: NodeIndex,
    graph: &'tree DiGraph<NodeData, ()>,
}

impl<'tree> From<(NodeIndex, &'tree DiGraph<NodeData, ()>)> for Node<'tree> {
    fn from((index, graph): (NodeIndex, &'tree DiGraph<NodeData, ()>)) -> Self {
        Self { index, graph }
    }
}

impl<'tree> Node<'tree> {
    fn data(&self) -> &NodeData {
        self.graph.node_weight(self.index).expect("valid node index")
    }

    pub fn node_id(&self) -> NodeId {
        self.data().node_id
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn is_leaf(&self) -> bool {
        self.data().is_leaf
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    pub fn observed_tts(&self) -> Option<&TtsTuple> {
        self.data().observed_tts.as_ref()
    }

    pub fn observed_singletons(&self) -> Option<&[Singleton]> {
        self.data().observed_singletons.as_deref()
    }

    pub fn parent(&self) -> Option<Node<'tree>> {
        self.graph
            .neighbors_directed(self.index, Incoming)
            .next()
            .map(|idx| Node::from((idx, self.graph)))
    }

    pub fn children(&self) -> Vec<Node<'tree>> {
        self.graph
            .neighbors_directed(self.index, Outgoing)
            .map(|idx| Node::from((idx, self.graph)))
            .collect()
    }
}

impl<'tree> std::fmt::Display for Node<'tree> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node({})", self.node_id())
    }
}
