//! Flow graph implementation using petgraph.
//!
//! A flow is a directed graph of nodes and edges. Cycles are permitted;
//! the traversal engine bounds execution with a step budget instead of
//! rejecting cyclic structures.

use crate::edge::Edge;
use crate::error::GraphInputError;
use crate::node::{Node, NodeId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// An agent's flow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraph {
    /// The underlying directed graph.
    #[serde(with = "graph_serde")]
    graph: DiGraph<Node, Edge>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    #[serde(skip)]
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl FlowGraph {
    /// Creates a new empty flow graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Adds a node to the graph, returning its ID.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let node_id = node.id;
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        node_id
    }

    /// Adds an edge between two existing nodes.
    ///
    /// # Errors
    ///
    /// Returns [`GraphInputError::UnknownNode`] if either endpoint does
    /// not exist.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphInputError> {
        let source_index = *self
            .node_index_map
            .get(&edge.source)
            .ok_or(GraphInputError::UnknownNode { node_id: edge.source })?;
        let target_index = *self
            .node_index_map
            .get(&edge.target)
            .ok_or(GraphInputError::UnknownNode { node_id: edge.target })?;

        self.graph.add_edge(source_index, target_index, edge);
        Ok(())
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns all nodes in definition order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns nodes with no incoming edges, in definition order.
    pub fn entry_nodes(&self) -> Vec<&Node> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.edges_directed(idx, Direction::Incoming).count() == 0)
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    /// Returns the outgoing edges of a node in definition order.
    pub fn outgoing_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.directed_edges(node_id, Direction::Outgoing)
    }

    /// Returns the incoming edges of a node in definition order.
    pub fn incoming_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.directed_edges(node_id, Direction::Incoming)
    }

    fn directed_edges(&self, node_id: NodeId, direction: Direction) -> Vec<&Edge> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };
        // petgraph iterates newest-first; reverse to restore definition
        // order so traversal stays deterministic.
        let mut edges: Vec<&Edge> = self
            .graph
            .edges_directed(index, direction)
            .map(|e| e.weight())
            .collect();
        edges.reverse();
        edges
    }

    /// Returns the strict ancestors of a node (every node with a directed
    /// path to it, excluding the node itself).
    #[must_use]
    pub fn ancestors_of(&self, node_id: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([node_id]);
        while let Some(current) = queue.pop_front() {
            for edge in self.incoming_edges(current) {
                if edge.source != node_id && seen.insert(edge.source) {
                    queue.push_back(edge.source);
                }
            }
        }
        seen
    }

    /// Validates the flow graph structure.
    ///
    /// Checks that every edge endpoint references an existing node and
    /// that at least one entry node exists. Cycles are allowed; the step
    /// budget bounds execution at run time.
    ///
    /// # Errors
    ///
    /// Returns an error describing the structural problem.
    pub fn validate(&self) -> Result<(), GraphInputError> {
        for edge in self.graph.edge_weights() {
            if !self.node_index_map.contains_key(&edge.source) {
                return Err(GraphInputError::UnknownNode { node_id: edge.source });
            }
            if !self.node_index_map.contains_key(&edge.target) {
                return Err(GraphInputError::UnknownNode { node_id: edge.target });
            }
        }

        if self.node_count() > 0 && self.entry_nodes().is_empty() {
            return Err(GraphInputError::NoEntryNode);
        }

        Ok(())
    }

    /// Rebuilds the node index map after deserialization.
    pub fn rebuild_index_map(&mut self) {
        self.node_index_map.clear();
        for index in self.graph.node_indices() {
            if let Some(node) = self.graph.node_weight(index) {
                self.node_index_map.insert(node.id, index);
            }
        }
    }
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom serde for petgraph DiGraph. Edges carry their own endpoints,
/// so the graph serializes as plain node and edge lists.
mod graph_serde {
    use super::*;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeStruct;

    pub fn serialize<S>(graph: &DiGraph<Node, Edge>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let nodes: Vec<_> = graph.node_weights().cloned().collect();
        let edges: Vec<_> = graph.edge_weights().cloned().collect();

        let mut state = serializer.serialize_struct("Graph", 2)?;
        state.serialize_field("nodes", &nodes)?;
        state.serialize_field("edges", &edges)?;
        state.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DiGraph<Node, Edge>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct GraphVisitor;

        impl<'de> Visitor<'de> for GraphVisitor {
            type Value = DiGraph<Node, Edge>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a flow graph with nodes and edges")
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut nodes: Option<Vec<Node>> = None;
                let mut edges: Option<Vec<Edge>> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "nodes" => nodes = Some(map.next_value()?),
                        "edges" => edges = Some(map.next_value()?),
                        _ => {
                            let _ = map.next_value::<serde::de::IgnoredAny>()?;
                        }
                    }
                }

                let nodes = nodes.unwrap_or_default();
                let edges = edges.unwrap_or_default();

                let mut graph = DiGraph::new();
                let mut id_to_index = HashMap::new();

                for node in nodes {
                    let id = node.id;
                    let index = graph.add_node(node);
                    id_to_index.insert(id, index);
                }

                for edge in edges {
                    let (Some(&source_idx), Some(&target_idx)) =
                        (id_to_index.get(&edge.source), id_to_index.get(&edge.target))
                    else {
                        continue;
                    };
                    graph.add_edge(source_idx, target_idx, edge);
                }

                Ok(graph)
            }
        }

        deserializer.deserialize_struct("Graph", &["nodes", "edges"], GraphVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;

    fn trigger(name: &str) -> Node {
        Node::new(name, NodeConfig::Trigger)
    }

    fn llm(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::LlmStep {
                family: flowgate_ai::ModelFamily::Local,
                system_instructions: "reply briefly".to_string(),
                temperature: None,
                max_tokens: None,
            },
        )
    }

    #[test]
    fn add_and_get_node() {
        let mut graph = FlowGraph::new();
        let node = trigger("Entry");
        let node_id = node.id;
        graph.add_node(node);

        let retrieved = graph.get_node(node_id).expect("node exists");
        assert_eq!(retrieved.name, "Entry");
    }

    #[test]
    fn add_edge_rejects_unknown_endpoint() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(trigger("A"));
        let ghost = NodeId::new();

        let result = graph.add_edge(Edge::new(a, ghost));
        assert!(matches!(result, Err(GraphInputError::UnknownNode { .. })));
    }

    #[test]
    fn entry_nodes_in_definition_order() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(trigger("A"));
        let b = graph.add_node(trigger("B"));
        let c = graph.add_node(llm("C"));
        graph.add_edge(Edge::new(a, c)).unwrap();
        graph.add_edge(Edge::new(b, c)).unwrap();

        let entries = graph.entry_nodes();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "A");
        assert_eq!(entries[1].name, "B");
    }

    #[test]
    fn outgoing_edges_in_definition_order() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(trigger("A"));
        let b = graph.add_node(llm("B"));
        let c = graph.add_node(llm("C"));
        graph.add_edge(Edge::new(a, b)).unwrap();
        graph.add_edge(Edge::new(a, c)).unwrap();

        let outgoing = graph.outgoing_edges(a);
        assert_eq!(outgoing.len(), 2);
        assert_eq!(outgoing[0].target, b);
        assert_eq!(outgoing[1].target, c);
    }

    #[test]
    fn validate_accepts_cycles() {
        let mut graph = FlowGraph::new();
        let entry = graph.add_node(trigger("Entry"));
        let a = graph.add_node(llm("A"));
        let b = graph.add_node(llm("B"));
        graph.add_edge(Edge::new(entry, a)).unwrap();
        graph.add_edge(Edge::new(a, b)).unwrap();
        graph.add_edge(Edge::new(b, a)).unwrap();

        assert!(graph.validate().is_ok());
    }

    #[test]
    fn validate_requires_entry_node() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(llm("A"));
        let b = graph.add_node(llm("B"));
        graph.add_edge(Edge::new(a, b)).unwrap();
        graph.add_edge(Edge::new(b, a)).unwrap();

        assert!(matches!(graph.validate(), Err(GraphInputError::NoEntryNode)));
    }

    #[test]
    fn ancestors_of_collects_transitively() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(trigger("A"));
        let b = graph.add_node(llm("B"));
        let c = graph.add_node(llm("C"));
        let d = graph.add_node(llm("D"));
        graph.add_edge(Edge::new(a, b)).unwrap();
        graph.add_edge(Edge::new(b, c)).unwrap();
        graph.add_edge(Edge::new(a, d)).unwrap();

        let ancestors = graph.ancestors_of(c);
        assert!(ancestors.contains(&a));
        assert!(ancestors.contains(&b));
        assert!(!ancestors.contains(&d));
        assert!(!ancestors.contains(&c));
    }

    #[test]
    fn graph_serde_roundtrip() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(trigger("A"));
        let b = graph.add_node(llm("B"));
        graph.add_edge(Edge::new(a, b)).unwrap();

        let json = serde_json::to_string(&graph).expect("serialize");
        let mut parsed: FlowGraph = serde_json::from_str(&json).expect("deserialize");
        parsed.rebuild_index_map();

        assert_eq!(parsed.node_count(), 2);
        assert_eq!(parsed.edge_count(), 1);
        assert!(parsed.get_node(a).is_some());
    }
}
