//! In-memory directed slice graph
//!
//! Nodes are implied by edge endpoints, so no edge can dangle. Nodes are kept
//! ordered and edges keep their row order, which makes serialization of the
//! same rows byte-for-byte repeatable.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::aoi::{AreaOfInterest, Profile};
use crate::core::model::{EdgeRecord, NodeId};

/// Which query produced a slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceMode {
    Isochrone,
    Radius,
}

impl SliceMode {
    pub fn name(&self) -> &'static str {
        match self {
            SliceMode::Isochrone => "isochrone",
            SliceMode::Radius => "radius",
        }
    }
}

/// Graph-level description of where a slice came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceMetadata {
    pub mode: SliceMode,
    pub profile: Profile,
    pub aoi: AreaOfInterest,
}

/// Directed sub-network with cost and geometry on every edge
#[derive(Debug, Clone, Default)]
pub struct SliceGraph {
    metadata: Option<SliceMetadata>,
    nodes: BTreeSet<NodeId>,
    edges: Vec<EdgeRecord>,
}

impl SliceGraph {
    /// Build a graph with one edge per row; parallel edges are kept
    pub fn from_edges(edges: Vec<EdgeRecord>) -> Self {
        let nodes = edges
            .iter()
            .flat_map(|edge| [edge.source, edge.target])
            .collect();
        Self {
            metadata: None,
            nodes,
            edges,
        }
    }

    pub fn with_metadata(mut self, metadata: SliceMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metadata(&self) -> Option<&SliceMetadata> {
        self.metadata.as_ref()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Nodes in ascending identifier order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        self.edges.iter().filter(|edge| edge.source == node).count()
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.edges.iter().filter(|edge| edge.target == node).count()
    }
}
