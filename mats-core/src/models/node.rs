use serde::{Deserialize, Serialize};

use super::{GraphId, NodeId};

/// A technique: a named position or move inside one graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub graph_id: GraphId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNode {
    pub name: String,
    pub graph_id: GraphId,
}
