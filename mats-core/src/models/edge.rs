use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{EdgeId, NodeId};

/// Tri-state classification of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeType::Positive => write!(f, "positive"),
            EdgeType::Neutral => write!(f, "neutral"),
            EdgeType::Negative => write!(f, "negative"),
        }
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" | "+" => Ok(EdgeType::Positive),
            "neutral" | "0" => Ok(EdgeType::Neutral),
            "negative" | "-" => Ok(EdgeType::Negative),
            other => Err(format!("unknown edge type: {}", other)),
        }
    }
}

/// A transition between two techniques.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    #[serde(default)]
    pub edge_type: EdgeType,
    #[serde(default)]
    pub label: Option<String>,
}

impl Edge {
    pub fn touches(&self, node: NodeId) -> bool {
        self.from_node_id == node || self.to_node_id == node
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEdge {
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    pub edge_type: EdgeType,
}

/// Body of `PUT /edges/:id`; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<EdgeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}
