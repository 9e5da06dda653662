//! Backend-owned entities and the client-local records that sit beside them.

pub mod edge;
pub mod graph;
pub mod layout;
pub mod node;
pub mod technique;
pub mod user;

pub use edge::{Edge, EdgeType, EdgeUpdate, NewEdge};
pub use graph::{Graph, NewGraph};
pub use layout::{Position, PositionMap, Theme};
pub use node::{NewNode, Node};
pub use technique::TechniqueNote;
pub use user::{Credentials, NewUser, TokenResponse, User};

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }
    };
}

entity_id!(UserId);
entity_id!(GraphId);
entity_id!(NodeId);
entity_id!(EdgeId);
