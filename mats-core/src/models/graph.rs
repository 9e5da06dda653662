use serde::{Deserialize, Serialize};

use super::{GraphId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub id: GraphId,
    pub title: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGraph {
    pub title: String,
    pub user_id: UserId,
}
