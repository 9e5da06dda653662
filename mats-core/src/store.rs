//! Client-local key-value store.
//!
//! Holds the state the backend does not own: per-graph node positions, the
//! theme preference and the bearer token. Every write is flushed before
//! returning. Reads follow a load-or-default contract: a missing or
//! unreadable record yields the default value, never an error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::error::MatsError;
use crate::models::{GraphId, PositionMap, Theme};

const THEME_KEY: &str = "theme";
const TOKEN_KEY: &str = "auth_token";

fn positions_key(graph: GraphId) -> String {
    format!("positions:{}", graph)
}

#[derive(Clone)]
pub struct LocalStore {
    db: sled::Db,
}

impl LocalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MatsError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory store discarded on drop.
    pub fn temporary() -> Result<Self, MatsError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MatsError> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), MatsError> {
        let bytes = serde_json::to_vec(value)?;
        self.db.insert(key, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), MatsError> {
        self.db.remove(key)?;
        self.db.flush()?;
        Ok(())
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.get_json(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(key, error = %e, "Unreadable local record, using default");
                T::default()
            }
        }
    }

    // --- positions ---------------------------------------------------------

    pub fn load_positions(&self, graph: GraphId) -> PositionMap {
        self.load_or_default(&positions_key(graph))
    }

    pub fn save_positions(&self, graph: GraphId, positions: &PositionMap) -> Result<(), MatsError> {
        self.put_json(&positions_key(graph), positions)
    }

    // --- theme -------------------------------------------------------------

    pub fn load_theme(&self) -> Theme {
        self.load_or_default(THEME_KEY)
    }

    pub fn save_theme(&self, theme: Theme) -> Result<(), MatsError> {
        self.put_json(THEME_KEY, &theme)
    }

    // --- token -------------------------------------------------------------

    pub fn load_token(&self) -> Option<String> {
        self.load_or_default(TOKEN_KEY)
    }

    pub fn save_token(&self, token: &str) -> Result<(), MatsError> {
        self.put_json(TOKEN_KEY, token)
    }

    pub fn clear_token(&self) -> Result<(), MatsError> {
        self.remove(TOKEN_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeId, Position};

    #[test]
    fn test_positions_round_trip_per_graph() {
        let store = LocalStore::temporary().unwrap();
        let mut positions = PositionMap::new();
        positions.insert(NodeId(1), Position::new(12.0, 34.0));
        positions.insert(NodeId(2), Position::new(-5.0, 0.5));

        store.save_positions(GraphId(1), &positions).unwrap();

        assert_eq!(store.load_positions(GraphId(1)), positions);
        assert!(store.load_positions(GraphId(2)).is_empty());
    }

    #[test]
    fn test_corrupt_positions_fall_back_to_empty() {
        let store = LocalStore::temporary().unwrap();
        store.db.insert("positions:3", b"not json".to_vec()).unwrap();
        assert!(store.load_positions(GraphId(3)).is_empty());
    }

    #[test]
    fn test_theme_defaults_to_light_and_persists() {
        let store = LocalStore::temporary().unwrap();
        assert_eq!(store.load_theme(), Theme::Light);
        store.save_theme(Theme::Dark).unwrap();
        assert_eq!(store.load_theme(), Theme::Dark);
    }

    #[test]
    fn test_token_save_and_clear() {
        let store = LocalStore::temporary().unwrap();
        assert!(store.load_token().is_none());
        store.save_token("abc").unwrap();
        assert_eq!(store.load_token().as_deref(), Some("abc"));
        store.clear_token().unwrap();
        assert!(store.load_token().is_none());
    }

    #[test]
    fn test_clones_share_the_same_database() {
        let store = LocalStore::temporary().unwrap();
        let other = store.clone();
        store.save_theme(Theme::Dark).unwrap();
        assert_eq!(other.load_theme(), Theme::Dark);
    }
}
