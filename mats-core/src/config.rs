use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MatsConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: ".mats_store".to_string(),
        }
    }
}

/// Tuning for the editor's client-side behaviour (debounce windows, layout
/// geometry, search cap, viewport focus).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EditorConfig {
    pub position_debounce_ms: u64,
    pub technique_debounce_ms: u64,
    pub search_limit: usize,
    /// Side of the square used for random placement of unpositioned nodes.
    pub placement_extent: f64,
    pub grid_spacing_x: f64,
    pub grid_spacing_y: f64,
    pub grid_origin_x: f64,
    pub grid_origin_y: f64,
    pub focus_zoom: f64,
    pub focus_duration_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            position_debounce_ms: 200,
            technique_debounce_ms: 500,
            search_limit: 12,
            placement_extent: 400.0,
            grid_spacing_x: 220.0,
            grid_spacing_y: 140.0,
            grid_origin_x: 50.0,
            grid_origin_y: 50.0,
            focus_zoom: 1.5,
            focus_duration_ms: 800,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl MatsConfig {
    /// Load configuration from an optional TOML file, then apply `MATS__`
    /// environment overrides (e.g. `MATS__API__BASE_URL`).
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("MATS").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
