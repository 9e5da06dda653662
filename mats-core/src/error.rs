use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum MatsError {
    #[error("Store error: {0}")]
    Store(#[from] sled::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Other error: {0}")]
    Other(String),
}
