pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use api::{ApiClient, ApiError, Backend};
pub use config::{EditorConfig, MatsConfig};
pub use error::MatsError;
pub use store::LocalStore;
