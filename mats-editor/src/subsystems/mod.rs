//! Editor operations, grouped by concern. Each module adds an `impl Editor`
//! block.

pub mod connect;
pub mod layout;
pub mod search;
pub mod selection;
pub mod sync;
pub mod techniques;

pub use connect::{connect_failure_message, ConnectTicket};
pub use layout::{grid_layout, random_position, GridSpec};
pub use search::name_matches;
pub use selection::{Focus, Key, KeyPress};
