//! Client-side state for the MatsLogic technique graph editor.
//!
//! - `session`: token restore, login, register, logout
//! - `editor`: entity caches, view state and debounced writers
//! - `subsystems`: sync, optimistic edges, layout, technique panel,
//!   selection and search
//! - `view`: projection into renderer records

pub mod editor;
pub mod scheduler;
pub mod session;
pub mod subsystems;
pub mod view;

#[cfg(test)]
mod testing;

pub use editor::{
    messages, Banner, DeleteReport, Editor, EditorError, Entities, FailureKind, TechniquePanel,
};
pub use scheduler::CoalescingScheduler;
pub use session::{Session, SessionError};
pub use subsystems::{ConnectTicket, Focus, Key, KeyPress};
pub use view::{EdgeKey, ViewEdge, ViewModel, ViewNode, ViewportCommand};
