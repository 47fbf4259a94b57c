//! The session layer: shared state, command handlers and the background
//! combine task.

pub mod commands;
pub mod events;
pub mod helpers;
pub mod proxy;
pub mod state;
pub mod tasks;

pub use events::{CombineReport, SessionEvent, SessionSummary};
pub use proxy::EventProxy;
pub use state::{AppState, SessionOverrides};
