//! LinkTerm Library
//!
//! Link session manager for remote radio link devices: a persistent
//! channel with heartbeat and backoff reconnect, one-shot fallback calls,
//! device discovery and a bounded operator terminal.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use domain::error::{LinkTermError, LinkTermResult};
pub use domain::config::LinkTermConfig;
pub use core::registry::{DeviceRegistry, Endpoint, Identity};
pub use core::session::{LinkState, LinkStatus, LinkTarget, SessionManager, SessionSettings};
pub use core::terminal::{CommandHistory, EntryKind, TerminalEntry, TerminalLog};
