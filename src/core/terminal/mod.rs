// Terminal module - Operator-facing message store
pub mod history;
pub mod log;

pub use history::CommandHistory;
pub use log::{EntryKind, TerminalEntry, TerminalLog};
