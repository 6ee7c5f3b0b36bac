// Session module - Link lifecycle, keepalive and reconnect
pub mod heartbeat;
pub mod manager;
pub mod reconnect;
pub mod session;
pub mod state;

pub use heartbeat::Heartbeat;
pub use manager::{SessionManager, SessionSettings, SCRIPT_LINE_DELAY};
pub use reconnect::{ReconnectPolicy, RetryDecision};
pub use state::{LinkState, LinkStatus, LinkTarget};
