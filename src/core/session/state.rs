use crate::domain::config::DeviceClass;
use serde::{Deserialize, Serialize};

/// Lifecycle state of the link session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// Nothing opened yet
    Idle,
    /// Transport open in progress
    Connecting,
    /// Persistent channel is up
    Open,
    /// Intentional close in progress
    Closing,
    /// Channel is down; a reconnect may be pending
    Closed,
    /// Reconnect budget spent; only an explicit open leaves this state
    Failed,
}

impl LinkState {
    /// States in which `open` is a no-op
    pub fn is_busy(&self) -> bool {
        matches!(self, LinkState::Connecting | LinkState::Open)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Idle => write!(f, "Idle"),
            LinkState::Connecting => write!(f, "Connecting"),
            LinkState::Open => write!(f, "Open"),
            LinkState::Closing => write!(f, "Closing"),
            LinkState::Closed => write!(f, "Closed"),
            LinkState::Failed => write!(f, "Failed"),
        }
    }
}

/// Endpoint the session connects to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub endpoint_id: String,
    pub class: DeviceClass,
}

impl LinkTarget {
    pub fn new(endpoint_id: impl Into<String>, class: DeviceClass) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            class,
        }
    }

    pub fn lora_link(endpoint_id: impl Into<String>) -> Self {
        Self::new(endpoint_id, DeviceClass::LoraLink)
    }
}

/// Read model of the session published after every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub state: LinkState,
    pub endpoint: Option<String>,
    /// Reconnect attempts used since the last successful open
    pub attempts: u32,
    pub reconnect_pending: bool,
    pub heartbeat_active: bool,
    /// Lit while frames are arriving
    pub receiving: bool,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            state: LinkState::Idle,
            endpoint: None,
            attempts: 0,
            reconnect_pending: false,
            heartbeat_active: false,
            receiving: false,
        }
    }
}
