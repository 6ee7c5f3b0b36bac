use crate::core::session::state::LinkState;
use serde::Serialize;

/// Path an outgoing command takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandRoute {
    /// Fire-and-forget frame over the open persistent channel
    Persistent,
    /// Single request/response call to the host
    OneShot,
}

/// Pick the route for one command. Called per command, never cached:
/// the session may have changed state since the previous one.
pub fn select_route(state: LinkState, channel_live: bool) -> CommandRoute {
    if state == LinkState::Open && channel_live {
        CommandRoute::Persistent
    } else {
        CommandRoute::OneShot
    }
}

impl std::fmt::Display for CommandRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandRoute::Persistent => write!(f, "persistent"),
            CommandRoute::OneShot => write!(f, "one-shot"),
        }
    }
}
