use crate::core::communication::message::Envelope;
use crate::domain::config::DeviceClass;
use crate::domain::error::{LinkTermError, LinkTermResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Close code reserved for closes this console initiates itself
pub const NORMAL_CLOSURE: u16 = 1000;

/// Why the persistent channel went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn is_intentional(&self) -> bool {
        self.code == Some(NORMAL_CLOSURE)
    }
}

/// Event delivered from the transport to the session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// One raw inbound text frame
    Frame(String),
    /// The channel closed; no further events follow
    Closed(CloseInfo),
}

/// Request from the session to the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(Envelope),
    Close { code: u16, reason: String },
}

/// Session side of an open persistent channel
#[derive(Debug)]
pub struct LinkChannel {
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Transport side of an open persistent channel
#[derive(Debug)]
pub struct ChannelPeer {
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl LinkChannel {
    /// Create a connected session/transport pair
    pub fn pair() -> (LinkChannel, ChannelPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            LinkChannel {
                outbound: outbound_tx,
                events: events_rx,
            },
            ChannelPeer {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }

    /// Queue a frame; fails once the transport side is gone
    pub fn send(&self, frame: Envelope) -> LinkTermResult<()> {
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| LinkTermError::Send {
                message: "persistent channel is closed".to_string(),
            })
    }

    /// Ask the transport to close with `code`
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.outbound.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
    }

    pub fn is_live(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Next transport event. A transport that vanished without a close
    /// event reads as an abnormal close.
    pub async fn next_event(&mut self) -> TransportEvent {
        self.events
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::Closed(CloseInfo::new(None, "transport dropped")))
    }
}

impl ChannelPeer {
    pub fn frame(&self, text: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Frame(text.into())).is_ok()
    }

    pub fn closed(&self, code: Option<u16>, reason: &str) -> bool {
        self.events
            .send(TransportEvent::Closed(CloseInfo::new(code, reason)))
            .is_ok()
    }
}

/// Opens the persistent channel to a device endpoint
#[async_trait]
pub trait LinkConnector: Send + Sync {
    async fn connect(&self, endpoint_id: &str) -> LinkTermResult<LinkChannel>;
}

/// Reply to a one-shot command call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    #[serde(default)]
    pub response: Option<String>,
}

/// Request/response calls to the host process that owns the ports
#[async_trait]
pub trait DeviceService: Send + Sync {
    /// Port identifiers of the given class currently present
    async fn scan_endpoints(&self, class: DeviceClass) -> LinkTermResult<Vec<String>>;

    /// Raw identification reply of one endpoint
    async fn identify(&self, endpoint_id: &str) -> LinkTermResult<String>;

    /// Send one command outside of the persistent channel
    async fn send_command_once(&self, command: &str) -> LinkTermResult<CommandReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_info_intent() {
        assert!(CloseInfo::new(Some(1000), "bye").is_intentional());
        assert!(!CloseInfo::new(Some(1006), "gone").is_intentional());
        assert!(!CloseInfo::new(None, "gone").is_intentional());
    }

    #[tokio::test]
    async fn test_pair_round_trip() {
        let (mut channel, mut peer) = LinkChannel::pair();

        channel.send(Envelope::ping()).unwrap();
        match peer.outbound.recv().await {
            Some(Outbound::Frame(frame)) => assert_eq!(frame.kind, crate::core::communication::FrameKind::Ping),
            other => panic!("unexpected outbound: {:?}", other),
        }

        assert!(peer.frame("hello"));
        assert_eq!(channel.next_event().await, TransportEvent::Frame("hello".to_string()));

        channel.close(NORMAL_CLOSURE, "bye");
        assert_eq!(
            peer.outbound.recv().await,
            Some(Outbound::Close { code: 1000, reason: "bye".to_string() })
        );
    }

    #[tokio::test]
    async fn test_dropped_peer_reads_as_abnormal_close() {
        let (mut channel, peer) = LinkChannel::pair();
        drop(peer);

        assert!(!channel.is_live());
        assert!(channel.send(Envelope::ping()).is_err());
        match channel.next_event().await {
            TransportEvent::Closed(info) => {
                assert_eq!(info.code, None);
                assert!(!info.is_intentional());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
