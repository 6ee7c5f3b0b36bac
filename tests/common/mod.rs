#![allow(dead_code)]

use async_trait::async_trait;
use linkterm::core::communication::{
    ChannelPeer, CommandReply, DeviceService, LinkChannel, LinkConnector,
};
use linkterm::domain::config::DeviceClass;
use linkterm::{LinkTermError, LinkTermResult, SessionManager, SessionSettings, TerminalLog};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What the next `connect` call does
pub enum ConnectOutcome {
    Accept,
    AcceptAfter(Duration),
    Refuse(&'static str),
}

/// Connector that follows a script and hands the transport side of each
/// accepted channel to the test.
pub struct ScriptedConnector {
    script: Mutex<VecDeque<ConnectOutcome>>,
    calls: Mutex<Vec<(String, Instant)>>,
    peers: mpsc::UnboundedSender<ChannelPeer>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<ConnectOutcome>) -> (Arc<Self>, mpsc::UnboundedReceiver<ChannelPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            peers,
        });
        (connector, peers_rx)
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkConnector for ScriptedConnector {
    async fn connect(&self, endpoint_id: &str) -> LinkTermResult<LinkChannel> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint_id.to_string(), Instant::now()));

        // an exhausted script refuses
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectOutcome::Refuse("no route to host"));

        if let ConnectOutcome::AcceptAfter(delay) = outcome {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            ConnectOutcome::Accept | ConnectOutcome::AcceptAfter(_) => {
                let (channel, peer) = LinkChannel::pair();
                let _ = self.peers.send(peer);
                Ok(channel)
            }
            ConnectOutcome::Refuse(message) => Err(LinkTermError::TransportOpen {
                endpoint: endpoint_id.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// Host service with a fixed one-shot reply
pub struct StubService {
    pub reply: LinkTermResult<Option<String>>,
    pub sent: Mutex<Vec<String>>,
}

impl StubService {
    pub fn replying(response: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(response.map(str::to_string)),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err(LinkTermError::Send {
                message: "host returned 500".to_string(),
            }),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceService for StubService {
    async fn scan_endpoints(&self, _class: DeviceClass) -> LinkTermResult<Vec<String>> {
        Ok(vec!["COM3".to_string()])
    }

    async fn identify(&self, _endpoint_id: &str) -> LinkTermResult<String> {
        Ok("v1.0.0 NanoLink".to_string())
    }

    async fn send_command_once(&self, command: &str) -> LinkTermResult<CommandReply> {
        self.sent.lock().unwrap().push(command.to_string());
        match &self.reply {
            Ok(response) => Ok(CommandReply {
                response: response.clone(),
            }),
            Err(e) => Err(LinkTermError::Send {
                message: e.to_string(),
            }),
        }
    }
}

pub fn spawn_session(
    connector: Arc<ScriptedConnector>,
    service: Arc<StubService>,
) -> (SessionManager, TerminalLog) {
    let terminal = TerminalLog::new(TerminalLog::DEFAULT_CAPACITY);
    let manager = SessionManager::spawn(connector, service, terminal.clone(), SessionSettings::default());
    (manager, terminal)
}

pub async fn texts(terminal: &TerminalLog) -> Vec<String> {
    terminal.snapshot().await.into_iter().map(|e| e.text).collect()
}
