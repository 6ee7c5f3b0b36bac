use crate::core::communication::{
    select_route, CloseInfo, CommandReply, CommandRoute, DeviceService, Envelope, FrameKind,
    LinkChannel, LinkConnector, TransportEvent, NORMAL_CLOSURE,
};
use crate::core::session::{
    heartbeat::Heartbeat,
    manager::SessionSettings,
    state::{LinkState, LinkStatus, LinkTarget},
};
use crate::core::terminal::{CommandHistory, EntryKind, TerminalLog};
use crate::domain::config::DeviceClass;
use crate::domain::error::{LinkTermError, LinkTermResult};
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

/// Request from a `SessionManager` handle
pub(crate) enum SessionCommand {
    Open {
        target: LinkTarget,
        done: oneshot::Sender<()>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
    Send {
        command: String,
        done: oneshot::Sender<CommandRoute>,
    },
    SelectClass {
        class: DeviceClass,
        done: oneshot::Sender<()>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Completion of work the session started off its own loop
enum LinkEvent {
    Connected {
        generation: u64,
        result: LinkTermResult<LinkChannel>,
    },
    OneShotFinished {
        result: LinkTermResult<CommandReply>,
    },
}

/// What woke the loop up
enum Step {
    Command(Option<SessionCommand>),
    Event(LinkEvent),
    Transport(TransportEvent),
    Heartbeat(Envelope),
    ReconnectDue,
    ReceivingElapsed,
}

/// The single link session.
///
/// Everything here runs on one task: state, reconnect counter, heartbeat
/// and the transport handle are only touched from `run`, so handlers never
/// race each other. Slow work (opening the transport, one-shot calls) is
/// spawned and comes back as a `LinkEvent`.
pub(crate) struct LinkSession {
    connector: Arc<dyn LinkConnector>,
    service: Arc<dyn DeviceService>,
    terminal: TerminalLog,
    history: Arc<RwLock<CommandHistory>>,
    settings: SessionSettings,

    commands: mpsc::UnboundedReceiver<SessionCommand>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    events_rx: mpsc::UnboundedReceiver<LinkEvent>,
    status_tx: watch::Sender<LinkStatus>,

    state: LinkState,
    target: Option<LinkTarget>,
    selected_class: DeviceClass,
    channel: Option<LinkChannel>,
    heartbeat: Option<Heartbeat>,
    reconnect_at: Option<Pin<Box<Sleep>>>,
    receiving_until: Option<Pin<Box<Sleep>>>,
    attempts: u32,
    /// Bumped on every open and on cancel; stale connect results are dropped
    generation: u64,
    intentional_close: bool,
}

impl LinkSession {
    pub(crate) fn new(
        connector: Arc<dyn LinkConnector>,
        service: Arc<dyn DeviceService>,
        terminal: TerminalLog,
        history: Arc<RwLock<CommandHistory>>,
        settings: SessionSettings,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
        status_tx: watch::Sender<LinkStatus>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let selected_class = settings.selected_class;

        Self {
            connector,
            service,
            terminal,
            history,
            settings,
            commands,
            events_tx,
            events_rx,
            status_tx,
            state: LinkState::Idle,
            target: None,
            selected_class,
            channel: None,
            heartbeat: None,
            reconnect_at: None,
            receiving_until: None,
            attempts: 0,
            generation: 0,
            intentional_close: false,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("Link session task started");

        loop {
            let step = tokio::select! {
                command = self.commands.recv() => Step::Command(command),
                Some(event) = self.events_rx.recv() => Step::Event(event),
                event = next_transport_event(&mut self.channel) => Step::Transport(event),
                frame = next_heartbeat(&mut self.heartbeat) => Step::Heartbeat(frame),
                _ = deadline(&mut self.reconnect_at) => Step::ReconnectDue,
                _ = deadline(&mut self.receiving_until) => Step::ReceivingElapsed,
            };

            match step {
                Step::Command(Some(command)) => {
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                Step::Command(None) => {
                    // every handle is gone
                    self.close().await;
                    break;
                }
                Step::Event(LinkEvent::Connected { generation, result }) => {
                    self.on_connected(generation, result).await;
                }
                Step::Event(LinkEvent::OneShotFinished { result }) => {
                    self.on_one_shot_finished(result).await;
                }
                Step::Transport(TransportEvent::Frame(text)) => {
                    self.dispatch(&text).await;
                }
                Step::Transport(TransportEvent::Closed(info)) => {
                    self.on_closed(info).await;
                }
                Step::Heartbeat(frame) => self.send_ping(frame),
                Step::ReconnectDue => {
                    self.reconnect_at = None;
                    if let Some(target) = self.target.clone() {
                        self.open(target, false).await;
                    }
                }
                Step::ReceivingElapsed => {
                    self.receiving_until = None;
                }
            }

            self.publish();
        }

        self.publish();
        debug!("Link session task stopped");
    }

    /// Returns false when the loop should stop
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Open { target, done } => {
                self.open(target, true).await;
                self.publish();
                let _ = done.send(());
            }
            SessionCommand::Close { done } => {
                self.close().await;
                self.publish();
                let _ = done.send(());
            }
            SessionCommand::Send { command, done } => {
                let route = self.send(command).await;
                self.publish();
                let _ = done.send(route);
            }
            SessionCommand::SelectClass { class, done } => {
                debug!("Selected device class: {}", class);
                self.selected_class = class;
                let _ = done.send(());
            }
            SessionCommand::Shutdown { done } => {
                self.close().await;
                self.publish();
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    /// Start opening the transport. `manual` opens come from the operator
    /// and reset the reconnect budget; scheduled reconnects do not.
    async fn open(&mut self, target: LinkTarget, manual: bool) {
        if self.state.is_busy() {
            debug!("Ignoring open of '{}' while {}", target.endpoint_id, self.state);
            return;
        }

        if manual {
            self.attempts = 0;
        }
        self.reconnect_at = None;
        self.intentional_close = false;
        self.generation += 1;
        let generation = self.generation;

        self.state = LinkState::Connecting;
        self.terminal
            .info(format!("Connecting to {}...", target.endpoint_id))
            .await;
        info!("Opening link to '{}' ({})", target.endpoint_id, target.class);
        self.target = Some(target.clone());

        let connector = Arc::clone(&self.connector);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = connector.connect(&target.endpoint_id).await;
            let _ = events.send(LinkEvent::Connected { generation, result });
        });
    }

    async fn on_connected(&mut self, generation: u64, result: LinkTermResult<LinkChannel>) {
        if generation != self.generation || self.state != LinkState::Connecting {
            debug!("Discarding stale connect result (generation {})", generation);
            if let Ok(channel) = result {
                channel.close(NORMAL_CLOSURE, "superseded");
            }
            return;
        }

        let endpoint = self.endpoint_label();
        match result {
            Ok(channel) => {
                self.attempts = 0;
                self.channel = Some(channel);
                self.heartbeat = Some(Heartbeat::start(self.settings.heartbeat_interval));
                self.state = LinkState::Open;
                self.terminal.info(format!("Connected to {}", endpoint)).await;
                info!("Link to '{}' is open", endpoint);
            }
            Err(e) => {
                self.state = LinkState::Closed;
                warn!("Failed to open link to '{}': {}", endpoint, e);
                self.terminal.error(format!("Connection failed: {}", e)).await;
                self.evaluate_reconnect().await;
            }
        }
    }

    async fn on_closed(&mut self, info: CloseInfo) {
        self.channel = None;
        self.heartbeat = None;
        self.state = LinkState::Closed;

        if info.is_intentional() || self.intentional_close {
            info!("Link closed normally: {}", info.reason);
            self.terminal.info("Connection closed by remote").await;
            return;
        }

        let lost = LinkTermError::UnexpectedClose {
            code: info.code,
            reason: info.reason,
        };
        warn!("{}", lost);
        self.terminal.error(lost.to_string()).await;

        let still_selected = self
            .target
            .as_ref()
            .map(|t| t.class == self.selected_class)
            .unwrap_or(false);
        if still_selected {
            self.evaluate_reconnect().await;
        } else {
            debug!("Device class no longer selected, staying closed");
        }
    }

    async fn evaluate_reconnect(&mut self) {
        let decision = self.settings.reconnect.should_retry(self.attempts);
        let max_attempts = self.settings.reconnect.max_attempts();

        if decision.retry {
            self.attempts += 1;
            self.terminal
                .info(format!(
                    "Reconnecting in {}ms (attempt {}/{})",
                    decision.delay.as_millis(),
                    self.attempts,
                    max_attempts
                ))
                .await;
            self.reconnect_at = Some(Box::pin(sleep(decision.delay)));
        } else {
            self.state = LinkState::Failed;
            let exhausted = LinkTermError::ReconnectBudgetExhausted {
                attempts: max_attempts,
            };
            warn!("{}", exhausted);
            self.terminal.error(exhausted.to_string()).await;
        }
    }

    /// Tear down on the operator's request. Marks the close intentional
    /// before anything else so no path below can schedule a reconnect.
    async fn close(&mut self) {
        self.intentional_close = true;
        let had_reconnect = self.reconnect_at.take().is_some();
        self.heartbeat = None;
        let endpoint = self.endpoint_label();

        match self.state {
            LinkState::Open => {
                self.state = LinkState::Closing;
                self.publish();
                if let Some(channel) = self.channel.take() {
                    channel.close(NORMAL_CLOSURE, "Client disconnect");
                }
                self.state = LinkState::Closed;
                info!("Link to '{}' closed by operator", endpoint);
                self.terminal.info(format!("Disconnected from {}", endpoint)).await;
            }
            LinkState::Connecting => {
                self.generation += 1;
                self.state = LinkState::Closed;
                self.terminal
                    .info(format!("Connection attempt to {} cancelled", endpoint))
                    .await;
            }
            _ => {
                if had_reconnect {
                    self.terminal.info("Pending reconnect cancelled").await;
                }
            }
        }
    }

    async fn send(&mut self, command: String) -> CommandRoute {
        self.history.write().await.push(&command);

        let channel_live = self.channel.as_ref().map(LinkChannel::is_live).unwrap_or(false);
        let route = select_route(self.state, channel_live);

        match route {
            CommandRoute::Persistent => {
                // the remote echoes `command_sent`; that echo is the terminal line
                if let Some(channel) = &self.channel {
                    if let Err(e) = channel.send(Envelope::command(&command)) {
                        self.terminal.error(format!("Failed to send command: {}", e)).await;
                    }
                }
            }
            CommandRoute::OneShot => {
                self.terminal
                    .push(EntryKind::Command, format!("> {}", command))
                    .await;
                let service = Arc::clone(&self.service);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = service.send_command_once(&command).await;
                    let _ = events.send(LinkEvent::OneShotFinished { result });
                });
            }
        }

        debug!("Command routed via {}", route);
        route
    }

    async fn on_one_shot_finished(&mut self, result: LinkTermResult<CommandReply>) {
        match result {
            Ok(reply) => {
                let text = reply
                    .response
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| "(no response)".to_string());
                self.terminal.push(EntryKind::Response, text).await;
            }
            Err(e) => {
                warn!("One-shot command failed: {}", e);
                self.terminal.error(format!("Command failed: {}", e)).await;
            }
        }
    }

    /// Route one inbound frame into the terminal by its tag
    async fn dispatch(&mut self, raw: &str) {
        self.receiving_until = Some(Box::pin(sleep(self.settings.receiving_indicator)));

        let frame = match Envelope::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Unparsable frame ({}), showing raw text", e);
                self.terminal.push(EntryKind::Response, raw).await;
                return;
            }
        };

        match frame.kind {
            FrameKind::TerminalOutput | FrameKind::CommandResponse => {
                if let Some(text) = frame.output_text().filter(|t| !t.trim().is_empty()) {
                    self.terminal.push(EntryKind::Response, text).await;
                }
            }
            FrameKind::CommandSent => {
                let command = frame
                    .command
                    .as_deref()
                    .or(frame.content.as_deref())
                    .unwrap_or_default();
                self.terminal
                    .push(EntryKind::Command, format!("> {}", command))
                    .await;
            }
            FrameKind::Error => {
                let message = frame.message_text().unwrap_or("Unknown error");
                self.terminal.push(EntryKind::Error, message).await;
            }
            FrameKind::Status => {
                let message = frame.message_text().unwrap_or_default();
                self.terminal.push(EntryKind::Status, message).await;
            }
            FrameKind::Pong => {
                debug!("Pong received");
            }
            FrameKind::Command | FrameKind::Ping | FrameKind::Unknown => {
                self.terminal.push(EntryKind::Response, raw).await;
            }
        }
    }

    fn send_ping(&mut self, frame: Envelope) {
        match &self.channel {
            Some(channel) => {
                if let Err(e) = channel.send(frame) {
                    // the close event that follows drives the state machine
                    warn!("Heartbeat not sent: {}", e);
                } else {
                    debug!("Heartbeat ping sent");
                }
            }
            None => self.heartbeat = None,
        }
    }

    fn endpoint_label(&self) -> String {
        self.target
            .as_ref()
            .map(|t| t.endpoint_id.clone())
            .unwrap_or_else(|| "device".to_string())
    }

    fn publish(&self) {
        self.status_tx.send_replace(LinkStatus {
            state: self.state,
            endpoint: self.target.as_ref().map(|t| t.endpoint_id.clone()),
            attempts: self.attempts,
            reconnect_pending: self.reconnect_at.is_some(),
            heartbeat_active: self.heartbeat.is_some(),
            receiving: self.receiving_until.is_some(),
        });
    }
}

async fn next_transport_event(channel: &mut Option<LinkChannel>) -> TransportEvent {
    match channel {
        Some(channel) => channel.next_event().await,
        None => pending().await,
    }
}

async fn next_heartbeat(heartbeat: &mut Option<Heartbeat>) -> Envelope {
    match heartbeat {
        Some(heartbeat) => heartbeat.tick().await,
        None => pending().await,
    }
}

async fn deadline(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
