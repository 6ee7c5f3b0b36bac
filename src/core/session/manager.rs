use crate::core::communication::{CommandRoute, DeviceService, LinkConnector};
use crate::core::session::{
    heartbeat::Heartbeat,
    reconnect::ReconnectPolicy,
    session::{LinkSession, SessionCommand},
    state::{LinkStatus, LinkTarget},
};
use crate::core::terminal::{CommandHistory, TerminalLog};
use crate::domain::config::{DeviceClass, LinkTermConfig, QuickCommand};
use crate::domain::error::{LinkTermError, LinkTermResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tracing::{debug, info};

/// Pause between script lines
pub const SCRIPT_LINE_DELAY: Duration = Duration::from_millis(200);

/// Tunables the session task runs with
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub heartbeat_interval: Duration,
    pub receiving_indicator: Duration,
    pub reconnect: ReconnectPolicy,
    pub history_capacity: usize,
    pub selected_class: DeviceClass,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Heartbeat::DEFAULT_PERIOD,
            receiving_indicator: Duration::from_millis(1000),
            reconnect: ReconnectPolicy::default(),
            history_capacity: CommandHistory::DEFAULT_CAPACITY,
            selected_class: DeviceClass::default(),
        }
    }
}

impl From<&LinkTermConfig> for SessionSettings {
    fn from(config: &LinkTermConfig) -> Self {
        Self {
            heartbeat_interval: config.link.heartbeat_interval(),
            receiving_indicator: config.link.receiving_indicator(),
            reconnect: ReconnectPolicy::from(&config.link.reconnect),
            history_capacity: config.global.history_capacity,
            selected_class: config.devices.default_class,
        }
    }
}

/// Cloneable handle onto the link session task.
///
/// Every mutating call is a message to the task, answered once the task
/// has applied it and published the new status. Dropping the last handle
/// closes the link and stops the task.
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::UnboundedSender<SessionCommand>,
    status: watch::Receiver<LinkStatus>,
    terminal: TerminalLog,
    history: Arc<RwLock<CommandHistory>>,
}

impl SessionManager {
    /// Start the session task on the current runtime
    pub fn spawn(
        connector: Arc<dyn LinkConnector>,
        service: Arc<dyn DeviceService>,
        terminal: TerminalLog,
        settings: SessionSettings,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let history = Arc::new(RwLock::new(CommandHistory::new(settings.history_capacity)));

        let session = LinkSession::new(
            connector,
            service,
            terminal.clone(),
            Arc::clone(&history),
            settings,
            commands_rx,
            status_tx,
        );
        tokio::spawn(session.run());
        info!("Link session started");

        Self {
            commands: commands_tx,
            status: status_rx,
            terminal,
            history,
        }
    }

    /// Open the persistent channel to `target`.
    ///
    /// Returns once the attempt has started; watch `subscribe()` for the
    /// outcome. A no-op while already connecting or open.
    pub async fn open(&self, target: LinkTarget) -> LinkTermResult<()> {
        self.request(|done| SessionCommand::Open { target, done }).await
    }

    /// Close the channel and cancel any pending reconnect
    pub async fn close(&self) -> LinkTermResult<()> {
        self.request(|done| SessionCommand::Close { done }).await
    }

    /// Send one command over whichever route is available.
    ///
    /// Blank input is ignored and yields `None`.
    pub async fn send(&self, command: &str) -> LinkTermResult<Option<CommandRoute>> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(None);
        }

        let command = command.to_string();
        self.request(|done| SessionCommand::Send { command, done })
            .await
            .map(Some)
    }

    /// Send the command behind a quick command button
    pub async fn send_quick(&self, quick: &QuickCommand) -> LinkTermResult<Option<CommandRoute>> {
        debug!("Quick command '{}' -> {}", quick.name, quick.command);
        self.send(&quick.command).await
    }

    /// Send each non-blank, non-comment line of `script` in order.
    /// Returns the number of commands sent.
    pub async fn run_script(&self, script: &str) -> LinkTermResult<usize> {
        let commands: Vec<&str> = script
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        self.terminal
            .info(format!("Running script ({} commands)", commands.len()))
            .await;

        let mut sent = 0;
        for line in commands {
            if sent > 0 {
                tokio::time::sleep(SCRIPT_LINE_DELAY).await;
            }
            self.send(line).await?;
            sent += 1;
        }

        info!("Script finished, {} command(s) sent", sent);
        Ok(sent)
    }

    /// Device class the operator currently has selected. Unexpected drops
    /// of a link of another class do not reconnect.
    pub async fn select_class(&self, class: DeviceClass) -> LinkTermResult<()> {
        self.request(|done| SessionCommand::SelectClass { class, done })
            .await
    }

    pub fn status(&self) -> LinkStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    pub fn terminal(&self) -> &TerminalLog {
        &self.terminal
    }

    /// Most recent first
    pub async fn history(&self) -> Vec<String> {
        self.history.read().await.to_vec()
    }

    pub async fn recall(&self, index: usize) -> Option<String> {
        self.history.read().await.recall(index).map(str::to_string)
    }

    /// Close the link and stop the session task
    pub async fn shutdown(&self) -> LinkTermResult<()> {
        self.request(|done| SessionCommand::Shutdown { done }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> LinkTermResult<T> {
        let (done, reply) = oneshot::channel();
        self.commands.send(build(done)).map_err(|_| session_stopped())?;
        reply.await.map_err(|_| session_stopped())
    }
}

fn session_stopped() -> LinkTermError {
    LinkTermError::Session {
        message: "Link session has stopped".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::communication::CommandReply;
    use crate::core::session::state::LinkState;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RefusingConnector;

    #[async_trait]
    impl LinkConnector for RefusingConnector {
        async fn connect(
            &self,
            endpoint_id: &str,
        ) -> LinkTermResult<crate::core::communication::LinkChannel> {
            Err(LinkTermError::TransportOpen {
                endpoint: endpoint_id.to_string(),
                message: "refused".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingService {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeviceService for RecordingService {
        async fn scan_endpoints(&self, _class: DeviceClass) -> LinkTermResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn identify(&self, _endpoint_id: &str) -> LinkTermResult<String> {
            Ok(String::new())
        }

        async fn send_command_once(&self, command: &str) -> LinkTermResult<CommandReply> {
            self.sent.lock().unwrap().push(command.to_string());
            Ok(CommandReply {
                response: Some("OK".to_string()),
            })
        }
    }

    fn spawn_manager(service: Arc<RecordingService>) -> SessionManager {
        SessionManager::spawn(
            Arc::new(RefusingConnector),
            service,
            TerminalLog::new(100),
            SessionSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_blank_send_is_ignored() {
        let manager = spawn_manager(Arc::new(RecordingService::default()));

        assert_eq!(manager.send("   ").await.unwrap(), None);
        assert!(manager.history().await.is_empty());
        assert!(manager.terminal().is_empty().await);
    }

    #[tokio::test]
    async fn test_send_without_link_uses_one_shot() {
        let service = Arc::new(RecordingService::default());
        let manager = spawn_manager(Arc::clone(&service));

        let route = manager.send("  AT+VER  ").await.unwrap();
        assert_eq!(route, Some(CommandRoute::OneShot));
        assert_eq!(manager.recall(0).await.as_deref(), Some("AT+VER"));

        let entries = manager.terminal().snapshot().await;
        assert_eq!(entries[0].text, "> AT+VER");
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_skips_comments_and_blank_lines() {
        let service = Arc::new(RecordingService::default());
        let manager = spawn_manager(Arc::clone(&service));
        let started = tokio::time::Instant::now();

        let script = "# setup\nAT+VER\n\n  # again\nAT+STATUS\nAT+RESET\n";
        let sent = manager.run_script(script).await.unwrap();

        assert_eq!(sent, 3);
        assert_eq!(started.elapsed(), SCRIPT_LINE_DELAY * 2);
        assert_eq!(
            manager.history().await,
            vec!["AT+RESET", "AT+STATUS", "AT+VER"]
        );

        let entries = manager.terminal().snapshot().await;
        assert_eq!(entries[0].text, "Running script (3 commands)");
        assert_eq!(entries[1].text, "> AT+VER");
    }

    #[tokio::test]
    async fn test_shutdown_stops_session() {
        let manager = spawn_manager(Arc::new(RecordingService::default()));
        manager.shutdown().await.unwrap();

        let result = manager.close().await;
        assert!(matches!(result, Err(LinkTermError::Session { .. })));
        assert_eq!(manager.status().state, LinkState::Idle);
    }
}
