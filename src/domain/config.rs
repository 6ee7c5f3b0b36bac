use crate::domain::error::{LinkTermError, LinkTermResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// LinkTerm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkTermConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Link session settings
    #[serde(default)]
    pub link: LinkConfig,
    /// Device discovery settings
    #[serde(default)]
    pub devices: DeviceConfig,
    /// Named shortcuts for frequently sent commands
    #[serde(default = "default_quick_commands")]
    pub quick_commands: Vec<QuickCommand>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Maximum number of terminal entries kept
    #[serde(default = "default_terminal_capacity")]
    pub terminal_capacity: usize,
    /// Maximum number of remembered commands
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

/// Persistent channel and host API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// WebSocket endpoint exposed by the host process
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Base URL of the host REST API used for one-shot calls
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Keepalive ping period while the session is open
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// How long the receiving indicator stays lit after the last frame
    #[serde(default = "default_receiving_indicator")]
    pub receiving_indicator_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Reconnect backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Device discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Label used for endpoints whose identification probe failed
    #[serde(default = "default_generic_label")]
    pub generic_label: String,
    /// Device class selected at startup
    #[serde(default)]
    pub default_class: DeviceClass,
}

/// Class of remote device, as grouped by the host's port scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Device,
    LoraLink,
}

/// Named command shortcut
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickCommand {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub description: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_terminal_capacity() -> usize {
    1000
}

fn default_history_capacity() -> usize {
    50
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:8000/ws/lora".to_string()
}

fn default_api_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_heartbeat_interval() -> u64 {
    30_000
}

fn default_receiving_indicator() -> u64 {
    1000
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_generic_label() -> String {
    "LoRa Link".to_string()
}

fn default_quick_commands() -> Vec<QuickCommand> {
    [
        ("ping", "AT+PING", "Ping the link device"),
        ("status", "AT+STATUS", "Query link status"),
        ("reset", "AT+RESET", "Reboot the link device"),
        ("version", "AT+VERSION", "Query firmware version"),
        ("config", "AT+CONFIG?", "Read radio settings"),
    ]
    .into_iter()
    .map(|(name, command, description)| QuickCommand {
        name: name.to_string(),
        command: command.to_string(),
        description: description.to_string(),
    })
    .collect()
}

impl Default for LinkTermConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            link: LinkConfig::default(),
            devices: DeviceConfig::default(),
            quick_commands: default_quick_commands(),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            terminal_capacity: default_terminal_capacity(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_url: default_api_url(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            receiving_indicator_ms: default_receiving_indicator(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            generic_label: default_generic_label(),
            default_class: DeviceClass::default(),
        }
    }
}

impl Default for DeviceClass {
    fn default() -> Self {
        DeviceClass::LoraLink
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceClass::Device => write!(f, "device"),
            DeviceClass::LoraLink => write!(f, "lora_link"),
        }
    }
}

impl DeviceClass {
    /// Key under which the host groups ports of this class
    pub fn scan_key(&self) -> &'static str {
        match self {
            DeviceClass::Device => "device",
            DeviceClass::LoraLink => "lora_link",
        }
    }
}

impl LinkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn receiving_indicator(&self) -> Duration {
        Duration::from_millis(self.receiving_indicator_ms)
    }
}

impl LinkTermConfig {
    /// Look up a quick command by name
    pub fn quick_command(&self, name: &str) -> Option<&QuickCommand> {
        self.quick_commands.iter().find(|q| q.name.eq_ignore_ascii_case(name))
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> LinkTermResult<()> {
        let invalid = |message: String| Err(LinkTermError::Config { message });

        if self.global.terminal_capacity == 0 {
            return invalid("global.terminal_capacity must be greater than zero".to_string());
        }
        if self.global.history_capacity == 0 {
            return invalid("global.history_capacity must be greater than zero".to_string());
        }
        if self.link.heartbeat_interval_ms == 0 {
            return invalid("link.heartbeat_interval_ms must be greater than zero".to_string());
        }
        if self.link.reconnect.base_delay_ms == 0 {
            return invalid("link.reconnect.base_delay_ms must be greater than zero".to_string());
        }
        if self.link.reconnect.max_delay_ms < self.link.reconnect.base_delay_ms {
            return invalid(format!(
                "link.reconnect.max_delay_ms ({}) is below base_delay_ms ({})",
                self.link.reconnect.max_delay_ms, self.link.reconnect.base_delay_ms
            ));
        }
        for (key, value) in [("link.ws_url", &self.link.ws_url), ("link.api_url", &self.link.api_url)] {
            if let Err(e) = url::Url::parse(value) {
                return invalid(format!("{} '{}' is not a valid URL: {}", key, value, e));
            }
        }
        Ok(())
    }
}
