use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Tag carried in the `type` field of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    TerminalOutput,
    CommandResponse,
    Error,
    Status,
    CommandSent,
    Pong,
    Command,
    Ping,
    /// Any tag this console does not know about
    #[serde(other)]
    Unknown,
}

/// Tagged record exchanged over the persistent channel, both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default = "now_iso8601")]
    pub timestamp: String,
}

pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Envelope {
    fn bare(kind: FrameKind) -> Self {
        Self {
            kind,
            content: None,
            response: None,
            message: None,
            command: None,
            timestamp: now_iso8601(),
        }
    }

    /// Outbound command frame
    pub fn command(command: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            ..Self::bare(FrameKind::Command)
        }
    }

    /// Outbound keepalive frame
    pub fn ping() -> Self {
        Self::bare(FrameKind::Ping)
    }

    pub fn with_content(kind: FrameKind, content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            ..Self::bare(kind)
        }
    }

    pub fn with_message(kind: FrameKind, message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::bare(kind)
        }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Text shown for output-like frames: `content`, then `response`, then `message`
    pub fn output_text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .or(self.response.as_deref())
            .or(self.message.as_deref())
    }

    /// Text shown for error/status frames: `message`, then `content`
    pub fn message_text(&self) -> Option<&str> {
        self.message.as_deref().or(self.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame_shape() {
        let frame = Envelope::command("AT+STATUS");
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "command");
        assert_eq!(value["command"], "AT+STATUS");
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(value.get("content").is_none());
    }

    #[test]
    fn test_ping_frame_shape() {
        let value: serde_json::Value = serde_json::from_str(&Envelope::ping().to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "ping");
        assert!(value["timestamp"].is_string());
        assert!(value.get("command").is_none());
    }

    #[test]
    fn test_parse_inbound_frames() {
        let frame = Envelope::parse(r#"{"type":"command_response","command":"AT+PING","response":"PONG","timestamp":"2024-05-01T10:00:00"}"#).unwrap();
        assert_eq!(frame.kind, FrameKind::CommandResponse);
        assert_eq!(frame.output_text(), Some("PONG"));

        let frame = Envelope::parse(r#"{"type":"status","message":"LoRa terminal WebSocket connected","connection_count":1}"#).unwrap();
        assert_eq!(frame.kind, FrameKind::Status);
        assert_eq!(frame.message_text(), Some("LoRa terminal WebSocket connected"));
        assert!(!frame.timestamp.is_empty());
    }

    #[test]
    fn test_unknown_tag() {
        let frame = Envelope::parse(r#"{"type":"status_response","timestamp":"x"}"#).unwrap();
        assert_eq!(frame.kind, FrameKind::Unknown);
    }

    #[test]
    fn test_missing_tag_is_an_error() {
        assert!(Envelope::parse(r#"{"content":"hi"}"#).is_err());
        assert!(Envelope::parse("plain text").is_err());
    }
}
