use crate::cli::args::OutputFormat;
use crate::core::registry::Endpoint;
use crate::core::session::LinkStatus;
use crate::core::terminal::TerminalEntry;
use crate::domain::config::{LinkTermConfig, QuickCommand};
use serde_json;
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_endpoints(&self, endpoints: &[Endpoint]) -> Result<(), OutputError>;
    fn write_status(&self, status: &LinkStatus) -> Result<(), OutputError>;
    fn write_entry(&self, entry: &TerminalEntry) -> Result<(), OutputError>;
    fn write_history(&self, history: &[String]) -> Result<(), OutputError>;
    fn write_config(&self, config: &LinkTermConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::LinkTermError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Endpoints in the writer's format
    pub fn render_endpoints(&self, endpoints: &[Endpoint]) -> Result<String, OutputError> {
        let rendered = match self.format {
            OutputFormat::Text => endpoints
                .iter()
                .map(|e| e.display_label.clone())
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Json => serde_json::to_string_pretty(endpoints)?,
            OutputFormat::Table => {
                let rows: Vec<EndpointTableRow> = endpoints.iter().map(EndpointTableRow::from).collect();
                Table::new(rows).to_string()
            }
            OutputFormat::Csv => {
                let mut csv = "id,name,version,identifying".to_string();
                for endpoint in endpoints {
                    csv.push_str(&format!(
                        "\n{},{},{},{}",
                        endpoint.id, endpoint.raw_name, endpoint.version, endpoint.identifying
                    ));
                }
                csv
            }
        };
        Ok(rendered)
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_endpoints(&self, endpoints: &[Endpoint]) -> Result<(), OutputError> {
        if endpoints.is_empty() && !matches!(self.format, OutputFormat::Json) {
            println!("No devices found");
            return Ok(());
        }
        println!("{}", self.render_endpoints(endpoints)?);
        Ok(())
    }

    fn write_status(&self, status: &LinkStatus) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(status)?);
            }
            _ => {
                println!("Link: {}", status.state);
                if let Some(endpoint) = &status.endpoint {
                    println!("  Endpoint: {}", endpoint);
                }
                println!("  Reconnect attempts: {}", status.attempts);
                println!("  Reconnect pending: {}", status.reconnect_pending);
                println!("  Heartbeat: {}", if status.heartbeat_active { "on" } else { "off" });
                println!("  Receiving: {}", status.receiving);
            }
        }
        Ok(())
    }

    fn write_entry(&self, entry: &TerminalEntry) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(entry)?);
            }
            _ => {
                println!("{}", entry.render());
            }
        }
        Ok(())
    }

    fn write_history(&self, history: &[String]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(history)?);
            }
            _ => {
                for (index, command) in history.iter().enumerate() {
                    println!("{:>3}  {}", index, command);
                }
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &LinkTermConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("LinkTerm Configuration:");
                println!("  Log level: {}", config.global.log_level);
                println!("  Terminal capacity: {}", config.global.terminal_capacity);
                println!("  History capacity: {}", config.global.history_capacity);
                println!("  WebSocket URL: {}", config.link.ws_url);
                println!("  API URL: {}", config.link.api_url);
                println!("  Heartbeat: {}ms", config.link.heartbeat_interval_ms);
                println!(
                    "  Reconnect: {}ms..{}ms, {} attempts",
                    config.link.reconnect.base_delay_ms,
                    config.link.reconnect.max_delay_ms,
                    config.link.reconnect.max_attempts
                );
                println!("  Default class: {}", config.devices.default_class);

                if !config.quick_commands.is_empty() {
                    println!("  Quick commands:");
                    for quick in &config.quick_commands {
                        println!("    {}: {} ({})", quick.name, quick.command, quick.description);
                    }
                }
            }
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(config)?;
                println!("{}", output);
            }
            OutputFormat::Table => {
                let rows: Vec<QuickCommandRow> = config.quick_commands.iter().map(QuickCommandRow::from).collect();
                println!("{}", Table::new(rows));
            }
            OutputFormat::Csv => {
                println!("name,command,description");
                for quick in &config.quick_commands {
                    println!("{},{},{}", quick.name, quick.command, quick.description);
                }
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

/// Table row for a scanned endpoint
#[derive(Tabled)]
struct EndpointTableRow {
    id: String,
    name: String,
    version: String,
    status: String,
}

impl From<&Endpoint> for EndpointTableRow {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            id: endpoint.id.clone(),
            name: endpoint.raw_name.clone(),
            version: endpoint.version.clone(),
            status: if endpoint.identifying { "identifying" } else { "ready" }.to_string(),
        }
    }
}

/// Table row for a quick command
#[derive(Tabled)]
struct QuickCommandRow {
    name: String,
    command: String,
    description: String,
}

impl From<&QuickCommand> for QuickCommandRow {
    fn from(quick: &QuickCommand) -> Self {
        Self {
            name: quick.name.clone(),
            command: quick.command.clone(),
            description: quick.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(id: &str, name: &str, version: &str) -> Endpoint {
        Endpoint {
            id: id.to_string(),
            raw_name: name.to_string(),
            version: version.to_string(),
            display_label: format!("{} v{} ({})", name, version, id),
            identifying: false,
        }
    }

    #[test]
    fn test_render_endpoints_table() {
        let writer = ConsoleWriter::new(OutputFormat::Table);
        let table = writer
            .render_endpoints(&[endpoint("COM3", "NanoLink", "1.0.0")])
            .unwrap();

        assert!(table.contains("id"));
        assert!(table.contains("NanoLink"));
        assert!(table.contains("ready"));
    }

    #[test]
    fn test_render_endpoints_text_and_csv() {
        let endpoints = [endpoint("COM3", "NanoLink", "1.0.0"), endpoint("COM4", "Unknown", "0.0.0")];

        let text = ConsoleWriter::new(OutputFormat::Text).render_endpoints(&endpoints).unwrap();
        assert_eq!(text, "NanoLink v1.0.0 (COM3)\nUnknown v0.0.0 (COM4)");

        let csv = ConsoleWriter::new(OutputFormat::Csv).render_endpoints(&endpoints).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().nth(2).unwrap().starts_with("COM4,Unknown,0.0.0"));
    }
}
