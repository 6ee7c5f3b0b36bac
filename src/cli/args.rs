use crate::domain::config::DeviceClass;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for LinkTerm
#[derive(Parser, Debug)]
#[command(
    name = "linkterm",
    version = env!("CARGO_PKG_VERSION"),
    about = "Operator console for remote radio link devices",
    long_about = "An operator console that keeps a persistent link to a remote radio link device, reconnecting with backoff, and falls back to one-shot host calls while the link is down."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan for devices and identify them
    Scan(ScanArgs),
    /// Open the persistent link and start an interactive console
    Connect(ConnectArgs),
    /// Send a single command through the host without opening a link
    Send(SendArgs),
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
    /// CSV output
    Csv,
}

/// Device scan arguments
#[derive(ClapArgs, Debug)]
pub struct ScanArgs {
    /// Device class to scan for (defaults to the configured class)
    #[arg(long, value_enum)]
    pub class: Option<ClassArg>,
}

/// Interactive link arguments
#[derive(ClapArgs, Debug)]
pub struct ConnectArgs {
    /// Endpoint to open; the first scanned endpoint is used when omitted
    pub endpoint: Option<String>,

    /// Device class of the endpoint
    #[arg(long, value_enum)]
    pub class: Option<ClassArg>,

    /// Run this command script once the link is open
    #[arg(short, long)]
    pub script: Option<String>,
}

/// One-shot send arguments
#[derive(ClapArgs, Debug)]
pub struct SendArgs {
    /// Command text, or a quick command name with --quick
    pub command: String,

    /// Treat the argument as the name of a configured quick command
    #[arg(long)]
    pub quick: bool,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration file
    Validate {
        /// Configuration file path
        file: Option<String>,
    },
    /// Initialize configuration
    Init {
        /// Output directory for the project configuration
        #[arg(short, long)]
        output: Option<String>,
        /// Write the global configuration instead
        #[arg(short, long)]
        global: bool,
    },
}

/// Device class argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ClassArg {
    Device,
    LoraLink,
}

impl From<ClassArg> for DeviceClass {
    fn from(class: ClassArg) -> Self {
        match class {
            ClassArg::Device => Self::Device,
            ClassArg::LoraLink => Self::LoraLink,
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Text
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect() {
        let args = Args::try_parse_from([
            "linkterm", "connect", "COM3", "--class", "lora-link", "--script", "boot.txt",
        ])
        .unwrap();

        match args.command {
            Command::Connect(connect) => {
                assert_eq!(connect.endpoint.as_deref(), Some("COM3"));
                assert_eq!(DeviceClass::from(connect.class.unwrap()), DeviceClass::LoraLink);
                assert_eq!(connect.script.as_deref(), Some("boot.txt"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["linkterm", "scan", "-v", "--config", "x.toml"]).unwrap();
        assert!(args.verbose);
        assert_eq!(args.config.as_deref(), Some("x.toml"));
        assert!(matches!(args.command, Command::Scan(ScanArgs { class: None })));
    }

    #[test]
    fn test_parse_quick_send() {
        let args = Args::try_parse_from(["linkterm", "-o", "json", "send", "--quick", "status"]).unwrap();
        assert!(matches!(args.output, OutputFormat::Json));
        match args.command {
            Command::Send(send) => {
                assert!(send.quick);
                assert_eq!(send.command, "status");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Args::try_parse_from(["linkterm"]).is_err());
    }
}
