use crate::cli::args::{Args, Command, ConfigCommand, ConnectArgs, OutputFormat, ScanArgs, SendArgs};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::communication::DeviceService;
use crate::core::registry::DeviceRegistry;
use crate::core::session::{LinkState, LinkStatus, LinkTarget, SessionManager, SessionSettings};
use crate::core::terminal::TerminalLog;
use crate::domain::config::{DeviceClass, LinkTermConfig};
use crate::domain::error::{LinkTermError, LinkTermResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::http::HostApiClient;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::ws::WsConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// Execute CLI command
pub async fn execute_command(args: Args) -> Result<(), LinkTermError> {
    let writer = ConsoleWriter::new(args.output.clone());

    // `config validate` has to report a broken file instead of failing on it
    let config_manager = ConfigManager::new()?;
    let loaded = match &args.config {
        Some(config_path) => config_manager.load_config_from_path(config_path.as_ref()),
        None => config_manager.load_config(),
    };

    if !args.quiet {
        let level = loaded
            .as_ref()
            .map(|c| c.global.log_level.clone())
            .unwrap_or_else(|_| "info".to_string());
        setup_logging(&level, args.verbose)?;
    }

    match args.command {
        Command::Config(config_args) => {
            execute_config_command(config_args.command, &writer, loaded, &config_manager)
        }
        Command::Version => {
            writer.write_message(&format!("linkterm {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
        Command::Scan(scan_args) => execute_scan(scan_args, &writer, &loaded?).await,
        Command::Send(send_args) => execute_send(send_args, &writer, &loaded?).await,
        Command::Connect(connect_args) => {
            execute_connect(connect_args, args.output, &writer, &loaded?).await
        }
    }
}

async fn execute_scan(
    args: ScanArgs,
    writer: &ConsoleWriter,
    config: &LinkTermConfig,
) -> Result<(), LinkTermError> {
    let class = args.class.map(DeviceClass::from).unwrap_or(config.devices.default_class);
    let terminal = TerminalLog::new(config.global.terminal_capacity);
    let registry = registry_for(config, terminal.clone())?;

    registry.scan(class).await;
    registry.wait_identified().await;

    for entry in terminal.snapshot().await {
        if entry.kind == crate::core::terminal::EntryKind::Error {
            writer.write_error(&entry.text)?;
        }
    }
    writer.write_endpoints(&registry.endpoints().await)?;
    Ok(())
}

async fn execute_send(
    args: SendArgs,
    writer: &ConsoleWriter,
    config: &LinkTermConfig,
) -> Result<(), LinkTermError> {
    let command = if args.quick {
        config
            .quick_command(&args.command)
            .map(|q| q.command.clone())
            .ok_or_else(|| LinkTermError::Config {
                message: format!("Unknown quick command '{}'", args.command),
            })?
    } else {
        args.command.trim().to_string()
    };

    let client = HostApiClient::from_config(&config.link)?;
    let reply = client.send_command_once(&command).await?;
    let text = reply
        .response
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "(no response)".to_string());
    writer.write_message(&text)?;
    Ok(())
}

async fn execute_connect(
    args: ConnectArgs,
    format: OutputFormat,
    writer: &ConsoleWriter,
    config: &LinkTermConfig,
) -> Result<(), LinkTermError> {
    let class = args.class.map(DeviceClass::from).unwrap_or(config.devices.default_class);
    let terminal = TerminalLog::new(config.global.terminal_capacity);

    let endpoint_id = match args.endpoint {
        Some(endpoint_id) => endpoint_id,
        None => {
            let registry = registry_for(config, terminal.clone())?;
            registry.scan(class).await;
            registry.wait_identified().await;
            let endpoint = registry.first().await.ok_or_else(|| LinkTermError::Session {
                message: format!("No {} devices found", class),
            })?;
            endpoint.id
        }
    };

    let manager = SessionManager::spawn(
        Arc::new(WsConnector::from_config(&config.link)),
        Arc::new(HostApiClient::from_config(&config.link)?),
        terminal.clone(),
        SessionSettings::from(config),
    );
    let printer = tokio::spawn(follow_terminal(terminal.clone(), manager.subscribe(), format));

    let target = LinkTarget::new(endpoint_id, class);
    manager.select_class(class).await?;
    manager.open(target.clone()).await?;

    if let Some(script_path) = &args.script {
        wait_until_settled(manager.subscribe(), config.link.connect_timeout()).await;
        let script = tokio::fs::read_to_string(script_path).await?;
        manager.run_script(&script).await?;
    }

    let result = console_loop(&manager, &target, writer, config).await;

    manager.shutdown().await?;
    let _ = printer.await;
    result
}

/// Read operator lines from stdin until `:quit` or end of input
async fn console_loop(
    manager: &SessionManager,
    target: &LinkTarget,
    writer: &ConsoleWriter,
    config: &LinkTermConfig,
) -> LinkTermResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(':') else {
            manager.send(line).await?;
            continue;
        };

        let (verb, argument) = match rest.split_once(char::is_whitespace) {
            Some((verb, argument)) => (verb, argument.trim()),
            None => (rest, ""),
        };

        match verb {
            "quit" | "q" => break,
            "clear" => manager.terminal().clear().await,
            "save" if !argument.is_empty() => {
                tokio::fs::write(argument, manager.terminal().export_text().await).await?;
                writer.write_message(&format!("Terminal saved to '{}'", argument))?;
            }
            "history" => writer.write_history(&manager.history().await)?,
            "recall" => match argument.parse::<usize>().ok() {
                Some(index) => match manager.recall(index).await {
                    Some(command) => {
                        manager.send(&command).await?;
                    }
                    None => writer.write_error(&format!("No history entry {}", index))?,
                },
                None => writer.write_error("Usage: :recall <index>")?,
            },
            "status" => writer.write_status(&manager.status())?,
            "quick" => match config.quick_command(argument) {
                Some(quick) => {
                    manager.send_quick(quick).await?;
                }
                None => writer.write_error(&format!("Unknown quick command '{}'", argument))?,
            },
            "script" if !argument.is_empty() => {
                let script = tokio::fs::read_to_string(argument).await?;
                manager.run_script(&script).await?;
            }
            "reconnect" => manager.open(target.clone()).await?,
            "disconnect" => manager.close().await?,
            _ => writer.write_error(&format!("Unknown console command ':{}'", rest))?,
        }
    }

    Ok(())
}

/// Print terminal entries as they arrive until the session stops
async fn follow_terminal(terminal: TerminalLog, mut status: watch::Receiver<LinkStatus>, format: OutputFormat) {
    let writer = ConsoleWriter::new(format);
    let mut last: Option<Uuid> = None;
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        let stopped = tokio::select! {
            changed = status.changed() => changed.is_err(),
            _ = tick.tick() => false,
        };

        for entry in terminal.entries_after(last).await {
            last = Some(entry.id);
            if let Err(e) = writer.write_entry(&entry) {
                debug!("Failed to print terminal entry: {}", e);
            }
        }

        if stopped {
            break;
        }
    }
}

async fn wait_until_settled(mut status: watch::Receiver<LinkStatus>, limit: Duration) {
    let settled = status.wait_for(|s| matches!(s.state, LinkState::Open | LinkState::Failed));
    if tokio::time::timeout(limit, settled).await.is_err() {
        debug!("Link not open yet, script commands will use one-shot calls");
    }
}

fn registry_for(config: &LinkTermConfig, terminal: TerminalLog) -> LinkTermResult<DeviceRegistry> {
    let service: Arc<dyn DeviceService> = Arc::new(HostApiClient::from_config(&config.link)?);
    Ok(DeviceRegistry::new(service, terminal, config.devices.generic_label.clone()))
}

fn execute_config_command(
    command: ConfigCommand,
    writer: &ConsoleWriter,
    loaded: LinkTermResult<LinkTermConfig>,
    config_manager: &ConfigManager,
) -> Result<(), LinkTermError> {
    match command {
        ConfigCommand::Show => {
            writer.write_config(&loaded?)?;
            Ok(())
        }
        ConfigCommand::Validate { file } => {
            let result = match &file {
                Some(config_path) => config_manager.load_config_from_path(config_path.as_ref()).map(|_| ()),
                None => loaded.map(|_| ()),
            };
            match (result, file) {
                (Ok(()), Some(path)) => writer.write_message(&format!("Configuration file '{}' is valid", path))?,
                (Ok(()), None) => writer.write_message("Current configuration is valid")?,
                (Err(e), _) => writer.write_error(&format!("Configuration validation failed: {}", e))?,
            }
            Ok(())
        }
        ConfigCommand::Init { output, global } => {
            if global {
                config_manager.save_config(&LinkTermConfig::default())?;
                writer.write_message(&format!(
                    "Global configuration initialized at '{}'",
                    config_manager.get_global_config_path_ref().display()
                ))?;
            } else {
                let dir: std::path::PathBuf = match output {
                    Some(output_path) => output_path.into(),
                    None => std::env::current_dir().map_err(|e| LinkTermError::Config {
                        message: format!("Failed to get current directory: {}", e),
                    })?,
                };
                let path = config_manager.init_project_config(&dir)?;
                writer.write_message(&format!("Project configuration initialized at '{}'", path.display()))?;
            }
            Ok(())
        }
    }
}

fn setup_logging(level: &str, verbose: bool) -> Result<(), LinkTermError> {
    let level = if verbose { "debug" } else { level };
    init_logging(level).map_err(|e| LinkTermError::Config {
        message: format!("Failed to initialize logging: {}", e),
    })
}
