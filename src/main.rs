//! Blind clock CLI - poker tournament level timer
//!
//! One binary, two roles:
//! - `blindclock daemon` runs the authoritative clock on a Unix socket
//! - every other subcommand is a client talking to that daemon

use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use serde_json::{Map, Value};

use blindclock::cli::{Cli, Commands, Display, IpcClient};
use blindclock::daemon;
use blindclock::types::ClockConfig;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(&cli);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins; otherwise the daemon logs at `info`, clients at `warn`,
/// and `--verbose` raises either to `debug`.
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let is_daemon = matches!(cli.command, Some(Commands::Daemon));
    let fallback = match (cli.verbose, is_daemon) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let builder = fmt().with_env_filter(filter).with_target(false);
    if is_daemon {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        // No command provided, show help
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Daemon => {
            let mut config = ClockConfig::load_or_default(cli.config.as_deref())
                .context("Failed to load configuration")?;
            if let Some(socket) = cli.socket {
                config.socket_path = Some(socket);
            }
            daemon::run(config).await?;
        }
        Commands::Start => {
            let response = client(cli.socket)?.start().await?;
            Display::show_response(&response);
        }
        Commands::Pause => {
            let response = client(cli.socket)?.pause().await?;
            Display::show_response(&response);
        }
        Commands::Resume => {
            let response = client(cli.socket)?.resume().await?;
            Display::show_response(&response);
        }
        Commands::Reset => {
            let response = client(cli.socket)?.reset().await?;
            Display::show_response(&response);
        }
        Commands::Next => {
            let response = client(cli.socket)?.next().await?;
            Display::show_response(&response);
        }
        Commands::Prev => {
            let response = client(cli.socket)?.prev().await?;
            Display::show_response(&response);
        }
        Commands::Status => {
            let response = client(cli.socket)?.status().await?;
            Display::show_status(&response);
        }
        Commands::Schedule { file } => {
            let levels = read_json(&file)?;
            let response = client(cli.socket)?.set_schedule(levels).await?;
            Display::show_response(&response);
        }
        Commands::Alerts { seconds } => {
            let response = client(cli.socket)?.set_alerts(&seconds).await?;
            Display::show_response(&response);
        }
        Commands::Settings { file } => {
            let settings = read_json_object(&file)?;
            let response = client(cli.socket)?.update_settings(settings).await?;
            Display::show_response(&response);
        }
        Commands::Init { file } => {
            let settings = read_json_object(&file)?;
            let response = client(cli.socket)?.init(settings).await?;
            Display::show_response(&response);
        }
        Commands::Preset { preset } => {
            let response = client(cli.socket)?.preset(preset).await?;
            Display::show_response(&response);
        }
        Commands::Sound(args) => {
            let response = client(cli.socket)?.sound(&args).await?;
            Display::show_response(&response);
        }
        Commands::Watch { json } => {
            watch(client(cli.socket)?, json).await?;
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}

/// Creates the IPC client for the selected socket.
fn client(socket: Option<std::path::PathBuf>) -> Result<IpcClient> {
    IpcClient::from_option(socket).context("Failed to resolve the daemon socket")
}

/// Prints notifications until the daemon goes away or ctrl-c.
async fn watch(client: IpcClient, json: bool) -> Result<()> {
    let mut notifications = client.subscribe().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = notifications.next_line() => {
                let Some(line) = next? else {
                    tracing::info!("Daemon closed the stream");
                    break;
                };
                if json {
                    println!("{}", line);
                } else {
                    let notification =
                        serde_json::from_str(&line).context("Failed to parse notification")?;
                    Display::show_notification(&notification);
                }
            }
        }
    }

    Ok(())
}

/// Reads a JSON document from a file.
fn read_json(path: &Path) -> Result<Value> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {:?}", path))
}

/// Reads a JSON object from a file.
fn read_json_object(path: &Path) -> Result<Map<String, Value>> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{:?} must contain a JSON object", path),
    }
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
