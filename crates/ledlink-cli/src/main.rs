//! LED Link Control Tool
//!
//! CLI for driving a serial LED strip controller.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use ledlink_hw::{Command, CommandHandle, DeviceManager, Outcome, SerialLink};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledlinkctl")]
#[command(about = "Control tool for serial LED strip controllers")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port path, overrides the configuration file
    #[arg(short, long)]
    port: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set global brightness
    Brightness {
        /// Brightness (0-255)
        value: u8,
    },
    /// Set one LED to an RGB color
    Rgb {
        /// LED index
        index: u8,
        red: u8,
        green: u8,
        blue: u8,
    },
    /// Set one LED to an HSV color
    Hsv {
        /// LED index
        index: u8,
        hue: u8,
        saturation: u8,
        value: u8,
    },
    /// Set the translation mode
    Translation {
        /// Mode byte
        mode: u8,
    },
    /// Reboot the controller through its reset line
    Reset,
    /// Power down the LED strip
    PowerDown,
    /// Check that a controller answers on the port
    Verify,
    /// Read one command per line from stdin
    Interactive,
}

impl Commands {
    fn to_command(&self) -> Option<Command> {
        let command = match *self {
            Commands::Brightness { value } => Command::SetBrightness(value),
            Commands::Rgb {
                index,
                red,
                green,
                blue,
            } => Command::SetImmediateRgb {
                index,
                red,
                green,
                blue,
            },
            Commands::Hsv {
                index,
                hue,
                saturation,
                value,
            } => Command::SetImmediateHsv {
                index,
                hue,
                saturation,
                value,
            },
            Commands::Translation { mode } => Command::SetTranslation(mode),
            Commands::Reset => Command::Reset,
            Commands::PowerDown => Command::PowerDown,
            Commands::Verify => Command::VerifyDevice,
            Commands::Interactive => return None,
        };
        Some(command)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        config.device.port = port;
    }
    let protocol = config.protocol_config()?;

    let link = SerialLink::open(&config.device.port, &protocol)
        .with_context(|| format!("Failed to open LED controller at {}", config.device.port))?;
    let manager = Arc::new(DeviceManager::new());
    let handle = manager
        .connect(Box::new(link), protocol)
        .context("Failed to start LED controller")?;

    let result = match cli.command.to_command() {
        Some(command) => handle_one_shot(command, &handle).await,
        None => handle_interactive(&handle).await,
    };

    // Joining the worker blocks until its current command finishes
    tokio::task::spawn_blocking(move || manager.disconnect())
        .await
        .context("Failed to shut down LED controller")?;

    result
}

async fn handle_one_shot(command: Command, handle: &CommandHandle) -> Result<()> {
    let coalesce = command.kind().coalesces_by_default();
    match handle.submit(command, coalesce).await {
        Outcome::Completed(true) => {
            println!("{}: ok", command);
            Ok(())
        }
        Outcome::Completed(false) => anyhow::bail!("{} failed", command),
        Outcome::Superseded => anyhow::bail!("{} was superseded", command),
    }
}

async fn handle_interactive(handle: &CommandHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = JoinSet::new();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command: Command = match line.parse() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        debug!("Queueing {}", command);
        let handle = handle.clone();
        pending.spawn(async move {
            let coalesce = command.kind().coalesces_by_default();
            let outcome = handle.submit(command, coalesce).await;
            report(command, outcome);
        });
    }

    info!("End of input, waiting for {} command(s)", pending.len());
    while pending.join_next().await.is_some() {}
    Ok(())
}

fn report(command: Command, outcome: Outcome) {
    match outcome {
        Outcome::Completed(true) => println!("{}: ok", command),
        Outcome::Completed(false) => println!("{}: failed", command),
        Outcome::Superseded => println!("{}: superseded", command),
    }
}
