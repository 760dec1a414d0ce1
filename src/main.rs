use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use ptz_gateway::{AdapterSet, Config, Daemon, DiscoveryAggregator};

/// PTZ Gateway - routes relayed operator commands to LAN cameras
#[derive(Parser)]
#[command(name = "ptz-gateway", version, about)]
struct Cli {
    /// Config file (default: ~/.config/ptz-gateway/config.toml)
    #[arg(short, long, env = "PTZ_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read inbound commands from stdin and drive cameras (default)
    Run,
    /// Discover cameras on the LAN and print them as JSON
    Discover,
    /// Send one command to configured cameras
    Send {
        /// Device identifier, or "all"
        #[arg(short, long, default_value = "all")]
        target: String,
        /// Action name (e.g. pan_left, stop, preset_recall, vector)
        #[arg(short, long)]
        action: String,
        /// Speed, 0-100
        #[arg(short, long, default_value = "50")]
        speed: u8,
        /// Vector pan component, -1 to 1
        #[arg(long, allow_hyphen_values = true)]
        x: Option<f64>,
        /// Vector tilt component, -1 to 1
        #[arg(long, allow_hyphen_values = true)]
        y: Option<f64>,
        /// Preset slot for preset actions
        #[arg(short, long, default_value = "0")]
        preset: u8,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,ptz_gateway=info",
        1 => "info,ptz_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            tracing::info!(
                watchdog_ms = config.watchdog.as_millis(),
                discovery = config.discovery.enabled,
                "starting ptz gateway"
            );
            Daemon::new(config)?.run().await?;
        }
        Command::Discover => {
            let adapters = AdapterSet::standard(config.adapter_options())?;
            let devices = DiscoveryAggregator::new(adapters)
                .with_timeout(config.discovery.round_timeout())
                .discover()
                .await;
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        Command::Send {
            target,
            action,
            speed,
            x,
            y,
            preset,
        } => {
            let secret = config.require_secret()?;
            let mut payload = json!({
                "password": secret.expose(),
                "action": action,
                "target": target,
                "speed": speed,
                "preset": preset,
            });
            if x.is_some() || y.is_some() {
                payload["vector"] = json!({"x": x.unwrap_or(0.0), "y": y.unwrap_or(0.0)});
            }

            let grace = config.network.http_timeout;
            let daemon = Daemon::new(config)?;
            let reports = daemon.handle(&payload).await;
            println!("{}", serde_json::to_string_pretty(&reports)?);
            if reports.is_empty() {
                tracing::warn!("command rejected or matched no configured device");
                return Ok(());
            }

            // Let the watchdog stop any continuous motion before exiting
            tokio::time::sleep(daemon.router().horizon().saturating_add(grace)).await;
        }
    }

    Ok(())
}
