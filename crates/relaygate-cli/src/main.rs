mod logger;
mod serve;

use anyhow::Context;
use clap::{Parser, Subcommand};
use relaygate_core::TriggerRequest;
use relaygate_hardware::{RelayControl, RelayControlConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "relaygate",
    about = "Pulse USB, serial and network relay boards",
    version
)]
struct Cli {
    /// TOML configuration file (built-in profiles when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pulse one relay, or every discovered relay
    Trigger {
        /// Flat relay number (1-based); omit to pulse every device
        #[arg(short, long)]
        relay: Option<u32>,

        /// Hold time in milliseconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Only pulse devices of this brand or alias
        #[arg(short, long)]
        brand: Option<String>,
    },
    /// Print the current relay numbering
    List {
        /// Only list devices of this brand
        #[arg(short, long)]
        brand: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Accept trigger requests over a raw TCP socket
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:9000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let control = RelayControl::new(config);

    match cli.command {
        Commands::Trigger {
            relay,
            duration,
            brand,
        } => {
            let request = TriggerRequest {
                relay_number: relay,
                duration_ms: duration,
                brand,
            };
            let cancel = cancel_on_ctrl_c();
            let result = control.trigger_relay_with_cancel(request, cancel).await;

            println!("{}", result.diagnostic);
            if result.success {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::List { brand, json } => {
            let space = control.list_devices(brand.as_deref()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&space)?);
            } else if space.is_empty() {
                println!("no relays found");
            } else {
                println!("{:>5}  {:<8} {:<12} DEVICE", "RELAY", "BUS", "BRAND");
                for entry in &space {
                    println!(
                        "{:>5}  {:<8} {:<12} {}",
                        entry.relay_number(),
                        entry.transport().to_string(),
                        entry.descriptor.brand,
                        entry.descriptor.identity
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Serve { bind } => {
            serve::serve(control, &bind, cancel_on_ctrl_c()).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RelayControlConfig> {
    match path {
        Some(path) => {
            let config = RelayControlConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            debug!(path = %path.display(), brands = ?config.brands(), "Configuration loaded");
            Ok(config)
        }
        None => Ok(RelayControlConfig::default()),
    }
}

/// Token cancelled on the first Ctrl-C. Holds in progress end early and the
/// relays are switched off.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, releasing relays");
            cancel.cancel();
        }
    });
    token
}
