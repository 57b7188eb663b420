//! CLI Entry Point for av-matrix
//!
//! Provides command-line access to the routing operations:
//! - Query the channel a device reports
//! - Reconstruct the source a receiver is showing
//! - Route a receiver to a transmitter
//! - Fetch device details
//! - Check a transmitter for drift
//!
//! # Usage
//!
//! ```bash
//! avmatrix route 10.0.5.10 10.0.5.42
//! avmatrix --config matrix.toml --json details rx-lobby
//! RUST_LOG=av_matrix=debug avmatrix drift tx-stage
//! ```

use anyhow::{Context, Result};
use av_matrix::telemetry::{self, OutputFormat, TracingConfig};
use av_matrix::{CallContext, MatrixClient, MatrixConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "avmatrix")]
#[command(about = "Route and inspect AV-over-IP receivers and transmitters", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Deadline for the whole operation, e.g. "3s"
    #[arg(long, global = true, value_parser = humantime_duration)]
    timeout: Option<Duration>,

    /// Print results (and logs) as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the channel a device reports
    Channel {
        /// Device address
        address: String,
    },

    /// Print the transmitter a receiver appears to be showing
    Source {
        /// Receiver address
        receiver: String,
    },

    /// Point a receiver at a transmitter
    Route {
        /// Receiver address
        receiver: String,
        /// Transmitter address
        transmitter: String,
    },

    /// Print device details
    Details {
        /// Receiver address
        receiver: String,
    },

    /// Check a transmitter's channel against its address and repair it
    Drift {
        /// Transmitter address
        transmitter: String,
    },
}

fn humantime_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = telemetry::parse_log_level(&cli.log_level).map_err(anyhow::Error::msg)?;
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Compact
    };
    telemetry::init(TracingConfig::new(level).with_format(format)).map_err(anyhow::Error::msg)?;

    let config = match &cli.config {
        Some(path) => MatrixConfig::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => MatrixConfig::load().context("Failed to load config from environment")?,
    };

    let matrix = MatrixClient::from_config(&config)?;
    let ctx = match cli.timeout {
        Some(budget) => CallContext::with_timeout(budget),
        None => CallContext::new(),
    };

    match cli.command {
        Commands::Channel { address } => {
            let channel = matrix.receiver(address.clone()).current_channel(&ctx, &address).await?;
            print(cli.json, &serde_json::json!({ "address": address, "channel": channel }), &channel)?;
        }
        Commands::Source { receiver } => {
            let sources = matrix.receiver(receiver).current_source(&ctx).await?;
            for (output, source) in &sources {
                print(
                    cli.json,
                    &serde_json::json!({ "output": output, "source": source.to_string() }),
                    &format!("{} <- {}", output, source),
                )?;
            }
        }
        Commands::Route {
            receiver,
            transmitter,
        } => {
            matrix
                .receiver(receiver.clone())
                .set_route(&ctx, &transmitter)
                .await?;
            print(
                cli.json,
                &serde_json::json!({ "receiver": receiver, "transmitter": transmitter }),
                &format!("{} -> {}", transmitter, receiver),
            )?;
            // Let the scheduled drift check finish before the runtime shuts down.
            matrix.drift_monitor().wait_idle().await;
        }
        Commands::Details { receiver } => {
            let info = matrix.receiver(receiver).device_details(&ctx).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Hostname:         {}", info.hostname);
                println!("Model:            {}", info.model_name);
                println!("Firmware:         {} ({})", info.firmware_version, info.build_date);
                println!("Uptime:           {}", info.power_status);
                println!("IP address:       {}", info.ip_address);
                println!("MAC address:      {}", info.mac_address);
            }
        }
        Commands::Drift { transmitter } => {
            let outcome = matrix.check_drift(&transmitter).await?;
            print(
                cli.json,
                &serde_json::json!({
                    "transmitter": transmitter,
                    "corrected": outcome.corrected(),
                    "outcome": outcome.to_string(),
                }),
                &format!("{}: {}", transmitter, outcome),
            )?;
        }
    }

    Ok(())
}

fn print(json: bool, value: &serde_json::Value, text: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{}", text);
    }
    Ok(())
}
