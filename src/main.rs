// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! mqtt-alarm - runs every alarm accessory found in a configuration file.
//!
//! Usage:
//!   mqtt-alarm [OPTIONS] <CONFIG>
//!
//! Options:
//!   -l, --log-level <LEVEL>  Log level (error, warn, info, debug, trace)
//!   -h, --help               Print help

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use mqtt_alarm::config::BridgeConfig;
use mqtt_alarm::{DeviceSession, Subscribable};

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    #[default]
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Bridge MQTT security alarms to smart-home accessories
#[derive(Parser, Debug)]
#[command(name = "mqtt-alarm")]
#[command(version)]
#[command(about = "Bridge MQTT security alarms to smart-home accessories")]
struct Args {
    /// Configuration file path (JSON)
    config: PathBuf,

    /// Log level; overrides RUST_LOG when given
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> mqtt_alarm::Result<()> {
    let args = Args::parse();

    let filter = match args.log_level {
        Some(level) => EnvFilter::new(level.as_directive()),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(LogLevel::default().as_directive())),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = BridgeConfig::from_file(&args.config)?;
    tracing::info!(
        path = %args.config.display(),
        accessories = config.accessories.len(),
        "Configuration loaded"
    );

    let mut sessions = Vec::with_capacity(config.accessories.len());
    for accessory in config.accessories {
        let name = accessory.name.clone();
        let session = DeviceSession::start(accessory).await?;
        session.on_state_changed(move |change| {
            tracing::info!(accessory = %name, %change, "State changed");
        });
        sessions.push(session);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");

    for session in &sessions {
        session.shutdown().await;
    }

    Ok(())
}
