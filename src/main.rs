//! datahubd: runs the hub on its own thread until standard input closes.
//!
//! Usage: `datahubd [config.json]`

use datahub_rs::{config::HubConfig, logging, Hub, HubBridge};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => match HubConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("datahubd: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => HubConfig::default(),
    };

    logging::init(&config.log_filter);
    tracing::info!("Starting datahubd");

    let hub = match Hub::from_config(&config) {
        Ok(hub) => hub,
        Err(e) => {
            tracing::error!("Failed to start hub: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let bridge = HubBridge::spawn(hub, &config);

    // Block until the supervisor closes our stdin.
    if let Err(e) = std::io::copy(&mut std::io::stdin().lock(), &mut std::io::sink()) {
        tracing::warn!("Reading stdin failed: {}", e);
    }

    tracing::info!("Shutting down...");
    match bridge.shutdown() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
