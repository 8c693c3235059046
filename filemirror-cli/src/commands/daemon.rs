//! `filemirror daemon`: background sync loop lifecycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use filemirror_core::paths::socket_path_at;
use filemirror_daemon::{request_status, request_stop, start_blocking, DaemonError};

use super::Session;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground.
    Start(StartArgs),
    /// Request graceful daemon shutdown over the control socket.
    Stop,
    /// Query daemon runtime status over the control socket.
    Status,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Seconds between sync passes; overrides `interval_secs` in config.yaml.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

pub fn run(command: DaemonCommand, session: &Session) -> Result<()> {
    let home = &session.home;

    match command {
        DaemonCommand::Start(args) => {
            let interval = args
                .interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| session.config.interval());
            start_blocking(home, Arc::new(session.coordinator()), interval)
                .context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let payload = match request_status(home) {
                Ok(status) => status,
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket_path_at(home).display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
        }
    }

    Ok(())
}
