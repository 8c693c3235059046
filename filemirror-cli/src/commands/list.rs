//! `filemirror list` / `filemirror status`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use filemirror_core::{RegistryError, TrackedEntry};
use filemirror_sync::{Staleness, SyncError};

use super::{finish, Session};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct EntryJson {
    link: String,
    location: String,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "file")]
    link: String,
    #[tabled(rename = "location")]
    location: String,
}

impl ListArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let entries = match session.registry().list_entries() {
            Ok(entries) => entries,
            Err(RegistryError::EmptyRegistry) if self.json => {
                println!("[]");
                return Ok(());
            }
            Err(e) => return finish(SyncError::from(e).to_notice()),
        };

        if self.json {
            let payload: Vec<EntryJson> = entries
                .iter()
                .map(|e| EntryJson {
                    link: session.link(&e.file),
                    location: e.location.display().to_string(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to render JSON")?
            );
            return Ok(());
        }

        let rows = entries.iter().enumerate().map(|(i, e)| EntryRow {
            index: i + 1,
            link: session.link(&e.file),
            location: e.location.display().to_string(),
        });
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson {
    link: String,
    local_path: String,
    status: &'static str,
    stale: bool,
    remote_commit_at: Option<DateTime<Utc>>,
    local_modified_at: Option<DateTime<Utc>>,
    detail: Option<String>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "file")]
    link: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl StatusArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let coordinator = session.coordinator();
        let verdicts = match coordinator.status() {
            Ok(verdicts) => verdicts,
            Err(SyncError::Registry(RegistryError::EmptyRegistry)) if self.json => {
                println!("[]");
                return Ok(());
            }
            Err(e) => return finish(e.to_notice()),
        };

        if self.json {
            let payload: Vec<StatusJson> = verdicts
                .iter()
                .map(|(entry, verdict)| {
                    let local_path = coordinator.oracle().target_path(entry);
                    status_json(session, local_path, entry, verdict)
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to render JSON")?
            );
            return Ok(());
        }

        let mut stale = 0usize;
        let rows: Vec<StatusRow> = verdicts
            .iter()
            .map(|(entry, verdict)| {
                if verdict.is_stale() {
                    stale += 1;
                }
                StatusRow {
                    link: session.link(&entry.file),
                    status: colored_label(verdict),
                    detail: detail(verdict),
                }
            })
            .collect();
        let total = rows.len();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{stale} of {total} file(s) need syncing");
        Ok(())
    }
}

fn label(verdict: &Staleness) -> &'static str {
    match verdict {
        Staleness::Missing { .. } => "missing",
        Staleness::Stale { .. } => "stale",
        Staleness::Current { .. } => "current",
        Staleness::Unverified(_) => "unverified",
    }
}

fn colored_label(verdict: &Staleness) -> String {
    let text = label(verdict);
    match verdict {
        Staleness::Missing { .. } | Staleness::Stale { .. } => text.yellow().to_string(),
        Staleness::Current { .. } => text.green().to_string(),
        Staleness::Unverified(e) if e.is_unavailable() => text.yellow().to_string(),
        Staleness::Unverified(_) => text.red().to_string(),
    }
}

fn local_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn detail(verdict: &Staleness) -> String {
    match verdict {
        Staleness::Missing { path } => format!("no local copy at {}", path.display()),
        Staleness::Stale { remote, local } => format!(
            "upstream changed {} (local copy {})",
            local_time(remote),
            local_time(local)
        ),
        Staleness::Current { local, .. } => format!("local copy {}", local_time(local)),
        Staleness::Unverified(e) => e.to_string(),
    }
}

fn status_json(
    session: &Session,
    local_path: std::path::PathBuf,
    entry: &TrackedEntry,
    verdict: &Staleness,
) -> StatusJson {
    let (remote_commit_at, local_modified_at) = match verdict {
        Staleness::Stale { remote, local } | Staleness::Current { remote, local } => {
            (Some(*remote), Some(*local))
        }
        _ => (None, None),
    };
    StatusJson {
        link: session.link(&entry.file),
        local_path: local_path.display().to_string(),
        status: label(verdict),
        stale: verdict.is_stale(),
        remote_commit_at,
        local_modified_at,
        detail: match verdict {
            Staleness::Unverified(e) => Some(e.to_string()),
            _ => None,
        },
    }
}
