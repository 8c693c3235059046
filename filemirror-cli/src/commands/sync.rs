//! `filemirror sync` / `filemirror update`.

use anyhow::Result;
use clap::Args;

use filemirror_sync::coordinator::write_notice;
use filemirror_sync::SyncSummary;

use super::{finish, finish_all, parse_link, Session};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Web link of one tracked file.
    pub link: Option<String>,

    /// Sync every tracked file (the default when no link is given).
    #[arg(long, conflicts_with = "link")]
    pub all: bool,
}

impl SyncArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let coordinator = session.coordinator();
        let host = &session.config.web_host;

        if let Some(link) = self.link {
            let file = parse_link(&link)?;
            return match coordinator.sync_key(&file) {
                Ok(report) => finish_all([report.notice(host)]),
                Err(e) => finish(e.to_notice()),
            };
        }

        let reports = match coordinator.sync_all() {
            Ok(reports) => reports,
            Err(e) => return finish(e.to_notice()),
        };
        let summary = SyncSummary::from_reports(&reports);
        let result = finish_all(reports.iter().map(|r| r.notice(host)));
        println!(
            "{} updated, {} up to date, {} unverified, {} failed",
            summary.updated, summary.up_to_date, summary.unverified, summary.failed
        );
        result
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Web link of the tracked file.
    pub link: String,
}

impl UpdateArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let file = parse_link(&self.link)?;
        match session.coordinator().update(&file) {
            Ok(write) => finish(write_notice(&session.link(&file), &write)),
            Err(e) => finish(e.to_notice()),
        }
    }
}
