//! `filemirror track` / `filemirror download`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use filemirror_core::Notice;
use filemirror_sync::coordinator::write_notice;

use super::{finish, finish_all, parse_link, Session};

#[derive(Args, Debug)]
pub struct TrackArgs {
    /// Web link to the file, e.g. https://github.com/<owner>/<repo>/blob/<branch>/<path>.
    pub link: String,

    /// Directory the file is stored in (defaults to the current directory).
    #[arg(long, short)]
    pub location: Option<PathBuf>,
}

impl TrackArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let file = parse_link(&self.link)?;
        let location = resolve_location(self.location)?;
        let link = session.link(&file);

        let tracked = match session.coordinator().track(file, &location) {
            Ok(tracked) => tracked,
            Err(e) => return finish(e.to_notice()),
        };
        let registered = Notice::success(format!(
            "tracking {link} at {}",
            tracked.entry.location.display()
        ));
        let fetched = match &tracked.fetch {
            Ok(write) => write_notice(&link, write),
            Err(e) => {
                let notice = e.to_notice();
                Notice::new(notice.severity, format!("initial fetch failed: {}", notice.message))
            }
        };
        finish_all([registered, fetched])
    }
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Web link to the file.
    pub link: String,

    /// Directory the file is stored in (defaults to the current directory).
    #[arg(long, short)]
    pub location: Option<PathBuf>,
}

impl DownloadArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let file = parse_link(&self.link)?;
        let location = resolve_location(self.location)?;
        let notice = match session.coordinator().download(&file, &location) {
            Ok(write) => write_notice(&session.link(&file), &write),
            Err(e) => e.to_notice(),
        };
        finish(notice)
    }
}

fn resolve_location(location: Option<PathBuf>) -> Result<PathBuf> {
    let location = match location {
        Some(location) => location,
        None => std::env::current_dir().context("could not determine current directory")?,
    };
    // Stored locations are absolute so the daemon resolves them the same way.
    if location.is_absolute() {
        Ok(location)
    } else {
        Ok(std::env::current_dir()
            .context("could not determine current directory")?
            .join(location))
    }
}
