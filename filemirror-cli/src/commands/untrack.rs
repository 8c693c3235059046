//! `filemirror untrack`.

use anyhow::{bail, Result};
use clap::Args;

use filemirror_core::Notice;

use super::{finish, parse_link, Session};

#[derive(Args, Debug)]
pub struct UntrackArgs {
    /// Web link of the tracked file.
    pub link: Option<String>,

    /// Stop tracking every file.
    #[arg(long, conflicts_with = "link")]
    pub all: bool,
}

impl UntrackArgs {
    /// Local copies are left in place.
    pub fn run(self, session: &Session) -> Result<()> {
        let coordinator = session.coordinator();
        if self.all {
            return match coordinator.untrack_all() {
                Ok(()) => finish(Notice::success("stopped tracking all files")),
                Err(e) => finish(e.to_notice()),
            };
        }
        let Some(link) = self.link else {
            bail!("pass a link or --all");
        };
        let file = parse_link(&link)?;
        match coordinator.untrack(&file) {
            Ok(_) => finish(Notice::success(format!(
                "stopped tracking {}",
                session.link(&file)
            ))),
            Err(e) => finish(e.to_notice()),
        }
    }
}
