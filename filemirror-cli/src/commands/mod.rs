pub mod auth;
pub mod daemon;
pub mod list;
pub mod sync;
pub mod track;
pub mod untrack;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use filemirror_core::{credentials, paths, LinkAddress, MirrorConfig, Notice, Registry, RemoteFile, Severity};
use filemirror_remote::GithubClient;
use filemirror_sync::SyncCoordinator;

/// Per-invocation context: home, config, and the token to authenticate with.
pub struct Session {
    pub home: PathBuf,
    pub config: MirrorConfig,
    pub token: Option<String>,
}

impl Session {
    /// `token` comes from `--token` / `FILEMIRROR_TOKEN`; the stored
    /// credential is used when it is absent.
    pub fn load(token: Option<String>) -> Result<Self> {
        let home = paths::home_dir().context("could not determine home directory")?;
        let config = MirrorConfig::load_at(&home).context("failed to load config")?;
        let token = match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => Some(token),
            None => credentials::load_token_at(&home).context("failed to read stored credentials")?,
        };
        Ok(Self {
            home,
            config,
            token,
        })
    }

    pub fn client_with_token(&self, token: Option<String>) -> GithubClient {
        GithubClient::new(self.config.api_base.clone(), token, self.config.timeout())
    }

    pub fn client(&self) -> GithubClient {
        self.client_with_token(self.token.clone())
    }

    pub fn registry(&self) -> Registry {
        Registry::open_at(&self.home)
    }

    pub fn coordinator(&self) -> SyncCoordinator {
        SyncCoordinator::new(
            Arc::new(self.registry()),
            Arc::new(self.client()),
            self.config.download_dir_at(&self.home),
        )
    }

    pub fn link(&self, file: &RemoteFile) -> String {
        filemirror_core::link::format_link(&self.config.web_host, file)
    }
}

pub fn parse_link(link: &str) -> Result<RemoteFile> {
    Ok(LinkAddress::parse(link)?.file)
}

pub fn print_notice(notice: &Notice) {
    let tag = match notice.severity {
        Severity::Success => "ok".green().bold(),
        Severity::Info => "info".cyan().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Error => "error".red().bold(),
    };
    if notice.is_error() {
        eprintln!("{tag}: {}", notice.message);
    } else {
        println!("{tag}: {}", notice.message);
    }
}

/// Print `notice`, or fail with it when it is an error.
pub fn finish(notice: Notice) -> Result<()> {
    if notice.is_error() {
        anyhow::bail!(notice.message);
    }
    print_notice(&notice);
    Ok(())
}

/// Print `notices`; fail if any of them was an error.
pub fn finish_all(notices: impl IntoIterator<Item = Notice>) -> Result<()> {
    let mut errors = 0usize;
    for notice in notices {
        print_notice(&notice);
        if notice.is_error() {
            errors += 1;
        }
    }
    if errors > 0 {
        anyhow::bail!("{errors} file(s) failed");
    }
    Ok(())
}
