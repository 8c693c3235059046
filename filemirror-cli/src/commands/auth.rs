//! `filemirror login` / `filemirror whoami`.

use anyhow::{Context, Result};
use clap::Args;

use filemirror_core::{credentials, Notice};
use filemirror_remote::{RemoteError, RemoteProvider};

use super::{finish, Session};

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Personal access token.
    pub token: String,
}

impl LoginArgs {
    /// The token is stored only after the provider accepts it.
    pub fn run(self, session: &Session) -> Result<()> {
        let token = self.token.trim().to_owned();
        let user = match session
            .client_with_token(Some(token.clone()))
            .authenticated_user()
        {
            Ok(user) => user,
            Err(e @ RemoteError::Unavailable(_)) => return finish(Notice::warning(e.to_string())),
            Err(e) => return finish(Notice::error(e.to_string())),
        };
        let path = credentials::save_token_at(&session.home, &token)
            .context("failed to store credentials")?;
        finish(Notice::success(format!(
            "logged in as {} (token saved to {})",
            user.login,
            path.display()
        )))
    }
}

pub fn whoami(session: &Session) -> Result<()> {
    if session.token.is_none() {
        return finish(Notice::info("not logged in; run `filemirror login <token>`"));
    }
    match session.client().authenticated_user() {
        Ok(user) => {
            println!("{}", user.login);
            Ok(())
        }
        Err(e @ RemoteError::Unavailable(_)) => finish(Notice::warning(e.to_string())),
        Err(e) => finish(Notice::error(e.to_string())),
    }
}
