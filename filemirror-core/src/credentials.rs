//! Persisted access token.
//!
//! The token is an opaque precondition for building a provider client; this
//! module only stores and returns it.

use std::path::{Path, PathBuf};

use crate::error::{io_err, RegistryError};
use crate::paths;

/// Store `token` at `<home>/.filemirror/credentials` (mode `0600`).
pub fn save_token_at(home: &Path, token: &str) -> Result<PathBuf, RegistryError> {
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(RegistryError::InvalidField {
            field: "token",
            value: String::new(),
            reason: "must be a single non-empty word",
        });
    }
    paths::ensure_private_dir(&paths::root_at(home))?;
    let path = paths::credentials_path_at(home);
    paths::atomic_write(&path, token.as_bytes())?;
    Ok(path)
}

/// `save_token_at` convenience wrapper.
pub fn save_token(token: &str) -> Result<PathBuf, RegistryError> {
    save_token_at(&paths::home_dir()?, token)
}

/// Read the stored token, if any.
pub fn load_token_at(home: &Path) -> Result<Option<String>, RegistryError> {
    let path = paths::credentials_path_at(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let token = contents.trim();
    Ok((!token.is_empty()).then(|| token.to_owned()))
}

/// `load_token_at` convenience wrapper.
pub fn load_token() -> Result<Option<String>, RegistryError> {
    load_token_at(&paths::home_dir()?)
}
