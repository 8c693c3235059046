//! # filemirror-remote
//!
//! The capability set the sync engine needs from a remote repository
//! provider, expressed as the [`RemoteProvider`] trait, plus:
//!
//! - [`GithubClient`]: blocking REST client over `ureq`
//! - [`MemoryProvider`]: in-process provider for tests and offline use
//! - [`validate_address`]: per-field check of a newly entered address

pub mod error;
pub mod github;
pub mod memory;
pub mod provider;
mod validate;

pub use error::RemoteError;
pub use github::GithubClient;
pub use memory::MemoryProvider;
pub use provider::{BranchHandle, CommitInfo, RemoteProvider, RepoHandle, UserHandle};
pub use validate::validate_address;
