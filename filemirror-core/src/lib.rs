//! filemirror core library: domain types, link addresses, registry
//! persistence, storage paths, configuration, and errors.
//!
//! - [`types`]: [`RemoteFile`] and [`TrackedEntry`]
//! - [`link`]: parse / format of web links to a remote file
//! - [`registry`]: the line-oriented tracked-file store
//! - [`paths`], [`config`], [`credentials`]: everything under `~/.filemirror/`
//! - [`notice`]: user-facing outcome messages

pub mod config;
pub mod credentials;
pub mod error;
pub mod link;
pub mod notice;
pub mod paths;
pub mod registry;
pub mod types;

pub use config::MirrorConfig;
pub use error::{LinkError, RegistryError};
pub use link::LinkAddress;
pub use notice::{Notice, Severity};
pub use registry::Registry;
pub use types::{EntryKey, RemoteFile, TrackedEntry};
