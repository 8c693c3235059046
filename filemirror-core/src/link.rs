//! Web links to a file in a remote repository.
//!
//! Accepted shape: `https://<host>/<owner>/<repo>/blob/<branch>/<path...>`,
//! where `<path...>` may itself contain `/`. Formatting a parsed link
//! reproduces the input exactly.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::LinkError;
use crate::types::RemoteFile;

/// Host used when a link is built from a bare [`RemoteFile`].
pub const DEFAULT_WEB_HOST: &str = "github.com";

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^https://(?P<host>[^/]+)/(?P<owner>[^/]+)/(?P<repo>[^/]+)/blob/(?P<branch>[^/]+)/(?P<path>.+)$",
        )
        .expect("link pattern is a valid regex")
    })
}

/// A parsed link: the web host plus the remote file it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkAddress {
    pub host: String,
    pub file: RemoteFile,
}

impl LinkAddress {
    pub fn new(host: impl Into<String>, file: RemoteFile) -> Self {
        Self {
            host: host.into(),
            file,
        }
    }

    /// Split a link into host / owner / repo / branch / path.
    ///
    /// Fails with [`LinkError::Malformed`] unless the whole link matches;
    /// nothing is extracted from a partial match.
    pub fn parse(link: &str) -> Result<Self, LinkError> {
        let malformed = || LinkError::Malformed {
            link: link.to_owned(),
        };
        let caps = pattern().captures(link).ok_or_else(malformed)?;
        let group = |name: &str| caps.name(name).map(|m| m.as_str()).ok_or_else(malformed);
        Ok(Self {
            host: group("host")?.to_owned(),
            file: RemoteFile::new(group("owner")?, group("repo")?, group("branch")?, group("path")?),
        })
    }

    /// Canonical link text; the inverse of [`LinkAddress::parse`].
    pub fn format(&self) -> String {
        format_link(&self.host, &self.file)
    }
}

/// Build the canonical link for `file` on `host`.
pub fn format_link(host: &str, file: &RemoteFile) -> String {
    format!(
        "https://{host}/{}/{}/blob/{}/{}",
        file.owner, file.repo, file.branch, file.path
    )
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for LinkAddress {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_path() {
        let link = LinkAddress::parse("https://github.com/revel111/GithubDownloader/blob/master/src/app/main.py")
            .unwrap();
        assert_eq!(link.host, "github.com");
        assert_eq!(link.file.owner, "revel111");
        assert_eq!(link.file.repo, "GithubDownloader");
        assert_eq!(link.file.branch, "master");
        assert_eq!(link.file.path, "src/app/main.py");
    }

    #[test]
    fn default_host_link() {
        let file = RemoteFile::new("o", "r", "main", "a/b.txt");
        assert_eq!(
            format_link(DEFAULT_WEB_HOST, &file),
            "https://github.com/o/r/blob/main/a/b.txt"
        );
    }

    #[test]
    fn from_str_delegates_to_parse() {
        let err = "not a link".parse::<LinkAddress>().unwrap_err();
        assert_eq!(err, LinkError::Malformed { link: "not a link".into() });
    }
}
