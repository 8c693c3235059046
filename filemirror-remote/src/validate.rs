use filemirror_core::RemoteFile;

use crate::error::RemoteError;
use crate::provider::RemoteProvider;

/// Check a newly entered address component by component.
///
/// Order: user → repository → branch → path. The first failing component is
/// reported with its own [`RemoteError`] variant.
pub fn validate_address(provider: &dyn RemoteProvider, file: &RemoteFile) -> Result<(), RemoteError> {
    provider.user(&file.owner)?;
    let repo = provider.repository(&file.owner, &file.repo)?;
    provider.branch(&repo, &file.branch)?;
    provider.blob_content(&repo, &file.path, &file.branch)?;
    tracing::debug!("validated remote address {file}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::MemoryProvider;

    fn provider() -> MemoryProvider {
        let p = MemoryProvider::new();
        p.put_file(&RemoteFile::new("o", "r", "main", "a/b.txt"), "x", Utc::now());
        p
    }

    #[rstest]
    #[case::user(RemoteFile::new("nobody", "r", "main", "a/b.txt"), "user \"nobody\"")]
    #[case::repo(RemoteFile::new("o", "missing", "main", "a/b.txt"), "repository \"o/missing\"")]
    #[case::branch(RemoteFile::new("o", "r", "dev", "a/b.txt"), "branch \"dev\"")]
    #[case::path(RemoteFile::new("o", "r", "main", "nope.txt"), "file \"nope.txt\"")]
    fn first_wrong_component_is_named(#[case] file: RemoteFile, #[case] expected: &str) {
        let err = validate_address(&provider(), &file).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains(expected), "got: {err}");
    }

    #[test]
    fn valid_address_passes() {
        validate_address(&provider(), &RemoteFile::new("o", "r", "main", "a/b.txt")).expect("valid");
    }

    #[test]
    fn offline_is_unavailable() {
        let p = provider();
        p.set_offline(true);
        let err = validate_address(&p, &RemoteFile::new("o", "r", "main", "a/b.txt")).unwrap_err();
        assert!(err.is_unavailable());
    }
}
