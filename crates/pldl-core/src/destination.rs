//! Output directory resolution for batches.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::SettingsSource;

/// Where a batch lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPolicy {
    /// Base directory; the configured download location when `None`.
    pub custom_location: Option<PathBuf>,
    /// Put the batch in `<base>/<group_id>-<label>/videos`.
    pub create_group_folder: bool,
}

impl Default for DestinationPolicy {
    fn default() -> Self {
        Self {
            custom_location: None,
            create_group_folder: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("cannot create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

#[async_trait]
pub trait DestinationResolver: Send + Sync {
    /// Resolve and create the directory for one batch.
    async fn resolve(
        &self,
        group_id: &str,
        group_label: &str,
        policy: &DestinationPolicy,
    ) -> Result<PathBuf, DestinationError>;
}

/// Sanitizes a playlist label for use as one path component.
///
/// - Turns whitespace runs (tabs, newlines) into a single space
/// - Replaces NUL, `/`, `\`, other control characters and characters Windows
///   rejects (`<>:"|?*`) with `_`, collapsing repeats
/// - Trims leading/trailing spaces, dots and underscores
/// - Limits length to 100 bytes
pub fn sanitize_label(label: &str) -> String {
    const MAX_LEN: usize = 100;

    let mut out = String::with_capacity(label.len());
    let mut prev_underscore = false;
    let mut prev_space = false;

    for c in label.chars() {
        if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
            prev_underscore = false;
        } else if c == '\0' || c == '/' || c == '\\' || c.is_control() || "<>:\"|?*".contains(c) {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
            prev_space = false;
        } else {
            out.push(c);
            prev_underscore = false;
            prev_space = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.len() > MAX_LEN {
        let mut take = MAX_LEN;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].trim_end().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Directory a batch resolves to under `base`.
pub fn batch_directory(
    base: &Path,
    group_id: &str,
    group_label: &str,
    create_group_folder: bool,
) -> PathBuf {
    if !create_group_folder {
        return base.to_path_buf();
    }
    let label = sanitize_label(group_label);
    let folder = if label.is_empty() {
        sanitize_label(group_id)
    } else {
        format!("{}-{}", sanitize_label(group_id), label)
    };
    base.join(folder).join("videos")
}

/// Resolves against the local filesystem, creating directories as needed.
pub struct FsDestinationResolver {
    settings: Arc<dyn SettingsSource>,
}

impl FsDestinationResolver {
    pub fn new(settings: Arc<dyn SettingsSource>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl DestinationResolver for FsDestinationResolver {
    async fn resolve(
        &self,
        group_id: &str,
        group_label: &str,
        policy: &DestinationPolicy,
    ) -> Result<PathBuf, DestinationError> {
        if policy.create_group_folder && sanitize_label(group_id).is_empty() {
            return Err(DestinationError::Invalid(format!(
                "group id {group_id:?} is not usable as a folder name"
            )));
        }
        let base = policy
            .custom_location
            .clone()
            .unwrap_or_else(|| self.settings.download_location());
        let dir = batch_directory(&base, group_id, group_label, policy.create_group_folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| DestinationError::Create {
                path: dir.clone(),
                source,
            })?;
        tracing::debug!(dir = %dir.display(), group_id, "resolved batch destination");
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PldlConfig;

    #[test]
    fn replaces_separators_and_reserved_chars() {
        assert_eq!(sanitize_label("Rock/Pop: Best?"), "Rock_Pop_ Best");
        assert_eq!(sanitize_label("a\\b<>c"), "a_b_c");
    }

    #[test]
    fn trims_dots_and_spaces() {
        assert_eq!(sanitize_label("  ..  My Mix  ..  "), "My Mix");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(sanitize_label("lofi\t\tbeats   to study"), "lofi beats to study");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let long = "é".repeat(80);
        let out = sanitize_label(&long);
        assert!(out.len() <= 100);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn group_folder_layout() {
        let base = Path::new("/media");
        assert_eq!(
            batch_directory(base, "PL123", "Road Trip", true),
            PathBuf::from("/media/PL123-Road Trip/videos")
        );
        assert_eq!(
            batch_directory(base, "PL123", "Road Trip", false),
            PathBuf::from("/media")
        );
        assert_eq!(
            batch_directory(base, "PL123", "///", true),
            PathBuf::from("/media/PL123/videos")
        );
    }

    #[tokio::test]
    async fn resolver_creates_directory_under_custom_location() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = FsDestinationResolver::new(Arc::new(PldlConfig::default()));
        let policy = DestinationPolicy {
            custom_location: Some(tmp.path().to_path_buf()),
            create_group_folder: true,
        };
        let dir = resolver.resolve("PL9", "Live Sets", &policy).await.unwrap();
        assert_eq!(dir, tmp.path().join("PL9-Live Sets").join("videos"));
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn resolver_uses_configured_location() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = PldlConfig {
            download_location: Some(tmp.path().join("library")),
            ..PldlConfig::default()
        };
        let resolver = FsDestinationResolver::new(Arc::new(cfg));
        let policy = DestinationPolicy {
            custom_location: None,
            create_group_folder: false,
        };
        let dir = resolver.resolve("PL9", "x", &policy).await.unwrap();
        assert_eq!(dir, tmp.path().join("library"));
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn unusable_group_id_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = FsDestinationResolver::new(Arc::new(PldlConfig::default()));
        let policy = DestinationPolicy {
            custom_location: Some(tmp.path().to_path_buf()),
            create_group_folder: true,
        };
        let err = resolver.resolve("..", "x", &policy).await.unwrap_err();
        assert!(matches!(err, DestinationError::Invalid(_)));
    }
}
