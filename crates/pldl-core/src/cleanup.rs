//! Partial-artifact cleanup after a failed attempt.

use std::path::{Path, PathBuf};

/// Suffixes yt-dlp leaves behind while a download is in progress.
const TEMP_MARKERS: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

/// True for `<source_id>.*` names carrying a temp marker: `.part`, `.ytdl`,
/// `.temp`, `.tmp`, or a per-stream `.f<digits>.` segment.
pub fn is_partial_artifact(file_name: &str, source_id: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(source_id) else {
        return false;
    };
    if !rest.starts_with('.') {
        return false;
    }
    TEMP_MARKERS.iter().any(|m| rest.contains(m)) || has_stream_marker(rest)
}

fn has_stream_marker(rest: &str) -> bool {
    rest.split('.').any(|seg| {
        seg.len() > 1 && seg.starts_with('f') && seg[1..].bytes().all(|b| b.is_ascii_digit())
    })
}

/// Remove partial artifacts for `source_id` from `dir`. Returns the removed paths.
/// Errors are logged, never returned.
pub async fn remove_partial_artifacts(dir: &Path, source_id: &str) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    if source_id.is_empty() {
        return removed;
    }
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), "skip partial cleanup: {e}");
            return removed;
        }
    };
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "partial cleanup scan failed: {e}");
                break;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_partial_artifact(name, source_id) {
            continue;
        }
        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed partial artifact");
                removed.push(path);
            }
            Err(e) => tracing::warn!(path = %path.display(), "could not remove partial artifact: {e}"),
        }
    }
    removed
}
