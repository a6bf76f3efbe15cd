//! Playlist batches: many submissions sharing one destination directory.

use serde::{Deserialize, Serialize};

use crate::destination::DestinationPolicy;
use crate::error::ManagerResult;
use crate::job::{DownloadOptions, JobId};
use crate::manager::{DownloadManager, SubmitRequest};

/// One playlist entry, as stored by the metadata layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub video_id: String,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// The playlist a batch belongs to and where it goes.
#[derive(Debug, Clone, Default)]
pub struct BatchTarget {
    pub group_id: String,
    pub group_label: String,
    pub destination: DestinationPolicy,
    /// Applied to every item.
    pub options: DownloadOptions,
}

/// Why an item cannot be submitted, if it can't.
pub fn invalid_reason(item: &BatchItem) -> Option<String> {
    if item.video_id.trim().is_empty() {
        return Some("missing video id".to_string());
    }
    if item.title.trim().is_empty() {
        return Some("missing title".to_string());
    }
    let url = item.url.trim();
    if url.is_empty() {
        return Some("missing url".to_string());
    }
    match url::Url::parse(url) {
        Ok(u) if u.has_host() => None,
        Ok(_) => Some(format!("url {url:?} has no host")),
        Err(e) => Some(format!("url {url:?} does not parse: {e}")),
    }
}

/// Best-effort source id for an ad-hoc URL: the `v` query parameter when
/// present, else the last path segment.
pub fn derive_source_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
        if !v.is_empty() {
            return Some(v.into_owned());
        }
    }
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

/// Keep the structurally valid items, logging why the others were dropped.
pub fn filter_valid_items(items: &[BatchItem]) -> Vec<&BatchItem> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match invalid_reason(item) {
            None => Some(item),
            Some(reason) => {
                tracing::warn!(index, video_id = %item.video_id, %reason, "dropping batch item");
                None
            }
        })
        .collect()
}

impl DownloadManager {
    /// Submit a playlist. The destination is resolved once; items that are
    /// invalid or fail to submit are skipped. Fails only when the
    /// destination cannot be resolved. Returns the created ids in item order.
    pub async fn add_batch(
        &self,
        items: &[BatchItem],
        target: &BatchTarget,
    ) -> ManagerResult<Vec<JobId>> {
        self.ensure_running()?;
        let valid = filter_valid_items(items);
        if valid.is_empty() {
            tracing::info!(group_id = %target.group_id, "batch has no valid items");
            return Ok(Vec::new());
        }

        let dir = self
            .resolver()
            .resolve(&target.group_id, &target.group_label, &target.destination)
            .await?;

        let mut ids = Vec::with_capacity(valid.len());
        for item in valid {
            let req = SubmitRequest {
                url: item.url.clone(),
                source_id: item.video_id.clone(),
                title: item.title.clone(),
                output_dir: dir.clone(),
                options: target.options.clone(),
                group_id: Some(target.group_id.clone()),
                thumbnail: item.thumbnail.clone(),
            };
            match self.submit(req).await {
                Ok(id) => ids.push(id),
                Err(e) => {
                    tracing::warn!(video_id = %item.video_id, "batch item not submitted: {e}")
                }
            }
        }
        tracing::info!(
            group_id = %target.group_id,
            submitted = ids.len(),
            requested = items.len(),
            dir = %dir.display(),
            "batch submitted"
        );
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, url: &str, title: &str) -> BatchItem {
        BatchItem {
            video_id: id.into(),
            url: url.into(),
            title: title.into(),
            thumbnail: None,
        }
    }

    #[test]
    fn rejects_structurally_invalid_items() {
        assert!(invalid_reason(&item("a", "https://youtu.be/a", "A")).is_none());
        assert!(invalid_reason(&item("", "https://youtu.be/a", "A")).is_some());
        assert!(invalid_reason(&item("a", "", "A")).is_some());
        assert!(invalid_reason(&item("a", "https://youtu.be/a", " ")).is_some());
        assert!(invalid_reason(&item("a", "not a url", "A")).is_some());
        assert!(invalid_reason(&item("a", "mailto:x@y.z", "A")).is_some());
    }

    #[test]
    fn filter_keeps_order() {
        let items = vec![
            item("a", "https://youtu.be/a", "A"),
            item("b", "", "B"),
            item("c", "https://youtu.be/c", "C"),
        ];
        let kept: Vec<_> = filter_valid_items(&items)
            .into_iter()
            .map(|i| i.video_id.as_str())
            .collect();
        assert_eq!(kept, vec!["a", "c"]);
    }

    #[test]
    fn source_id_from_common_url_shapes() {
        assert_eq!(
            derive_source_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(derive_source_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(derive_source_id("https://example.com/"), None);
        assert_eq!(derive_source_id("garbage"), None);
    }

    #[test]
    fn items_deserialize_from_playlist_json() {
        let json = r#"[{"videoId":"a","url":"https://youtu.be/a","title":"A","thumbnail":"https://i.ytimg.com/a.jpg"}]"#;
        let items: Vec<BatchItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items[0].video_id, "a");
        assert!(items[0].thumbnail.is_some());
    }
}
