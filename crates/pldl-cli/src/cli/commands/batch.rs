//! `pldl batch <items.json>` – download a playlist and wait for it.

use anyhow::{bail, Context, Result};
use pldl_core::config::PldlConfig;
use pldl_core::{BatchItem, BatchTarget, DestinationPolicy, DownloadOptions};
use std::path::{Path, PathBuf};

use crate::cli::session::Session;

pub fn batch_target(
    group_id: String,
    group_label: String,
    location: Option<PathBuf>,
    no_group_folder: bool,
    format: Option<String>,
    quality: Option<String>,
) -> BatchTarget {
    BatchTarget {
        group_id,
        group_label,
        destination: DestinationPolicy {
            custom_location: location,
            create_group_folder: !no_group_folder,
        },
        options: DownloadOptions { format, quality },
    }
}

pub fn read_items(path: &Path) -> Result<Vec<BatchItem>> {
    let data = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let items: Vec<BatchItem> =
        serde_json::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(items)
}

pub async fn run_batch(cfg: &PldlConfig, items_path: &Path, target: BatchTarget) -> Result<()> {
    let items = read_items(items_path)?;
    let session = Session::start(cfg)?;
    let ids = session.manager.add_batch(&items, &target).await?;
    if ids.is_empty() {
        bail!("no valid items in {}", items_path.display());
    }
    println!(
        "Queued {} of {} item(s) for {}",
        ids.len(),
        items.len(),
        target.group_label
    );
    session.wait(&ids).await
}
