//! `pldl get <url>` – download one video and wait for it.

use anyhow::{Context, Result};
use pldl_core::batch::derive_source_id;
use pldl_core::config::PldlConfig;
use pldl_core::{DownloadOptions, SubmitRequest};
use std::path::PathBuf;

use crate::cli::session::Session;

pub async fn run_get(
    cfg: &PldlConfig,
    url: String,
    id: Option<String>,
    title: Option<String>,
    output_dir: Option<PathBuf>,
    format: Option<String>,
    quality: Option<String>,
) -> Result<()> {
    let source_id = match id {
        Some(id) => id,
        None => derive_source_id(&url)
            .with_context(|| format!("cannot derive an id from {url}; pass --id"))?,
    };
    let title = title.unwrap_or_else(|| source_id.clone());
    let output_dir = output_dir.unwrap_or_else(|| cfg.resolved_download_location());

    let session = Session::start(cfg)?;
    let job_id = session
        .manager
        .submit(SubmitRequest {
            url,
            source_id,
            title,
            output_dir,
            options: DownloadOptions { format, quality },
            group_id: None,
            thumbnail: None,
        })
        .await?;
    println!("Queued job {job_id}");
    session.wait(&[job_id]).await
}
