//! `pldl status` – show jobs of the running session.

use anyhow::{Context, Result};
use pldl_core::JobRecord;

use crate::cli::control_socket::{self, ControlRequest};
use crate::cli::progress::short_id;

pub async fn run_status() -> Result<()> {
    let path = pldl_core::control::default_control_socket_path()?;
    let reply = control_socket::send_request(&path, ControlRequest::Status).await?;
    let jobs: Vec<JobRecord> = serde_json::from_str(&reply).context("parse status reply")?;
    if jobs.is_empty() {
        println!("No jobs.");
    } else {
        println!("{:<10} {:<10} {:>6}  {}", "ID", "STATE", "PCT", "TITLE");
        for j in jobs {
            println!(
                "{:<10} {:<10} {:>5.1}%  {}",
                short_id(&j.id),
                j.status,
                j.progress_percent,
                j.display_name
            );
        }
    }
    Ok(())
}
