//! `pldl pause|resume|cancel|remove <id>` – forward to the running session.

use anyhow::{bail, Result};
use pldl_core::JobId;

use crate::cli::control_socket::{self, ControlAction, ControlRequest};

pub async fn run_control(action: ControlAction, id: JobId) -> Result<()> {
    let path = pldl_core::control::default_control_socket_path()?;
    let reply = control_socket::send_request(&path, ControlRequest::Job(action, id)).await?;
    match reply.as_str() {
        "ok" => {
            println!("{} job {id}", action.done());
            Ok(())
        }
        "rejected" => bail!("cannot {} job {id} (unknown id or not allowed in its current state)", action.as_str()),
        other => bail!("unexpected reply: {other}"),
    }
}
