//! Control socket: server (during `pldl get`/`pldl batch`) and client (for
//! `pldl pause` and friends).
//! Protocol: one line per command, one line per reply.
//! "pause|resume|cancel|remove <id>" -> "ok" | "rejected"; "status" -> JSON array.

use anyhow::{bail, Context, Result};
use pldl_core::{DownloadManager, JobId};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Cancel,
    Remove,
}

impl ControlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Cancel => "cancel",
            ControlAction::Remove => "remove",
        }
    }

    /// Past tense for user messages.
    pub fn done(self) -> &'static str {
        match self {
            ControlAction::Pause => "Paused",
            ControlAction::Resume => "Resumed",
            ControlAction::Cancel => "Canceled",
            ControlAction::Remove => "Removed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Job(ControlAction, JobId),
    Status,
}

impl ControlRequest {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line == "status" {
            return Some(ControlRequest::Status);
        }
        let (verb, rest) = line.split_once(' ')?;
        let action = match verb {
            "pause" => ControlAction::Pause,
            "resume" => ControlAction::Resume,
            "cancel" => ControlAction::Cancel,
            "remove" => ControlAction::Remove,
            _ => return None,
        };
        let id = rest.trim().parse::<JobId>().ok()?;
        Some(ControlRequest::Job(action, id))
    }

    pub fn to_line(self) -> String {
        match self {
            ControlRequest::Job(action, id) => format!("{} {}\n", action.as_str(), id),
            ControlRequest::Status => "status\n".to_string(),
        }
    }
}

/// Apply one request to the manager and produce the reply line (without newline).
pub fn handle_request(manager: &DownloadManager, req: ControlRequest) -> String {
    match req {
        ControlRequest::Status => {
            serde_json::to_string(&manager.get_all()).unwrap_or_else(|e| {
                tracing::warn!("status serialization: {}", e);
                "[]".to_string()
            })
        }
        ControlRequest::Job(action, id) => {
            let accepted = match action {
                ControlAction::Pause => manager.pause(&id),
                ControlAction::Resume => manager.resume(&id),
                ControlAction::Cancel => manager.cancel(&id),
                ControlAction::Remove => manager.remove(&id),
            };
            if accepted { "ok" } else { "rejected" }.to_string()
        }
    }
}

/// Spawns a task that listens on `path` and applies each command line to
/// `manager`. Malformed lines get an "error" reply.
pub fn spawn_control_listener(
    manager: DownloadManager,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let manager = manager.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&manager, stream).await {
                            tracing::debug!("control connection: {}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(manager: &DownloadManager, stream: UnixStream) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let reply = match ControlRequest::parse(&line) {
            Some(req) => {
                tracing::debug!(?req, "control request");
                handle_request(manager, req)
            }
            None => format!("error: unrecognized command {:?}", line.trim()),
        };
        write.write_all(reply.as_bytes()).await?;
        write.write_all(b"\n").await?;
    }
    Ok(())
}

/// Sends one request and returns the reply line.
pub async fn send_request(socket_path: &Path, req: ControlRequest) -> Result<String> {
    if !socket_path.exists() {
        bail!(
            "no running pldl download (control socket {} not found)",
            socket_path.display()
        );
    }
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write.write_all(req.to_line().as_bytes()).await?;
    write.shutdown().await?;
    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .context("control socket closed without a reply")?;
    Ok(reply)
}
