//! Tests for status, pause, resume, cancel, remove and the control protocol.

use super::parse;
use clap::Parser;
use crate::cli::control_socket::{handle_request, ControlAction, ControlRequest};
use crate::cli::CliCommand;
use pldl_core::config::PldlConfig;
use pldl_core::{DownloadManager, JobId, YtDlpFetcher};
use std::sync::Arc;

const ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

#[test]
fn cli_parse_status() {
    match parse(&["pldl", "status"]) {
        CliCommand::Status => {}
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_job_actions() {
    let id: JobId = ID.parse().unwrap();
    match parse(&["pldl", "pause", ID]) {
        CliCommand::Pause { id: got } => assert_eq!(got, id),
        _ => panic!("expected Pause"),
    }
    match parse(&["pldl", "resume", ID]) {
        CliCommand::Resume { id: got } => assert_eq!(got, id),
        _ => panic!("expected Resume"),
    }
    match parse(&["pldl", "cancel", ID]) {
        CliCommand::Cancel { id: got } => assert_eq!(got, id),
        _ => panic!("expected Cancel"),
    }
    match parse(&["pldl", "remove", ID]) {
        CliCommand::Remove { id: got } => assert_eq!(got, id),
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_rejects_malformed_job_id() {
    assert!(crate::cli::Cli::try_parse_from(["pldl", "pause", "42"]).is_err());
}

#[test]
fn control_lines_parse() {
    let id: JobId = ID.parse().unwrap();
    assert_eq!(ControlRequest::parse("status\n"), Some(ControlRequest::Status));
    assert_eq!(
        ControlRequest::parse(&format!("cancel {ID}")),
        Some(ControlRequest::Job(ControlAction::Cancel, id))
    );
    assert_eq!(
        ControlRequest::parse(ControlRequest::Job(ControlAction::Resume, id).to_line().as_str()),
        Some(ControlRequest::Job(ControlAction::Resume, id))
    );
    assert_eq!(ControlRequest::parse("stop everything"), None);
    assert_eq!(ControlRequest::parse("pause 42"), None);
    assert_eq!(ControlRequest::parse(""), None);
}

#[tokio::test]
async fn control_requests_reach_manager() {
    let cfg = PldlConfig::default();
    let m = DownloadManager::builder(Arc::new(YtDlpFetcher::from_config(&cfg)), Arc::new(cfg))
        .build();
    m.initialize().unwrap();
    assert_eq!(handle_request(&m, ControlRequest::Status), "[]");
    let unknown: JobId = ID.parse().unwrap();
    for action in [
        ControlAction::Pause,
        ControlAction::Resume,
        ControlAction::Cancel,
        ControlAction::Remove,
    ] {
        assert_eq!(handle_request(&m, ControlRequest::Job(action, unknown)), "rejected");
    }
}
