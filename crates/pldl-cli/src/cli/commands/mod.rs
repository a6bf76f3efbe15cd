//! CLI command handlers. Each command is in its own file.

mod batch;
mod control;
mod get;
mod status;

pub use batch::{batch_target, run_batch};
#[cfg(test)]
pub use batch::read_items;
pub use control::run_control;
pub use get::run_get;
pub use status::run_status;

pub use crate::cli::control_socket::ControlAction;
