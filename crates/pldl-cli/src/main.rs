use pldl_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible; fall back to stderr.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {e:#}");
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("pldl error: {:#}", err);
        std::process::exit(1);
    }
}
