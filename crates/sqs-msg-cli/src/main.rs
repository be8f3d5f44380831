use sqs_msg_cli::{run_cli, CliError};
use tracing::error;

#[tokio::main]
async fn main() {
    // Run CLI and handle errors
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("Error: {}", e);

        // Exit with appropriate code based on error type
        let exit_code = match e {
            CliError::Configuration(_) => 1,
            CliError::Queue(_) => 2,
            CliError::Server(_) => 3,
            CliError::Writer(_) => 4,
            CliError::InvalidArgument { .. } => 5,
            CliError::CommandFailed { .. } => 6,
            CliError::Io(_) => 7,
        };

        std::process::exit(exit_code);
    }
}
