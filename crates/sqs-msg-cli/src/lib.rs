//! # SQS Msg CLI
//!
//! Command-line interface for the sqs-msg library.
//!
//! - `send` publishes one message, read from `--body` or stdin
//! - `consume` runs the consumer loop and prints every message as a JSON line
//!   on stdout until Ctrl-C, then shuts down with a deadline
//!
//! Connection settings come from `AWS_REGION`, `SQS_ENDPOINT`,
//! `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`, or from
//! a configuration file given with `--config`. `--region` and `--endpoint`
//! override either source.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use sqs_msg::{
    ConfigurationError, Message, QueueError, QueueUrl, Receiver, Server, ServerConfig,
    ServerError, SqsConfig, Topic, WriterError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// sqs-msg - send to and consume from SQS queues
#[derive(Parser, Debug)]
#[command(name = "sqs-msg")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send to and consume from SQS queues")]
pub struct Cli {
    /// Configuration file with SQS connection settings
    #[arg(short, long, env = "SQS_MSG_CONFIG")]
    pub config: Option<PathBuf>,

    /// AWS region
    #[arg(long)]
    pub region: Option<String>,

    /// SQS endpoint, e.g. a local emulator
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Logging level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish a single message
    Send {
        /// Queue URL
        queue_url: QueueUrl,

        /// Message body; read from stdin when omitted
        #[arg(short, long)]
        body: Option<String>,

        /// Message attribute as KEY=VALUE; repeat a key to add values
        #[arg(short, long = "attribute", value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,

        /// Delivery delay in seconds (clamped to 0..=900)
        #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
        delay: i64,
    },

    /// Receive messages and print them as JSON lines
    Consume {
        /// Queue URL
        queue_url: QueueUrl,

        /// Maximum number of messages handled at once
        #[arg(short = 'n', long, default_value = "1")]
        concurrency: usize,

        /// Visibility timeout applied to messages that failed, in seconds
        #[arg(long, default_value = "30")]
        retry_timeout: u32,

        /// Long-poll wait per receive call, in seconds
        #[arg(long, default_value = "20")]
        wait_time: u32,

        /// Time allowed for running handlers after Ctrl-C, in seconds
        #[arg(long, default_value = "30")]
        shutdown_timeout: u64,

        /// Delay between retries of credential (HTTP 403) failures, in seconds
        #[arg(long, default_value = "2")]
        credential_retry_delay: u64,

        /// Maximum retries of a failed SQS call
        #[arg(long, default_value = "7")]
        max_retries: u32,
    },
}

/// Parse a `KEY=VALUE` attribute argument
pub fn parse_attribute(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI operation errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Consumer error: {0}")]
    Server(#[from] ServerError),

    #[error("Publish error: {0}")]
    Writer(#[from] WriterError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let sqs = load_sqs_config(
        cli.config.as_deref(),
        cli.region.clone(),
        cli.endpoint.clone(),
    )?;

    match cli.command {
        Commands::Send {
            queue_url,
            body,
            attributes,
            delay,
        } => execute_send_command(&sqs, queue_url, body, attributes, delay).await,
        Commands::Consume {
            queue_url,
            concurrency,
            retry_timeout,
            wait_time,
            shutdown_timeout,
            credential_retry_delay,
            max_retries,
        } => {
            let config = ServerConfig::new(queue_url, concurrency, retry_timeout)
                .with_wait_time_seconds(wait_time)
                .with_credential_retry(Duration::from_secs(credential_retry_delay), max_retries);

            execute_consume_command(&sqs, config, Duration::from_secs(shutdown_timeout)).await
        }
    }
}

/// Initialize logging based on CLI arguments
///
/// Logs go to stderr so stdout carries only command output.
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .map_err(|e| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if cli.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("Failed to initialize logging: {}", e),
    })
}

/// Resolve SQS connection settings
///
/// A configuration file replaces the environment entirely; explicit region
/// and endpoint arguments win over both.
pub fn load_sqs_config(
    path: Option<&Path>,
    region: Option<String>,
    endpoint: Option<String>,
) -> Result<SqsConfig, CliError> {
    let mut sqs = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigurationError::Missing {
                    key: path.display().to_string(),
                }
                .into());
            }

            config::Config::builder()
                .add_source(config::File::from(path))
                .build()
                .and_then(|c| c.try_deserialize::<SqsConfig>())
                .map_err(|e| ConfigurationError::Parsing {
                    message: e.to_string(),
                })?
        }
        None => SqsConfig::from_env()?,
    };

    if let Some(region) = region {
        sqs.region = region;
    }
    if let Some(endpoint) = endpoint {
        sqs.endpoint = Some(endpoint);
    }

    sqs.validate()?;
    Ok(sqs)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Execute send command
async fn execute_send_command(
    sqs: &SqsConfig,
    queue_url: QueueUrl,
    body: Option<String>,
    attributes: Vec<(String, String)>,
    delay: i64,
) -> Result<(), CliError> {
    let topic = Topic::connect(sqs, queue_url)?;
    let writer = topic.new_writer();

    for (key, value) in attributes {
        writer.add_attribute(key, value)?;
    }
    writer.set_delay(chrono::Duration::seconds(delay))?;

    match body {
        Some(body) => {
            writer.write(body.as_bytes())?;
        }
        None => {
            let mut input = Vec::new();
            tokio::io::stdin().read_to_end(&mut input).await?;
            writer.write(&input)?;
        }
    }

    info!(
        queue_url = %topic.queue_url(),
        delay_seconds = writer.delay().as_secs(),
        "Sending message"
    );
    let message_id = writer.close().await?;
    println!("{}", message_id);

    Ok(())
}

/// Execute consume command
async fn execute_consume_command(
    sqs: &SqsConfig,
    config: ServerConfig,
    shutdown_timeout: Duration,
) -> Result<(), CliError> {
    let server = Arc::new(Server::connect(sqs, config)?);

    let mut serving = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.serve(Arc::new(PrintReceiver)).await })
    };

    tokio::select! {
        result = &mut serving => {
            return match result {
                Ok(outcome) => outcome.map(|_| ()).map_err(CliError::from),
                Err(e) => Err(CliError::CommandFailed {
                    message: format!("Consumer task failed: {}", e),
                }),
            };
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Received Ctrl-C, shutting down"
            );
        }
    }

    let outcome = server
        .shutdown(tokio::time::Instant::now() + shutdown_timeout)
        .await;

    match &outcome {
        Ok(_) => {
            // The loop may still be inside a long-poll; it stops after it returns
            if let Err(e) = serving.await {
                warn!(error = %e, "Consumer task did not finish cleanly");
            }
        }
        Err(e) => warn!(error = %e, "Abandoning running handlers"),
    }

    outcome?;
    info!("Consumer stopped");
    Ok(())
}

// ============================================================================
// Message Output
// ============================================================================

/// Receiver that writes each message to stdout as one JSON object per line
#[derive(Debug, Clone, Copy)]
pub struct PrintReceiver;

#[async_trait]
impl Receiver for PrintReceiver {
    async fn receive(&self, _ctx: CancellationToken, message: Message) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&render_message(&message))?;
        line.push(b'\n');

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&line).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// JSON view of a message; the body is decoded as lossy UTF-8
pub fn render_message(message: &Message) -> serde_json::Value {
    serde_json::json!({
        "attributes": message.attributes,
        "body": String::from_utf8_lossy(&message.body),
    })
}
