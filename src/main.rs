//! dce-ingest CLI - batched upload of JSON records to a Data Collection Endpoint.

use clap::{Parser, Subcommand};
use dce_ingest::{
    ConnectorConfig, Driver, DryRunSubmitter, HttpSubmitter, IngestError, ReqwestHttpClient,
    RetryPolicy, StaticToken, Submitter, batch, load_records, report,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Parser)]
#[command(name = "dce-ingest")]
#[command(about = "Batched upload of JSON records to a Data Collection Endpoint")]
#[command(version)]
struct Cli {
    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "warn", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload records in batches
    Send {
        /// Path to the JSON connector configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Path to the JSON array of records
        #[arg(short, long)]
        data: PathBuf,

        /// Override records per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override retries per batch after a transient failure
        #[arg(long)]
        retry_count: Option<u32>,

        /// Skip this many leading batches (resume after a halted run)
        #[arg(long, default_value = "0")]
        skip_batches: usize,

        /// Bearer token for the endpoint
        #[arg(long, env = "DCE_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,

        /// Accept every batch without sending anything
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON instead of the text report
        #[arg(long)]
        output_json: bool,
    },

    /// Validate configuration and data without sending
    Check {
        /// Path to the JSON connector configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Path to the JSON array of records
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), IngestError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    match cli.command {
        Commands::Send {
            config,
            data,
            batch_size,
            retry_count,
            skip_batches,
            access_token,
            dry_run,
            output_json,
        } => {
            let mut connector = read_config(&config)?;
            if let Some(size) = batch_size {
                connector.ingest.batch_size = size;
            }
            if let Some(count) = retry_count {
                connector.ingest.retry_count = count;
            }
            connector.validate()?;
            info!("Loaded configuration from {:?}", config);

            let records = load_records(&data)?;
            info!(records = records.len(), "Loaded records from {:?}", data);

            let submitter: Arc<dyn Submitter> = if dry_run {
                Arc::new(DryRunSubmitter)
            } else {
                let token = access_token.ok_or_else(|| {
                    IngestError::config(
                        "no access token: pass --access-token or set DCE_ACCESS_TOKEN",
                    )
                })?;
                Arc::new(
                    HttpSubmitter::new(
                        ReqwestHttpClient::new(),
                        &connector.submitter,
                        StaticToken::new(token),
                    )
                    .with_timeout(connector.ingest.timeout()),
                )
            };

            let plan = batch(&records, connector.ingest.batch_size)?.skip_batches(skip_batches);
            let cancel_token = setup_signal_handler();

            if !output_json {
                println!("{}\n", report::banner(&connector, plan.total_records(), dry_run));
            }

            let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
            let printer = tokio::spawn(async move {
                while let Some(result) = progress_rx.recv().await {
                    if !output_json {
                        println!("{}", result);
                    }
                }
            });

            let driver = Driver::new(submitter, RetryPolicy::from(&connector.ingest))
                .with_cancellation(cancel_token)
                .with_progress(progress_tx);
            let summary = driver.run(&plan).await;
            drop(driver);
            let _ = printer.await;

            if output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", report::summary_block(&summary));
                println!("{}", report::verdict(&summary));
            }

            summary.ensure_success()?;
        }

        Commands::Check { config, data } => {
            let connector = ConnectorConfig::load(&config)?;
            println!("Configuration valid: {:?}", connector.submitter);

            if let Some(data) = data {
                let records = load_records(&data)?;
                let plan = batch(&records, connector.ingest.batch_size)?;
                println!(
                    "Data valid: {} records in {} batches of up to {}",
                    records.len(),
                    plan.len(),
                    plan.batch_size()
                );
            }
        }
    }

    Ok(())
}

/// Parse the connector file without validating, so flags can override it first.
fn read_config(path: &Path) -> Result<ConnectorConfig, IngestError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries the report
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the run on SIGINT or SIGTERM. The batch in flight is finished and
/// accounted for before the run stops.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Stopping after the current batch...", name);
                    token.cancel();
                });
            }
            Err(e) => tracing::warn!(error = %e, "Failed to install {} handler", name),
        }
    }

    cancel_token
}

#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Stopping after the current batch...");
                token.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to install Ctrl-C handler"),
        }
    });

    cancel_token
}
