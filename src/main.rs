use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use lytspot::config::{ConfigError, LytspotConfig, parse_base_url};
use lytspot::prober::{Prober, ProbeOutcome, probe_once};
use lytspot::queue::{FileStore, FlushReport, MessageKind, Payload, QueueError, StoreError, SubmissionQueue};
use lytspot::submitter::{FormSubmitter, SubmitOutcome};
use lytspot::transport::{DeliveryError, HttpTransport, Transport};
use lytspot::{routes, state};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("queue store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("queue write failed: {0}")]
    Queue(#[from] QueueError),
    #[error("transport setup failed: {0}")]
    Transport(#[from] DeliveryError),
    #[error("invalid --field '{0}' (expected key=value)")]
    InvalidField(String),
    #[error("submission needs --field or --json")]
    EmptySubmission,
    #[error("--json must be a JSON object")]
    NotAnObject,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "lytspot", about = "LytSpot form API and submission outbox")]
struct Cli {
    /// Backend base URL (http:// or https://).
    #[arg(long, env = "LYTSPOT_API_BASE_URL", value_parser = parse_base_url)]
    api_base_url: Option<String>,

    /// Directory holding the queue store.
    #[arg(long, env = "LYTSPOT_QUEUE_DIR")]
    queue_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the form API.
    Serve,
    /// Submit a form, queueing it if the backend is unavailable.
    Submit(SubmitArgs),
    /// Inspect or drain the submission queue.
    Queue(QueueCommand),
    /// Ping the backend and flush the queue whenever it answers.
    Probe {
        /// Run a single probe cycle and exit.
        #[arg(long)]
        once: bool,
    },
}

#[derive(Args, Debug)]
struct SubmitArgs {
    /// `contact` or `budget`.
    kind: MessageKind,
    /// Form field as key=value; repeatable.
    #[arg(long = "field", short = 'f')]
    fields: Vec<String>,
    /// Whole payload as a JSON object; merged under any --field values.
    #[arg(long)]
    json: Option<String>,
}

#[derive(Args, Debug)]
struct QueueCommand {
    #[command(subcommand)]
    command: QueueSubcommand,
}

#[derive(Subcommand, Debug)]
enum QueueSubcommand {
    /// Print queued submissions, one JSON line each.
    List,
    /// Try to deliver everything now.
    Flush,
    /// Drop the submission at INDEX.
    Remove { index: usize },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = LytspotConfig::from_env()?;
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url;
    }
    if let Some(dir) = cli.queue_dir {
        config.queue_dir = dir;
    }

    match cli.command {
        Command::Serve => run_serve(&config).await,
        Command::Submit(args) => run_submit(&config, args).await,
        Command::Queue(queue) => run_queue(&config, queue).await,
        Command::Probe { once } => run_probe(&config, once).await,
    }
}

async fn run_serve(config: &LytspotConfig) -> Result<(), CliError> {
    let state = state::AppState::new(config.inbox_capacity);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;

    tracing::info!(port = config.port, "lytspot api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Queue over the configured file store, plus the transport it delivers with.
fn open_queue(config: &LytspotConfig) -> Result<(Arc<SubmissionQueue>, Arc<dyn Transport>), CliError> {
    let store = Arc::new(FileStore::open(&config.queue_dir)?);
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(config)?);
    let queue = Arc::new(SubmissionQueue::with_key(store, transport.clone(), config.queue_key.clone()));
    Ok((queue, transport))
}

async fn run_submit(config: &LytspotConfig, args: SubmitArgs) -> Result<(), CliError> {
    let payload = build_payload(&args.fields, args.json.as_deref())?;
    let (queue, transport) = open_queue(config)?;
    let submitter = FormSubmitter::new(queue, transport);

    let outcome = submitter.submit(args.kind, payload).await;
    let status = match outcome {
        SubmitOutcome::Delivered { .. } => "delivered",
        SubmitOutcome::Queued { .. } => "queued",
        SubmitOutcome::Unsaved { .. } => "unsaved",
    };
    tracing::info!(id = %outcome.id(), status, "submit finished");
    println!("{}", outcome.user_message());
    Ok(())
}

async fn run_queue(config: &LytspotConfig, cmd: QueueCommand) -> Result<(), CliError> {
    let (queue, _) = open_queue(config)?;
    match cmd.command {
        QueueSubcommand::List => {
            for (index, message) in queue.list_all().iter().enumerate() {
                let line = serde_json::json!({ "index": index, "message": message });
                println!("{}", serde_json::to_string(&line)?);
            }
        }
        QueueSubcommand::Flush => print_report(&queue.flush().await),
        QueueSubcommand::Remove { index } => match queue.remove_at(index)? {
            Some(removed) => println!("removed {} ({})", removed.id, removed.kind),
            None => println!("no submission at index {index}"),
        },
    }
    Ok(())
}

async fn run_probe(config: &LytspotConfig, once: bool) -> Result<(), CliError> {
    let (queue, transport) = open_queue(config)?;

    if once {
        match probe_once(&queue, transport.as_ref()).await {
            ProbeOutcome::Unreachable => println!("backend unreachable; queue kept ({} pending)", queue.len()),
            ProbeOutcome::Flushed(report) => print_report(&report),
        }
        return Ok(());
    }

    let prober = Prober::spawn(queue, transport, Duration::from_secs(config.probe_interval_secs));
    tokio::signal::ctrl_c().await?;
    prober.stop();
    Ok(())
}

fn print_report(report: &FlushReport) {
    if report.skipped {
        println!("flush already in progress");
        return;
    }
    println!(
        "attempted {} delivered {} failed {}",
        report.attempted, report.delivered, report.failed
    );
}

/// Merge `--json` (if any) with `--field key=value` pairs; fields win.
fn build_payload(fields: &[String], json: Option<&str>) -> Result<Payload, CliError> {
    let mut payload = match json {
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            _ => return Err(CliError::NotAnObject),
        },
        None => Payload::new(),
    };

    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            return Err(CliError::InvalidField(field.clone()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::InvalidField(field.clone()));
        }
        payload.insert(key.to_owned(), Value::String(value.to_owned()));
    }

    if payload.is_empty() {
        return Err(CliError::EmptySubmission);
    }
    Ok(payload)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
