//! Reliquary CLI: ingest a local file into a new FileSet and report the result.
//!
//! Configuration comes from the environment (see `Config::from_env`). Logs go
//! to stderr; the summary is printed to stdout as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use reliquary_cli::{guess_content_type, IngestSummary, JobWaiter};
use reliquary_core::models::{FileSet, JobStatus, Use, User};
use reliquary_core::Config;
use reliquary_db::{queries, IndexDocument, ResourceRepository, SearchIndex};
use reliquary_infra::{init_telemetry, shutdown_telemetry, ChannelListener};
use reliquary_ingest::{initialize_services, stage_upload, submit_ingest};
use serde::Serialize;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "reliquary", about = "Reliquary file ingest")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file into a new FileSet and wait for its derivatives
    Ingest {
        /// Path to the file to ingest
        path: PathBuf,
        /// Use tag, e.g. original_file or thumbnail
        #[arg(long = "use", default_value = "original_file")]
        use_tag: Use,
        /// Title for the new FileSet (defaults to the filename)
        #[arg(long)]
        title: Option<String>,
        /// Depositing user
        #[arg(long, default_value = "cli@localhost")]
        user: String,
        /// Content type (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
        /// Seconds to wait for each job
        #[arg(long, default_value = "300")]
        timeout_secs: u64,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize summary")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    init_telemetry("reliquary-cli", &config.environment, cli.json_logs)
        .map_err(|e| anyhow!("Failed to initialize telemetry: {}", e))?;

    let result = match cli.command {
        Commands::Ingest {
            path,
            use_tag,
            title,
            user,
            content_type,
            timeout_secs,
        } => {
            ingest(
                &config,
                path,
                use_tag,
                title,
                User::new(user),
                content_type,
                Duration::from_secs(timeout_secs),
            )
            .await
        }
    };

    shutdown_telemetry().await;
    result
}

async fn ingest(
    config: &Config,
    path: PathBuf,
    use_tag: Use,
    title: Option<String>,
    user: User,
    content_type: Option<String>,
    timeout: Duration,
) -> anyhow::Result<()> {
    let services = initialize_services(config).await?;
    let state = services.state;
    let mut waiter = JobWaiter::new(services.job_finished_rx);

    let (listener, mut events_rx) = ChannelListener::new(EVENT_CHANNEL_CAPACITY);
    state.publisher.subscribe(Arc::new(listener));

    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no usable filename", path.display()))?
        .to_string();
    let content_type = content_type.unwrap_or_else(|| guess_content_type(&path).to_string());

    let mut file_set = FileSet::new();
    file_set.title = title.into_iter().collect();
    let file_set = state
        .repository
        .save(file_set.into())
        .await
        .context("Failed to create FileSet")?
        .into_file_set()
        .ok_or_else(|| anyhow!("Saved resource is not a FileSet"))?;

    let upload = stage_upload(
        &state,
        user,
        file_set.id.clone(),
        &filename,
        &content_type,
        data,
    )
    .await
    .context("Failed to stage upload")?;
    let ingest_job_id = submit_ingest(&state, upload, use_tag)
        .await
        .context("Failed to queue ingest")?;
    tracing::info!(job_id = %ingest_job_id, file_set_id = %file_set.id, "Ingest queued");

    let ingest_status = waiter.wait_for(ingest_job_id, timeout).await?;
    let mut job_ids = vec![ingest_job_id];
    if ingest_status == JobStatus::Completed {
        let ingest_job = state
            .job_queue
            .repository()
            .get_job(ingest_job_id)
            .await?
            .ok_or_else(|| anyhow!("Job {} disappeared", ingest_job_id))?;
        let derivatives_job_id = ingest_job
            .result
            .as_ref()
            .and_then(|r| r["derivatives_job_id"].as_str())
            .and_then(|id| Uuid::parse_str(id).ok());
        if let Some(job_id) = derivatives_job_id {
            waiter.wait_for(job_id, timeout).await?;
            job_ids.push(job_id);
        }
    }

    state.job_queue.shutdown().await;

    let mut jobs = Vec::with_capacity(job_ids.len());
    for job_id in job_ids {
        if let Some(job) = state.job_queue.repository().get_job(job_id).await? {
            jobs.push(job);
        }
    }

    let file_set = queries::find_file_set(state.repository.as_ref(), &file_set.id).await?;
    let files = queries::find_files(state.repository.as_ref(), &file_set).await?;
    let thumbnail_path = state
        .search_index
        .find(&file_set.id)
        .await?
        .as_ref()
        .and_then(|doc: &IndexDocument| doc.get_str("thumbnail_path_ss"))
        .map(str::to_string);

    let mut events = Vec::new();
    while let Ok(event) = events_rx.try_recv() {
        events.push(event);
    }

    print_json(&IngestSummary::new(
        &file_set,
        &files,
        &jobs,
        &events,
        thumbnail_path,
    ))?;

    if ingest_status != JobStatus::Completed {
        bail!("Ingest job {} finished as {}", ingest_job_id, ingest_status);
    }
    Ok(())
}
