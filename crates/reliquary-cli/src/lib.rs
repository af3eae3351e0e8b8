//! Helpers for the `reliquary` command: waiting on the job queue and shaping
//! what an ingest run reports.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use reliquary_core::models::{CharacterizationStatus, FileMetadata, FileSet, Job, JobStatus};
use reliquary_core::Event;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Collects `(job id, status)` pairs from the queue's finished channel until
/// the job it is asked about shows up.
pub struct JobWaiter {
    rx: mpsc::Receiver<(Uuid, JobStatus)>,
    finished: HashMap<Uuid, JobStatus>,
}

impl JobWaiter {
    pub fn new(rx: mpsc::Receiver<(Uuid, JobStatus)>) -> Self {
        Self {
            rx,
            finished: HashMap::new(),
        }
    }

    /// Wait until `job_id` reaches a terminal status, or fail after `timeout`.
    pub async fn wait_for(&mut self, job_id: Uuid, timeout: Duration) -> anyhow::Result<JobStatus> {
        if let Some(status) = self.finished.get(&job_id) {
            return Ok(*status);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let next = tokio::time::timeout_at(deadline, self.rx.recv())
                .await
                .with_context(|| format!("Timed out waiting for job {}", job_id))?;
            let Some((id, status)) = next else {
                bail!("Job queue stopped before job {} finished", job_id);
            };
            self.finished.insert(id, status);
            if id == job_id {
                return Ok(status);
            }
        }
    }
}

/// Best-effort content type from the file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("txt") | Some("text") => "text/plain",
        Some("csv") => "text/csv",
        Some("md") => "text/markdown",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Serialize)]
pub struct FileSummary {
    pub id: String,
    #[serde(rename = "use")]
    pub use_tag: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub storage_key: String,
    pub characterization: String,
}

impl From<&FileMetadata> for FileSummary {
    fn from(fm: &FileMetadata) -> Self {
        let characterization = match &fm.characterization_status {
            CharacterizationStatus::Pending => "pending".to_string(),
            CharacterizationStatus::Succeeded => "succeeded".to_string(),
            CharacterizationStatus::Failed { reason } => format!("failed: {}", reason),
        };
        Self {
            id: fm.id.to_string(),
            use_tag: fm.use_tag.to_string(),
            filename: fm.original_filename.clone(),
            mime_type: fm.mime_type.clone(),
            size_bytes: fm.size_bytes,
            storage_key: fm.storage_key.clone(),
            characterization,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub job_type: String,
    pub status: String,
    pub retry_count: i32,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type.to_string(),
            status: job.status.to_string(),
            retry_count: job.retry_count,
        }
    }
}

/// What `reliquary ingest` prints once the queue has settled.
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub file_set_id: String,
    pub title: Vec<String>,
    pub label: Option<String>,
    pub file_ids: Vec<String>,
    pub files: Vec<FileSummary>,
    pub jobs: Vec<JobSummary>,
    pub events: Vec<String>,
    pub thumbnail_path: Option<String>,
}

impl IngestSummary {
    pub fn new(
        file_set: &FileSet,
        files: &[FileMetadata],
        jobs: &[Job],
        events: &[Event],
        thumbnail_path: Option<String>,
    ) -> Self {
        Self {
            file_set_id: file_set.id.to_string(),
            title: file_set.title.clone(),
            label: file_set.label.clone(),
            file_ids: file_set.file_ids.iter().map(|id| id.to_string()).collect(),
            files: files.iter().map(FileSummary::from).collect(),
            jobs: jobs.iter().map(JobSummary::from).collect(),
            events: events.iter().map(|e| e.name.to_string()).collect(),
            thumbnail_path,
        }
    }
}
