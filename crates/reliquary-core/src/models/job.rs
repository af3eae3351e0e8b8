use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::{ResourceId, UploadedFile, Use};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    IngestFile,
    CreateDerivatives,
}

impl Display for JobType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobType::IngestFile => write!(f, "ingest_file"),
            JobType::CreateDerivatives => write!(f, "create_derivatives"),
        }
    }
}

impl FromStr for JobType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingest_file" => Ok(JobType::IngestFile),
            "create_derivatives" => Ok(JobType::CreateDerivatives),
            _ => Err(anyhow::anyhow!("Invalid job type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Scheduled,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Scheduled => write!(f, "scheduled"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "scheduled" => Ok(JobStatus::Scheduled),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 3,
    #[default]
    Normal = 5,
    High = 7,
    Critical = 10,
}

impl Priority {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            i32::MIN..=3 => Priority::Low,
            4..=6 => Priority::Normal,
            7..=9 => Priority::High,
            _ => Priority::Critical,
        }
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> Self {
        priority as i32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub timeout_seconds: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        job_type: JobType,
        payload: serde_json::Value,
        priority: Priority,
        scheduled_at: Option<DateTime<Utc>>,
        max_retries: i32,
        timeout_seconds: Option<i32>,
    ) -> Self {
        let now = Utc::now();
        let scheduled_at = scheduled_at.unwrap_or(now);
        Self {
            id: Uuid::new_v4(),
            job_type,
            status: if scheduled_at > now {
                JobStatus::Scheduled
            } else {
                JobStatus::Pending
            },
            priority: priority.as_i32(),
            payload,
            result: None,
            scheduled_at,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries,
            timeout_seconds,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_ready_to_run(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Scheduled)
            && self.scheduled_at <= Utc::now()
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn should_timeout(&self, started_at: DateTime<Utc>) -> bool {
        if let Some(timeout) = self.timeout_seconds {
            let elapsed = Utc::now().signed_duration_since(started_at);
            elapsed.num_seconds() >= timeout as i64
        } else {
            false
        }
    }

    /// Extract the payload as a typed struct, returning an error on failure.
    pub fn try_payload_as<P: JobPayload>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Extract the result as a typed struct.
    /// Returns None if result is not set or deserialization fails.
    pub fn result_as<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        self.result
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn payload_from<P: JobPayload>(
        payload: &P,
    ) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(payload)
    }
}

/// Trait for type-safe job payloads
pub trait JobPayload: Serialize + for<'de> Deserialize<'de> {
    fn job_type() -> JobType;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFilePayload {
    pub uploaded_file: UploadedFile,
    #[serde(default)]
    pub use_tag: Use,
}

impl JobPayload for IngestFilePayload {
    fn job_type() -> JobType {
        JobType::IngestFile
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDerivativesPayload {
    pub file_set_id: ResourceId,
    /// Use tag of the source file derivatives are generated from.
    #[serde(default)]
    pub use_tag: Use,
}

impl JobPayload for CreateDerivativesPayload {
    fn job_type() -> JobType {
        JobType::CreateDerivatives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn job_type_round_trips_through_display() {
        for job_type in [JobType::IngestFile, JobType::CreateDerivatives] {
            assert_eq!(job_type.to_string().parse::<JobType>().unwrap(), job_type);
        }
        assert!("video_transcode".parse::<JobType>().is_err());
    }

    #[test]
    fn future_jobs_start_scheduled() {
        let later = Utc::now() + Duration::minutes(5);
        let job = Job::new(
            JobType::CreateDerivatives,
            serde_json::json!({}),
            Priority::Normal,
            Some(later),
            3,
            None,
        );
        assert_eq!(job.status, JobStatus::Scheduled);
        assert!(!job.is_ready_to_run());
    }

    #[test]
    fn retry_budget_is_respected() {
        let mut job = Job::new(
            JobType::IngestFile,
            serde_json::json!({}),
            Priority::High,
            None,
            2,
            Some(60),
        );
        assert!(job.is_ready_to_run());
        assert!(job.can_retry());
        job.retry_count = 2;
        assert!(!job.can_retry());
    }

    #[test]
    fn derivatives_payload_defaults_to_original_file() {
        let job = Job::new(
            JobType::CreateDerivatives,
            serde_json::json!({ "file_set_id": "fs-1" }),
            Priority::Normal,
            None,
            3,
            None,
        );
        let payload: CreateDerivativesPayload = job.try_payload_as().unwrap();
        assert_eq!(payload.file_set_id.as_str(), "fs-1");
        assert_eq!(payload.use_tag, Use::OriginalFile);
    }

    #[test]
    fn priority_buckets() {
        assert_eq!(Priority::from_i32(1), Priority::Low);
        assert_eq!(Priority::from_i32(5), Priority::Normal);
        assert_eq!(Priority::from_i32(8), Priority::High);
        assert_eq!(Priority::from_i32(42), Priority::Critical);
    }
}
