//! Job lifecycle types: stages, progress, and reportable status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a submitted job.
pub type JobId = Uuid;

/// Lifecycle stage of a processing job.
///
/// Stages advance strictly forward; `Failed` is absorbing and may be
/// entered from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStage {
    /// Accepted but not yet picked up.
    Pending,
    /// Picked up by a worker, before any work.
    Started,
    /// Validating and normalizing the submitted track list.
    Processing,
    /// Fetching preview clips.
    Downloading,
    /// Normalizing audio to mono fixed-rate WAV.
    Converting,
    /// Extracting, reducing, and storing embeddings.
    Embedding,
    Completed,
    Failed,
}

impl JobStage {
    /// Coarse progress fraction reported for this stage, in percent.
    #[must_use]
    pub fn progress(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Started => 5,
            Self::Processing => 20,
            Self::Downloading => 40,
            Self::Converting => 60,
            Self::Embedding => 80,
            Self::Completed | Self::Failed => 100,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Processing => "PROCESSING",
            Self::Downloading => "DOWNLOADING",
            Self::Converting => "CONVERTING",
            Self::Embedding => "EMBEDDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Final accounting for a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub tracks_processed: usize,
    pub embeddings_generated: usize,
    /// Where the per-user embedding artifact was written. Populated on
    /// every completed job; `None` only in statuses that never reached
    /// completion.
    pub embeddings_path: Option<String>,
}

/// Snapshot of a job's state, suitable for polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub user_id: String,
    pub stage: JobStage,
    /// Coarse percentage derived from the stage; stages never report
    /// per-track granularity.
    pub progress: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl JobStatus {
    pub(crate) fn new(id: JobId, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: user_id.to_string(),
            stage: JobStage::Pending,
            progress: JobStage::Pending.progress(),
            message: "Job accepted".to_string(),
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    pub(crate) fn advance(&mut self, stage: JobStage, message: impl Into<String>) {
        self.stage = stage;
        self.progress = stage.progress();
        self.message = message.into();
        self.updated_at = Utc::now();
    }

    pub(crate) fn complete(&mut self, result: JobResult) {
        self.result = Some(result);
        self.advance(JobStage::Completed, "Job completed");
    }

    pub(crate) fn fail(&mut self, error: impl std::fmt::Display) {
        self.error = Some(error.to_string());
        self.advance(JobStage::Failed, "Job failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic_through_happy_path() {
        let path = [
            JobStage::Pending,
            JobStage::Started,
            JobStage::Processing,
            JobStage::Downloading,
            JobStage::Converting,
            JobStage::Embedding,
            JobStage::Completed,
        ];
        let progress: Vec<u8> = path.iter().map(|s| s.progress()).collect();
        assert_eq!(progress, vec![0, 5, 20, 40, 60, 80, 100]);
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_terminal_stages() {
        assert!(JobStage::Completed.is_terminal());
        assert!(JobStage::Failed.is_terminal());
        assert!(!JobStage::Embedding.is_terminal());
        assert_eq!(JobStage::Failed.progress(), 100);
    }

    #[test]
    fn test_stage_serializes_screaming_snake() {
        let json = serde_json::to_string(&JobStage::Downloading).unwrap();
        assert_eq!(json, "\"DOWNLOADING\"");
        let back: JobStage = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(back, JobStage::Completed);
    }

    #[test]
    fn test_failure_records_error_and_terminal_stage() {
        let mut status = JobStatus::new(Uuid::new_v4(), "user-1");
        status.advance(JobStage::Processing, "normalizing");
        status.fail("no valid tracks found to process");

        assert_eq!(status.stage, JobStage::Failed);
        assert_eq!(status.progress, 100);
        assert!(status.error.as_deref().unwrap().contains("no valid tracks"));
        assert!(status.result.is_none());
    }

    #[test]
    fn test_completion_carries_result() {
        let mut status = JobStatus::new(Uuid::new_v4(), "user-1");
        status.complete(JobResult {
            tracks_processed: 3,
            embeddings_generated: 2,
            embeddings_path: Some("/data/embeddings/user-1_embeddings.json".to_string()),
        });
        assert_eq!(status.stage, JobStage::Completed);
        assert_eq!(status.result.as_ref().unwrap().embeddings_generated, 2);
        assert!(status.error.is_none());
    }
}
