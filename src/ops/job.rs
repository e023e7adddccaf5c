//! Long-running job tracking.
//!
//! A job is an opaque identifier correlating a server-side computation with
//! progress and cancellation. Identifiers are taken verbatim when the
//! caller supplies one and generated client-side otherwise. Cancellation is
//! cooperative: a synchronous request to the server, a no-op once the job
//! is already terminal.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::arrow::ArrowClient;
use crate::model::CallParameters;
use crate::runner::QueryRunner;
use crate::{Error, Result};

// ============================================================================
// Identifier
// ============================================================================

/// Opaque job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// A fresh client-generated identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Status
// ============================================================================

/// Lifecycle of a server-side job:
/// `Submitted → Running → {Completed | Failed | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Map the server's status spelling.
    pub fn parse(status: &str) -> Result<Self> {
        match status.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Submitted),
            "RUNNING" => Ok(JobStatus::Running),
            "FINISHED" | "DONE" => Ok(JobStatus::Completed),
            "FAILED" | "ABORTED" => Ok(JobStatus::Failed),
            "CANCELED" | "CANCELLED" => Ok(JobStatus::Cancelled),
            other => Err(Error::Server(format!("unknown job status `{other}`"))),
        }
    }
}

/// One progress row of a tracked job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgress {
    pub job_id: JobId,
    pub task_name: String,
    pub progress: String,
    pub status: JobStatus,
}

// ============================================================================
// Job operations
// ============================================================================

/// Progress polling and cancellation for server-side jobs.
pub struct Jobs {
    runner: Arc<dyn QueryRunner>,
    arrow: Option<Arc<ArrowClient>>,
}

impl Jobs {
    pub(crate) fn new(runner: Arc<dyn QueryRunner>, arrow: Option<Arc<ArrowClient>>) -> Self {
        Self { runner, arrow }
    }

    /// Poll the root progress row for a job.
    pub async fn progress(&self, job_id: &JobId) -> Result<JobProgress> {
        let params = CallParameters::new().with("job_id", job_id.as_str());
        let table = self
            .runner
            .call_procedure("gds.listProgress", params, None)
            .await?;

        // The first row is the root task; deeper rows are subtasks.
        let row = table.rows.first().ok_or_else(|| {
            Error::Server(format!("No task with job id `{job_id}` was found"))
        })?;
        Ok(JobProgress {
            job_id: JobId::from(row.get::<String>("jobId")?),
            task_name: row.get("taskName")?,
            progress: row.get("progress")?,
            status: JobStatus::parse(&row.get::<String>("status")?)?,
        })
    }

    pub async fn status(&self, job_id: &JobId) -> Result<JobStatus> {
        Ok(self.progress(job_id).await?.status)
    }

    /// Ask the server to stop a job.
    ///
    /// A job already in a terminal state is left alone and its status is
    /// returned as-is.
    pub async fn cancel(&self, job_id: &JobId) -> Result<JobStatus> {
        let status = self.status(job_id).await?;
        if status.is_terminal() {
            return Ok(status);
        }

        match &self.arrow {
            Some(arrow) => {
                arrow.job_cancel(job_id.as_str()).await?;
                Ok(JobStatus::Cancelled)
            }
            None => Err(Error::Server(
                "job cancellation requires the streaming transport".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn caller_supplied_ids_are_verbatim() {
        let id = JobId::from("my-job-7");
        assert_eq!(id.as_str(), "my-job-7");
        assert_eq!(id.to_string(), "my-job-7");
    }

    #[test]
    fn status_parsing_covers_server_spellings() {
        assert_eq!(JobStatus::parse("RUNNING").unwrap(), JobStatus::Running);
        assert_eq!(JobStatus::parse("Done").unwrap(), JobStatus::Completed);
        assert_eq!(JobStatus::parse("FINISHED").unwrap(), JobStatus::Completed);
        assert_eq!(JobStatus::parse("CANCELED").unwrap(), JobStatus::Cancelled);
        assert_eq!(JobStatus::parse("PENDING").unwrap(), JobStatus::Submitted);
        assert!(JobStatus::parse("EXPLODED").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Submitted.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }
}
