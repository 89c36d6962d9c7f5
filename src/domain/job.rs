// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::ScrapeRequest;
use super::response::SuccessResponse;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invalid job status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// `Job::status` transitions monotonically: `Queued -> Processing ->
/// {Completed, Failed}`. There is no transition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// The outcome stored once a job leaves `Processing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutcome {
    Success(SuccessResponse),
    Failed { error: String },
}

/// A unit of scrape work. `completed_at` and `result` are set iff
/// `status` is `Completed` or `Failed`; the result is owned exclusively
/// by the job until the TTL sweeper evicts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub request: ScrapeRequest,
    pub status: JobStatus,
    pub result: Option<JobOutcome>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(request: ScrapeRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            status: JobStatus::Queued,
            result: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn start(&mut self) -> Result<(), JobError> {
        if self.status != JobStatus::Queued {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        self.status = JobStatus::Processing;
        Ok(())
    }

    pub fn complete(&mut self, response: SuccessResponse) -> Result<(), JobError> {
        if self.status != JobStatus::Processing {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Completed,
            });
        }
        self.status = JobStatus::Completed;
        self.result = Some(JobOutcome::Success(response));
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        if self.status != JobStatus::Processing {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Failed,
            });
        }
        self.status = JobStatus::Failed;
        self.result = Some(JobOutcome::Failed { error: error.into() });
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// The projection returned by `JobManager::job_status`. `None` (handled
/// by the caller, not a variant here) means the job id is unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobStatusResponse {
    Processing { job_id: Uuid, processing: bool },
    Completed(SuccessResponse),
    Failed { error: String },
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        match job.status {
            JobStatus::Queued | JobStatus::Processing => JobStatusResponse::Processing {
                job_id: job.id,
                processing: true,
            },
            JobStatus::Completed => match &job.result {
                Some(JobOutcome::Success(r)) => JobStatusResponse::Completed(r.clone()),
                _ => JobStatusResponse::Failed {
                    error: "job marked completed without a result".to_string(),
                },
            },
            JobStatus::Failed => match &job.result {
                Some(JobOutcome::Failed { error }) => JobStatusResponse::Failed {
                    error: error.clone(),
                },
                _ => JobStatusResponse::Failed {
                    error: "unknown error".to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ScrapeRequest {
        serde_json::from_value(serde_json::json!({ "url": "https://example.com" })).unwrap()
    }

    #[test]
    fn new_job_starts_queued_with_no_result() {
        let job = Job::new(sample_request());
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.result.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn full_transition_sets_completed_at() {
        let mut job = Job::new(sample_request());
        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        job.complete(SuccessResponse::default()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
        assert!(job.result.is_some());
    }

    #[test]
    fn cannot_complete_a_queued_job() {
        let mut job = Job::new(sample_request());
        assert!(job.complete(SuccessResponse::default()).is_err());
    }

    #[test]
    fn cannot_start_a_completed_job() {
        let mut job = Job::new(sample_request());
        job.start().unwrap();
        job.complete(SuccessResponse::default()).unwrap();
        assert!(job.start().is_err());
    }

    #[test]
    fn is_expired_boundary() {
        let mut job = Job::new(sample_request());
        let now = Utc::now();
        let ttl = chrono::Duration::milliseconds(1_000);

        job.created_at = now - chrono::Duration::milliseconds(999);
        assert!(!job.is_expired(now, ttl));

        job.created_at = now - chrono::Duration::milliseconds(1_001);
        assert!(job.is_expired(now, ttl));
    }

    #[test]
    fn status_projection_for_in_flight_job() {
        let mut job = Job::new(sample_request());
        let projection = JobStatusResponse::from(&job);
        assert!(matches!(projection, JobStatusResponse::Processing { processing: true, .. }));
        job.start().unwrap();
        let projection = JobStatusResponse::from(&job);
        assert!(matches!(projection, JobStatusResponse::Processing { processing: true, .. }));
    }
}
