// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::config::settings::Settings;
use crate::domain::job::{Job, JobStatusResponse};
use crate::domain::request::ScrapeRequest;
use crate::engines::router::EngineRouter;

/// Keyed store of in-flight and recently-finished jobs, backed by a
/// `DashMap` for lock-free concurrent access from request handlers and
/// the background sweeper alike.
pub struct JobManager {
    jobs: Arc<DashMap<Uuid, Job>>,
    router: Arc<EngineRouter>,
    settings: Arc<Settings>,
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusCounts {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobManager {
    pub fn new(router: Arc<EngineRouter>, settings: Arc<Settings>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            router,
            settings,
        }
    }

    /// Register a new job and return its id without executing it.
    /// `request.timeout` is capped at the operator's `TIMEOUT_MS` ceiling.
    pub fn create_job(&self, mut request: ScrapeRequest) -> Uuid {
        request.timeout = request.timeout.min(self.settings.timeout_ms);
        let engine = request.engine;
        let job = Job::new(request);
        let id = job.id;
        self.jobs.insert(id, job);
        info!(job_id = %id, engine = ?engine, "job created");
        id
    }

    /// Run a job to completion and return its final projection.
    /// `executeJob` in the synchronous API path: the caller awaits this.
    pub async fn execute_job(&self, id: Uuid) -> Option<JobStatusResponse> {
        let request = {
            let mut entry = self.jobs.get_mut(&id)?;
            if entry.start().is_err() {
                return Some(JobStatusResponse::from(&*entry));
            }
            entry.request.clone()
        };

        let outcome = self.router.route(&request, &self.settings).await;

        let mut entry = self.jobs.get_mut(&id)?;
        match outcome {
            Ok(response) if response.is_transport_failure() => {
                let error = response.page_error.clone().unwrap_or_else(|| "transport failure".to_string());
                let _ = entry.fail(error);
            }
            Ok(response) => {
                let _ = entry.complete(response);
            }
            Err(e) => {
                let _ = entry.fail(e.to_string());
            }
        }

        Some(JobStatusResponse::from(&*entry))
    }

    /// Fire-and-forget execution: spawns `execute_job` and logs any
    /// panics or errors without surfacing them to the caller.
    pub fn start_job_async(self: &Arc<Self>, id: Uuid) {
        let manager = self.clone();
        tokio::spawn(async move {
            manager.execute_job(id).await;
        });
    }

    pub fn job_status(&self, id: Uuid) -> Option<JobStatusResponse> {
        self.jobs.get(&id).map(|job| JobStatusResponse::from(&*job))
    }

    /// Idempotent: removing an id that is absent is a no-op, not an error.
    pub fn delete_job(&self, id: Uuid) {
        self.jobs.remove(&id);
    }

    /// Counts of jobs per status, for the health endpoint.
    pub fn status_counts(&self) -> JobStatusCounts {
        let mut counts = JobStatusCounts::default();
        for entry in self.jobs.iter() {
            counts.total += 1;
            match entry.status {
                crate::domain::job::JobStatus::Queued => counts.queued += 1,
                crate::domain::job::JobStatus::Processing => counts.processing += 1,
                crate::domain::job::JobStatus::Completed => counts.completed += 1,
                crate::domain::job::JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Spawn the periodic TTL sweeper. Returns a handle the caller can
    /// abort on shutdown.
    pub fn spawn_ttl_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let ttl = chrono::Duration::milliseconds(manager.settings.job_ttl_ms as i64);
        let interval_ms = manager.settings.job_cleanup_interval_ms;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            loop {
                interval.tick().await;
                let now = Utc::now();
                let expired: Vec<Uuid> = manager
                    .jobs
                    .iter()
                    .filter(|entry| entry.is_expired(now, ttl))
                    .map(|entry| *entry.key())
                    .collect();
                let evicted = expired.len();
                for id in expired {
                    manager.jobs.remove(&id);
                }
                if evicted > 0 {
                    info!(evicted, "sweeper evicted expired jobs");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::browser::BrowserPool;

    fn test_settings() -> Settings {
        Settings {
            host: "0.0.0.0".into(),
            port: 3000,
            log_level: "info".into(),
            auth_token: None,
            max_concurrent_pages: 10,
            timeout_ms: 300_000,
            page_load_timeout_ms: 60_000,
            proxy_server: None,
            proxy_username: None,
            proxy_password: None,
            block_media: true,
            headless: true,
            stealth_enabled: true,
            job_ttl_ms: 600_000,
            job_cleanup_interval_ms: 60_000,
        }
    }

    fn sample_request(url: &str) -> ScrapeRequest {
        serde_json::from_value(serde_json::json!({ "url": url })).unwrap()
    }

    fn test_manager() -> Arc<JobManager> {
        let settings = Arc::new(test_settings());
        let pool = Arc::new(BrowserPool::new(settings.max_concurrent_pages, settings.headless));
        let router = Arc::new(EngineRouter::new(pool));
        Arc::new(JobManager::new(router, settings))
    }

    #[test]
    fn create_job_registers_it_as_processing() {
        let manager = test_manager();
        let id = manager.create_job(sample_request("https://example.com"));
        let status = manager.job_status(id).unwrap();
        assert!(matches!(status, JobStatusResponse::Processing { processing: true, .. }));
    }

    #[test]
    fn unknown_job_id_returns_none() {
        let manager = test_manager();
        assert!(manager.job_status(Uuid::new_v4()).is_none());
    }

    #[test]
    fn delete_job_is_idempotent() {
        let manager = test_manager();
        let id = manager.create_job(sample_request("https://example.com"));
        manager.delete_job(id);
        manager.delete_job(id);
        assert!(manager.job_status(id).is_none());
    }

    #[tokio::test]
    async fn executing_an_unknown_job_returns_none() {
        let manager = test_manager();
        assert!(manager.execute_job(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn ttl_sweeper_evicts_jobs_past_their_ttl() {
        let mut settings = test_settings();
        settings.job_ttl_ms = 20;
        settings.job_cleanup_interval_ms = 10;
        let settings = Arc::new(settings);
        let pool = Arc::new(BrowserPool::new(settings.max_concurrent_pages, settings.headless));
        let router = Arc::new(EngineRouter::new(pool));
        let manager = Arc::new(JobManager::new(router, settings));

        let id = manager.create_job(sample_request("https://example.com"));
        let sweeper = manager.spawn_ttl_sweeper();

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert!(manager.job_status(id).is_none());
        sweeper.abort();
    }

    #[test]
    fn status_counts_reflect_queued_jobs() {
        let manager = test_manager();
        manager.create_job(sample_request("https://example.com"));
        manager.create_job(sample_request("https://example.org"));
        let counts = manager.status_counts();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.queued, 2);
    }
}
