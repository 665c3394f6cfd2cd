use chrono::Utc;
use chrono_tz::Tz;
use nexus_store::{Job, JobKind, Store};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::Result,
    grammar::parse_when,
    schedule::compute_next_run,
};

/// A job that has fired, ready for delivery routing.
#[derive(Debug, Clone)]
pub struct FiredJob {
    pub job_id: String,
    pub chat_id: String,
    pub text: String,
}

/// Cron + one-shot scheduler: persists jobs to the shared [`Store`] and
/// drives execution at ~1s precision. See SPEC_FULL.md §4.8.
pub struct SchedulerEngine {
    store: Store,
    tz: Tz,
    fired_tx: mpsc::Sender<FiredJob>,
}

impl SchedulerEngine {
    pub fn new(store: Store, tz: Tz, fired_tx: mpsc::Sender<FiredJob>) -> Self {
        Self { store, tz, fired_tx }
    }

    /// Schedule a new reminder job; `when_text` is parsed per the grammar in
    /// [`crate::grammar`]. Returns the created job.
    pub fn schedule(&self, chat_id: &str, when_text: &str, text: &str) -> Result<Job> {
        let schedule = parse_when(when_text, self.tz)?;
        let next_run_at = compute_next_run(&schedule, Utc::now(), self.tz);
        let job = Job {
            job_id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            when_spec: when_text.to_string(),
            text: text.to_string(),
            kind: if schedule.kind() == "date" {
                JobKind::Date
            } else {
                JobKind::Cron
            },
            next_run_at,
            created_at: Utc::now(),
        };
        self.store.upsert_job(&job)?;
        info!(job_id = %job.job_id, chat_id, "job scheduled");
        Ok(job)
    }

    pub fn list_jobs(&self, chat_id: Option<&str>) -> Result<Vec<Job>> {
        Ok(self.store.list_jobs(chat_id)?)
    }

    pub fn cancel(&self, job_id: &str) -> Result<()> {
        self.store.delete_job(job_id)?;
        info!(job_id, "job cancelled");
        Ok(())
    }

    pub fn update(&self, job_id: &str, when_text: &str, text: &str) -> Result<Job> {
        let existing = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| nexus_store::StoreError::JobNotFound {
                id: job_id.to_string(),
            })?;
        let schedule = parse_when(when_text, self.tz)?;
        let next_run_at = compute_next_run(&schedule, Utc::now(), self.tz);
        let job = Job {
            job_id: existing.job_id,
            chat_id: existing.chat_id,
            when_spec: when_text.to_string(),
            text: text.to_string(),
            kind: if schedule.kind() == "date" {
                JobKind::Date
            } else {
                JobKind::Cron
            },
            next_run_at,
            created_at: existing.created_at,
        };
        self.store.upsert_job(&job)?;
        Ok(job)
    }

    /// On startup, reparse every persisted job's `when_spec` and refresh its
    /// `next_run_at`. Returns `(loaded, failed)`.
    pub fn restore_jobs(&self) -> (usize, usize) {
        let jobs = match self.store.list_jobs(None) {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("failed to list jobs for restore: {e}");
                return (0, 0);
            }
        };
        let mut loaded = 0;
        let mut failed = 0;
        for job in jobs {
            match parse_when(&job.when_spec, self.tz) {
                Ok(schedule) => {
                    let next_run_at = compute_next_run(&schedule, Utc::now(), self.tz);
                    if let Err(e) = self.store.update_job_next_run(&job.job_id, next_run_at) {
                        warn!(job_id = %job.job_id, "failed to persist restored next_run: {e}");
                        failed += 1;
                        continue;
                    }
                    loaded += 1;
                }
                Err(e) => {
                    warn!(job_id = %job.job_id, "failed to reparse job on restore: {e}");
                    failed += 1;
                }
            }
        }
        info!(loaded, failed, "jobs restored");
        (loaded, failed)
    }

    /// Main event loop. Polls every second until `shutdown` broadcasts `true`.
    /// Takes `&self` so callers can keep an `Arc<SchedulerEngine>` shared
    /// with tools (e.g. `SchedulerTool`) while the loop runs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self) -> Result<()> {
        let now = Utc::now();
        let due: Vec<Job> = self
            .store
            .list_jobs(None)?
            .into_iter()
            .filter(|j| j.next_run_at.map(|t| t <= now).unwrap_or(false))
            .collect();

        for job in due {
            info!(job_id = %job.job_id, chat_id = %job.chat_id, "job fired");
            let fired = FiredJob {
                job_id: job.job_id.clone(),
                chat_id: job.chat_id.clone(),
                text: job.text.clone(),
            };
            if self.fired_tx.try_send(fired).is_err() {
                warn!(job_id = %job.job_id, "delivery channel full or closed — job dropped");
            }

            match job.kind {
                JobKind::Date => {
                    // One-shot: delete the row after firing.
                    if let Err(e) = self.store.delete_job(&job.job_id) {
                        error!(job_id = %job.job_id, "failed to delete fired one-shot job: {e}");
                    }
                }
                JobKind::Cron => {
                    // Recurring: reparse and refresh next_run_at.
                    match parse_when(&job.when_spec, self.tz) {
                        Ok(schedule) => {
                            let next = compute_next_run(&schedule, now, self.tz);
                            if let Err(e) = self.store.update_job_next_run(&job.job_id, next) {
                                error!(job_id = %job.job_id, "failed to refresh next_run: {e}");
                            }
                        }
                        Err(e) => error!(job_id = %job.job_id, "bad when_spec on refire: {e}"),
                    }
                }
            }
        }
        Ok(())
    }
}
