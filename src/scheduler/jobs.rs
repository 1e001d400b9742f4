use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    config::Config,
    pipeline::{PipelineOrchestrator, morning::MorningPipeline},
    store::dao::{JobStatus, RecapDao},
    util::idempotency::{acquire_job_lock, current_jst_day, job_bucket_lock_key},
};

/// ジョブの(day, window_days)バケットの保持期間を超えたレコードを掃除する際のデフォルト保持日数。
const JOB_RETENTION_DAYS: i64 = 30;

/// `Scheduler::run_job`の結果。ロック競合はエラーではなく正常系の一結果として扱う。
pub(crate) enum JobStart {
    Started,
    LockContended,
}

#[derive(Debug, Clone)]
pub(crate) struct JobContext {
    pub(crate) job_id: Uuid,
    pub(crate) genres: Vec<String>,
    pub(crate) current_stage: Option<String>,
    window_days: Option<u32>,
}

impl JobContext {
    pub(crate) fn new(job_id: Uuid, genres: Vec<String>) -> Self {
        Self {
            job_id,
            genres,
            current_stage: None,
            window_days: None,
        }
    }

    /// Constructs a job context with an explicit (possibly absent) window override, used when
    /// resuming a job whose bucket window was recorded at creation time.
    pub(crate) fn new_with_window(job_id: Uuid, genres: Vec<String>, window_days: Option<u32>) -> Self {
        Self {
            job_id,
            genres,
            current_stage: None,
            window_days,
        }
    }

    pub(crate) fn with_stage(mut self, stage: String) -> Self {
        self.current_stage = Some(stage);
        self
    }

    /// Overrides the configured default fetch window for this job, used by the
    /// `{window_days}d`-parameterized HTTP routes.
    pub(crate) fn with_window_days(mut self, window_days: u32) -> Self {
        self.window_days = Some(window_days);
        self
    }

    pub(crate) fn genres(&self) -> &[String] {
        &self.genres
    }

    pub(crate) fn window_days(&self) -> Option<u32> {
        self.window_days
    }
}

#[derive(Clone)]
pub struct Scheduler {
    pipeline: Arc<PipelineOrchestrator>,
    morning_pipeline: Arc<MorningPipeline>,
    config: Arc<Config>,
    recap_dao: Arc<RecapDao>,
}

impl Scheduler {
    pub(crate) fn new(
        pipeline: Arc<PipelineOrchestrator>,
        morning_pipeline: Arc<MorningPipeline>,
        config: Arc<Config>,
        recap_dao: Arc<RecapDao>,
    ) -> Self {
        Self {
            pipeline,
            morning_pipeline,
            config,
            recap_dao,
        }
    }

    /// Creates the `recap_jobs` row (and its initial `pending` status event) a job's
    /// `run_job`/`trigger_job` call will later transition. Idempotent: re-triggering the
    /// same `job_id` is a no-op (`ON CONFLICT DO NOTHING`).
    pub(crate) async fn create_job(
        &self,
        job_id: Uuid,
        window_days: u32,
        note: Option<&str>,
        actor: &str,
    ) -> Result<()> {
        self.recap_dao
            .create_job(job_id, window_days as i32, note, actor)
            .await
    }

    /// Runs a job to completion, guarded by the session-scoped advisory lock on its
    /// `(day, window_days)` bucket. Exactly one job per bucket may run at a time; a
    /// contended lock returns `Ok(JobStart::LockContended)` without touching the pipeline.
    ///
    /// Blocks until the job finishes; used by the batch daemon, which runs one job at a
    /// time and has no caller waiting on an immediate HTTP response.
    pub(crate) async fn run_job(&self, context: JobContext) -> Result<JobStart> {
        tracing::info!(
            job_id = %context.job_id,
            prompt_version = %self.config.llm_prompt_version(),
            genres = context.genres().len(),
            "running recap job"
        );

        self.recap_dao
            .record_job_status(context.job_id, JobStatus::Pending, None, None, "system")
            .await?;

        let bucket_day: NaiveDate = current_jst_day();
        let window_days = context
            .window_days()
            .unwrap_or_else(|| self.config.recap_window_days());
        let lock_key = job_bucket_lock_key(bucket_day, window_days);

        let _lock_guard = match self.recap_dao.pool() {
            Some(pool) => match acquire_job_lock(pool, lock_key).await? {
                Some(guard) => Some(guard),
                None => {
                    tracing::info!(
                        job_id = %context.job_id,
                        window_days,
                        %bucket_day,
                        "job bucket already locked, returning lock_contended"
                    );
                    return Ok(JobStart::LockContended);
                }
            },
            // Mock/test DAOs have no pool; locking is a no-op in that case.
            None => None,
        };

        self.execute_locked(&context).await?;
        Ok(JobStart::Started)
    }

    /// Attempts to admit a job for execution without blocking on the pipeline itself.
    ///
    /// Creates the job row, then synchronously attempts the bucket's advisory lock. On
    /// success the pipeline runs in a spawned task that holds the lock guard for its
    /// entire lifetime; the caller (the HTTP trigger handler) only waits on the lock
    /// attempt, so it can answer a contended bucket with `JobStart::LockContended`
    /// immediately rather than from inside a fire-and-forget task.
    pub(crate) async fn trigger_job(&self, context: JobContext, actor: &str) -> Result<JobStart> {
        let window_days = context
            .window_days()
            .unwrap_or_else(|| self.config.recap_window_days());

        self.create_job(context.job_id, window_days, None, actor)
            .await?;
        self.recap_dao
            .record_job_status(context.job_id, JobStatus::Pending, None, None, actor)
            .await?;

        let bucket_day: NaiveDate = current_jst_day();
        let lock_key = job_bucket_lock_key(bucket_day, window_days);

        let guard = match self.recap_dao.pool() {
            Some(pool) => match acquire_job_lock(pool, lock_key).await? {
                Some(guard) => Some(guard),
                None => {
                    tracing::info!(
                        job_id = %context.job_id,
                        window_days,
                        %bucket_day,
                        "job bucket already locked, returning lock_contended"
                    );
                    return Ok(JobStart::LockContended);
                }
            },
            None => None,
        };

        let scheduler = self.clone();
        tokio::spawn(async move {
            let _lock_guard = guard;
            if let Err(err) = scheduler.execute_locked(&context).await {
                tracing::error!(job_id = %context.job_id, error = %err, "triggered job failed");
            }
        });

        Ok(JobStart::Started)
    }

    /// Runs the pipeline and records its outcome. The caller is responsible for holding
    /// the bucket's advisory lock guard for the duration of this call.
    async fn execute_locked(&self, context: &JobContext) -> Result<()> {
        self.recap_dao
            .record_job_status(
                context.job_id,
                JobStatus::Running,
                context.current_stage.as_deref(),
                None,
                "system",
            )
            .await?;

        match self.pipeline.execute(context).await {
            Ok(_) => {
                self.recap_dao
                    .record_job_status(context.job_id, JobStatus::Completed, None, None, "system")
                    .await?;
                Ok(())
            }
            Err(e) => {
                tracing::error!(job_id = %context.job_id, error = %e, "job execution failed");
                let reason = if e.to_string().contains("exceeded timeout") {
                    "timeout".to_string()
                } else {
                    e.to_string()
                };
                // Attempt to record failure status, but preserve original error
                if let Err(dao_err) = self
                    .recap_dao
                    .record_job_status(
                        context.job_id,
                        JobStatus::Failed,
                        context.current_stage.as_deref(),
                        Some(&reason),
                        "system",
                    )
                    .await
                {
                    tracing::error!(job_id = %context.job_id, error = %dao_err, "failed to update job status to failed");
                }

                // Log failed task details
                let stage = context
                    .current_stage
                    .as_deref()
                    .unwrap_or("pipeline_execution");
                if let Err(log_err) = self
                    .recap_dao
                    .insert_failed_task(context.job_id, stage, None, Some(&reason))
                    .await
                {
                    tracing::error!(job_id = %context.job_id, error = %log_err, "failed to insert failed task log");
                }

                Err(e)
            }
        }
    }

    pub(crate) async fn run_morning_update(&self, context: JobContext) -> Result<()> {
        tracing::info!("running morning update job");
        self.morning_pipeline.execute_update(&context).await
    }

    pub(crate) async fn find_resumable_job(
        &self,
    ) -> Result<Option<(Uuid, JobStatus, Option<String>, Option<i32>)>> {
        self.recap_dao.find_resumable_job().await
    }

    /// Deletes jobs (and their cascade-linked rows) older than the retention window.
    pub(crate) async fn cleanup_old_jobs(&self) -> Result<u64> {
        self.recap_dao.delete_old_jobs(JOB_RETENTION_DAYS).await
    }
}
