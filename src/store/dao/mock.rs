// テスト用のモックRecapDao実装
// プロダクションコードから分離して、テスト専用のモックを提供

#[cfg(test)]
use anyhow::Result;
#[cfg(test)]
use async_trait::async_trait;
#[cfg(test)]
use sqlx::PgPool;
#[cfg(test)]
use uuid::Uuid;

use super::article;
use super::dao_trait::RecapDao;
use super::types::JobStatus;
use crate::store::models::{
    ClusterWithEvidence, DiagnosticEntry, GenreEvaluationMetric, GenreEvaluationRun,
    GenreLearningRecord, GenreWithSummary, GraphEdgeRecord, NewSubworkerRun, PersistedCluster,
    PersistedGenre, RawArticle, RecapJob, SubworkerRunStatus,
};

#[cfg(test)]
/// テスト用のモックRecapDao（DB接続なしで動作）
#[allow(dead_code)]
#[derive(Clone)]
pub(crate) struct MockRecapDao;

#[cfg(test)]
impl MockRecapDao {
    #[allow(dead_code)]
    pub(crate) fn new() -> Self {
        Self
    }
}

#[cfg(test)]
#[async_trait]
impl RecapDao for MockRecapDao {
    fn pool(&self) -> Option<&PgPool> {
        // モックではデータベース接続プールは不要
        None
    }

    // Job management
    #[allow(dead_code)]
    async fn create_job(
        &self,
        _job_id: Uuid,
        _window_days: i32,
        _note: Option<&str>,
        _actor: &str,
    ) -> Result<()> {
        Ok(())
    }

    #[allow(dead_code)]
    async fn job_exists(&self, _job_id: Uuid) -> Result<bool> {
        Ok(false)
    }

    async fn find_resumable_job(
        &self,
    ) -> Result<Option<(Uuid, JobStatus, Option<String>, Option<i32>)>> {
        Ok(None)
    }

    async fn record_job_status(
        &self,
        _job_id: Uuid,
        _status: JobStatus,
        _stage: Option<&str>,
        _reason: Option<&str>,
        _actor: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn get_recap_jobs(
        &self,
        _window_seconds: i64,
        _limit: i64,
    ) -> Result<
        Vec<(
            Uuid,
            String,
            Option<String>,
            chrono::DateTime<chrono::Utc>,
            chrono::DateTime<chrono::Utc>,
        )>,
    > {
        Ok(vec![])
    }

    async fn delete_old_jobs(&self, _retention_days: i64) -> Result<u64> {
        Ok(0)
    }

    // Stage management
    async fn insert_stage_log(
        &self,
        _job_id: Uuid,
        _stage: &str,
        _status: &str,
        _message: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    async fn save_stage_state(
        &self,
        _job_id: Uuid,
        _stage: &str,
        _state_data: &serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }

    async fn load_stage_state(
        &self,
        _job_id: Uuid,
        _stage: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    async fn insert_failed_task(
        &self,
        _job_id: Uuid,
        _stage: &str,
        _payload: Option<&serde_json::Value>,
        _error: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    // Article management
    async fn backup_raw_articles(&self, _job_id: Uuid, _articles: &[RawArticle]) -> Result<()> {
        Ok(())
    }

    async fn get_article_metadata(
        &self,
        _job_id: Uuid,
        _article_ids: &[String],
    ) -> Result<
        std::collections::HashMap<String, (Option<chrono::DateTime<chrono::Utc>>, Option<String>)>,
    > {
        Ok(std::collections::HashMap::new())
    }

    async fn get_articles_by_ids(
        &self,
        _job_id: Uuid,
        _article_ids: &[String],
    ) -> Result<Vec<article::FetchedArticleData>> {
        Ok(vec![])
    }

    // Genre learning
    async fn load_tag_label_graph(&self, _window_label: &str) -> Result<Vec<GraphEdgeRecord>> {
        Ok(vec![])
    }

    async fn upsert_genre_learning_record(&self, _record: &GenreLearningRecord) -> Result<()> {
        Ok(())
    }

    async fn upsert_genre_learning_records_bulk(
        &self,
        _records: &[GenreLearningRecord],
    ) -> Result<()> {
        Ok(())
    }

    // Config
    async fn get_latest_worker_config(
        &self,
        _config_type: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    async fn insert_worker_config(
        &self,
        _config_type: &str,
        _config_payload: &serde_json::Value,
        _source: &str,
        _metadata: Option<&serde_json::Value>,
    ) -> Result<()> {
        Ok(())
    }

    // Metrics
    async fn save_preprocess_metrics(
        &self,
        _metrics: &crate::store::models::PreprocessMetrics,
    ) -> Result<()> {
        Ok(())
    }

    async fn save_system_metrics(
        &self,
        _job_id: Uuid,
        _metric_type: &str,
        _metrics: &serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }

    async fn get_system_metrics(
        &self,
        _metric_type: Option<&str>,
        _window_seconds: i64,
        _limit: i64,
    ) -> Result<
        Vec<(
            Option<Uuid>,
            chrono::DateTime<chrono::Utc>,
            serde_json::Value,
        )>,
    > {
        Ok(vec![])
    }

    async fn get_recent_activity(
        &self,
        _window_seconds: i64,
        _limit: i64,
    ) -> Result<Vec<(Option<Uuid>, String, chrono::DateTime<chrono::Utc>)>> {
        Ok(vec![])
    }

    async fn get_log_errors(
        &self,
        _window_seconds: i64,
        _limit: i64,
    ) -> Result<
        Vec<(
            chrono::DateTime<chrono::Utc>,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
        )>,
    > {
        Ok(vec![])
    }

    async fn get_admin_jobs(
        &self,
        _window_seconds: i64,
        _limit: i64,
    ) -> Result<
        Vec<(
            Uuid,
            String,
            String,
            chrono::DateTime<chrono::Utc>,
            Option<chrono::DateTime<chrono::Utc>>,
            Option<serde_json::Value>,
            Option<serde_json::Value>,
            Option<String>,
        )>,
    > {
        Ok(vec![])
    }

    // Output
    #[allow(dead_code)]
    async fn save_final_section(
        &self,
        _section: &crate::store::models::RecapFinalSection,
    ) -> Result<i64> {
        Ok(0)
    }

    #[allow(dead_code)]
    async fn upsert_recap_output(&self, _output: &crate::store::models::RecapOutput) -> Result<()> {
        Ok(())
    }

    async fn get_recap_output_body_json(
        &self,
        _job_id: Uuid,
        _genre: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    async fn get_latest_completed_job(&self, _window_days: i32) -> Result<Option<RecapJob>> {
        Ok(None)
    }

    async fn get_genres_by_job(&self, _job_id: Uuid) -> Result<Vec<GenreWithSummary>> {
        Ok(vec![])
    }

    async fn get_clusters_by_job(
        &self,
        _job_id: Uuid,
    ) -> Result<std::collections::HashMap<String, Vec<ClusterWithEvidence>>> {
        Ok(std::collections::HashMap::new())
    }

    // Subworker
    #[allow(dead_code)]
    async fn insert_subworker_run(&self, _run: &NewSubworkerRun) -> Result<i64> {
        Ok(0)
    }

    #[allow(dead_code)]
    async fn mark_subworker_run_success(
        &self,
        _run_id: i64,
        _cluster_count: i32,
        _response_payload: &serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }

    #[allow(dead_code)]
    async fn mark_subworker_run_failure(
        &self,
        _run_id: i64,
        _status: SubworkerRunStatus,
        _error_message: &str,
    ) -> Result<()> {
        Ok(())
    }

    #[allow(dead_code)]
    async fn insert_clusters(&self, _run_id: i64, _clusters: &[PersistedCluster]) -> Result<()> {
        Ok(())
    }

    #[allow(dead_code)]
    async fn upsert_diagnostics(
        &self,
        _run_id: i64,
        _diagnostics: &[DiagnosticEntry],
    ) -> Result<()> {
        Ok(())
    }

    #[allow(dead_code)]
    async fn upsert_genre(&self, _genre: &PersistedGenre) -> Result<()> {
        Ok(())
    }

    // Evaluation
    async fn save_genre_evaluation(
        &self,
        _run: &GenreEvaluationRun,
        _metrics: &[GenreEvaluationMetric],
    ) -> Result<()> {
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    async fn get_genre_evaluation(
        &self,
        _run_id: Uuid,
    ) -> Result<Option<(GenreEvaluationRun, Vec<GenreEvaluationMetric>)>> {
        Ok(None)
    }

    async fn get_latest_genre_evaluation(
        &self,
    ) -> Result<Option<(GenreEvaluationRun, Vec<GenreEvaluationMetric>)>> {
        Ok(None)
    }

    // Morning
    async fn save_morning_article_groups(&self, _groups: &[(Uuid, Uuid, bool)]) -> Result<()> {
        Ok(())
    }

    async fn get_morning_article_groups(
        &self,
        _since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<(Uuid, Uuid, bool, chrono::DateTime<chrono::Utc>)>> {
        Ok(vec![])
    }
}
