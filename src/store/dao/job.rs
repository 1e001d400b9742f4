use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::JobStatus;

pub(crate) struct RecapDao;

impl RecapDao {
    /// 新しいジョブをpending状態で作成し、最初のJobStatusEventを記録する。
    ///
    /// バケット（day, window_days）の排他制御はアドバイザリロック（`util::idempotency`）が
    /// 別途担うため、ここでの行作成自体はロックを取らない。
    pub async fn create_job(
        pool: &PgPool,
        job_id: Uuid,
        window_days: i32,
        note: Option<&str>,
        actor: &str,
    ) -> Result<()> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        sqlx::query(
            r"
            INSERT INTO recap_jobs (job_id, kicked_at, status, window_days, note)
            VALUES ($1, NOW(), 'pending', $2, $3)
            ON CONFLICT (job_id) DO NOTHING
            ",
        )
        .bind(job_id)
        .bind(window_days)
        .bind(note)
        .execute(&mut *tx)
        .await
        .context("failed to insert recap_jobs record")?;

        sqlx::query(
            r"
            INSERT INTO job_status_events (job_id, status, stage, transitioned_at, reason, actor)
            VALUES ($1, 'pending', NULL, NOW(), NULL, $2)
            ",
        )
        .bind(job_id)
        .bind(actor)
        .execute(&mut *tx)
        .await
        .context("failed to append initial job status event")?;

        tx.commit().await.context("failed to commit job creation")?;

        Ok(())
    }

    /// 指定されたjob_idのジョブが存在するかチェックする。
    #[allow(dead_code)]
    pub async fn job_exists(pool: &PgPool, job_id: Uuid) -> Result<bool> {
        let row =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM recap_jobs WHERE job_id = $1) as exists")
                .bind(job_id)
                .fetch_one(pool)
                .await
                .context("failed to check job existence")?;

        let exists: bool = row
            .try_get("exists")
            .context("failed to get exists result")?;
        Ok(exists)
    }

    /// 再開可能なジョブ（failedまたはrunningのまま放置されたジョブ）を探す。
    ///
    /// ここでは簡易的に「最新の非完了ジョブ」を返す実装とします。
    pub async fn find_resumable_job(
        pool: &PgPool,
    ) -> Result<Option<(Uuid, JobStatus, Option<String>, Option<i32>)>> {
        let row = sqlx::query(
            r"
            SELECT job_id, status, last_stage, window_days
            FROM recap_jobs
            WHERE status IN ('pending', 'running', 'failed')
            ORDER BY kicked_at DESC
            LIMIT 1
            ",
        )
        .fetch_optional(pool)
        .await
        .context("failed to find resumable job")?;

        if let Some(row) = row {
            let job_id: Uuid = row.try_get("job_id")?;
            let status_str: String = row.try_get("status")?;
            let last_stage: Option<String> = row.try_get("last_stage")?;
            let window_days: Option<i32> = row.try_get("window_days")?;

            let status = match status_str.as_str() {
                "pending" => JobStatus::Pending,
                "running" => JobStatus::Running,
                "completed" => JobStatus::Completed,
                _ => JobStatus::Failed, // Default fallback
            };

            Ok(Some((job_id, status, last_stage, window_days)))
        } else {
            Ok(None)
        }
    }

    /// ジョブのステータス遷移を記録する。
    ///
    /// `recap_jobs`の現在状態（projection）を更新すると同時に、`job_status_events`へ
    /// 追記専用（append-only）の履歴行を挿入する。両方とも同一トランザクション内で行う。
    pub async fn record_job_status(
        pool: &PgPool,
        job_id: Uuid,
        status: JobStatus,
        stage: Option<&str>,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<()> {
        let mut tx = pool.begin().await.context("failed to begin transaction")?;

        sqlx::query(
            r"
            UPDATE recap_jobs
            SET status = $2,
            last_stage = COALESCE($3, last_stage),
            updated_at = NOW()
            WHERE job_id = $1
            ",
        )
        .bind(job_id)
        .bind(status.as_ref())
        .bind(stage)
        .execute(&mut *tx)
        .await
        .context("failed to update job status")?;

        sqlx::query(
            r"
            INSERT INTO job_status_events (job_id, status, stage, transitioned_at, reason, actor)
            VALUES ($1, $2, $3, NOW(), $4, $5)
            ",
        )
        .bind(job_id)
        .bind(status.as_ref())
        .bind(stage)
        .bind(reason)
        .bind(actor)
        .execute(&mut *tx)
        .await
        .context("failed to append job status event")?;

        tx.commit()
            .await
            .context("failed to commit job status transition")?;

        Ok(())
    }

    /// ダッシュボード用に全ジョブを取得する。
    pub async fn get_recap_jobs(
        pool: &PgPool,
        window_seconds: i64,
        limit: i64,
    ) -> Result<
        Vec<(
            Uuid,
            String,
            Option<String>,
            chrono::DateTime<chrono::Utc>,
            chrono::DateTime<chrono::Utc>,
        )>,
    > {
        let rows = sqlx::query(
            r"
            SELECT job_id, status, last_stage, kicked_at, updated_at
            FROM recap_jobs
            WHERE kicked_at > NOW() - make_interval(secs => $1)
            ORDER BY kicked_at DESC
            LIMIT $2
            ",
        )
        .bind(window_seconds as f64)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to fetch recap jobs")?;

        let mut results = Vec::new();
        for row in rows {
            let job_id: Uuid = row.try_get("job_id")?;
            let status_str: String = row.try_get("status")?;
            let last_stage: Option<String> = row.try_get("last_stage")?;
            let kicked_at: chrono::DateTime<chrono::Utc> = row.try_get("kicked_at")?;
            let updated_at: chrono::DateTime<chrono::Utc> = row.try_get("updated_at")?;
            results.push((job_id, status_str, last_stage, kicked_at, updated_at));
        }

        Ok(results)
    }

    /// 指定された保持期間より古いジョブを削除する。
    ///
    /// CASCADEにより、関連するrecap_job_articles、recap_stage_state等も自動削除される。
    ///
    /// # Arguments
    /// * `pool` - データベース接続プール
    /// * `retention_days` - 保持期間（日数）。この日数より古いジョブが削除対象となる
    ///
    /// # Returns
    /// 削除されたジョブの件数
    pub async fn delete_old_jobs(pool: &PgPool, retention_days: i64) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM recap_jobs
            WHERE kicked_at < NOW() - make_interval(days => $1)
            ",
        )
        .bind(retention_days as f64)
        .execute(pool)
        .await
        .context("failed to delete old jobs")?;

        Ok(result.rows_affected())
    }
}
