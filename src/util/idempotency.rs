use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool, Row};
use xxhash_rust::xxh3::xxh3_64;

const JST_OFFSET_SECONDS: i32 = 9 * 3600;

/// 60-bit mask applied to the hash before it is used as a `bigint` advisory lock key.
const LOCK_KEY_MASK: u64 = 0x0FFF_FFFF_FFFF_FFFF;

/// Today's date in JST, used to bucket jobs by calendar day.
pub(crate) fn current_jst_day() -> NaiveDate {
    let tz = FixedOffset::east_opt(JST_OFFSET_SECONDS).expect("valid JST offset");
    Utc::now().with_timezone(&tz).date_naive()
}

/// Derives the advisory lock key for a job's `(day, window_days)` bucket identity.
///
/// Exactly one job per bucket may hold this lock at a time.
pub(crate) fn job_bucket_lock_key(day: NaiveDate, window_days: u32) -> i64 {
    let identity = format!("{day}:{window_days}d");
    let hash = xxh3_64(identity.as_bytes()) & LOCK_KEY_MASK;
    hash as i64
}

/// A session-scoped Postgres advisory lock held on a connection detached from the pool.
///
/// The lock is released when the session ends, which happens either through an explicit
/// `drop` or because the connection is never returned to the pool, so a panic anywhere
/// between acquisition and drop still releases it.
pub(crate) struct JobLockGuard {
    conn: Option<PgConnection>,
    lock_key: i64,
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!(lock_key = self.lock_key, "releasing job bucket advisory lock");
        }
    }
}

/// Attempts to acquire the session-scoped advisory lock for `lock_key`.
///
/// Returns `Ok(None)` when another session already holds it (lock contended).
///
/// # Errors
/// Returns an error if a connection cannot be acquired or the lock query fails.
pub(crate) async fn acquire_job_lock(pool: &PgPool, lock_key: i64) -> Result<Option<JobLockGuard>> {
    let mut conn = pool
        .acquire()
        .await
        .context("failed to acquire connection for advisory lock")?
        .detach();

    let row = sqlx::query("SELECT pg_try_advisory_lock($1) as acquired")
        .bind(lock_key)
        .fetch_one(&mut conn)
        .await
        .context("failed to execute pg_try_advisory_lock")?;

    let acquired: bool = row
        .try_get("acquired")
        .context("failed to read lock acquisition result")?;

    if acquired {
        Ok(Some(JobLockGuard {
            conn: Some(conn),
            lock_key,
        }))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn bucket_lock_key_is_deterministic() {
        let key1 = job_bucket_lock_key(day("2026-07-28"), 7);
        let key2 = job_bucket_lock_key(day("2026-07-28"), 7);
        assert_eq!(key1, key2);
    }

    #[test]
    fn different_window_days_produce_different_keys() {
        let key7 = job_bucket_lock_key(day("2026-07-28"), 7);
        let key14 = job_bucket_lock_key(day("2026-07-28"), 14);
        assert_ne!(key7, key14);
    }

    #[test]
    fn different_days_produce_different_keys() {
        let key1 = job_bucket_lock_key(day("2026-07-28"), 7);
        let key2 = job_bucket_lock_key(day("2026-07-29"), 7);
        assert_ne!(key1, key2);
    }
}
