use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::alt_backend::{AltBackendArticle, AltBackendClient};
use crate::clients::tag_generator::TagGeneratorClient;
use crate::scheduler::JobContext;
use crate::store::dao::RecapDao;
use crate::util::retry::{is_retryable_error, RetryConfig};

use super::tag_signal::TagSignal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct FetchedArticle {
    pub(crate) id: String,
    pub(crate) title: Option<String>,
    pub(crate) body: String,
    pub(crate) language: Option<String>,
    pub(crate) published_at: Option<DateTime<Utc>>,
    pub(crate) source_url: Option<String>,
    #[serde(default)]
    pub(crate) tags: Vec<TagSignal>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FetchedCorpus {
    pub(crate) job_id: Uuid,
    pub(crate) articles: Vec<FetchedArticle>,
}

/// 軽量チェックポイント。本文は含まず、記事IDのみを保持する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FetchedCorpusLight {
    pub(crate) job_id: Uuid,
    pub(crate) article_ids: Vec<String>,
}

impl FetchedCorpus {
    pub(crate) fn to_lightweight(&self) -> FetchedCorpusLight {
        FetchedCorpusLight {
            job_id: self.job_id,
            article_ids: self.articles.iter().map(|a| a.id.clone()).collect(),
        }
    }
}

#[async_trait]
pub(crate) trait FetchStage: Send + Sync {
    async fn fetch(&self, job: &JobContext) -> anyhow::Result<FetchedCorpus>;
}

/// alt-backendから記事を取得し、raw記事をバックアップテーブルへ保存するFetchStage。
/// tag-generatorが設定されていれば、既存タグをバッチ取得して付与する。
pub(crate) struct AltBackendFetchStage {
    alt_backend: Arc<AltBackendClient>,
    tag_generator: Option<Arc<TagGeneratorClient>>,
    recap_dao: Arc<dyn RecapDao>,
    retry_config: RetryConfig,
    window_days: u32,
}

impl AltBackendFetchStage {
    pub(crate) fn new(
        alt_backend: Arc<AltBackendClient>,
        tag_generator: Option<Arc<TagGeneratorClient>>,
        recap_dao: Arc<dyn RecapDao>,
        retry_config: RetryConfig,
        window_days: u32,
    ) -> Self {
        Self {
            alt_backend,
            tag_generator,
            recap_dao,
            retry_config,
            window_days,
        }
    }

    async fn fetch_with_retry(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AltBackendArticle>> {
        let mut attempt = 0;
        loop {
            match self.alt_backend.fetch_articles(from, to).await {
                Ok(articles) => return Ok(articles),
                Err(err) => {
                    let retryable = err
                        .chain()
                        .find_map(|cause| cause.downcast_ref::<reqwest::Error>())
                        .is_none_or(is_retryable_error);
                    if !retryable || !self.retry_config.can_retry(attempt) {
                        return Err(err);
                    }
                    let delay = self.retry_config.delay_for_attempt(attempt + 1);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = ?err, "retrying alt-backend fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl FetchStage for AltBackendFetchStage {
    async fn fetch(&self, job: &JobContext) -> anyhow::Result<FetchedCorpus> {
        let window_days = job.window_days().unwrap_or(self.window_days);
        let to = Utc::now();
        let from = to - ChronoDuration::days(i64::from(window_days));

        info!(job_id = %job.job_id, %from, %to, "fetching articles from alt-backend");

        let articles = self.fetch_with_retry(from, to).await?;

        debug!(job_id = %job.job_id, count = articles.len(), "fetched articles");

        let tags_by_article = if let Some(tag_generator) = &self.tag_generator {
            let ids: Vec<String> = articles.iter().map(|a| a.id.clone()).collect();
            tag_generator
                .fetch_tags_batch(&ids)
                .await
                .unwrap_or_else(|err| {
                    warn!(job_id = %job.job_id, error = ?err, "failed to fetch tags, continuing without them");
                    std::collections::HashMap::new()
                })
        } else {
            std::collections::HashMap::new()
        };

        let raw_articles: Vec<crate::store::models::RawArticle> = articles
            .iter()
            .map(|article| {
                crate::store::models::RawArticle::new(
                    article.id.clone(),
                    article.title.clone(),
                    article.content.clone(),
                    article.published_at,
                    article.source_url.clone(),
                    article.lang.clone(),
                    crate::util::text::hash_text(&article.content).to_string(),
                )
            })
            .collect();

        self.recap_dao
            .backup_raw_articles(job.job_id, &raw_articles)
            .await?;

        let fetched_articles = articles
            .into_iter()
            .map(|article| {
                let tags = tags_by_article.get(&article.id).cloned().unwrap_or_default();
                FetchedArticle {
                    id: article.id,
                    title: article.title,
                    body: article.content,
                    language: article.lang,
                    published_at: article.published_at,
                    source_url: article.source_url,
                    tags,
                }
            })
            .collect();

        Ok(FetchedCorpus {
            job_id: job.job_id,
            articles: fetched_articles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_lightweight_keeps_only_ids() {
        let corpus = FetchedCorpus {
            job_id: Uuid::new_v4(),
            articles: vec![
                FetchedArticle {
                    id: "a-1".to_string(),
                    title: Some("Title".to_string()),
                    body: "Body".to_string(),
                    language: Some("en".to_string()),
                    published_at: None,
                    source_url: None,
                    tags: Vec::new(),
                },
                FetchedArticle {
                    id: "a-2".to_string(),
                    title: None,
                    body: "Body 2".to_string(),
                    language: None,
                    published_at: None,
                    source_url: None,
                    tags: Vec::new(),
                },
            ],
        };

        let light = corpus.to_lightweight();

        assert_eq!(light.job_id, corpus.job_id);
        assert_eq!(light.article_ids, vec!["a-1".to_string(), "a-2".to_string()]);
    }
}
