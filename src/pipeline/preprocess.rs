use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::classification::{ClassificationLanguage, TokenPipeline};
use crate::clients::SubworkerClient;
use crate::language_detection::detect_lang;
use crate::scheduler::JobContext;
use crate::store::dao::RecapDao;

use super::fetch::{FetchedArticle, FetchedCorpus};
use super::tag_signal::TagSignal;

/// 正規化後にこの文字数未満のテキストは破棄する。
const MIN_CLEAN_TEXT_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PreprocessedArticle {
    pub(crate) id: String,
    pub(crate) title: Option<String>,
    pub(crate) body: String,
    pub(crate) language: String,
    pub(crate) char_count: usize,
    pub(crate) is_html_cleaned: bool,
    pub(crate) published_at: Option<DateTime<Utc>>,
    pub(crate) source_url: Option<String>,
    pub(crate) tokens: Vec<String>,
    #[serde(default)]
    pub(crate) tags: Vec<TagSignal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PreprocessedCorpus {
    pub(crate) job_id: Uuid,
    pub(crate) articles: Vec<PreprocessedArticle>,
}

#[async_trait]
pub(crate) trait PreprocessStage: Send + Sync {
    async fn preprocess(
        &self,
        job: &JobContext,
        corpus: FetchedCorpus,
    ) -> anyhow::Result<PreprocessedCorpus>;
}

/// HTMLサニタイズ・言語判定・文分割・トークン化を行うPreprocessStage。
///
/// CPU負荷の高い処理は`spawn_blocking`へオフロードし、セマフォで
/// `max_concurrent`件まで同時実行する。
pub(crate) struct TextPreprocessStage {
    max_concurrent: usize,
    recap_dao: Arc<dyn RecapDao>,
    /// 将来のリモート言語判定フォールバック用に保持する（現行ロジックでは未使用）。
    #[allow(dead_code)]
    subworker_client: Arc<SubworkerClient>,
}

impl TextPreprocessStage {
    pub(crate) fn new(
        max_concurrent: usize,
        recap_dao: Arc<dyn RecapDao>,
        subworker_client: Arc<SubworkerClient>,
    ) -> Self {
        Self {
            max_concurrent,
            recap_dao,
            subworker_client,
        }
    }
}

/// 言語ヒント文字列とNFC正規化済み本文から`ClassificationLanguage`を決定する。
fn resolve_language(hint: Option<&str>, text: &str) -> ClassificationLanguage {
    match hint.map(str::to_ascii_lowercase).as_deref() {
        Some("ja") | Some("jpn") => return ClassificationLanguage::Japanese,
        Some("en") | Some("eng") => return ClassificationLanguage::English,
        _ => {}
    }
    detect_lang(text).0
}

fn language_code(lang: ClassificationLanguage) -> &'static str {
    match lang {
        ClassificationLanguage::Japanese => "ja",
        ClassificationLanguage::English => "en",
        ClassificationLanguage::Unknown => "und",
    }
}

/// 単一記事をHTML除去・NFC正規化・言語判定・トークン化する。
/// 清浄化後の本文が短すぎる、または言語判定不能な場合は`None`を返す。
fn process_one(article: FetchedArticle, pipeline: &TokenPipeline) -> Option<PreprocessedArticle> {
    let sanitized = ammonia::Builder::default()
        .tags(HashSet::new())
        .clean(&article.body)
        .to_string();
    let normalized: String = sanitized.nfc().collect();
    let text = normalized.trim().to_string();
    let char_count = text.chars().count();

    if char_count < MIN_CLEAN_TEXT_CHARS {
        return None;
    }

    let language = resolve_language(article.language.as_deref(), &text);
    if language == ClassificationLanguage::Unknown {
        return None;
    }

    let title = article.title.clone().unwrap_or_default();
    let normalized_doc = pipeline.preprocess(&title, &text, language);

    Some(PreprocessedArticle {
        id: article.id,
        title: article.title,
        body: text,
        language: language_code(language).to_string(),
        char_count,
        is_html_cleaned: sanitized != article.body,
        published_at: article.published_at,
        source_url: article.source_url,
        tokens: normalized_doc.tokens,
        tags: article.tags,
    })
}

#[async_trait]
impl PreprocessStage for TextPreprocessStage {
    async fn preprocess(
        &self,
        job: &JobContext,
        corpus: FetchedCorpus,
    ) -> anyhow::Result<PreprocessedCorpus> {
        let total_fetched = corpus.articles.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let pipeline = Arc::new(TokenPipeline::new());

        let mut handles = Vec::with_capacity(total_fetched);
        for article in corpus.articles {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore not closed");
                tokio::task::spawn_blocking(move || process_one(article, &pipeline))
                    .await
                    .expect("preprocess task panicked")
            }));
        }

        let mut articles = Vec::with_capacity(total_fetched);
        let mut dropped_empty = 0usize;
        let mut html_cleaned = 0usize;
        let mut total_characters = 0usize;
        let mut languages_detected: std::collections::HashMap<String, usize> =
            std::collections::HashMap::new();

        for handle in handles {
            match handle.await.expect("preprocess task join failed") {
                Some(processed) => {
                    if processed.is_html_cleaned {
                        html_cleaned += 1;
                    }
                    total_characters += processed.char_count;
                    *languages_detected
                        .entry(processed.language.clone())
                        .or_insert(0) += 1;
                    articles.push(processed);
                }
                None => dropped_empty += 1,
            }
        }

        debug!(
            job_id = %job.job_id,
            total_fetched,
            processed = articles.len(),
            dropped_empty,
            "preprocess stage finished"
        );

        let metrics = crate::store::models::PreprocessMetrics::new(
            job.job_id,
            total_fetched,
            articles.len(),
            dropped_empty,
            html_cleaned,
            total_characters,
            serde_json::to_value(&languages_detected).unwrap_or(serde_json::Value::Null),
        );

        if let Err(err) = self.recap_dao.save_preprocess_metrics(&metrics).await {
            tracing::warn!(job_id = %job.job_id, error = ?err, "failed to save preprocess metrics");
        }

        Ok(PreprocessedCorpus {
            job_id: job.job_id,
            articles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(body: &str, language: Option<&str>) -> FetchedArticle {
        FetchedArticle {
            id: "art-1".to_string(),
            title: Some("Title".to_string()),
            body: body.to_string(),
            language: language.map(std::string::ToString::to_string),
            published_at: None,
            source_url: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn process_one_drops_short_text() {
        let pipeline = TokenPipeline::new();
        assert!(process_one(article("too short", None), &pipeline).is_none());
    }

    #[test]
    fn process_one_strips_html_and_normalizes() {
        let pipeline = TokenPipeline::new();
        let body = "<p>This is a sufficiently long piece of English text for testing preprocessing.</p>";
        let processed = process_one(article(body, Some("en")), &pipeline)
            .expect("article should survive preprocessing");
        assert!(!processed.body.contains('<'));
        assert_eq!(processed.language, "en");
        assert!(processed.is_html_cleaned);
        assert!(!processed.tokens.is_empty());
    }

    #[test]
    fn process_one_respects_language_hint_over_detection() {
        let pipeline = TokenPipeline::new();
        let body = "This is a sufficiently long piece of plain English text for a hint test.";
        let processed = process_one(article(body, Some("ja")), &pipeline)
            .expect("article should survive preprocessing");
        assert_eq!(processed.language, "ja");
    }
}
