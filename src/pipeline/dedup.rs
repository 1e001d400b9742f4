use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::scheduler::JobContext;
use crate::util::text::{hash_text, split_sentences};

use super::minhash::MinHashLSH;
use super::preprocess::{PreprocessedArticle, PreprocessedCorpus};
use super::tag_signal::TagSignal;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct DeduplicatedArticle {
    pub(crate) id: String,
    pub(crate) title: Option<String>,
    pub(crate) sentences: Vec<String>,
    pub(crate) sentence_hashes: Vec<u64>,
    pub(crate) language: String,
    pub(crate) published_at: Option<DateTime<Utc>>,
    pub(crate) source_url: Option<String>,
    pub(crate) tags: Vec<TagSignal>,
    pub(crate) duplicates: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct DedupStats {
    pub(crate) total_input: usize,
    pub(crate) exact_duplicates_removed: usize,
    pub(crate) near_duplicates_removed: usize,
    pub(crate) survivors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DeduplicatedCorpus {
    pub(crate) job_id: Uuid,
    pub(crate) articles: Vec<DeduplicatedArticle>,
    pub(crate) stats: DedupStats,
}

#[async_trait]
pub(crate) trait DedupStage: Send + Sync {
    async fn deduplicate(
        &self,
        job: &JobContext,
        corpus: PreprocessedCorpus,
    ) -> anyhow::Result<DeduplicatedCorpus>;
}

/// 完全一致ハッシュ + MinHashによる近似重複除去を行うDedupStage。
///
/// `window`は近似重複比較の際に遡る直近サバイバー件数（ローリングウィンドウ）。
pub(crate) struct HashDedupStage {
    cpu_count: usize,
    threshold: f64,
    window: usize,
}

impl HashDedupStage {
    pub(crate) fn new(cpu_count: usize, threshold: f64, window: usize) -> Self {
        Self {
            cpu_count: cpu_count.max(1),
            threshold,
            window: window.max(1),
        }
    }
}

/// 記事本文の完全一致ハッシュと文単位の重複除去結果。
struct NormalizedArticle {
    article: PreprocessedArticle,
    exact_hash: u64,
    sentences: Vec<String>,
    sentence_hashes: Vec<u64>,
}

fn normalize_sentences(body: &str) -> (Vec<String>, Vec<u64>) {
    let mut seen = HashSet::new();
    let mut sentences = Vec::new();
    let mut hashes = Vec::new();
    for sentence in split_sentences(body) {
        let h = hash_text(&sentence);
        if seen.insert(h) {
            hashes.push(h);
            sentences.push(sentence);
        }
    }
    (sentences, hashes)
}

fn to_deduplicated(normalized: NormalizedArticle) -> DeduplicatedArticle {
    DeduplicatedArticle {
        id: normalized.article.id,
        title: normalized.article.title,
        sentences: normalized.sentences,
        sentence_hashes: normalized.sentence_hashes,
        language: normalized.article.language,
        published_at: normalized.article.published_at,
        source_url: normalized.article.source_url,
        tags: normalized.article.tags,
        duplicates: Vec::new(),
    }
}

#[async_trait]
impl DedupStage for HashDedupStage {
    async fn deduplicate(
        &self,
        job: &JobContext,
        corpus: PreprocessedCorpus,
    ) -> anyhow::Result<DeduplicatedCorpus> {
        let total_input = corpus.articles.len();
        let cpu_count = self.cpu_count;
        let threshold = self.threshold;
        let window = self.window;

        let normalized = tokio::task::spawn_blocking(move || {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(cpu_count)
                .build()
                .expect("failed to build dedup thread pool");
            pool.install(|| {
                corpus
                    .articles
                    .into_par_iter()
                    .map(|article| {
                        let exact_hash = hash_text(&article.body);
                        let (sentences, sentence_hashes) = normalize_sentences(&article.body);
                        NormalizedArticle {
                            article,
                            exact_hash,
                            sentences,
                            sentence_hashes,
                        }
                    })
                    .collect::<Vec<_>>()
            })
        })
        .await
        .expect("dedup normalization task panicked");

        // 完全一致ハッシュによる重複除去。最初に現れた記事をサバイバーとして残す。
        let mut exact_index: std::collections::HashMap<u64, usize> = std::collections::HashMap::new();
        let mut survivors: Vec<DeduplicatedArticle> = Vec::new();
        let mut exact_duplicates_removed = 0usize;

        for normalized in normalized {
            match exact_index.get(&normalized.exact_hash) {
                Some(&idx) => {
                    survivors[idx].duplicates.push(normalized.article.id.clone());
                    exact_duplicates_removed += 1;
                }
                None => {
                    exact_index.insert(normalized.exact_hash, survivors.len());
                    survivors.push(to_deduplicated(normalized));
                }
            }
        }

        // 近似重複をローリングウィンドウ内のMinHashシグネチャ比較で検出する。
        let lsh = MinHashLSH::with_threshold(threshold);
        let mut rolling: VecDeque<(String, super::minhash::MinHashSignature)> =
            VecDeque::with_capacity(window);
        let mut near_duplicates_removed = 0usize;
        let mut kept: Vec<DeduplicatedArticle> = Vec::with_capacity(survivors.len());

        for article in survivors {
            let body_for_signature = article.sentences.join(" ");
            let signature = lsh.compute_signature(&article.id, &body_for_signature, kept.len());

            let duplicate_of = rolling
                .iter()
                .find(|(_, existing)| existing.similarity(&signature) >= threshold)
                .map(|(id, _)| id.clone());

            match duplicate_of {
                Some(original_id) => {
                    near_duplicates_removed += 1;
                    if let Some(original) = kept.iter_mut().find(|a| a.id == original_id) {
                        original.duplicates.push(article.id.clone());
                        original.duplicates.extend(article.duplicates);
                    }
                }
                None => {
                    rolling.push_back((article.id.clone(), signature));
                    if rolling.len() > window {
                        rolling.pop_front();
                    }
                    kept.push(article);
                }
            }
        }

        let stats = DedupStats {
            total_input,
            exact_duplicates_removed,
            near_duplicates_removed,
            survivors: kept.len(),
        };

        debug!(
            job_id = %job.job_id,
            total_input,
            survivors = kept.len(),
            exact_duplicates_removed,
            near_duplicates_removed,
            "dedup stage finished"
        );

        Ok(DeduplicatedCorpus {
            job_id: job.job_id,
            articles: kept,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, body: &str) -> PreprocessedArticle {
        PreprocessedArticle {
            id: id.to_string(),
            title: Some("Title".to_string()),
            body: body.to_string(),
            language: "en".to_string(),
            char_count: body.chars().count(),
            is_html_cleaned: false,
            published_at: None,
            source_url: None,
            tokens: vec![],
            tags: vec![],
        }
    }

    fn job() -> JobContext {
        JobContext::new(Uuid::new_v4(), vec!["tech".to_string()])
    }

    #[tokio::test]
    async fn deduplicate_collapses_exact_duplicates() {
        let stage = HashDedupStage::new(2, 0.85, 100);
        let corpus = PreprocessedCorpus {
            job_id: Uuid::new_v4(),
            articles: vec![
                article("a-1", "Identical body text for dedup testing."),
                article("a-2", "Identical body text for dedup testing."),
            ],
        };

        let result = stage.deduplicate(&job(), corpus).await.expect("dedup succeeds");

        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].duplicates, vec!["a-2".to_string()]);
        assert_eq!(result.stats.exact_duplicates_removed, 1);
        assert_eq!(result.stats.survivors, 1);
    }

    #[tokio::test]
    async fn deduplicate_keeps_distinct_articles() {
        let stage = HashDedupStage::new(2, 0.85, 100);
        let corpus = PreprocessedCorpus {
            job_id: Uuid::new_v4(),
            articles: vec![
                article("a-1", "First article about a completely different subject."),
                article("a-2", "Second article covering an unrelated topic entirely."),
            ],
        };

        let result = stage.deduplicate(&job(), corpus).await.expect("dedup succeeds");

        assert_eq!(result.articles.len(), 2);
        assert_eq!(result.stats.survivors, 2);
    }

    #[test]
    fn normalize_sentences_drops_repeats_within_article() {
        let body = "First sentence. First sentence. Second sentence.";
        let (sentences, hashes) = normalize_sentences(body);
        assert_eq!(sentences.len(), 2);
        assert_eq!(hashes.len(), 2);
    }
}
