//! ジャンル分類のための言語ユーティリティ。
pub(crate) mod features;
pub(crate) mod tokenizer;

pub(crate) use features::{FeatureExtractor, FeatureVector};
pub(crate) use tokenizer::TokenPipeline;

/// 分類対象テキストの言語。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationLanguage {
    Japanese,
    English,
    Unknown,
}

impl ClassificationLanguage {
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.to_lowercase().as_str() {
            "ja" | "jp" => Self::Japanese,
            "en" | "us" | "uk" => Self::English,
            _ => Self::Unknown,
        }
    }
}
