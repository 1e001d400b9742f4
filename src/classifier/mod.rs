//! 新しい分類パイプライン: Centroid-based Classification

pub mod centroid;

pub use centroid::{Article, CentroidClassifier};
