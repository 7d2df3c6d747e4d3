use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::indexer::Chunk;

/// A chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    /// Higher is more relevant.
    pub score: f32,
}

impl RetrievalResult {
    pub fn filename(&self) -> Option<&str> {
        self.chunk.filename()
    }

    pub fn from_file(&self, filename: &str) -> bool {
        self.chunk.filenames().any(|f| f == filename)
    }
}

/// Similarity search over stored chunks. Embedding happens behind this trait.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, query: &str, top_k: u64) -> Result<Vec<RetrievalResult>>;

    /// Store the chunks of one document; returns how many were written.
    async fn upsert(&self, document_key: &str, chunks: &[Chunk]) -> Result<usize>;

    /// Drop everything stored in the index.
    async fn reset(&self) -> Result<()>;

    /// Delete stored chunks that [`is_stale`] against `live`; returns how
    /// many were removed.
    async fn prune(&self, live: &LiveDocuments) -> Result<usize>;
}

/// Chunk count per document key after an ingest run. `None` keeps every
/// stored chunk of that document (its file exists but failed to ingest).
pub type LiveDocuments = HashMap<String, Option<usize>>;

/// A stored chunk is stale when its document is gone or its position lies
/// past the document's current chunk count. Chunks without a key are stale.
pub fn is_stale(live: &LiveDocuments, document_key: Option<&str>, position: Option<usize>) -> bool {
    let Some(key) = document_key else {
        return true;
    };
    match live.get(key) {
        None => true,
        Some(None) => false,
        Some(Some(count)) => position.map_or(true, |p| p >= *count),
    }
}

/// Sort by score, highest first. Equal scores keep the index's order.
pub fn rank(mut results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

/// Keep the results whose provenance includes `filename`. When nothing
/// matches, the input is returned untouched.
pub fn filter_by_filename(results: Vec<RetrievalResult>, filename: &str) -> Vec<RetrievalResult> {
    if !results.iter().any(|r| r.from_file(filename)) {
        tracing::info!(
            filename,
            "No results from requested file, keeping all {} results",
            results.len()
        );
        return results;
    }
    results.into_iter().filter(|r| r.from_file(filename)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Coordinates, ElementCategory, LayoutElement};

    fn result(filename: &str, score: f32) -> RetrievalResult {
        let element = LayoutElement::new(
            format!("{}-{}", filename, score),
            ElementCategory::NarrativeText,
            format!("from {}", filename),
            1,
            Coordinates::page_relative(0.0, 0.0, 10.0, 10.0),
        )
        .with_filename(filename);
        RetrievalResult {
            chunk: Chunk {
                text: element.text.clone(),
                source_elements: vec![element],
                page_number: 1,
            },
            score,
        }
    }

    fn scores(results: &[RetrievalResult]) -> Vec<f32> {
        results.iter().map(|r| r.score).collect()
    }

    #[test]
    fn test_rank_and_filter() {
        let found = vec![result("a.pdf", 0.2), result("b.pdf", 0.9), result("a.pdf", 0.5)];
        let ranked = rank(found);
        assert_eq!(scores(&ranked), vec![0.9, 0.5, 0.2]);

        let only_a = filter_by_filename(ranked.clone(), "a.pdf");
        assert_eq!(scores(&only_a), vec![0.5, 0.2]);

        let fallback = filter_by_filename(ranked, "c.pdf");
        assert_eq!(scores(&fallback), vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let ranked = rank(vec![result("x.pdf", 0.5), result("y.pdf", 0.5), result("z.pdf", 0.7)]);
        let files: Vec<_> = ranked.iter().filter_map(|r| r.filename()).collect();
        assert_eq!(files, vec!["z.pdf", "x.pdf", "y.pdf"]);
    }

    #[test]
    fn test_filter_on_empty_results() {
        assert!(filter_by_filename(Vec::new(), "a.pdf").is_empty());
    }

    #[test]
    fn test_stale_chunks() {
        let live: LiveDocuments = [("a".to_string(), Some(2)), ("b".to_string(), None)].into();
        assert!(!is_stale(&live, Some("a"), Some(1)));
        assert!(is_stale(&live, Some("a"), Some(2)));
        assert!(is_stale(&live, Some("a"), None));
        assert!(!is_stale(&live, Some("b"), Some(40)));
        assert!(is_stale(&live, Some("gone"), Some(0)));
        assert!(is_stale(&live, None, Some(0)));
    }

    #[test]
    fn test_any_source_element_counts() {
        let mut mixed = result("a.pdf", 0.4);
        let mut other = mixed.chunk.source_elements[0].clone();
        other.metadata.filename = "b.pdf".to_string();
        mixed.chunk.source_elements.push(other);
        assert!(mixed.from_file("b.pdf"));
        assert_eq!(mixed.filename(), Some("a.pdf"));
    }
}
