pub mod completion;
pub mod embeddings;
pub mod index;
pub mod index_manager;
pub mod processor;
pub mod prompt;
pub mod vector_store;

use std::sync::Arc;

use crate::error::Result;
use self::completion::LanguageModel;
use self::index::{filter_by_filename, rank, RetrievalResult, VectorIndex};
use self::processor::{ImageProcessor, SupportingImages};
use self::prompt::PromptTemplate;

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub struct RagAnswer {
    pub answer: String,
    pub docs: Vec<RetrievalResult>,
    /// Present only when formatting was requested and a processor is configured.
    pub images: Option<SupportingImages>,
}

/// Retrieval-augmented answering over one vector index.
pub struct Rag {
    llm: Arc<dyn LanguageModel>,
    index: Arc<dyn VectorIndex>,
    prompt: PromptTemplate,
    processor: Option<Arc<dyn ImageProcessor>>,
}

impl Rag {
    pub fn new(llm: Arc<dyn LanguageModel>, index: Arc<dyn VectorIndex>, template: &str) -> Result<Self> {
        Ok(Self {
            llm,
            index,
            prompt: PromptTemplate::new(template)?,
            processor: None,
        })
    }

    pub fn with_processor(mut self, processor: Arc<dyn ImageProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Search, rank by score and, when `pdf_filename` is given, narrow to
    /// chunks from that file (unless none are).
    pub async fn vector_search(
        &self,
        query: &str,
        pdf_filename: Option<&str>,
        top_k: u64,
    ) -> Result<Vec<RetrievalResult>> {
        let results = self.index.search(query, top_k).await?;
        if results.is_empty() {
            return Ok(results);
        }

        let ranked = rank(results);
        Ok(match pdf_filename {
            Some(filename) => filter_by_filename(ranked, filename),
            None => ranked,
        })
    }

    pub async fn predict(
        &self,
        query: &str,
        pdf_filename: Option<&str>,
        top_k: u64,
        format_result: bool,
    ) -> Result<RagAnswer> {
        let docs = self.vector_search(query, pdf_filename, top_k).await?;
        tracing::info!(results = docs.len(), top_k, "Retrieved context");

        let prompt = self.prompt.render(&build_context(&docs), query);
        let answer = self.llm.complete(&prompt).await?;

        let images = match (&self.processor, format_result) {
            (Some(processor), true) => Some(processor.annotate(&docs, &answer)),
            _ => None,
        };

        Ok(RagAnswer { answer, docs, images })
    }
}

pub fn build_context(docs: &[RetrievalResult]) -> String {
    docs.iter()
        .map(|d| d.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
