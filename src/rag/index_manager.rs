use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::index::{LiveDocuments, VectorIndex};
use crate::error::{RagError, Result};
use crate::indexer::{get_chunks, walker::walk_pdfs, ChunkingOptions};
use crate::layout::parser::LayoutParser;

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStatus {
    pub is_indexing: bool,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub total_files: usize,
    pub total_chunks: usize,
    /// Points of removed or shrunk documents deleted after the run.
    pub removed_chunks: usize,
    pub failed_files: Vec<String>,
    pub last_error: Option<String>,
}

/// Runs PDFs of one folder through layout parsing, chunking and the index.
pub struct IndexManager {
    status: Mutex<IngestStatus>,
    pdf_folder: PathBuf,
    parser: Arc<dyn LayoutParser>,
    index: Arc<dyn VectorIndex>,
    options: ChunkingOptions,
}

/// Stable key for a document: first 8 bytes of the path's SHA-256, hex.
pub fn file_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl IndexManager {
    pub fn new(
        pdf_folder: PathBuf,
        parser: Arc<dyn LayoutParser>,
        index: Arc<dyn VectorIndex>,
        options: ChunkingOptions,
    ) -> Self {
        Self {
            status: Mutex::new(IngestStatus::default()),
            pdf_folder,
            parser,
            index,
            options,
        }
    }

    pub fn pdf_folder(&self) -> &Path {
        &self.pdf_folder
    }

    pub async fn get_status(&self) -> IngestStatus {
        self.status.lock().await.clone()
    }

    pub fn pdf_files(&self) -> Vec<PathBuf> {
        walk_pdfs(&self.pdf_folder)
    }

    pub async fn run_index(&self) -> Result<IngestStatus> {
        {
            let mut status = self.status.lock().await;
            if status.is_indexing {
                return Err(RagError::IngestInProgress);
            }
            status.is_indexing = true;
            status.last_error = None;
            status.failed_files.clear();
        }

        // Panics must not leave is_indexing stuck at true.
        let result = std::panic::AssertUnwindSafe(self.do_index())
            .catch_unwind()
            .await;

        let mut status = self.status.lock().await;
        status.is_indexing = false;
        match result {
            Ok(Ok(())) => {
                status.last_indexed_at = Some(Utc::now());
                Ok(status.clone())
            }
            Ok(Err(e)) => {
                tracing::error!(folder = %self.pdf_folder.display(), "Ingestion error: {}", e);
                status.last_error = Some(e.to_string());
                Err(e)
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    format!("Ingestion panicked: {}", s)
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    format!("Ingestion panicked: {}", s)
                } else {
                    "Ingestion panicked with unknown error".to_string()
                };
                tracing::error!("{}", panic_msg);
                status.last_error = Some(panic_msg.clone());
                Err(RagError::Ingest(panic_msg))
            }
        }
    }

    async fn do_index(&self) -> Result<()> {
        let files = self.pdf_files();
        tracing::info!("Ingesting {} PDFs from {}", files.len(), self.pdf_folder.display());

        let mut success_count = 0usize;
        let mut total_chunks = 0usize;
        let mut failed_files = Vec::new();
        let mut live = LiveDocuments::new();

        for path in &files {
            match self.process_file(path).await {
                Ok(written) => {
                    total_chunks += written;
                    success_count += 1;
                    live.insert(file_id(path), Some(written));
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), "Failed to ingest: {}", e);
                    failed_files.push(display_name(path));
                    // Keep what an earlier run stored for it.
                    live.insert(file_id(path), None);
                }
            }
        }

        // An unreadable folder must not wipe the collection.
        let removed_chunks = if self.pdf_folder.is_dir() {
            match self.index.prune(&live).await {
                Ok(removed) => removed,
                Err(e) => {
                    tracing::warn!(
                        folder = %self.pdf_folder.display(),
                        "Stale chunk cleanup failed: {}",
                        e
                    );
                    0
                }
            }
        } else {
            0
        };

        {
            let mut status = self.status.lock().await;
            status.total_files = success_count;
            status.total_chunks = total_chunks;
            status.removed_chunks = removed_chunks;
            status.failed_files = failed_files;
        }

        tracing::info!(
            "Ingestion complete: {} files, {} chunks, {} stale removed",
            success_count,
            total_chunks,
            removed_chunks
        );
        Ok(())
    }

    pub async fn process_file(&self, path: &Path) -> Result<usize> {
        let parser = Arc::clone(&self.parser);
        let options = self.options;
        let pdf = path.to_path_buf();
        let chunks = tokio::task::spawn_blocking(move || get_chunks(parser.as_ref(), &pdf, &options))
            .await
            .map_err(|e| RagError::Ingest(format!("Chunking task failed: {}", e)))??;

        if chunks.is_empty() {
            tracing::debug!(file = %path.display(), "No chunks produced");
            return Ok(0);
        }

        self.index.upsert(&file_id(path), &chunks).await
    }
}
