use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, VectorParamsBuilder,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    ScrollPointsBuilder, PointsIdsList, PointId, DeletePointsBuilder,
};
use serde_json::{Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

use super::embeddings::EmbeddingGenerator;
use super::index::{is_stale, LiveDocuments, RetrievalResult, VectorIndex};
use crate::error::{RagError, Result};
use crate::indexer::Chunk;

const EMBED_BATCH_SIZE: usize = 32;

pub struct VectorStore {
    client: Qdrant,
    collection_name: String,
    dimensions: u64,
}

impl VectorStore {
    pub async fn new(url: &str, collection_name: &str, dimensions: u64) -> Result<Self> {
        tracing::info!("Building Qdrant client for URL: {}", url);
        let client = Qdrant::from_url(url).build().map_err(|e| {
            tracing::error!("Qdrant client build failed: {:?}", e);
            RagError::VectorIndex {
                collection: collection_name.to_string(),
                message: format!("Qdrant client build failed: {}", e),
            }
        })?;

        let store = Self {
            client,
            collection_name: collection_name.to_string(),
            dimensions,
        };

        store.ensure_collection().await?;
        tracing::info!(collection = collection_name, "Qdrant collection ready");

        Ok(store)
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn error(&self, e: impl std::fmt::Display) -> RagError {
        RagError::VectorIndex {
            collection: self.collection_name.clone(),
            message: e.to_string(),
        }
    }

    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection_name)
            .await
            .map_err(|e| self.error(e))?;
        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name)
                        .vectors_config(VectorParamsBuilder::new(self.dimensions, Distance::Cosine)),
                )
                .await
                .map_err(|e| self.error(e))?;
        }
        Ok(())
    }

    pub async fn recreate(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection_name)
            .await
            .map_err(|e| self.error(e))?;
        if exists {
            self.client
                .delete_collection(&self.collection_name)
                .await
                .map_err(|e| self.error(e))?;
            tracing::info!(collection = %self.collection_name, "Deleted collection");
        }
        self.ensure_collection().await
    }

    pub async fn upsert(&self, points: Vec<PointStruct>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await
            .map_err(|e| self.error(e))?;
        Ok(())
    }

    pub async fn search(&self, query_vector: Vec<f32>, limit: u64) -> Result<Vec<RetrievalResult>> {
        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, query_vector, limit)
                    .with_payload(true),
            )
            .await
            .map_err(|e| self.error(e))?;

        let mut results = Vec::new();
        for point in search_result.result {
            let Some(raw) = point.payload.get("chunk").and_then(|v| v.as_str()) else {
                tracing::warn!(collection = %self.collection_name, "Skipping point without chunk payload");
                continue;
            };
            let chunk: Chunk = serde_json::from_str(raw)?;
            results.push(RetrievalResult {
                chunk,
                score: point.score,
            });
        }

        Ok(results)
    }

    /// Every point id with its document key and position, if recorded.
    pub async fn scroll_point_keys(&self) -> Result<Vec<(PointId, Option<String>, Option<usize>)>> {
        let mut keys = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection_name)
                .limit(256)
                .with_payload(true)
                .with_vectors(false);

            if let Some(ref off) = offset {
                builder = builder.offset(off.clone());
            }

            let result = self.client.scroll(builder).await.map_err(|e| self.error(e))?;

            for point in result.result {
                let Some(id) = point.id else {
                    continue;
                };
                let document_key = point
                    .payload
                    .get("document_key")
                    .and_then(|v| v.as_str())
                    .cloned();
                let position = point
                    .payload
                    .get("position")
                    .and_then(|v| v.as_integer())
                    .and_then(|p| usize::try_from(p).ok());
                keys.push((id, document_key, position));
            }

            offset = result.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(keys)
    }

    pub async fn delete_points(&self, ids: Vec<PointId>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(PointsIdsList { ids })
                    .wait(true),
            )
            .await
            .map_err(|e| self.error(e))?;

        Ok(())
    }
}

/// Point ids are stable per document and position, so re-ingesting a file
/// overwrites its previous points.
pub fn point_id(document_key: &str, position: usize) -> String {
    let name = format!("{}_{}", document_key, position);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn chunk_payload(
    document_key: &str,
    position: usize,
    chunk: &Chunk,
) -> Result<JsonMap<String, JsonValue>> {
    let mut payload_map = JsonMap::new();
    payload_map.insert("document_key".to_string(), JsonValue::String(document_key.to_string()));
    payload_map.insert("position".to_string(), JsonValue::from(position));
    payload_map.insert("text".to_string(), JsonValue::String(chunk.text.clone()));
    payload_map.insert(
        "filename".to_string(),
        JsonValue::String(chunk.filename().unwrap_or_default().to_string()),
    );
    payload_map.insert("page_number".to_string(), JsonValue::from(chunk.page_number));
    payload_map.insert("chunk".to_string(), JsonValue::String(serde_json::to_string(chunk)?));
    Ok(payload_map)
}

/// Local embedding model in front of a Qdrant collection.
pub struct QdrantIndex {
    embeddings: Arc<EmbeddingGenerator>,
    store: VectorStore,
}

impl QdrantIndex {
    pub async fn connect(
        url: &str,
        collection_name: &str,
        dimensions: u64,
        embeddings: Arc<EmbeddingGenerator>,
    ) -> Result<Self> {
        let store = VectorStore::new(url, collection_name, dimensions).await?;
        Ok(Self { embeddings, store })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(&self, query: &str, top_k: u64) -> Result<Vec<RetrievalResult>> {
        let embeddings = Arc::clone(&self.embeddings);
        let query = query.to_string();
        let query_embedding = blocking_embed(move || embeddings.generate_single(&query)).await?;
        self.store.search(query_embedding, top_k).await
    }

    async fn upsert(&self, document_key: &str, chunks: &[Chunk]) -> Result<usize> {
        let mut position = 0usize;
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = Arc::clone(&self.embeddings);
            let embeddings_batch = blocking_embed(move || embeddings.generate(texts)).await?;

            let mut points = Vec::with_capacity(batch.len());
            for (chunk, embedding) in batch.iter().zip(embeddings_batch.into_iter()) {
                points.push(PointStruct::new(
                    point_id(document_key, position),
                    embedding,
                    chunk_payload(document_key, position, chunk)?,
                ));
                position += 1;
            }
            self.store.upsert(points).await?;
        }

        tracing::debug!(
            collection = %self.store.collection_name(),
            document_key,
            chunks = position,
            "Upserted chunks"
        );
        Ok(position)
    }

    async fn reset(&self) -> Result<()> {
        self.store.recreate().await
    }

    async fn prune(&self, live: &LiveDocuments) -> Result<usize> {
        let stale: Vec<PointId> = self
            .store
            .scroll_point_keys()
            .await?
            .into_iter()
            .filter(|(_, key, position)| is_stale(live, key.as_deref(), *position))
            .map(|(id, _, _)| id)
            .collect();

        let removed = stale.len();
        if removed > 0 {
            tracing::info!(
                collection = %self.store.collection_name(),
                "Cleaning up {} stale points",
                removed
            );
            self.store.delete_points(stale).await?;
        }
        Ok(removed)
    }
}

/// ONNX inference is CPU bound; keep it off the async workers.
async fn blocking_embed<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Coordinates, ElementCategory, LayoutElement};

    #[test]
    fn test_point_ids_are_stable_uuids() {
        let a = point_id("4f2a9c01d3e5b7a8", 3);
        assert_eq!(a, point_id("4f2a9c01d3e5b7a8", 3));
        assert_ne!(a, point_id("4f2a9c01d3e5b7a8", 4));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn test_blocking_embed_reports_crashes() {
        let vector = blocking_embed(|| Ok(vec![0.5f32, 0.25])).await.unwrap();
        assert_eq!(vector, vec![0.5, 0.25]);

        let crashed = blocking_embed(|| -> Result<Vec<f32>> { panic!("onnx crashed") }).await;
        assert!(matches!(crashed, Err(RagError::Embedding(_))));
    }

    #[test]
    fn test_payload_round_trips_chunk() {
        let element = LayoutElement::new(
            "e1",
            ElementCategory::NarrativeText,
            "Deductible applies.",
            2,
            Coordinates::page_relative(100.0, 100.0, 900.0, 120.0),
        )
        .with_filename("policy.pdf");
        let chunk = Chunk {
            text: element.text.clone(),
            source_elements: vec![element],
            page_number: 2,
        };

        let payload = chunk_payload("4f2a9c01d3e5b7a8", 3, &chunk).unwrap();
        assert_eq!(payload["document_key"], "4f2a9c01d3e5b7a8");
        assert_eq!(payload["position"], 3);
        assert_eq!(payload["filename"], "policy.pdf");
        assert_eq!(payload["page_number"], 2);
        let stored: Chunk = serde_json::from_str(payload["chunk"].as_str().unwrap()).unwrap();
        assert_eq!(stored, chunk);
    }
}
