use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{AppConfig, DemoConfig};
use crate::error::{RagError, Result};
use crate::layout::JsonLayoutParser;
use crate::rag::completion::{ChatCompletionClient, LanguageModel};
use crate::rag::embeddings::EmbeddingGenerator;
use crate::rag::index::VectorIndex;
use crate::rag::index_manager::IndexManager;
use crate::rag::processor::PageImageProcessor;
use crate::rag::vector_store::QdrantIndex;
use crate::rag::Rag;
use crate::registry::{TenantKey, TenantPipeline, TenantRegistry};

/// Tenants whose collection is being rebuilt or cleaned. Shared by every
/// request so a second setup of the same tenant is refused.
#[derive(Clone, Default)]
pub struct IngestLocks {
    busy: Arc<Mutex<HashSet<TenantKey>>>,
}

impl IngestLocks {
    pub fn try_begin(&self, tenant: &TenantKey) -> Result<IngestTicket> {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(tenant.clone()) {
            tracing::warn!(tenant = %tenant, "Ingest already running");
            return Err(RagError::IngestInProgress);
        }
        Ok(IngestTicket {
            busy: Arc::clone(&self.busy),
            tenant: tenant.clone(),
        })
    }

    pub fn is_busy(&self, tenant: &TenantKey) -> bool {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner).contains(tenant)
    }
}

/// Releases the tenant's lock when dropped.
pub struct IngestTicket {
    busy: Arc<Mutex<HashSet<TenantKey>>>,
    tenant: TenantKey,
}

impl Drop for IngestTicket {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.tenant);
    }
}

/// Process-wide collaborators shared by every tenant.
#[derive(Clone)]
pub struct SharedServices {
    pub app: AppConfig,
    /// `None` when the model failed to load; setup is refused until restart.
    pub embeddings: Option<Arc<EmbeddingGenerator>>,
    pub llm: ChatCompletionClient,
    pub ingest_locks: IngestLocks,
}

impl SharedServices {
    pub fn new(app: AppConfig, embeddings: Option<Arc<EmbeddingGenerator>>) -> Self {
        let llm = ChatCompletionClient::new(
            app.llm_base_url.clone(),
            app.llm_api_key.clone(),
            app.default_chat_model.clone(),
        );
        Self {
            app,
            embeddings,
            llm,
            ingest_locks: IngestLocks::default(),
        }
    }

    pub async fn connect_index(&self, demo: &DemoConfig) -> Result<QdrantIndex> {
        let embeddings = self
            .embeddings
            .clone()
            .ok_or_else(|| RagError::Embedding("Embedding model is not loaded".to_string()))?;
        QdrantIndex::connect(
            &self.app.qdrant_url,
            &demo.collection,
            self.app.embedding_dimensions,
            embeddings,
        )
        .await
    }
}

/// Connect the tenant's collection, ingest its PDFs and wire the model.
pub async fn build_tenant(services: &SharedServices, demo: DemoConfig, reset: bool) -> Result<TenantPipeline> {
    // Refuse early, before connecting to the collection.
    if services.ingest_locks.is_busy(&demo.tenant) {
        return Err(RagError::IngestInProgress);
    }
    let index: Arc<dyn VectorIndex> = Arc::new(services.connect_index(&demo).await?);
    let llm: Arc<dyn LanguageModel> = Arc::new(services.llm.with_model(demo.chat_completion_model.clone()));
    assemble_tenant(demo, index, llm, reset, &services.ingest_locks).await
}

/// Reset the tenant's collection, then drop it from the registry. A failed
/// reset leaves the tenant registered and queryable.
pub async fn clean_tenant<T>(
    registry: &TenantRegistry<T>,
    locks: &IngestLocks,
    tenant: &TenantKey,
    index: Arc<dyn VectorIndex>,
) -> Result<()> {
    let _ticket = locks.try_begin(tenant)?;
    index.reset().await?;
    registry.evict(tenant).await;
    tracing::info!(tenant = %tenant, "Collection cleaned");
    Ok(())
}

/// Reset, ingest and wire one tenant while holding its ingest lock.
pub async fn assemble_tenant(
    demo: DemoConfig,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LanguageModel>,
    reset: bool,
    locks: &IngestLocks,
) -> Result<TenantPipeline> {
    let _ticket = locks.try_begin(&demo.tenant)?;
    tracing::info!(tenant = %demo.tenant, collection = %demo.collection, reset, "Setting up tenant");

    if reset {
        index.reset().await?;
    }

    let parser = Arc::new(JsonLayoutParser::new(demo.layout_folder.clone()));
    let manager = IndexManager::new(demo.pdf_folder.clone(), parser, Arc::clone(&index), demo.chunking);
    let report = manager.run_index().await?;

    let mut rag = Rag::new(llm, index, &demo.prompt_template)?;
    if let Some(images) = &demo.pdf_images_folder {
        rag = rag.with_processor(Arc::new(PageImageProcessor::new(images.clone())));
    }

    tracing::info!(
        tenant = %demo.tenant,
        files = report.total_files,
        chunks = report.total_chunks,
        failed = report.failed_files.len(),
        "Tenant ready"
    );

    Ok(TenantPipeline {
        config: demo,
        rag,
        report,
    })
}
