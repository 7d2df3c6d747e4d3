use axum::{
    Router,
    routing::{get, post},
    extract::State,
    Json,
    http::{HeaderValue, Method, StatusCode},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use anyhow::Result;
use chrono::Utc;

use pdf_rag::config::{env_snapshot, AppConfig, DemoCatalog, DemoConfig};
use pdf_rag::error::RagError;
use pdf_rag::formatting::{supporting_docs, text_docs};
use pdf_rag::logger;
use pdf_rag::models::{
    MessageResponse, QueryRequest, QueryResponse, SetupResponse, TenantRequest,
};
use pdf_rag::rag::embeddings::EmbeddingGenerator;
use pdf_rag::rag::index::VectorIndex;
use pdf_rag::registry::{query_plan, TenantKey, TenantRegistry};
use pdf_rag::setup::{build_tenant, clean_tenant, SharedServices};

type ApiError = (StatusCode, String);

struct AppState {
    catalog: DemoCatalog,
    registry: TenantRegistry,
    services: SharedServices,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logger::init();

    let app_config = AppConfig::load()?;
    tracing::info!("Connecting to Qdrant: {}", app_config.qdrant_url);
    tracing::info!("Connecting to LLM endpoint: {}", app_config.llm_base_url);

    let catalog = DemoCatalog::load(&app_config.demo_config_path)?;

    let embeddings = match EmbeddingGenerator::new(&app_config.embedding_model_dir) {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            tracing::warn!("Embedding model unavailable (setup routes disabled): {}", e);
            None
        }
    };

    let cors = cors_layer(&catalog.origins());
    let bind_addr = app_config.bind_addr.clone();

    let state = Arc::new(AppState {
        catalog,
        registry: TenantRegistry::new(),
        services: SharedServices::new(app_config, embeddings),
    });

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_check))
        .route("/cleandb", post(clean_db_handler))
        .route("/setupdb", post(setup_db_handler))
        .route("/setuprag", post(setup_rag_handler))
        .route("/querythepdf", post(query_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

fn error_response(e: RagError) -> ApiError {
    let status = match &e {
        e if e.is_config() => StatusCode::BAD_REQUEST,
        RagError::IngestInProgress => StatusCode::CONFLICT,
        RagError::Embedding(_) | RagError::TenantNotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => {
            tracing::error!("Request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

fn resolve_demo(state: &AppState, tenant: &TenantKey) -> Result<DemoConfig, ApiError> {
    state
        .catalog
        .resolve(tenant, &env_snapshot())
        .map_err(error_response)
}

async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse::new("Server is running"))
}

async fn clean_db_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TenantRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let tenant = TenantKey::from_parts(request.industry.as_deref(), request.demo_name.as_deref());

    // Reuse the live index when the tenant is set up, else connect to its collection.
    let index: Arc<dyn VectorIndex> = match state.registry.get(&tenant).await {
        Some(pipeline) => Arc::clone(pipeline.rag.index()),
        None => {
            let demo = resolve_demo(&state, &tenant)?;
            Arc::new(state.services.connect_index(&demo).await.map_err(error_response)?)
        }
    };
    clean_tenant(&state.registry, &state.services.ingest_locks, &tenant, index)
        .await
        .map_err(error_response)?;

    Ok(Json(MessageResponse::new(format!("Cleaned vector database for {}", tenant))))
}

async fn setup_tenant(
    state: &AppState,
    tenant: TenantKey,
    reset: bool,
) -> Result<Json<SetupResponse>, ApiError> {
    let demo = resolve_demo(state, &tenant)?;
    let collection = demo.collection.clone();

    let pipeline = build_tenant(&state.services, demo, reset)
        .await
        .map_err(error_response)?;
    let report = pipeline.report.clone();
    state.registry.insert(tenant.clone(), pipeline).await;

    Ok(Json(SetupResponse {
        status: "ready".to_string(),
        tenant: tenant.to_string(),
        collection,
        total_files: report.total_files,
        total_chunks: report.total_chunks,
        failed_files: report.failed_files,
    }))
}

async fn setup_db_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TenantRequest>>,
) -> Result<Json<SetupResponse>, ApiError> {
    let reset = body.map(|Json(r)| r.reset).unwrap_or(false);
    setup_tenant(&state, TenantKey::default_tenant(), reset).await
}

async fn setup_rag_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TenantRequest>,
) -> Result<Json<SetupResponse>, ApiError> {
    let (Some(industry), Some(demo_name)) = (request.industry.as_deref(), request.demo_name.as_deref())
    else {
        return Err((StatusCode::BAD_REQUEST, "industry and demo_name are required".to_string()));
    };
    setup_tenant(&state, TenantKey::new(industry, demo_name), request.reset).await
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    // 1. Pick the tenant
    let tenant = TenantKey::from_parts(request.industry.as_deref(), request.demo_name.as_deref());
    let pipeline = state.registry.ready(&tenant).await.map_err(error_response)?;

    // 2. Depth and file filter
    let plan = query_plan(&tenant, &request, &pipeline.config, state.services.app.default_top_k);

    // 3. Retrieve and answer
    let answer = pipeline
        .rag
        .predict(&request.query, plan.pdf_filename.as_deref(), plan.top_k, true)
        .await
        .map_err(|e| {
            tracing::error!(tenant = %tenant, "Prediction failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to answer the query".to_string())
        })?;

    // 4. Supporting pages
    let supporting = match answer.images {
        Some(images) => supporting_docs(images),
        None => text_docs(&answer.docs),
    };

    Ok(Json(QueryResponse {
        answer: answer.answer,
        supporting_docs: supporting,
    }))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let llm_healthy = state.services.llm.health_check().await.unwrap_or(false);

    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "services": {
            "llm": llm_healthy,
            "embeddings": state.services.embeddings.is_some(),
        },
        "tenants": state.registry.len().await,
    }))
}
