use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::DemoConfig;
use crate::error::{RagError, Result};
use crate::models::QueryRequest;
use crate::rag::index_manager::IngestStatus;
use crate::rag::Rag;

pub const DEFAULT_TENANT: &str = "default";

/// Identifies one demo deployment: `industry/demo_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantKey {
    pub industry: String,
    pub demo_name: String,
}

impl TenantKey {
    pub fn new(industry: impl Into<String>, demo_name: impl Into<String>) -> Self {
        Self {
            industry: industry.into(),
            demo_name: demo_name.into(),
        }
    }

    /// Tenant served by the single-tenant routes.
    pub fn default_tenant() -> Self {
        Self::new(DEFAULT_TENANT, DEFAULT_TENANT)
    }

    pub fn is_default(&self) -> bool {
        self.industry == DEFAULT_TENANT && self.demo_name == DEFAULT_TENANT
    }

    /// Both parts given selects that tenant; anything else is the default.
    pub fn from_parts(industry: Option<&str>, demo_name: Option<&str>) -> Self {
        match (industry, demo_name) {
            (Some(i), Some(d)) if !i.is_empty() && !d.is_empty() => Self::new(i, d),
            _ => Self::default_tenant(),
        }
    }

    /// Route that sets this tenant up.
    pub fn setup_route(&self) -> &'static str {
        if self.is_default() {
            "/setupdb"
        } else {
            "/setuprag"
        }
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.industry, self.demo_name)
    }
}

/// Retrieval settings for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub top_k: u64,
    /// Provenance filter; only tenant queries carry one.
    pub pdf_filename: Option<String>,
}

/// The default tenant uses the service `default_top_k` and never filters.
/// Other tenants use their own `top_k` and treat non-empty `guidelines` as
/// the PDF filename to prefer. A `top_k` in the request overrides both.
pub fn query_plan(
    tenant: &TenantKey,
    request: &QueryRequest,
    demo: &DemoConfig,
    default_top_k: u64,
) -> QueryPlan {
    let (top_k, pdf_filename) = if tenant.is_default() {
        (default_top_k, None)
    } else {
        let filename = request.guidelines.as_deref().filter(|g| !g.is_empty());
        (demo.top_k, filename.map(str::to_string))
    };
    QueryPlan {
        top_k: request.top_k.unwrap_or(top_k),
        pdf_filename,
    }
}

/// A tenant that has been set up and can answer queries.
pub struct TenantPipeline {
    pub config: DemoConfig,
    pub rag: Rag,
    pub report: IngestStatus,
}

pub struct TenantRegistry<T = TenantPipeline> {
    tenants: RwLock<HashMap<TenantKey, Arc<T>>>,
}

impl<T> Default for TenantRegistry<T> {
    fn default() -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> TenantRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &TenantKey) -> Option<Arc<T>> {
        self.tenants.read().await.get(key).cloned()
    }

    /// Returns the entry it replaced, if any.
    pub async fn insert(&self, key: TenantKey, value: T) -> Option<Arc<T>> {
        self.tenants.write().await.insert(key, Arc::new(value))
    }

    /// The tenant's entry, or [`RagError::TenantNotReady`] naming the route
    /// that sets it up.
    pub async fn ready(&self, key: &TenantKey) -> Result<Arc<T>> {
        self.get(key).await.ok_or_else(|| RagError::TenantNotReady {
            tenant: key.to_string(),
            route: key.setup_route().to_string(),
        })
    }

    pub async fn evict(&self, key: &TenantKey) -> Option<Arc<T>> {
        self.tenants.write().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.tenants.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tenants.read().await.is_empty()
    }
}
