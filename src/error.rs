use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No demo configuration for {industry}/{demo_name}")]
    MissingDemoConfig { industry: String, demo_name: String },

    #[error("Missing setting '{key}' (set it in the demo config or via {env_var})")]
    MissingSetting { key: String, env_var: String },

    #[error("Invalid prompt template: {0}")]
    InvalidPromptTemplate(String),

    #[error("Invalid chunk window: stride={stride}, window={window}")]
    InvalidWindow { stride: usize, window: usize },

    #[error("Layout error ({}): {message}", path.display())]
    Layout { path: PathBuf, message: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index error ({collection}): {message}")]
    VectorIndex { collection: String, message: String },

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("Ingestion already in progress")]
    IngestInProgress,

    #[error("{tenant} is not set up yet, call {route} first")]
    TenantNotReady { tenant: String, route: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    /// True for errors caused by bad settings rather than a failing collaborator.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::MissingDemoConfig { .. }
                | Self::MissingSetting { .. }
                | Self::InvalidPromptTemplate(_)
                | Self::InvalidWindow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
