use serde::{Deserialize, Serialize};

// Chat completion wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

// HTTP request/response bodies

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantRequest {
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub demo_name: Option<String>,
    /// Drop the collection before ingesting.
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub demo_name: Option<String>,
    /// PDF filename results should come from, when available.
    #[serde(default)]
    pub guidelines: Option<String>,
    #[serde(default)]
    pub top_k: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportingDoc {
    pub full_text: String,
    /// Base64-encoded JPEG, when a page image is available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub supporting_docs: Vec<SupportingDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupResponse {
    pub status: String,
    pub tenant: String,
    pub collection: String,
    pub total_files: usize,
    pub total_chunks: usize,
    pub failed_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
