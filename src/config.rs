//! Service settings and the per-demo catalog.
//!
//! Service settings come from the environment on top of built-in defaults.
//! Demo settings are looked up in the YAML catalog first, then in the
//! environment, then fall back to a default where one exists.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{RagError, Result};
use crate::filters::DEFAULT_ANNOTATION_THRESHOLD;
use crate::indexer::chunker::{DEFAULT_STRIDE, DEFAULT_WINDOW};
use crate::indexer::{ChunkingOptions, WindowSpec};
use crate::rag::prompt::{PromptTemplate, DEFAULT_PROMPT_TEMPLATE};
use crate::registry::TenantKey;

pub const DEFAULT_DEMO_TOP_K: u64 = 7;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub qdrant_url: String,
    pub llm_base_url: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    pub default_chat_model: String,
    pub embedding_model_dir: PathBuf,
    pub embedding_dimensions: u64,
    pub demo_config_path: PathBuf,
    /// Result count for the single-tenant query route.
    pub default_top_k: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::build(Environment::default())
    }

    /// Same as [`AppConfig::load`] but reads variables from `vars`.
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::build(Environment::default().source(Some(vars)))
    }

    fn build(env: Environment) -> Result<Self> {
        let config = Config::builder()
            .set_default("bind_addr", "0.0.0.0:8080")
            .and_then(|b| b.set_default("qdrant_url", "http://localhost:6334"))
            .and_then(|b| b.set_default("llm_base_url", "http://localhost:4000"))
            .and_then(|b| b.set_default("default_chat_model", "gpt-4o-mini"))
            .and_then(|b| b.set_default("embedding_model_dir", "models/all-MiniLM-L6-v2"))
            .and_then(|b| b.set_default("embedding_dimensions", 384_i64))
            .and_then(|b| b.set_default("demo_config_path", "config.yaml"))
            .and_then(|b| b.set_default("default_top_k", 5_i64))
            .map_err(|e| RagError::Config(e.to_string()))?
            .add_source(env.try_parsing(true))
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| RagError::Config(e.to_string()))
    }
}

/// Current process environment, for [`DemoCatalog::resolve`].
pub fn env_snapshot() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Fully resolved settings for one tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub tenant: TenantKey,
    pub pdf_folder: PathBuf,
    pub layout_folder: PathBuf,
    pub pdf_images_folder: Option<PathBuf>,
    pub collection: String,
    pub chat_completion_model: String,
    pub top_k: u64,
    pub chunking: ChunkingOptions,
    pub prompt_template: String,
}

/// The YAML catalog, `industry -> demo_name -> settings`, plus `hosting`.
#[derive(Debug, Clone, Default)]
pub struct DemoCatalog {
    root: JsonMap<String, JsonValue>,
}

/// Case-insensitive key lookup; the config crate may lowercase keys.
fn get_key<'a>(map: &'a JsonMap<String, JsonValue>, key: &str) -> Option<&'a JsonValue> {
    map.get(key)
        .or_else(|| map.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))
}

impl DemoCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Demo config not found, only the default tenant is available");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Yaml))
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;
        let value: JsonValue = config
            .try_deserialize()
            .map_err(|e| RagError::Config(e.to_string()))?;

        Ok(Self {
            root: match value {
                JsonValue::Object(map) => map,
                _ => JsonMap::new(),
            },
        })
    }

    pub fn section(&self, tenant: &TenantKey) -> Option<&JsonMap<String, JsonValue>> {
        get_key(&self.root, &tenant.industry)?
            .as_object()
            .and_then(|demos| get_key(demos, &tenant.demo_name))
            .and_then(JsonValue::as_object)
    }

    /// CORS origins from `hosting.origins.local` and `hosting.origins.prod`.
    pub fn origins(&self) -> Vec<String> {
        let Some(origins) = get_key(&self.root, "hosting")
            .and_then(JsonValue::as_object)
            .and_then(|h| get_key(h, "origins"))
            .and_then(JsonValue::as_object)
        else {
            return Vec::new();
        };

        ["local", "prod"]
            .iter()
            .filter_map(|env| get_key(origins, env).and_then(JsonValue::as_array))
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    pub fn resolve(&self, tenant: &TenantKey, env: &HashMap<String, String>) -> Result<DemoConfig> {
        let section = self.section(tenant);
        if section.is_none() && !tenant.is_default() {
            return Err(RagError::MissingDemoConfig {
                industry: tenant.industry.clone(),
                demo_name: tenant.demo_name.clone(),
            });
        }
        let settings = LayeredResolver { section, env };

        let pdf_folder = PathBuf::from(settings.required("pdf_folder", "PDF_FOLDER")?);
        let layout_folder = match settings.lookup("layout_folder", "LAYOUT_FOLDER") {
            Some(dir) if dir.trim().is_empty() => {
                return Err(RagError::Config("Setting 'layout_folder' must not be empty".to_string()))
            }
            Some(dir) => PathBuf::from(dir),
            None => pdf_folder.clone(),
        };
        let pdf_images_folder = settings
            .lookup("pdf_images_folder", "PDF_IMAGES_FOLDER")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        let collection = settings
            .lookup("collection", "COLLECTION_NAME")
            .unwrap_or_else(|| format!("{}_{}_chunks", tenant.industry, tenant.demo_name));
        let chat_completion_model = settings.required("chat_completion_model", "CHAT_COMPLETION_MODEL")?;

        let window = WindowSpec::new(
            settings.parsed("chunk_stride", "CHUNK_STRIDE", DEFAULT_STRIDE)?,
            settings.parsed("chunk_window", "CHUNK_WINDOW", DEFAULT_WINDOW)?,
        )?;
        let annotation_threshold =
            settings.parsed("annotation_threshold", "ANNOTATION_THRESHOLD", DEFAULT_ANNOTATION_THRESHOLD)?;
        if !(0.0..=1.0).contains(&annotation_threshold) {
            return Err(RagError::Config(format!(
                "annotation_threshold must be within 0..=1, got {}",
                annotation_threshold
            )));
        }

        let prompt_template = settings
            .lookup("prompt_template", "PROMPT_TEMPLATE")
            .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string());
        PromptTemplate::new(prompt_template.as_str())?;

        Ok(DemoConfig {
            tenant: tenant.clone(),
            pdf_folder,
            layout_folder,
            pdf_images_folder,
            collection,
            chat_completion_model,
            top_k: settings.parsed("top_k", "TOP_K", DEFAULT_DEMO_TOP_K)?,
            chunking: ChunkingOptions {
                window,
                annotation_threshold,
            },
            prompt_template,
        })
    }
}

/// Demo section first, then environment. A present non-null value in the
/// section wins even when it is empty, zero or false.
pub struct LayeredResolver<'a> {
    section: Option<&'a JsonMap<String, JsonValue>>,
    env: &'a HashMap<String, String>,
}

impl<'a> LayeredResolver<'a> {
    pub fn new(section: Option<&'a JsonMap<String, JsonValue>>, env: &'a HashMap<String, String>) -> Self {
        Self { section, env }
    }

    pub fn lookup(&self, key: &str, env_var: &str) -> Option<String> {
        match self.section.and_then(|s| get_key(s, key)) {
            None | Some(JsonValue::Null) => self.env.get(env_var).cloned(),
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    pub fn required(&self, key: &str, env_var: &str) -> Result<String> {
        match self.lookup(key, env_var) {
            None => Err(RagError::MissingSetting {
                key: key.to_string(),
                env_var: env_var.to_string(),
            }),
            Some(value) if value.trim().is_empty() => {
                Err(RagError::Config(format!("Setting '{}' must not be empty", key)))
            }
            Some(value) => Ok(value),
        }
    }

    pub fn parsed<T: FromStr>(&self, key: &str, env_var: &str, default: T) -> Result<T> {
        match self.lookup(key, env_var) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| RagError::Config(format!("Invalid value for '{}': {:?}", key, raw))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
hosting:
  origins:
    local:
      - http://localhost:3000
    prod:
      - https://demo.example.com
insurance:
  claims:
    pdf_folder: /data/claims
    chat_completion_model: gpt-4o
    top_k: 0
    pdf_images_folder: /data/claims-images
    chunk_stride: 3
    chunk_window: 6
retail:
  returns:
    pdf_folder: ""
    chat_completion_model: gpt-4o
  manuals:
    pdf_folder: /data/manuals
    top_k: null
"#;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn catalog() -> DemoCatalog {
        DemoCatalog::from_yaml_str(CATALOG).unwrap()
    }

    #[test]
    fn test_demo_section_wins_over_env() {
        let vars = env(&[("TOP_K", "9"), ("PDF_FOLDER", "/env/pdfs"), ("COLLECTION_NAME", "shared")]);
        let demo = catalog().resolve(&TenantKey::new("insurance", "claims"), &vars).unwrap();

        assert_eq!(demo.pdf_folder, PathBuf::from("/data/claims"));
        assert_eq!(demo.layout_folder, PathBuf::from("/data/claims"));
        assert_eq!(demo.top_k, 0);
        assert_eq!(demo.collection, "shared");
        assert_eq!(demo.pdf_images_folder, Some(PathBuf::from("/data/claims-images")));
        assert_eq!(demo.chunking.window, WindowSpec::new(3, 6).unwrap());
        assert_eq!(demo.prompt_template, DEFAULT_PROMPT_TEMPLATE);
    }

    #[test]
    fn test_null_falls_through_to_env_then_default() {
        let vars = env(&[("CHAT_COMPLETION_MODEL", "llama3")]);
        let demo = catalog().resolve(&TenantKey::new("retail", "manuals"), &vars).unwrap();
        assert_eq!(demo.chat_completion_model, "llama3");
        assert_eq!(demo.top_k, DEFAULT_DEMO_TOP_K);
        assert_eq!(demo.collection, "retail_manuals_chunks");

        let vars = env(&[("CHAT_COMPLETION_MODEL", "llama3"), ("TOP_K", "4")]);
        let demo = catalog().resolve(&TenantKey::new("retail", "manuals"), &vars).unwrap();
        assert_eq!(demo.top_k, 4);
    }

    #[test]
    fn test_empty_required_setting_is_config_error() {
        let vars = env(&[("PDF_FOLDER", "/env/pdfs")]);
        let err = catalog().resolve(&TenantKey::new("retail", "returns"), &vars).unwrap_err();
        assert!(matches!(err, RagError::Config(ref m) if m.contains("pdf_folder")));
    }

    #[test]
    fn test_missing_required_setting() {
        let err = catalog().resolve(&TenantKey::new("retail", "manuals"), &env(&[])).unwrap_err();
        assert!(matches!(err, RagError::MissingSetting { ref env_var, .. } if env_var == "CHAT_COMPLETION_MODEL"));
    }

    #[test]
    fn test_unknown_tenant() {
        let err = catalog().resolve(&TenantKey::new("energy", "grid"), &env(&[])).unwrap_err();
        assert!(matches!(err, RagError::MissingDemoConfig { .. }));
        assert!(err.is_config());
    }

    #[test]
    fn test_default_tenant_from_env_only() {
        let vars = env(&[
            ("PDF_FOLDER", "/srv/pdfs"),
            ("LAYOUT_FOLDER", "/srv/layout"),
            ("CHAT_COMPLETION_MODEL", "gpt-4o-mini"),
            ("ANNOTATION_THRESHOLD", "0.3"),
            ("PROMPT_TEMPLATE", "{context} => {query}"),
        ]);
        let demo = DemoCatalog::default().resolve(&TenantKey::default_tenant(), &vars).unwrap();
        assert_eq!(demo.layout_folder, PathBuf::from("/srv/layout"));
        assert_eq!(demo.collection, "default_default_chunks");
        assert_eq!(demo.chunking.annotation_threshold, 0.3);
        assert_eq!(demo.prompt_template, "{context} => {query}");
        assert!(demo.pdf_images_folder.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = [("PDF_FOLDER", "/p"), ("CHAT_COMPLETION_MODEL", "m")];
        let cases: [(&str, &str); 4] = [
            ("TOP_K", "many"),
            ("CHUNK_STRIDE", "0"),
            ("ANNOTATION_THRESHOLD", "1.5"),
            ("PROMPT_TEMPLATE", "no slots"),
        ];
        for (var, value) in cases {
            let mut vars = env(&base);
            vars.insert(var.to_string(), value.to_string());
            let err = DemoCatalog::default().resolve(&TenantKey::default_tenant(), &vars).unwrap_err();
            assert!(err.is_config(), "{}={} gave {:?}", var, value, err);
        }
    }

    #[test]
    fn test_origins() {
        assert_eq!(
            catalog().origins(),
            vec!["http://localhost:3000".to_string(), "https://demo.example.com".to_string()]
        );
        assert!(DemoCatalog::default().origins().is_empty());
    }

    #[test]
    fn test_missing_catalog_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = DemoCatalog::load(&dir.path().join("absent.yaml")).unwrap();
        assert!(catalog.section(&TenantKey::new("insurance", "claims")).is_none());
    }

    #[test]
    fn test_catalog_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, CATALOG).unwrap();
        let catalog = DemoCatalog::load(&path).unwrap();
        assert!(catalog.section(&TenantKey::new("insurance", "claims")).is_some());
    }

    #[test]
    fn test_app_config_defaults_and_overrides() {
        let config = AppConfig::from_env_map(HashMap::new()).unwrap();
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.embedding_dimensions, 384);
        assert!(config.llm_api_key.is_none());

        let config = AppConfig::from_env_map(env(&[
            ("QDRANT_URL", "http://qdrant:6334"),
            ("DEFAULT_TOP_K", "3"),
            ("LLM_API_KEY", "sk-local"),
        ]))
        .unwrap();
        assert_eq!(config.qdrant_url, "http://qdrant:6334");
        assert_eq!(config.default_top_k, 3);
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-local"));
    }
}
