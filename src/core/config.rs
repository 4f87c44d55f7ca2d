//! Engine settings.
//!
//! Every field has a working default; a YAML settings file can override any
//! subset. The file path is resolved from `GENIUS_CONFIG_PATH` when set.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// What happens to an existing collection when a new document of the same
/// source type is indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildPolicy {
    /// Drop the persisted collection and index the new document alone.
    #[default]
    Replace,
    /// Keep existing chunks and add the new document's chunks to them.
    Accumulate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Directory holding the persistent vector index.
    pub persist_dir: PathBuf,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Number of passages returned per query.
    pub retrieval_k: usize,
    /// Relevance/diversity balance for MMR selection.
    pub mmr_lambda: f32,
    /// Rebuild behavior for an already-persisted collection.
    pub rebuild: RebuildPolicy,
    pub gateway: GatewaySettings,
}

/// Endpoint and model selection for the remote gateways.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub api_key: Option<String>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from("./vectorstore"),
            chunk_size: 800,
            chunk_overlap: 120,
            retrieval_k: 6,
            mmr_lambda: 0.5,
            rebuild: RebuildPolicy::default(),
            gateway: GatewaySettings::default(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4.1-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
        }
    }
}

impl RagSettings {
    /// Load from `GENIUS_CONFIG_PATH`, falling back to defaults when the
    /// variable is unset.
    pub fn from_env() -> Result<Self, RagError> {
        let settings = match env::var("GENIUS_CONFIG_PATH") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        Ok(settings.with_env_api_key())
    }

    /// Load from a YAML file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let settings: RagSettings = serde_yaml::from_str(&contents)
            .map_err(|e| RagError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(
                "chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }
        if self.retrieval_k == 0 {
            return Err(RagError::Config("retrieval_k must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(RagError::Config(
                "mmr_lambda must be within 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }

    fn with_env_api_key(mut self) -> Self {
        if self.gateway.api_key.is_none() {
            self.gateway.api_key = env::var("OPENAI_API_KEY").ok();
        }
        self
    }
}
