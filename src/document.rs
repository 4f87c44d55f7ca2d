//! Ingested documents and the acquisition boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// Where an ingested document came from. Determines the persistent
/// collection its chunks are indexed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Web,
    YouTube,
    Pdf,
    Csv,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Web => "web",
            SourceType::YouTube => "youtube",
            SourceType::Pdf => "pdf",
            SourceType::Csv => "csv",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(SourceType::Web),
            "youtube" => Ok(SourceType::YouTube),
            "pdf" => Ok(SourceType::Pdf),
            "csv" => Ok(SourceType::Csv),
            _ => Err(()),
        }
    }
}

/// An ingested document. Held only while its chunks are being indexed; the
/// index keeps the chunks, not the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub source_type: SourceType,
}

impl Document {
    pub fn new(text: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            text: text.into(),
            source_type,
        }
    }

    /// Collection name derived from the source type. Same source type, same
    /// name: re-indexing a source type always targets the same collection.
    pub fn collection_name(&self) -> String {
        format!("genius_{}", self.source_type.as_str())
    }
}

/// Boundary for source acquisition (web pages, transcripts, uploads).
/// Implementations live outside this crate; the pipeline only needs the
/// resulting [`Document`].
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self) -> Result<Document, RagError>;
}
