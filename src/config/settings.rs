//! Configuration settings for Blikk.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory where the extraction collaborator writes frame images.
    /// Frame record paths are resolved relative to this directory.
    pub frames_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.blikk".to_string(),
            frames_dir: "data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions. Must match the collection's vector dimension.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Vector store provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// Pinecone serverless (default).
    #[default]
    Pinecone,
    /// In-memory index. Volatile; useful for tests and local experiments.
    Memory,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pinecone" | "remote" => Ok(VectorStoreProvider::Pinecone),
            "memory" => Ok(VectorStoreProvider::Memory),
            _ => Err(format!("Unknown vector store provider: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreProvider::Pinecone => write!(f, "pinecone"),
            VectorStoreProvider::Memory => write!(f, "memory"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (pinecone, memory).
    pub provider: VectorStoreProvider,
    /// Control-plane base URL.
    pub control_url: String,
    /// API key. Falls back to the PINECONE_API_KEY environment variable.
    pub api_key: Option<String>,
    /// Cloud for serverless collections.
    pub cloud: String,
    /// Region for serverless collections.
    pub region: String,
    /// Default collection name when a request names none.
    pub index_name: String,
    /// Similarity metric for created collections.
    pub metric: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Pinecone,
            control_url: "https://api.pinecone.io".to_string(),
            api_key: None,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            index_name: "video-frames".to_string(),
            metric: "cosine".to_string(),
        }
    }
}

impl VectorStoreSettings {
    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("PINECONE_API_KEY").ok())
    }
}

/// Generation (answer synthesis) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// LLM model for answer generation.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Attach frame images to the generation call when they can be loaded.
    pub include_images: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            include_images: true,
        }
    }
}

/// Retrieval defaults for the query/analyze/overview pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Default number of matches for plain queries.
    pub query_top_k: u32,
    /// Default number of matches fed to the analyze pipeline.
    pub analyze_top_k: u32,
    /// Default number of records recovered by the overview probe.
    pub overview_top_k: u32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            query_top_k: 3,
            analyze_top_k: 10,
            overview_top_k: 200,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::BlikkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blikk")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded frames directory path.
    pub fn frames_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.frames_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.embedding.dimensions, 1536);
        assert_eq!(settings.vector_store.provider, VectorStoreProvider::Pinecone);
        assert_eq!(settings.vector_store.index_name, "video-frames");
        assert_eq!(settings.retrieval.query_top_k, 3);
        assert_eq!(settings.retrieval.analyze_top_k, 10);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            "memory".parse::<VectorStoreProvider>().unwrap(),
            VectorStoreProvider::Memory
        );
        assert_eq!(
            "Pinecone".parse::<VectorStoreProvider>().unwrap(),
            VectorStoreProvider::Pinecone
        );
        assert!("qdrant".parse::<VectorStoreProvider>().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let settings: Settings =
            toml::from_str("[embedding]\ndimensions = 768\n").unwrap();
        assert_eq!(settings.embedding.dimensions, 768);
        // Untouched sections keep their defaults.
        assert_eq!(settings.generation.model, "gpt-4o-mini");
    }
}
