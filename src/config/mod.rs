//! Configuration module for Blikk.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnalyzePrompts, Prompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, GenerationSettings, PromptSettings, RetrievalSettings,
    Settings, VectorStoreProvider, VectorStoreSettings,
};
