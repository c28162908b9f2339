//! Grounded question answering over retrieved video frames.
//!
//! Retrieval returns frames ranked by similarity; answering needs them as
//! a timeline. This module reorders matches chronologically, assembles a
//! multimodal prompt, and extracts the generated answer.

pub mod context;
mod response;

pub use context::{chronological, format_frames_for_prompt};
pub use response::{AnalyzeEngine, AnalyzeResponse};

use crate::vector_store::QueryMatch;

/// A retrieval match flattened into the fields the prompt needs.
#[derive(Debug, Clone)]
pub struct CitedFrame {
    /// Record ID (`namespace::frame_id`).
    pub id: String,
    /// Frame identifier from the extraction collaborator.
    pub frame_id: String,
    /// Position in the video, seconds. Missing metadata reads as 0.
    pub timestamp: f64,
    /// Frame image reference.
    pub path: String,
    /// Frame description.
    pub description: String,
    /// Similarity score.
    pub score: f32,
}

impl From<&QueryMatch> for CitedFrame {
    fn from(m: &QueryMatch) -> Self {
        let text = |key: &str| {
            m.metadata
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            id: m.id.clone(),
            frame_id: text("frame_id"),
            timestamp: m.timestamp().unwrap_or(0.0),
            path: text("path"),
            description: text("description"),
            score: m.score,
        }
    }
}
