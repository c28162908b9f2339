//! Frame records and image loading.
//!
//! Frame extraction is an external collaborator: it hands Blikk one record
//! per selected frame. Records are immutable once ingested. The image
//! loader resolves a record's `path` to raw bytes so the analyze pipeline
//! can attach the actual frame to the generation call.

use crate::error::{BlikkError, Result};
use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// One extracted video frame, as delivered by the extraction collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Frame identifier. Extractors send strings or numbers; both are accepted.
    #[serde(deserialize_with = "string_or_number")]
    pub frame_id: String,
    /// Position in the video, in seconds.
    pub timestamp: f64,
    /// Model-written description of the frame contents.
    pub description: String,
    /// Opaque reference to the frame image asset.
    pub path: String,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "frame_id must be a string or number, got {}",
            other
        ))),
    }
}

/// Trait for resolving a frame path to image bytes.
///
/// Loaders fail with an error, never panic past their boundary; the analyze
/// pipeline treats a failed load as a text-only frame.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, path: &str) -> Result<Vec<u8>>;
}

/// Loads frame images from the local filesystem.
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    /// Create a loader rooted at the frames directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a record path inside the root. Absolute paths and parent
    /// traversal are rejected: record paths are references, not commands.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let candidate = Path::new(path);
        if candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(BlikkError::InvalidInput(format!(
                "Frame path escapes the frames directory: {}",
                path
            )));
        }

        // Extractors prefix paths with the frames directory name; strip it
        // rather than doubling up.
        let relative = candidate
            .strip_prefix(&self.root)
            .unwrap_or(candidate)
            .to_path_buf();
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn load(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve(path)?;
        debug!("Loading frame image {:?}", resolved);
        let bytes = tokio::fs::read(&resolved).await?;
        Ok(bytes)
    }
}

/// Guess an image MIME type from a path extension. JPEG when unknown,
/// matching what extractors write.
pub fn image_mime_type(path: &str) -> &'static str {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_accepts_string_or_number() {
        let from_number: FrameRecord = serde_json::from_str(
            r#"{"frame_id": 7, "timestamp": 1.5, "description": "d", "path": "p.jpg"}"#,
        )
        .unwrap();
        assert_eq!(from_number.frame_id, "7");

        let from_string: FrameRecord = serde_json::from_str(
            r#"{"frame_id": "abc", "timestamp": 0.0, "description": "d", "path": "p.jpg"}"#,
        )
        .unwrap();
        assert_eq!(from_string.frame_id, "abc");

        let bad = serde_json::from_str::<FrameRecord>(
            r#"{"frame_id": [1], "timestamp": 0.0, "description": "d", "path": "p.jpg"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type("data/frame_001.jpg"), "image/jpeg");
        assert_eq!(image_mime_type("frame.PNG"), "image/png");
        assert_eq!(image_mime_type("no_extension"), "image/jpeg");
    }

    #[tokio::test]
    async fn test_fs_loader_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("frame_001.jpg"), b"jpegbytes").unwrap();

        let loader = FsImageLoader::new(dir.path());
        let bytes = loader.load("frame_001.jpg").await.unwrap();
        assert_eq!(bytes, b"jpegbytes");

        assert!(loader.load("missing.jpg").await.is_err());
    }

    #[tokio::test]
    async fn test_fs_loader_rejects_traversal() {
        let loader = FsImageLoader::new("data");
        assert!(loader.load("../etc/passwd").await.is_err());
        assert!(loader.load("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_fs_loader_strips_root_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("frame_002.jpg"), b"x").unwrap();

        let loader = FsImageLoader::new(dir.path());
        // Extractor-style path that already includes the directory.
        let prefixed = format!("{}/frame_002.jpg", dir.path().display());
        let bytes = loader.load(&prefixed).await;
        // Absolute paths are rejected even when they point inside the root.
        assert!(bytes.is_err());

        let relative = loader.load("frame_002.jpg").await.unwrap();
        assert_eq!(relative, b"x");
    }
}
