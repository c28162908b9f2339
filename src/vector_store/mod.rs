//! Vector index abstraction for Blikk.
//!
//! Provides a trait-based interface over an external vector database that
//! holds one or more named collections, each partitioned into namespaces.
//! A namespace scopes all vectors for one video.

mod memory;
mod pinecone;
pub mod provision;

pub use memory::MemoryVectorIndex;
pub use pinecone::PineconeIndex;
pub use provision::Provisioner;

use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Fallback collection name when a request names none.
pub const DEFAULT_INDEX_NAME: &str = "video-frames";

/// Namespace used when no video id is supplied.
pub const DEFAULT_NAMESPACE: &str = "frames";

/// Collection names are capped by the store.
const MAX_INDEX_NAME_LEN: usize = 45;

/// A vector stored in a collection namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record ID, a deterministic function of (namespace, role/frame id).
    pub id: String,
    /// Embedding values.
    pub values: Vec<f32>,
    /// Flat metadata map, as the store sees it.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A similarity match returned by a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl QueryMatch {
    /// Timestamp of the matched record, when it carries one.
    pub fn timestamp(&self) -> Option<f64> {
        self.metadata.get("timestamp").and_then(Value::as_f64)
    }
}

/// Readiness of a collection.
#[derive(Debug, Clone, Default)]
pub struct IndexStatus {
    /// Whether the collection accepts reads and writes.
    pub ready: bool,
    /// Data-plane host, once the store has assigned one.
    pub host: Option<String>,
}

/// Typed view of record metadata.
///
/// The store keeps a flat untyped map per record; three record roles share
/// each namespace. Conversion to and from the flat shape happens only here.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordMetadata {
    /// One extracted video frame.
    Frame {
        frame_id: String,
        timestamp: f64,
        description: String,
        path: String,
        video_id: String,
        video_filename: Option<String>,
    },
    /// The whole-video summary. At most one per namespace; last write wins.
    Summary { text: String },
    /// Ingestion manifest for the namespace. At most one; last write wins.
    Manifest {
        count: u64,
        first_timestamp: f64,
        last_timestamp: f64,
        video_id: String,
        video_filename: Option<String>,
        indexed_at: String,
    },
}

impl RecordMetadata {
    /// Flatten into the store's untyped map shape.
    pub fn to_map(&self) -> Map<String, Value> {
        let value = match self {
            RecordMetadata::Frame {
                frame_id,
                timestamp,
                description,
                path,
                video_id,
                video_filename,
            } => {
                let mut v = json!({
                    "frame_id": frame_id,
                    "timestamp": timestamp,
                    "description": description,
                    "path": path,
                    "video_id": video_id,
                });
                if let Some(name) = video_filename {
                    v["video_filename"] = json!(name);
                }
                v
            }
            RecordMetadata::Summary { text } => json!({
                "summary": true,
                "text": text,
            }),
            RecordMetadata::Manifest {
                count,
                first_timestamp,
                last_timestamp,
                video_id,
                video_filename,
                indexed_at,
            } => {
                let mut v = json!({
                    "manifest": true,
                    "count": count,
                    "first_timestamp": first_timestamp,
                    "last_timestamp": last_timestamp,
                    "video_id": video_id,
                    "indexed_at": indexed_at,
                });
                if let Some(name) = video_filename {
                    v["video_filename"] = json!(name);
                }
                v
            }
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Recover the typed view from a flat map, if it matches a known role.
    pub fn from_map(map: &Map<String, Value>) -> Option<Self> {
        let flag = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);
        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

        if flag("summary") {
            return Some(RecordMetadata::Summary { text: text("text")? });
        }

        if flag("manifest") {
            return Some(RecordMetadata::Manifest {
                count: map.get("count").and_then(Value::as_u64)?,
                first_timestamp: map.get("first_timestamp").and_then(Value::as_f64)?,
                last_timestamp: map.get("last_timestamp").and_then(Value::as_f64)?,
                video_id: text("video_id").unwrap_or_default(),
                video_filename: text("video_filename"),
                indexed_at: text("indexed_at").unwrap_or_default(),
            });
        }

        // Frame records are the only role carrying a numeric timestamp.
        let timestamp = map.get("timestamp").and_then(Value::as_f64)?;
        Some(RecordMetadata::Frame {
            frame_id: text("frame_id")?,
            timestamp,
            description: text("description").unwrap_or_default(),
            path: text("path").unwrap_or_default(),
            video_id: text("video_id").unwrap_or_default(),
            video_filename: text("video_filename"),
        })
    }
}

/// Trait for vector index backends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create a collection. The store finishes provisioning asynchronously.
    async fn create_index(&self, name: &str, dimension: usize, metric: &str) -> Result<()>;

    /// Describe a collection's readiness.
    async fn describe_index(&self, name: &str) -> Result<IndexStatus>;

    /// List collection names.
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Delete a collection.
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Upsert records into a namespace. Overwrites by ID.
    async fn upsert(&self, index: &str, namespace: &str, records: &[VectorRecord])
        -> Result<usize>;

    /// Top-K similarity query within a namespace, metadata included.
    async fn query(
        &self,
        index: &str,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>>;

    /// Fetch records by ID from a namespace. Missing IDs are omitted.
    async fn fetch(&self, index: &str, namespace: &str, ids: &[String])
        -> Result<Vec<VectorRecord>>;

    /// List the namespaces of a collection.
    async fn list_namespaces(&self, index: &str) -> Result<Vec<String>>;
}

fn invalid_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[^a-z0-9]+").expect("static pattern"))
}

/// Lowercase and collapse anything outside `[a-z0-9]` to single dashes.
fn sanitize_token(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let collapsed = invalid_chars().replace_all(&lowered, "-");
    collapsed.trim_matches('-').to_string()
}

/// Sanitize a user-supplied collection name.
///
/// Lowercase, `[a-z0-9-]` only, collapsed dashes, trimmed, capped at the
/// store's length limit. Falls back to [`DEFAULT_INDEX_NAME`] when nothing
/// usable remains.
pub fn sanitize_index_name(raw: &str) -> String {
    let mut name = sanitize_token(raw);
    if name.len() > MAX_INDEX_NAME_LEN {
        name.truncate(MAX_INDEX_NAME_LEN);
        name = name.trim_matches('-').to_string();
    }
    if name.is_empty() {
        DEFAULT_INDEX_NAME.to_string()
    } else {
        name
    }
}

/// Derive the namespace for a video id: `"video-" + sanitize(videoId)`,
/// or [`DEFAULT_NAMESPACE`] when absent.
pub fn namespace_for_video(video_id: Option<&str>) -> String {
    match video_id.map(sanitize_token) {
        Some(id) if !id.is_empty() => format!("video-{}", id),
        _ => DEFAULT_NAMESPACE.to_string(),
    }
}

/// ID of a frame vector. Re-ingesting the same frame overwrites it.
pub fn frame_vector_id(namespace: &str, frame_id: &str) -> String {
    format!("{}::{}", namespace, frame_id)
}

/// ID of the namespace's summary vector.
pub fn summary_vector_id(namespace: &str) -> String {
    format!("{}::summary", namespace)
}

/// ID of the namespace's manifest vector.
pub fn manifest_vector_id(namespace: &str) -> String {
    format!("{}::manifest", namespace)
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_index_name() {
        assert_eq!(sanitize_index_name("My Video!!.mp4"), "my-video-mp4");
        assert_eq!(sanitize_index_name("already-clean"), "already-clean");
        assert_eq!(sanitize_index_name("__Weird___Name__"), "weird-name");
        assert_eq!(sanitize_index_name("!!!"), DEFAULT_INDEX_NAME);
        assert_eq!(sanitize_index_name(""), DEFAULT_INDEX_NAME);

        let long = "a".repeat(80);
        assert_eq!(sanitize_index_name(&long).len(), 45);
    }

    #[test]
    fn test_namespace_for_video() {
        assert_eq!(namespace_for_video(Some("42")), "video-42");
        assert_eq!(namespace_for_video(Some("Crash Demo")), "video-crash-demo");
        assert_eq!(namespace_for_video(None), DEFAULT_NAMESPACE);
        assert_eq!(namespace_for_video(Some("")), DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_vector_ids_deterministic() {
        assert_eq!(frame_vector_id("video-42", "7"), "video-42::7");
        assert_eq!(summary_vector_id("video-42"), "video-42::summary");
        assert_eq!(manifest_vector_id("video-42"), "video-42::manifest");
        // Same inputs, same id: re-ingestion overwrites instead of duplicating.
        assert_eq!(frame_vector_id("video-42", "7"), frame_vector_id("video-42", "7"));
    }

    #[test]
    fn test_metadata_roundtrip_frame() {
        let meta = RecordMetadata::Frame {
            frame_id: "7".to_string(),
            timestamp: 4.25,
            description: "A car stops at a crossing".to_string(),
            path: "data/v1_frame_007.jpg".to_string(),
            video_id: "v1".to_string(),
            video_filename: Some("crash.mp4".to_string()),
        };
        let map = meta.to_map();
        assert_eq!(map["timestamp"], json!(4.25));
        assert_eq!(RecordMetadata::from_map(&map), Some(meta));
    }

    #[test]
    fn test_metadata_roundtrip_summary_and_manifest() {
        let summary = RecordMetadata::Summary {
            text: "A short clip of a crossing".to_string(),
        };
        let map = summary.to_map();
        assert_eq!(map["summary"], json!(true));
        assert_eq!(RecordMetadata::from_map(&map), Some(summary));

        let manifest = RecordMetadata::Manifest {
            count: 12,
            first_timestamp: 0.0,
            last_timestamp: 30.5,
            video_id: "v1".to_string(),
            video_filename: None,
            indexed_at: "2024-05-01T10:00:00Z".to_string(),
        };
        let map = manifest.to_map();
        assert_eq!(map["manifest"], json!(true));
        assert!(map.get("timestamp").is_none());
        assert_eq!(RecordMetadata::from_map(&map), Some(manifest));
    }

    #[test]
    fn test_metadata_from_unknown_map() {
        let mut map = Map::new();
        map.insert("whatever".to_string(), json!("x"));
        assert_eq!(RecordMetadata::from_map(&map), None);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }
}
