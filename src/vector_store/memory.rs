//! In-memory vector index implementation.
//!
//! Useful for testing and local experiments. Collections are ready as soon
//! as they are created; nothing survives the process.

use super::{cosine_similarity, IndexStatus, QueryMatch, VectorIndex, VectorRecord};
use crate::error::{BlikkError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

type Namespace = HashMap<String, VectorRecord>;
type Collection = HashMap<String, Namespace>;

/// In-memory vector index.
pub struct MemoryVectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorIndex {
    /// Create a new in-memory vector index.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Total record count within one namespace.
    pub fn record_count(&self, index: &str, namespace: &str) -> usize {
        let collections = self.collections.read().unwrap();
        collections
            .get(index)
            .and_then(|c| c.get(namespace))
            .map(|ns| ns.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn create_index(&self, name: &str, _dimension: usize, _metric: &str) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexStatus> {
        let collections = self.collections.read().unwrap();
        if collections.contains_key(name) {
            Ok(IndexStatus {
                ready: true,
                host: None,
            })
        } else {
            Err(BlikkError::VectorStore(format!(
                "Collection not found: {}",
                name
            )))
        }
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().unwrap();
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        collections.remove(name);
        Ok(())
    }

    async fn upsert(
        &self,
        index: &str,
        namespace: &str,
        records: &[VectorRecord],
    ) -> Result<usize> {
        let mut collections = self.collections.write().unwrap();
        let collection = collections.get_mut(index).ok_or_else(|| {
            BlikkError::VectorStore(format!("Collection not found: {}", index))
        })?;

        let ns = collection.entry(namespace.to_string()).or_default();
        for record in records {
            ns.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(
        &self,
        index: &str,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let collections = self.collections.read().unwrap();
        let collection = collections.get(index).ok_or_else(|| {
            BlikkError::VectorStore(format!("Collection not found: {}", index))
        })?;

        let mut matches: Vec<QueryMatch> = collection
            .get(namespace)
            .map(|ns| {
                ns.values()
                    .map(|record| QueryMatch {
                        id: record.id.clone(),
                        score: cosine_similarity(vector, &record.values),
                        metadata: record.metadata.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn fetch(
        &self,
        index: &str,
        namespace: &str,
        ids: &[String],
    ) -> Result<Vec<VectorRecord>> {
        let collections = self.collections.read().unwrap();
        let collection = collections.get(index).ok_or_else(|| {
            BlikkError::VectorStore(format!("Collection not found: {}", index))
        })?;

        let Some(ns) = collection.get(namespace) else {
            return Ok(Vec::new());
        };

        Ok(ids.iter().filter_map(|id| ns.get(id).cloned()).collect())
    }

    async fn list_namespaces(&self, index: &str) -> Result<Vec<String>> {
        let collections = self.collections.read().unwrap();
        let collection = collections.get(index).ok_or_else(|| {
            BlikkError::VectorStore(format!("Collection not found: {}", index))
        })?;

        let mut names: Vec<String> = collection.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, values: Vec<f32>) -> VectorRecord {
        let mut metadata = serde_json::Map::new();
        metadata.insert("frame_id".to_string(), json!(id));
        VectorRecord {
            id: id.to_string(),
            values,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_memory_index_roundtrip() {
        let index = MemoryVectorIndex::new();
        index.create_index("vids", 3, "cosine").await.unwrap();

        let upserted = index
            .upsert(
                "vids",
                "video-1",
                &[record("a", vec![1.0, 0.0, 0.0]), record("b", vec![0.0, 1.0, 0.0])],
            )
            .await
            .unwrap();
        assert_eq!(upserted, 2);

        let matches = index
            .query("vids", "video-1", &[1.0, 0.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert!(matches[0].score > matches[1].score);

        let fetched = index
            .fetch("vids", "video-1", &["b".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, "b");

        assert_eq!(index.list_namespaces("vids").await.unwrap(), vec!["video-1"]);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let index = MemoryVectorIndex::new();
        index.create_index("vids", 3, "cosine").await.unwrap();

        index
            .upsert("vids", "video-1", &[record("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert("vids", "video-1", &[record("a", vec![0.0, 0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.record_count("vids", "video-1"), 1);
        let fetched = index.fetch("vids", "video-1", &["a".to_string()]).await.unwrap();
        assert_eq!(fetched[0].values, vec![0.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_missing_collection_errors() {
        let index = MemoryVectorIndex::new();
        assert!(index.describe_index("nope").await.is_err());
        assert!(index.query("nope", "ns", &[1.0], 5).await.is_err());
    }
}
