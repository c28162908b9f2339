//! Pipeline orchestrator for Blikk.
//!
//! Coordinates provisioning, ingestion, retrieval, analysis, and overview
//! against the configured embedder and vector index.

use crate::config::{Prompts, Settings, VectorStoreProvider};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{BlikkError, Result};
use crate::frames::{FrameRecord, FsImageLoader, ImageLoader};
use crate::rag::{AnalyzeEngine, AnalyzeResponse};
use crate::vector_store::{
    frame_vector_id, manifest_vector_id, namespace_for_video, sanitize_index_name,
    summary_vector_id, MemoryVectorIndex, PineconeIndex, Provisioner, QueryMatch, RecordMetadata,
    VectorIndex, VectorRecord,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Hard cap on similarity query size.
const MAX_SEARCH_TOP_K: usize = 50;

/// Hard cap on the overview recovery query.
const MAX_OVERVIEW_TOP_K: usize = 1000;

/// Probe text embedded for the manifest record. The manifest is metadata
/// freight; its vector only has to live somewhere in the space.
const MANIFEST_PROBE: &str = "Manifest of indexed video frames";

/// Probe text for the overview recovery query. There is no native list
/// operation, so a broad query stands in for one.
const OVERVIEW_PROBE: &str = "Overview of everything that happens in this video";

/// The main orchestrator for the Blikk pipelines.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    provisioner: Provisioner,
    image_loader: Option<Arc<dyn ImageLoader>>,
}

impl Orchestrator {
    /// Create a new orchestrator from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));

        let index: Arc<dyn VectorIndex> = match settings.vector_store.provider {
            VectorStoreProvider::Pinecone => {
                let api_key = settings.vector_store.resolve_api_key().ok_or_else(|| {
                    BlikkError::Config(
                        "Missing vector store API key (set PINECONE_API_KEY)".to_string(),
                    )
                })?;
                Arc::new(
                    PineconeIndex::new(&settings.vector_store.control_url, api_key)?.with_spec(
                        &settings.vector_store.cloud,
                        &settings.vector_store.region,
                    ),
                )
            }
            VectorStoreProvider::Memory => {
                info!("Using in-memory vector index; nothing will persist");
                Arc::new(MemoryVectorIndex::new())
            }
        };

        let image_loader: Option<Arc<dyn ImageLoader>> = settings
            .generation
            .include_images
            .then(|| Arc::new(FsImageLoader::new(settings.frames_dir())) as Arc<dyn ImageLoader>);

        let provisioner = Provisioner::new(
            index.clone(),
            settings.embedding.dimensions as usize,
            &settings.vector_store.metric,
        );

        Ok(Self {
            settings,
            prompts,
            embedder,
            index,
            provisioner,
            image_loader,
        })
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        image_loader: Option<Arc<dyn ImageLoader>>,
    ) -> Self {
        let provisioner = Provisioner::new(
            index.clone(),
            settings.embedding.dimensions as usize,
            &settings.vector_store.metric,
        );

        Self {
            settings,
            prompts,
            embedder,
            index,
            provisioner,
            image_loader,
        }
    }

    /// Get a reference to the vector index (as trait object).
    pub fn vector_index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    /// Get a reference to the embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolve a requested collection name against the configured default.
    pub fn resolve_index_name(&self, requested: Option<&str>) -> String {
        match requested {
            Some(name) if !name.trim().is_empty() => sanitize_index_name(name),
            _ => sanitize_index_name(&self.settings.vector_store.index_name),
        }
    }

    async fn ensure_ready(&self, index: &str, skip: bool) -> Result<()> {
        if skip {
            // Explicit trust boundary: the caller asserts the collection
            // already exists.
            debug!("Skipping readiness check for '{}'", index);
            return Ok(());
        }
        self.provisioner.ensure_ready(index).await
    }

    /// Ingest frame records into a video's namespace.
    ///
    /// Re-running with the same frames is idempotent: record IDs collide
    /// with the prior run and overwrite it.
    #[instrument(skip(self, frames, summary), fields(frames = frames.len()))]
    pub async fn ingest(
        &self,
        index_name: Option<&str>,
        video_id: Option<&str>,
        frames: Vec<FrameRecord>,
        summary: Option<String>,
        video_filename: Option<String>,
        skip_ensure: bool,
    ) -> Result<IngestOutcome> {
        if frames.is_empty() {
            return Err(BlikkError::InvalidInput("No frames to ingest".to_string()));
        }

        let index = self.resolve_index_name(index_name);
        let namespace = namespace_for_video(video_id);
        let video_id = video_id.unwrap_or_default().to_string();
        let mut warnings = Vec::new();

        self.ensure_ready(&index, skip_ensure).await?;

        info!("Ingesting {} frames into {}/{}", frames.len(), index, namespace);

        let texts: Vec<String> = frames.iter().map(|f| f.description.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut records: Vec<VectorRecord> = frames
            .iter()
            .zip(embeddings)
            .map(|(frame, values)| VectorRecord {
                id: frame_vector_id(&namespace, &frame.frame_id),
                values,
                metadata: RecordMetadata::Frame {
                    frame_id: frame.frame_id.clone(),
                    timestamp: frame.timestamp,
                    description: frame.description.clone(),
                    path: frame.path.clone(),
                    video_id: video_id.clone(),
                    video_filename: video_filename.clone(),
                }
                .to_map(),
            })
            .collect();

        if let Some(summary) = summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let values = self.embedder.embed(summary).await?;
            records.push(VectorRecord {
                id: summary_vector_id(&namespace),
                values,
                metadata: RecordMetadata::Summary {
                    text: summary.to_string(),
                }
                .to_map(),
            });
        }

        // The manifest is best-effort: losing it degrades the overview,
        // it never fails the ingestion.
        match self.embedder.embed(MANIFEST_PROBE).await {
            Ok(values) => records.push(VectorRecord {
                id: manifest_vector_id(&namespace),
                values,
                metadata: RecordMetadata::Manifest {
                    count: frames.len() as u64,
                    first_timestamp: frames[0].timestamp,
                    last_timestamp: frames[frames.len() - 1].timestamp,
                    video_id: video_id.clone(),
                    video_filename: video_filename.clone(),
                    indexed_at: chrono::Utc::now().to_rfc3339(),
                }
                .to_map(),
            }),
            Err(e) => {
                warn!("Manifest vector skipped: {}", e);
                warnings.push(format!("Manifest vector skipped: {}", e));
            }
        }

        let upserted = self.index.upsert(&index, &namespace, &records).await?;

        Ok(IngestOutcome {
            upserted,
            namespace,
            index,
            warnings,
        })
    }

    /// Top-K similarity search for a question within a video's namespace.
    ///
    /// Matches come back in the store's order: similarity descending.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn search(
        &self,
        index_name: Option<&str>,
        video_id: Option<&str>,
        question: &str,
        top_k: Option<usize>,
        skip_ensure: bool,
    ) -> Result<Vec<QueryMatch>> {
        let top_k = clamp_top_k(
            top_k,
            self.settings.retrieval.query_top_k as usize,
            MAX_SEARCH_TOP_K,
        );
        self.run_search(index_name, video_id, question, top_k, skip_ensure)
            .await
    }

    async fn run_search(
        &self,
        index_name: Option<&str>,
        video_id: Option<&str>,
        question: &str,
        top_k: usize,
        skip_ensure: bool,
    ) -> Result<Vec<QueryMatch>> {
        if question.trim().is_empty() {
            return Err(BlikkError::InvalidInput("Question is empty".to_string()));
        }

        let index = self.resolve_index_name(index_name);
        let namespace = namespace_for_video(video_id);

        self.ensure_ready(&index, skip_ensure).await?;

        let query_vector = self.embedder.embed(question).await?;
        let matches = self
            .index
            .query(&index, &namespace, &query_vector, top_k)
            .await?;

        debug!("Retrieved {} matches from {}/{}", matches.len(), index, namespace);
        Ok(matches)
    }

    /// Answer a question from the retrieved frames.
    ///
    /// Retrieval order is similarity-ranked; the analyze engine reorders
    /// matches chronologically before generation, and citations keep that
    /// timeline order.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn analyze(
        &self,
        index_name: Option<&str>,
        video_id: Option<&str>,
        question: &str,
        top_k: Option<usize>,
        skip_ensure: bool,
    ) -> Result<AnalyzeResponse> {
        let top_k = clamp_top_k(
            top_k,
            self.settings.retrieval.analyze_top_k as usize,
            MAX_SEARCH_TOP_K,
        );
        let matches = self
            .run_search(index_name, video_id, question, top_k, skip_ensure)
            .await?;

        let mut engine = AnalyzeEngine::new(
            &self.settings.generation.model,
            self.settings.generation.temperature,
        )
        .with_prompts(self.prompts.clone());

        if let Some(loader) = &self.image_loader {
            engine = engine.with_image_loader(loader.clone());
        }

        engine.analyze(question, matches).await
    }

    /// Rebuild a video's frame manifest and summary.
    ///
    /// The store has no list operation, so frames are recovered with one
    /// broad probe query; an index may fail to surface some of them. The
    /// summary fetch is best-effort and never fails the call.
    #[instrument(skip(self))]
    pub async fn overview(
        &self,
        index_name: Option<&str>,
        video_id: Option<&str>,
        top_k: Option<usize>,
        skip_ensure: bool,
    ) -> Result<OverviewResult> {
        let top_k = clamp_top_k(
            top_k,
            self.settings.retrieval.overview_top_k as usize,
            MAX_OVERVIEW_TOP_K,
        );
        let index = self.resolve_index_name(index_name);
        let namespace = namespace_for_video(video_id);
        let mut warnings = Vec::new();

        self.ensure_ready(&index, skip_ensure).await?;

        let summary = match self
            .index
            .fetch(&index, &namespace, &[summary_vector_id(&namespace)])
            .await
        {
            Ok(records) => records
                .first()
                .and_then(|r| r.metadata.get("text"))
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(e) => {
                warn!("Summary fetch failed for {}/{}: {}", index, namespace, e);
                warnings.push(format!("Summary unavailable: {}", e));
                None
            }
        };

        let probe = self.embedder.embed(OVERVIEW_PROBE).await?;
        let matches = self.index.query(&index, &namespace, &probe, top_k).await?;

        let mut seen = HashSet::new();
        let mut frames: Vec<OverviewFrame> = matches
            .iter()
            // Summary and manifest records carry no timestamp; drop them.
            .filter_map(|m| {
                let timestamp = m.timestamp()?;
                let text = |key: &str| {
                    m.metadata
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                Some(OverviewFrame {
                    frame_id: text("frame_id"),
                    timestamp,
                    description: text("description"),
                    path: text("path"),
                })
            })
            .filter(|f| {
                seen.insert((f.frame_id.clone(), f.timestamp.to_bits(), f.path.clone()))
            })
            .collect();

        frames.sort_by(|a, b| {
            a.timestamp
                .partial_cmp(&b.timestamp)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(OverviewResult {
            summary,
            frames,
            namespace,
            index,
            warnings,
        })
    }

    /// List collection names.
    pub async fn list_indexes(&self) -> Result<Vec<String>> {
        self.index.list_indexes().await
    }

    /// List the namespaces of a collection.
    pub async fn list_namespaces(&self, index_name: Option<&str>) -> Result<(String, Vec<String>)> {
        let index = self.resolve_index_name(index_name);
        let namespaces = self.index.list_namespaces(&index).await?;
        Ok((index, namespaces))
    }

    /// Delete a collection and forget its provisioning state.
    #[instrument(skip(self))]
    pub async fn delete_index(&self, index_name: &str) -> Result<String> {
        let index = sanitize_index_name(index_name);
        self.index.delete_index(&index).await?;
        self.provisioner.forget(&index);
        info!("Deleted collection '{}'", index);
        Ok(index)
    }
}

/// Clamp a requested top-K into `1..=max`, with a default when absent.
fn clamp_top_k(requested: Option<usize>, default: usize, max: usize) -> usize {
    requested.unwrap_or(default).clamp(1, max)
}

/// Result of an ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    /// Total vectors written (frames + optional summary + optional manifest).
    pub upserted: usize,
    /// Namespace the vectors landed in.
    pub namespace: String,
    /// Collection name after sanitization.
    pub index: String,
    /// Non-fatal degradations.
    pub warnings: Vec<String>,
}

/// One frame in an overview listing.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewFrame {
    pub frame_id: String,
    pub timestamp: f64,
    pub description: String,
    pub path: String,
}

/// Result of an overview reconstruction.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewResult {
    /// Stored whole-video summary, when one could be fetched.
    pub summary: Option<String>,
    /// Recovered frames, deduplicated and in timeline order.
    pub frames: Vec<OverviewFrame>,
    pub namespace: String,
    pub index: String,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    /// Deterministic embedder: same text, same vector. Optionally fails on
    /// one specific input to exercise degraded paths.
    struct StubEmbedder {
        dims: usize,
        fail_on: Option<String>,
    }

    impl StubEmbedder {
        fn new(dims: usize) -> Self {
            Self { dims, fail_on: None }
        }

        fn failing_on(dims: usize, text: &str) -> Self {
            Self {
                dims,
                fail_on: Some(text.to_string()),
            }
        }

        fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            let seed = hasher.finish();
            (0..self.dims)
                .map(|i| ((seed.rotate_left(i as u32) & 0xff) as f32) / 255.0)
                .collect()
        }
    }

    #[async_trait]
    impl crate::embedding::Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail_on.as_deref() == Some(text) {
                return Err(BlikkError::Embedding("stub failure".to_string()));
            }
            Ok(self.vector_for(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Err(BlikkError::Embedding("No texts to embed".to_string()));
            }
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    fn frame(id: &str, timestamp: f64) -> FrameRecord {
        FrameRecord {
            frame_id: id.to_string(),
            timestamp,
            description: format!("frame {} at {}", id, timestamp),
            path: format!("data/frame_{}.jpg", id),
        }
    }

    fn test_orchestrator(
        embedder: Arc<dyn crate::embedding::Embedder>,
    ) -> (Orchestrator, Arc<MemoryVectorIndex>) {
        let memory = Arc::new(MemoryVectorIndex::new());
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            embedder,
            memory.clone(),
            None,
        );
        (orchestrator, memory)
    }

    #[tokio::test]
    async fn test_ingest_writes_frames_summary_and_manifest() {
        let (orchestrator, memory) = test_orchestrator(Arc::new(StubEmbedder::new(8)));

        let outcome = orchestrator
            .ingest(
                None,
                Some("42"),
                vec![frame("0", 0.0), frame("1", 2.5)],
                Some("Two frames of a crossing".to_string()),
                Some("crossing.mp4".to_string()),
                false,
            )
            .await
            .unwrap();

        assert_eq!(outcome.upserted, 4);
        assert_eq!(outcome.namespace, "video-42");
        assert_eq!(outcome.index, "video-frames");
        assert!(outcome.warnings.is_empty());
        assert_eq!(memory.record_count("video-frames", "video-42"), 4);
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let (orchestrator, memory) = test_orchestrator(Arc::new(StubEmbedder::new(8)));
        let frames = vec![frame("0", 0.0), frame("1", 2.5), frame("2", 4.0)];

        for _ in 0..2 {
            orchestrator
                .ingest(None, Some("42"), frames.clone(), None, None, false)
                .await
                .unwrap();
        }

        // 3 frames + manifest, counted once despite two runs.
        assert_eq!(memory.record_count("video-frames", "video-42"), 4);
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_frames() {
        let (orchestrator, memory) = test_orchestrator(Arc::new(StubEmbedder::new(8)));

        let result = orchestrator
            .ingest(None, Some("42"), Vec::new(), None, None, false)
            .await;

        assert!(matches!(result, Err(BlikkError::InvalidInput(_))));
        // Rejected before provisioning: no collection was created.
        assert!(memory.list_indexes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manifest_failure_is_a_warning_not_an_error() {
        let embedder = Arc::new(StubEmbedder::failing_on(8, MANIFEST_PROBE));
        let (orchestrator, memory) = test_orchestrator(embedder);

        let outcome = orchestrator
            .ingest(None, Some("42"), vec![frame("0", 0.0)], None, None, false)
            .await
            .unwrap();

        assert_eq!(outcome.upserted, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(memory.record_count("video-frames", "video-42"), 1);
    }

    #[tokio::test]
    async fn test_search_rejects_empty_question() {
        let (orchestrator, memory) = test_orchestrator(Arc::new(StubEmbedder::new(8)));

        let result = orchestrator.search(None, Some("42"), "  ", None, false).await;

        assert!(matches!(result, Err(BlikkError::InvalidInput(_))));
        assert!(memory.list_indexes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_returns_similarity_ranked_matches() {
        let (orchestrator, _memory) = test_orchestrator(Arc::new(StubEmbedder::new(8)));
        orchestrator
            .ingest(
                None,
                Some("42"),
                vec![frame("0", 0.0), frame("1", 2.5)],
                None,
                None,
                false,
            )
            .await
            .unwrap();

        let matches = orchestrator
            .search(None, Some("42"), "frame 0 at 0", Some(2), false)
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert!(matches[0].score >= matches[1].score);
    }

    #[tokio::test]
    async fn test_overview_filters_records_without_timestamps() {
        let (orchestrator, _memory) = test_orchestrator(Arc::new(StubEmbedder::new(8)));
        orchestrator
            .ingest(
                None,
                Some("42"),
                vec![frame("b", 5.0), frame("a", 1.0)],
                Some("A summary".to_string()),
                None,
                false,
            )
            .await
            .unwrap();

        let overview = orchestrator.overview(None, Some("42"), None, false).await.unwrap();

        // Summary and manifest records are excluded; frames are in
        // timeline order regardless of similarity.
        assert_eq!(overview.summary.as_deref(), Some("A summary"));
        assert_eq!(overview.frames.len(), 2);
        assert_eq!(overview.frames[0].frame_id, "a");
        assert_eq!(overview.frames[1].frame_id, "b");
        assert_eq!(overview.namespace, "video-42");
    }

    #[tokio::test]
    async fn test_overview_missing_summary_is_not_an_error() {
        let (orchestrator, _memory) = test_orchestrator(Arc::new(StubEmbedder::new(8)));
        orchestrator
            .ingest(None, Some("42"), vec![frame("0", 0.0)], None, None, false)
            .await
            .unwrap();

        let overview = orchestrator.overview(None, Some("42"), None, false).await.unwrap();

        assert!(overview.summary.is_none());
        assert_eq!(overview.frames.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_index_forgets_provisioning() {
        let (orchestrator, memory) = test_orchestrator(Arc::new(StubEmbedder::new(8)));
        orchestrator
            .ingest(None, Some("42"), vec![frame("0", 0.0)], None, None, false)
            .await
            .unwrap();

        let deleted = orchestrator.delete_index("video-frames").await.unwrap();
        assert_eq!(deleted, "video-frames");
        assert!(memory.list_indexes().await.unwrap().is_empty());

        // Re-ingestion provisions a fresh collection.
        orchestrator
            .ingest(None, Some("42"), vec![frame("0", 0.0)], None, None, false)
            .await
            .unwrap();
        assert_eq!(memory.record_count("video-frames", "video-42"), 2);
    }

    #[test]
    fn test_clamp_top_k() {
        assert_eq!(clamp_top_k(None, 3, 50), 3);
        assert_eq!(clamp_top_k(Some(10), 3, 50), 10);
        assert_eq!(clamp_top_k(Some(500), 3, 50), 50);
        assert_eq!(clamp_top_k(Some(0), 3, 50), 1);
        assert_eq!(clamp_top_k(Some(2000), 200, 1000), 1000);
    }

    #[test]
    fn test_resolve_index_name() {
        let (orchestrator, _memory) = test_orchestrator(Arc::new(StubEmbedder::new(8)));
        assert_eq!(orchestrator.resolve_index_name(None), "video-frames");
        assert_eq!(
            orchestrator.resolve_index_name(Some("My Video!!.mp4")),
            "my-video-mp4"
        );
        assert_eq!(orchestrator.resolve_index_name(Some("   ")), "video-frames");
    }
}
