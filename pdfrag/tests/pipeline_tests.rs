//! Indexing pipeline behaviour: decode failures, empty input, batching, aborts.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pdfrag::{
    ChunkStrategy, EmbeddingProvider, EmbeddingSpace, HashEmbedder, InMemoryVectorIndex,
    IndexingPipeline, RagConfig, RagError, SourceDocument, TextLoader, VectorIndex,
};

/// Wraps [`HashEmbedder`] and records the size of every batch it receives.
struct RecordingEmbedder {
    inner: HashEmbedder,
    batches: Mutex<Vec<usize>>,
}

impl RecordingEmbedder {
    fn new() -> Self {
        Self { inner: HashEmbedder::new(32).unwrap(), batches: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl EmbeddingProvider for RecordingEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> pdfrag::Result<Vec<Vec<f32>>> {
        self.batches.lock().unwrap().push(texts.len());
        self.inner.embed_batch(texts).await
    }

    fn space(&self) -> EmbeddingSpace {
        self.inner.space()
    }
}

/// Fails every call.
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> pdfrag::Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding { model: "failing".to_string(), message: "offline".to_string() })
    }

    fn space(&self) -> EmbeddingSpace {
        EmbeddingSpace::new("failing", 8)
    }
}

/// Drops the last vector of every batch.
struct LossyEmbedder;

#[async_trait]
impl EmbeddingProvider for LossyEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> pdfrag::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|_| vec![1.0; 8]).collect())
    }

    fn space(&self) -> EmbeddingSpace {
        EmbeddingSpace::new("lossy", 8)
    }
}

fn small_config() -> RagConfig {
    RagConfig::builder()
        .chunk_size(40)
        .chunk_overlap(8)
        .chunk_strategy(ChunkStrategy::Fixed)
        .embed_batch_size(2)
        .build()
        .unwrap()
}

fn pipeline_for(
    embedder: Arc<dyn EmbeddingProvider>,
) -> (IndexingPipeline, Arc<InMemoryVectorIndex>) {
    let index = Arc::new(InMemoryVectorIndex::new(embedder.space()));
    let pipeline = IndexingPipeline::builder()
        .config(small_config())
        .embedding_provider(embedder)
        .vector_index(index.clone())
        .build()
        .unwrap();
    (pipeline, index)
}

#[tokio::test]
async fn corrupt_file_is_skipped_and_reported() {
    let (pipeline, index) = pipeline_for(Arc::new(HashEmbedder::new(32).unwrap()));

    let report = pipeline
        .run(vec![
            SourceDocument::new("alpha.txt", "Rust ownership rules keep memory safe."),
            SourceDocument::new("broken.pdf", b"%PDF-1.4 this file was truncated".to_vec()),
            SourceDocument::new("beta.txt", "Tokio schedules async tasks on a thread pool."),
        ])
        .await
        .unwrap();

    assert_eq!(report.documents, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, "broken.pdf");
    assert!(report.chunks >= 2);
    assert_eq!(index.len().await.unwrap(), report.chunks);
}

#[tokio::test]
async fn empty_document_completes_and_leaves_index_unchanged() {
    let (pipeline, index) = pipeline_for(Arc::new(HashEmbedder::new(32).unwrap()));

    let report = pipeline.run(vec![SourceDocument::new("blank.txt", "")]).await.unwrap();

    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks, 0);
    assert!(report.failures.is_empty());
    assert!(index.is_empty().await.unwrap());
}

#[tokio::test]
async fn chunks_are_embedded_in_configured_batches() {
    let embedder = Arc::new(RecordingEmbedder::new());
    let (pipeline, index) = pipeline_for(embedder.clone());

    // 5 pages of text short enough to be one chunk each.
    let sources: Vec<SourceDocument> = (0..5)
        .map(|i| SourceDocument::new(format!("note{i}.txt"), format!("note number {i}")))
        .collect();
    let report = pipeline.run(sources).await.unwrap();

    assert_eq!(report.chunks, 5);
    assert_eq!(*embedder.batches.lock().unwrap(), [2, 2, 1]);
    assert_eq!(index.len().await.unwrap(), 5);
}

#[tokio::test]
async fn indexing_the_same_files_twice_is_idempotent() {
    let (pipeline, index) = pipeline_for(Arc::new(HashEmbedder::new(32).unwrap()));
    let sources = || {
        vec![SourceDocument::new(
            "alpha.txt",
            "A sentence long enough to make a few chunks of text.",
        )]
    };

    let first = pipeline.run(sources()).await.unwrap();
    let second = pipeline.run(sources()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(index.len().await.unwrap(), first.chunks);
}

#[tokio::test]
async fn embedding_failure_aborts_without_inserting() {
    let (pipeline, index) = pipeline_for(Arc::new(FailingEmbedder));

    let err = pipeline.run(vec![SourceDocument::new("a.txt", "some text")]).await.unwrap_err();

    assert!(err.is_embedding_error());
    assert!(index.is_empty().await.unwrap());
}

#[tokio::test]
async fn short_embedding_batch_is_an_error() {
    let (pipeline, index) = pipeline_for(Arc::new(LossyEmbedder));

    let err = pipeline.run(vec![SourceDocument::new("a.txt", "some text")]).await.unwrap_err();

    assert!(matches!(err, RagError::Embedding { .. }));
    assert!(index.is_empty().await.unwrap());
}

#[tokio::test]
async fn mismatched_index_is_rejected_at_build() {
    let embedder = Arc::new(HashEmbedder::new(32).unwrap());
    let index =
        Arc::new(InMemoryVectorIndex::new(EmbeddingSpace::new("all-MiniLM-L6-v2", 384)));

    let result = IndexingPipeline::builder()
        .config(small_config())
        .embedding_provider(embedder)
        .vector_index(index)
        .build();

    assert!(matches!(result, Err(RagError::EmbeddingMismatch { .. })));
}

#[tokio::test]
async fn builder_requires_embedder_and_index() {
    let result = IndexingPipeline::builder().config(small_config()).build();
    assert!(matches!(result, Err(RagError::Config(_))));
}

#[tokio::test]
async fn custom_loader_is_used() {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new(32).unwrap());
    let index = Arc::new(InMemoryVectorIndex::new(embedder.space()));
    let pipeline = IndexingPipeline::builder()
        .config(small_config())
        .loader(Arc::new(TextLoader))
        .embedding_provider(embedder)
        .vector_index(index.clone())
        .build()
        .unwrap();

    // TextLoader rejects binary even when it is named like a PDF.
    let report = pipeline
        .run(vec![
            SourceDocument::new("scan.pdf", vec![0u8, 1, 2]),
            SourceDocument::new("ok.pdf", "plain"),
        ])
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, "scan.pdf");
    assert_eq!(report.chunks, 1);
}

#[tokio::test]
async fn run_can_be_driven_from_a_spawned_task() {
    let embedder = Arc::new(RecordingEmbedder::new());
    let (pipeline, index) = pipeline_for(embedder);
    let pipeline = Arc::new(pipeline);

    let task = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            let sources: Vec<SourceDocument> = (0..3)
                .map(|i| SourceDocument::new(format!("n{i}.txt"), format!("note {i}")))
                .collect();
            pipeline.run(sources).await
        })
    };
    let report = task.await.unwrap().unwrap();

    assert_eq!(report.chunks, 3);
    assert_eq!(pipeline.vector_index().len().await.unwrap(), 3);
    assert_eq!(index.len().await.unwrap(), 3);
}
