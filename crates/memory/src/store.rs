//! `VectorMemory`: records plus embeddings, searched by overfetch-then-filter.
//!
//! Retrieval pulls `top_k * overfetch` nearest candidates from a flat index,
//! then walks them in ascending distance applying the metadata filter until
//! `top_k` survive. Heavier filtering needs a larger multiplier; a filter
//! that rejects most of the window simply yields fewer results.

use cartwise_core::error::MemoryError;
use cartwise_core::memory::{Embedder, MemoryRecord, RetrieveFilter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::file_backend::PairedFiles;
use crate::vector::nearest;

/// Default candidate multiplier for filtered retrieval.
pub const DEFAULT_OVERFETCH: usize = 5;

/// Smallest multiplier accepted, so the window is always larger than `top_k`.
pub const MIN_OVERFETCH: usize = 2;

#[derive(Default)]
struct Index {
    records: Vec<MemoryRecord>,
    vectors: Vec<Vec<f32>>,
}

/// Shared, concurrently usable vector memory.
pub struct VectorMemory {
    embedder: Arc<dyn Embedder>,
    index: RwLock<Index>,
    overfetch: usize,
    files: Option<PairedFiles>,
}

impl VectorMemory {
    /// A process-lifetime store with no persistence.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            index: RwLock::new(Index::default()),
            overfetch: DEFAULT_OVERFETCH,
            files: None,
        }
    }

    /// A store persisted under `dir`, loading whatever is already there.
    pub fn open(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        let files = PairedFiles::new(dir);
        let (records, vectors) = files.load();
        debug!(dir = %files.dir().display(), count = records.len(), "Vector memory opened");
        Self {
            embedder,
            index: RwLock::new(Index { records, vectors }),
            overfetch: DEFAULT_OVERFETCH,
            files: Some(files),
        }
    }

    /// Set the candidate multiplier (clamped to at least 2).
    pub fn with_overfetch(mut self, overfetch: usize) -> Self {
        self.overfetch = overfetch.max(MIN_OVERFETCH);
        self
    }

    pub fn overfetch(&self) -> usize {
        self.overfetch
    }

    pub fn is_persistent(&self) -> bool {
        self.files.is_some()
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.records.is_empty()
    }

    /// Embed and store a record, returning its id.
    pub async fn add(&self, mut record: MemoryRecord) -> Result<String, MemoryError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let vector = self.embedder.embed(&record.text).await?;

        let mut index = self.index.write().await;
        if let Some(expected) = index.vectors.first().map(Vec::len) {
            if expected != vector.len() {
                return Err(MemoryError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        if let Some(files) = &self.files {
            files.append(&record, &vector)?;
        }

        let id = record.id.clone();
        debug!(memory_id = %id, kind = %record.kind, "Memory stored");
        index.records.push(record);
        index.vectors.push(vector);
        Ok(id)
    }

    /// Up to `top_k` records passing `filter`, nearest first.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: &RetrieveFilter,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(self
            .search_scored(query, top_k, filter)
            .await?
            .into_iter()
            .map(|(record, _)| record)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve), with each record's squared distance.
    pub async fn search_scored(
        &self,
        query: &str,
        top_k: usize,
        filter: &RetrieveFilter,
    ) -> Result<Vec<(MemoryRecord, f32)>, MemoryError> {
        if top_k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let index = self.index.read().await;
        let Some(dimensions) = index.vectors.first().map(Vec::len) else {
            return Ok(Vec::new());
        };
        if dimensions != query_vector.len() {
            return Err(MemoryError::DimensionMismatch {
                expected: dimensions,
                actual: query_vector.len(),
            });
        }

        let window = top_k.saturating_mul(self.overfetch).min(index.vectors.len());
        let candidates = nearest(&index.vectors, &query_vector, window);

        let mut results = Vec::with_capacity(top_k);
        for (i, distance) in candidates {
            let record = &index.records[i];
            if filter.matches(record) {
                results.push((record.clone(), distance));
                if results.len() == top_k {
                    break;
                }
            }
        }

        debug!(
            window,
            returned = results.len(),
            top_k,
            "Memory retrieval"
        );
        Ok(results)
    }

    /// Every stored record, in insertion order.
    pub async fn records(&self) -> Vec<MemoryRecord> {
        self.index.read().await.records.clone()
    }

    /// Whole-store teardown.
    pub async fn clear(&self) -> Result<(), MemoryError> {
        let mut index = self.index.write().await;
        if let Some(files) = &self.files {
            files.clear()?;
        }
        let removed = index.records.len();
        index.records.clear();
        index.vectors.clear();
        if removed > 0 {
            warn!(removed, "Memory cleared");
        }
        Ok(())
    }
}
