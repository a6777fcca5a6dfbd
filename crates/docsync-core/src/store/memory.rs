//! In-memory [`IndexStore`] implementation for tests and embedding hosts.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`, in insertion order.
//! Search is brute-force squared-L2 distance over every stored vector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::{squared_l2_distance, EmbeddingProvider};
use crate::error::{Result, SyncError};
use crate::models::{Chunk, FingerprintTable, SearchHit};

use super::{embed_chunks, rank_hits, IndexStore, DEFAULT_EMBED_CONCURRENCY};

struct StoredChunk {
    chunk_id: String,
    chunk: Chunk,
    vector: Vec<f32>,
    fingerprint: String,
}

/// In-memory chunk index.
pub struct InMemoryStore {
    embedder: Arc<dyn EmbeddingProvider>,
    concurrency: usize,
    initialized: AtomicBool,
    rows: RwLock<Vec<StoredChunk>>,
}

impl InMemoryStore {
    /// Create an uninitialized store that embeds with `embedder`.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            concurrency: DEFAULT_EMBED_CONCURRENCY,
            initialized: AtomicBool::new(false),
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Snapshot of every stored chunk with its fingerprint, in insertion order.
    pub fn indexed(&self) -> Result<Vec<(Chunk, String)>> {
        Ok(self
            .read()?
            .iter()
            .map(|row| (row.chunk.clone(), row.fingerprint.clone()))
            .collect())
    }

    /// Number of stored chunks belonging to `doc_id`.
    pub fn count_for_doc(&self, doc_id: &str) -> Result<usize> {
        Ok(self
            .read()?
            .iter()
            .filter(|row| row.chunk.doc_id == doc_id)
            .count())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(SyncError::StoreUninitialized)
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<StoredChunk>>> {
        self.rows
            .read()
            .map_err(|_| SyncError::Store("in-memory index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredChunk>>> {
        self.rows
            .write()
            .map_err(|_| SyncError::Store("in-memory index lock poisoned".to_string()))
    }
}

#[async_trait]
impl IndexStore for InMemoryStore {
    async fn initialize(&self) -> Result<()> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn add_chunks(&self, chunks: &[Chunk], fingerprint: &str) -> Result<()> {
        self.ensure_initialized()?;
        let vectors = embed_chunks(self.embedder.as_ref(), chunks, self.concurrency).await?;

        let mut rows = self.write()?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            rows.push(StoredChunk {
                chunk_id: chunk.chunk_id(),
                chunk: chunk.clone(),
                vector,
                fingerprint: fingerprint.to_string(),
            });
        }
        tracing::debug!(count = chunks.len(), "added chunks to in-memory index");
        Ok(())
    }

    async fn fingerprints(&self) -> Result<FingerprintTable> {
        if self.ensure_initialized().is_err() {
            return Ok(FingerprintTable::new());
        }
        Ok(self
            .read()?
            .iter()
            .map(|row| (row.chunk.title.clone(), row.fingerprint.clone()))
            .collect())
    }

    async fn delete_by_doc_id(&self, doc_id: &str) -> Result<()> {
        self.ensure_initialized()?;
        self.write()?.retain(|row| row.chunk.doc_id != doc_id);
        Ok(())
    }

    async fn delete_by_title(&self, title: &str) -> Result<()> {
        self.ensure_initialized()?;
        self.write()?.retain(|row| row.chunk.title != title);
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize, threshold: f32) -> Result<Vec<SearchHit>> {
        self.ensure_initialized()?;
        let query_vec = self.embedder.embed(query).await?;

        let candidates: Vec<SearchHit> = self
            .read()?
            .iter()
            .map(|row| SearchHit {
                title: row.chunk.title.clone(),
                doc_id: row.chunk.doc_id.clone(),
                text: row.chunk.text.clone(),
                chunk_index: row.chunk.chunk_index,
                distance: squared_l2_distance(&query_vec, &row.vector),
            })
            .collect();

        Ok(rank_hits(candidates, top_k, threshold))
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self
            .read()
            .map(|rows| rows.iter().map(|row| row.chunk_id.clone()).collect())
            .unwrap_or_default();
        f.debug_struct("InMemoryStore")
            .field("model", &self.embedder.model_name())
            .field("initialized", &self.initialized.load(Ordering::Acquire))
            .field("chunks", &ids)
            .finish()
    }
}
