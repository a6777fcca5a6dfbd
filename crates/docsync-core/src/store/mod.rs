//! Index storage abstraction.
//!
//! The [`IndexStore`] trait is the only way the reconciliation engine and
//! the query surface touch persisted chunks. Backends embed chunk text
//! through an [`EmbeddingProvider`] they own, persist the vectors, and
//! answer fingerprint lookups, predicate deletes and nearest-neighbour
//! queries.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::{Chunk, FingerprintTable, SearchHit};

/// Default number of embedding calls in flight for one chunk batch.
pub const DEFAULT_EMBED_CONCURRENCY: usize = 8;

/// Abstract chunk index.
///
/// | Method | Before `initialize` | After `initialize` |
/// |--------|---------------------|--------------------|
/// | [`add_chunks`](IndexStore::add_chunks) | `StoreUninitialized` | embeds, then persists all or nothing |
/// | [`fingerprints`](IndexStore::fingerprints) | empty table | title → fingerprint |
/// | [`delete_by_doc_id`](IndexStore::delete_by_doc_id) | `StoreUninitialized` | no-op for unknown ids |
/// | [`delete_by_title`](IndexStore::delete_by_title) | `StoreUninitialized` | no-op for unknown titles |
/// | [`search`](IndexStore::search) | `StoreUninitialized` | ascending distance, `<= threshold` |
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Connect to / prepare the backend. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Embed and persist `chunks`, tagging each with `fingerprint`.
    ///
    /// Either every chunk is persisted or none is. Underlying storage is
    /// created on first use.
    async fn add_chunks(&self, chunks: &[Chunk], fingerprint: &str) -> Result<()>;

    /// The fingerprint recorded for each indexed title.
    async fn fingerprints(&self) -> Result<FingerprintTable>;

    /// Remove every chunk whose `doc_id` equals `doc_id`.
    async fn delete_by_doc_id(&self, doc_id: &str) -> Result<()>;

    /// Remove every chunk whose `title` equals `title`.
    async fn delete_by_title(&self, title: &str) -> Result<()>;

    /// Embed `query` and return up to `top_k` nearest chunks with
    /// `distance <= threshold`, closest first.
    async fn search(&self, query: &str, top_k: usize, threshold: f32) -> Result<Vec<SearchHit>>;
}

/// Embed every chunk of a batch, at most `concurrency` calls at a time.
///
/// Vectors come back in chunk order. The first failure aborts the batch.
pub async fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: &[Chunk],
    concurrency: usize,
) -> Result<Vec<Vec<f32>>> {
    let pending: Vec<_> = chunks.iter().map(|chunk| provider.embed(&chunk.text)).collect();
    stream::iter(pending)
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Order candidates by ascending distance, keep the first `top_k`, then
/// drop those farther than `threshold`.
///
/// Ties are broken by `(doc_id, chunk_index)` so results are stable.
pub fn rank_hits(mut candidates: Vec<SearchHit>, top_k: usize, threshold: f32) -> Vec<SearchHit> {
    candidates.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    candidates.truncate(top_k);
    candidates.retain(|hit| hit.distance <= threshold);
    candidates
}
