//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] capability every backend implements,
//! the offline [`HashEmbedder`], and pure helpers for vector storage and
//! distance computation.
//!
//! HTTP-backed providers (OpenAI, Qwen) live in the `docsync` app crate.

use async_trait::async_trait;

use crate::error::Result;

/// Trait for embedding providers.
///
/// Implementations must be `Send + Sync` so a single provider can be
/// shared by the store and the query path.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed one text. Failures surface as [`SyncError::Embedding`](crate::SyncError::Embedding).
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Dimensionality of [`HashEmbedder`] vectors.
pub const HASH_EMBEDDING_DIMS: usize = 384;

/// Bag-of-words embedding that hashes each lower-cased word into one of
/// [`HASH_EMBEDDING_DIMS`] buckets, then L2-normalises the counts.
///
/// Deterministic and offline; useful as a default and in tests. Texts
/// sharing many words land close together, texts with disjoint
/// vocabularies are orthogonal.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous form of [`EmbeddingProvider::embed`].
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; HASH_EMBEDDING_DIMS];
        for word in text.to_lowercase().split_whitespace() {
            let bucket = word_hash(word).unsigned_abs() as usize % HASH_EMBEDDING_DIMS;
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "simple-hash"
    }

    fn dims(&self) -> usize {
        HASH_EMBEDDING_DIMS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// 32-bit string hash over UTF-16 code units (`h = h * 31 + c`, wrapping).
fn word_hash(word: &str) -> i32 {
    word.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32)
    })
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Squared Euclidean distance between two vectors.
///
/// For unit vectors this is `2 - 2·cos`, so it ranges over `[0, 4]`.
/// Vectors of different lengths are infinitely far apart.
pub fn squared_l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
