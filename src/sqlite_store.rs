//! SQLite-backed [`IndexStore`] implementation.
//!
//! One row per chunk in the `chunks` table; vectors are little-endian f32
//! BLOBs. Search loads every vector and ranks by squared Euclidean
//! distance, which is plenty for a personal corpus.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

use docsync_core::embedding::{blob_to_vec, squared_l2_distance, vec_to_blob, EmbeddingProvider};
use docsync_core::models::{Chunk, FingerprintTable, SearchHit};
use docsync_core::store::{embed_chunks, rank_hits, IndexStore, DEFAULT_EMBED_CONCURRENCY};
use docsync_core::{Result, SyncError};

use crate::db;

fn store_err(e: sqlx::Error) -> SyncError {
    SyncError::Store(e.to_string())
}

/// SQLite implementation of the [`IndexStore`] trait.
///
/// The pool is opened by [`IndexStore::initialize`]; the table is created
/// by the first [`IndexStore::add_chunks`].
pub struct SqliteIndexStore {
    db_path: PathBuf,
    pool: OnceCell<SqlitePool>,
    table_ready: AtomicBool,
    embedder: Arc<dyn EmbeddingProvider>,
    concurrency: usize,
}

impl SqliteIndexStore {
    pub fn new(db_path: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            db_path: db_path.into(),
            pool: OnceCell::new(),
            table_ready: AtomicBool::new(false),
            embedder,
            concurrency: DEFAULT_EMBED_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Close the pool, flushing the WAL. Further calls fail.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }

    fn pool(&self) -> Result<&SqlitePool> {
        self.pool.get().ok_or(SyncError::StoreUninitialized)
    }

    /// `None` when the table has not been created yet.
    async fn ready_pool(&self) -> Result<Option<&SqlitePool>> {
        let pool = self.pool()?;
        if self.table_ready.load(Ordering::Acquire) {
            return Ok(Some(pool));
        }
        if db::chunks_table_exists(pool).await.map_err(store_err)? {
            self.table_ready.store(true, Ordering::Release);
            return Ok(Some(pool));
        }
        Ok(None)
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn initialize(&self) -> Result<()> {
        let path = self.db_path.clone();
        self.pool
            .get_or_try_init(|| async move { db::connect(&path).await })
            .await
            .map_err(store_err)?;
        tracing::debug!(path = %self.db_path.display(), "opened index database");
        Ok(())
    }

    async fn add_chunks(&self, chunks: &[Chunk], fingerprint: &str) -> Result<()> {
        let pool = self.pool()?;
        let vectors = embed_chunks(self.embedder.as_ref(), chunks, self.concurrency).await?;

        if !self.table_ready.load(Ordering::Acquire) {
            db::ensure_schema(pool).await.map_err(store_err)?;
            self.table_ready.store(true, Ordering::Release);
        }

        let mut tx = pool.begin().await.map_err(store_err)?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO chunks (chunk_id, doc_id, title, chunk_index, text, vector, fingerprint)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(chunk.chunk_id())
            .bind(&chunk.doc_id)
            .bind(&chunk.title)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.text)
            .bind(vec_to_blob(&vector))
            .bind(fingerprint)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;

        tracing::debug!(count = chunks.len(), "inserted chunks");
        Ok(())
    }

    async fn fingerprints(&self) -> Result<FingerprintTable> {
        if self.pool.get().is_none() {
            return Ok(FingerprintTable::new());
        }
        let Some(pool) = self.ready_pool().await? else {
            return Ok(FingerprintTable::new());
        };

        let rows = sqlx::query("SELECT title, fingerprint FROM chunks ORDER BY seq ASC")
            .fetch_all(pool)
            .await
            .map_err(store_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let title: String = row.get("title");
                let fingerprint: String = row.get("fingerprint");
                (title, fingerprint)
            })
            .collect())
    }

    async fn delete_by_doc_id(&self, doc_id: &str) -> Result<()> {
        let Some(pool) = self.ready_pool().await? else {
            return Ok(());
        };
        let result = sqlx::query("DELETE FROM chunks WHERE doc_id = ?")
            .bind(doc_id)
            .execute(pool)
            .await
            .map_err(store_err)?;
        tracing::debug!(doc_id, removed = result.rows_affected(), "deleted chunks by doc id");
        Ok(())
    }

    async fn delete_by_title(&self, title: &str) -> Result<()> {
        let Some(pool) = self.ready_pool().await? else {
            return Ok(());
        };
        let result = sqlx::query("DELETE FROM chunks WHERE title = ?")
            .bind(title)
            .execute(pool)
            .await
            .map_err(store_err)?;
        tracing::debug!(title, removed = result.rows_affected(), "deleted chunks by title");
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize, threshold: f32) -> Result<Vec<SearchHit>> {
        self.pool()?;
        let query_vec = self.embedder.embed(query).await?;
        let Some(pool) = self.ready_pool().await? else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query("SELECT doc_id, title, chunk_index, text, vector FROM chunks")
            .fetch_all(pool)
            .await
            .map_err(store_err)?;

        let candidates: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let chunk_index: i64 = row.get("chunk_index");
                SearchHit {
                    title: row.get("title"),
                    doc_id: row.get("doc_id"),
                    text: row.get("text"),
                    chunk_index: chunk_index as usize,
                    distance: squared_l2_distance(&query_vec, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank_hits(candidates, top_k, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::embedding::HashEmbedder;
    use docsync_core::store::memory::InMemoryStore;

    fn chunk(doc_id: &str, title: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            doc_id: doc_id.to_string(),
            title: title.to_string(),
            chunk_index: index,
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> SqliteIndexStore {
        SqliteIndexStore::new(dir.path().join("data").join("index.sqlite"), Arc::new(HashEmbedder))
    }

    #[tokio::test]
    async fn test_uninitialized_behaviour() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.fingerprints().await.unwrap().is_empty());
        assert!(matches!(
            store.add_chunks(&[chunk("a", "A", 0, "x")], "h").await,
            Err(SyncError::StoreUninitialized)
        ));
        assert!(matches!(
            store.delete_by_title("A").await,
            Err(SyncError::StoreUninitialized)
        ));
        assert!(matches!(
            store.search("x", 5, 1.0).await,
            Err(SyncError::StoreUninitialized)
        ));
    }

    #[tokio::test]
    async fn test_empty_database_before_first_add() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();

        assert!(store.fingerprints().await.unwrap().is_empty());
        store.delete_by_doc_id("a").await.unwrap();
        store.delete_by_title("A").await.unwrap();
        assert!(store.search("anything", 5, 1.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_fingerprint_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.initialize().await.unwrap();

        store
            .add_chunks(
                &[chunk("a", "Alpha", 0, "alpha one"), chunk("a", "Alpha", 1, "alpha two")],
                "fa",
            )
            .await
            .unwrap();
        store
            .add_chunks(&[chunk("b", "Beta", 0, "beta")], "fb")
            .await
            .unwrap();

        let table = store.fingerprints().await.unwrap();
        assert_eq!(table.get("Alpha"), Some("fa"));
        assert_eq!(table.get("Beta"), Some("fb"));

        store.delete_by_title("Alpha").await.unwrap();
        let table = store.fingerprints().await.unwrap();
        assert!(table.get("Alpha").is_none());

        store.delete_by_doc_id("b").await.unwrap();
        assert!(store.fingerprints().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_orders_and_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.initialize().await.unwrap();
        store
            .add_chunks(&[chunk("rust", "Rust", 0, "ownership and borrowing rules")], "f1")
            .await
            .unwrap();
        store
            .add_chunks(&[chunk("food", "Food", 0, "tomato basil pasta")], "f2")
            .await
            .unwrap();

        let hits = store.search("ownership and borrowing rules", 5, 1.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "rust");
        assert_eq!(hits[0].chunk_index, 0);

        assert!(store.search("x", 5, 1.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = store_in(&dir);
            store.initialize().await.unwrap();
            store
                .add_chunks(&[chunk("a", "Alpha", 0, "persisted")], "fa")
                .await
                .unwrap();
            store.close().await;
        }
        let store = store_in(&dir);
        store.initialize().await.unwrap();
        assert_eq!(store.fingerprints().await.unwrap().get("Alpha"), Some("fa"));
    }

    async fn add_on_spawned_task(store: Arc<dyn IndexStore>) {
        store.initialize().await.unwrap();
        let worker = store.clone();
        tokio::spawn(async move {
            let chunks = vec![chunk("a", "Alpha", 0, "one"), chunk("a", "Alpha", 1, "two")];
            worker.add_chunks(&chunks, "fa").await
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(store.fingerprints().await.unwrap().get("Alpha"), Some("fa"));
    }

    #[tokio::test]
    async fn test_add_chunks_runs_on_spawned_task() {
        let dir = tempfile::tempdir().unwrap();
        add_on_spawned_task(Arc::new(store_in(&dir))).await;
        add_on_spawned_task(Arc::new(InMemoryStore::new(Arc::new(HashEmbedder)))).await;
    }
}
