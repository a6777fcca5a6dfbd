//! Fingerprint reconciliation between a [`DocumentSource`] and an
//! [`IndexStore`].
//!
//! Each pass compares the fingerprint currently computed for a document
//! with the one recorded in the index under the document's title, and
//! issues the smallest set of deletes and adds that brings the index in
//! line with the corpus.
//!
//! | Prior fingerprint for title | Current fingerprint | State |
//! |-----------------------------|---------------------|-------|
//! | none | any | [`DocumentState::New`] |
//! | `h1` | `h1` | [`DocumentState::Unchanged`] |
//! | `h1` | `h2` | [`DocumentState::Modified`] |
//! | `h1` | no current document | [`DocumentState::Deleted`] |
//!
//! All entry points of one [`ReconcileContext`] (and its clones) run one at
//! a time; a full scan never interleaves with an incremental update.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::lock::Mutex;
use serde::Serialize;

use crate::chunk::Chunker;
use crate::error::Result;
use crate::models::{Chunk, Document, DocumentInfo, FingerprintTable};
use crate::source::DocumentSource;
use crate::store::IndexStore;

/// Classification of one document in a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    New,
    Modified,
    Unchanged,
    Deleted,
}

impl DocumentState {
    /// Classify a document from its prior and current fingerprints.
    pub fn classify(prior: Option<&str>, current: &str) -> Self {
        match prior {
            None => DocumentState::New,
            Some(prior) if prior == current => DocumentState::Unchanged,
            Some(_) => DocumentState::Modified,
        }
    }
}

/// Counts of what one full pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileTally {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    /// Documents that could not be hashed, loaded or indexed.
    pub failed: usize,
}

impl ReconcileTally {
    fn record(&mut self, state: DocumentState) {
        match state {
            DocumentState::New => self.added += 1,
            DocumentState::Modified => self.updated += 1,
            DocumentState::Unchanged => self.skipped += 1,
            DocumentState::Deleted => self.deleted += 1,
        }
    }
}

impl fmt::Display for ReconcileTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "added={} updated={} skipped={} deleted={} failed={}",
            self.added, self.updated, self.skipped, self.deleted, self.failed
        )
    }
}

/// Everything a reconciliation call needs, passed explicitly.
///
/// Cloning is cheap and clones share the same serialization gate.
#[derive(Clone)]
pub struct ReconcileContext {
    source: Arc<dyn DocumentSource>,
    store: Arc<dyn IndexStore>,
    chunker: Chunker,
    gate: Arc<Mutex<()>>,
}

impl ReconcileContext {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        store: Arc<dyn IndexStore>,
        chunker: Chunker,
    ) -> Self {
        Self {
            source,
            store,
            chunker,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn source(&self) -> &Arc<dyn DocumentSource> {
        &self.source
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn chunker(&self) -> Chunker {
        self.chunker
    }

    /// Full reconciliation of every document in the source.
    ///
    /// Per-document failures are logged and counted in
    /// [`ReconcileTally::failed`]; only listing the corpus, reading the
    /// fingerprint table, or a fatal store error abort the pass.
    pub async fn reconcile_all(&self) -> Result<ReconcileTally> {
        let _guard = self.gate.lock().await;

        let prior = self.store.fingerprints().await?;
        let entries = self.source.list_document_info().await?;
        tracing::debug!(
            documents = entries.len(),
            indexed_titles = prior.len(),
            "starting full reconciliation"
        );

        let mut tally = ReconcileTally::default();
        let mut visited: HashSet<String> = HashSet::new();

        for entry in entries {
            let info = match entry {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable document");
                    tally.failed += 1;
                    continue;
                }
            };

            match self.reconcile_listed(&prior, &info, &mut visited).await {
                Ok(Some(state)) => tally.record(state),
                Ok(None) => tally.skipped += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(doc_id = %info.id, error = %e, "failed to reconcile document");
                    tally.failed += 1;
                }
            }
        }

        for title in prior.titles() {
            if visited.contains(title) {
                continue;
            }
            match self.store.delete_by_title(title).await {
                Ok(()) => {
                    tracing::debug!(title, "removed deleted document");
                    tally.record(DocumentState::Deleted);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(title, error = %e, "failed to remove deleted document");
                    tally.failed += 1;
                }
            }
        }

        tracing::info!(
            added = tally.added,
            updated = tally.updated,
            skipped = tally.skipped,
            deleted = tally.deleted,
            failed = tally.failed,
            "reconciliation complete"
        );
        Ok(tally)
    }

    /// Incremental reconciliation after a file at `path` was added or changed.
    pub async fn reconcile_one(&self, path: &Path) -> Result<DocumentState> {
        let _guard = self.gate.lock().await;

        let id = self.source.id_for_path(path).await?;
        let fingerprint = self.source.fingerprint(&id).await?;
        let doc = self.source.load_document(&id).await?;

        let prior = self.store.fingerprints().await?;
        let state = DocumentState::classify(prior.get(&doc.title), &fingerprint);
        if state != DocumentState::Unchanged {
            self.index_document(&doc, &fingerprint, state).await?;
        }
        tracing::info!(doc_id = %id, title = %doc.title, ?state, "reconciled document");
        Ok(state)
    }

    /// Incremental reconciliation after the file at `path` was removed.
    ///
    /// The title is gone with the file, so chunks are removed by doc id.
    pub async fn reconcile_delete(&self, path: &Path) -> Result<()> {
        let _guard = self.gate.lock().await;

        let id = self.source.id_for_path(path).await?;
        self.store.delete_by_doc_id(&id).await?;
        tracing::info!(doc_id = %id, "removed document");
        Ok(())
    }

    /// Reconcile one listed document. `None` means the title was already
    /// claimed by an earlier document in this pass.
    async fn reconcile_listed(
        &self,
        prior: &FingerprintTable,
        info: &DocumentInfo,
        visited: &mut HashSet<String>,
    ) -> Result<Option<DocumentState>> {
        let doc = self.source.load_document(&info.id).await?;

        if !visited.insert(doc.title.clone()) {
            tracing::warn!(
                doc_id = %doc.id,
                title = %doc.title,
                "title already indexed for another document in this pass; skipping"
            );
            return Ok(None);
        }

        let state = DocumentState::classify(prior.get(&doc.title), &info.fingerprint);
        if state != DocumentState::Unchanged {
            self.index_document(&doc, &info.fingerprint, state).await?;
        }
        tracing::debug!(doc_id = %doc.id, ?state, "classified document");
        Ok(Some(state))
    }

    /// Replace whatever the index holds for `doc` with fresh chunks.
    ///
    /// Deletes always precede the add.
    async fn index_document(
        &self,
        doc: &Document,
        fingerprint: &str,
        state: DocumentState,
    ) -> Result<()> {
        if state == DocumentState::Modified {
            self.store.delete_by_title(&doc.title).await?;
        }
        // Chunks filed under a previous title of this document.
        self.store.delete_by_doc_id(&doc.id).await?;

        let chunks = self.chunk_document(doc);
        self.store.add_chunks(&chunks, fingerprint).await?;
        tracing::debug!(doc_id = %doc.id, chunks = chunks.len(), "indexed document");
        Ok(())
    }

    /// Chunks for `doc`; a body with no text is indexed as its title alone
    /// so its fingerprint is still recorded.
    fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let chunks = self.chunker.split(&doc.content, &doc.id, &doc.title);
        if !chunks.is_empty() {
            return chunks;
        }
        vec![Chunk {
            text: doc.title.clone(),
            doc_id: doc.id.clone(),
            title: doc.title.clone(),
            chunk_index: 0,
        }]
    }
}
