//! `docsync sync` and `docsync watch`.
//!
//! All reconciliation runs on one [`SyncWorker`] that drains a bounded
//! queue of [`PathEvent`]s in order, so a full pass and an incremental
//! update never touch the same document at once.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use docsync_core::chunk::Chunker;
use docsync_core::reconcile::{ReconcileContext, ReconcileTally};
use docsync_core::store::IndexStore;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::source_fs::FsDocumentSource;
use crate::sqlite_store::SqliteIndexStore;
use crate::watcher::{ChangeWatcher, PathEvent};

/// Open and initialize the configured SQLite index.
pub async fn open_store(config: &Config) -> Result<Arc<SqliteIndexStore>> {
    let embedder = create_provider(&config.embedding)?;
    let store = SqliteIndexStore::new(&config.db.path, embedder)
        .with_concurrency(config.embedding.concurrency);
    store
        .initialize()
        .await
        .with_context(|| format!("Failed to open index database: {}", config.db.path.display()))?;
    Ok(Arc::new(store))
}

/// Wire the filesystem source and `store` into a reconciliation context.
pub fn build_context(
    config: &Config,
    source: Arc<FsDocumentSource>,
    store: Arc<dyn IndexStore>,
) -> ReconcileContext {
    let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.overlap);
    ReconcileContext::new(source, store, chunker)
}

/// Sequential consumer of [`PathEvent`]s.
pub struct SyncWorker {
    ctx: ReconcileContext,
    events: mpsc::Receiver<PathEvent>,
}

impl SyncWorker {
    pub fn new(ctx: ReconcileContext, events: mpsc::Receiver<PathEvent>) -> Self {
        Self { ctx, events }
    }

    /// Run the startup pass, then handle events until every sender is gone.
    ///
    /// Only an unusable store stops the worker; everything else is logged.
    pub async fn run(mut self) -> docsync_core::Result<()> {
        match self.ctx.reconcile_all().await {
            Ok(tally) => tracing::info!(%tally, "startup scan finished"),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::error!(error = %e, "startup scan failed"),
        }

        while let Some(event) = self.events.recv().await {
            self.handle(event).await?;
        }
        tracing::debug!("change queue closed; worker exiting");
        Ok(())
    }

    /// Process one event to completion.
    pub async fn handle(&self, event: PathEvent) -> docsync_core::Result<()> {
        let result = match &event {
            PathEvent::Add(path) | PathEvent::Change(path) => {
                self.ctx.reconcile_one(path).await.map(|_| ())
            }
            PathEvent::Unlink(path) => self.ctx.reconcile_delete(path).await,
            PathEvent::Rescan => self.ctx.reconcile_all().await.map(|tally| {
                tracing::info!(%tally, "rescan finished");
            }),
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(?event, error = %e, "failed to apply change");
                Ok(())
            }
        }
    }
}

/// One full reconciliation pass.
pub async fn run_sync(config: &Config) -> Result<ReconcileTally> {
    let source = Arc::new(FsDocumentSource::new(&config.source)?);
    let store = open_store(config).await?;
    let ctx = build_context(config, source, store.clone());

    let tally = ctx.reconcile_all().await?;
    store.close().await;

    println!("sync {}", config.source.root.display());
    println!("  added: {}", tally.added);
    println!("  updated: {}", tally.updated);
    println!("  skipped: {}", tally.skipped);
    println!("  deleted: {}", tally.deleted);
    println!("  failed: {}", tally.failed);
    println!("ok");

    Ok(tally)
}

/// Startup pass plus live updates until Ctrl-C.
pub async fn run_watch(config: &Config) -> Result<()> {
    let source = Arc::new(FsDocumentSource::new(&config.source)?);
    let store = open_store(config).await?;
    let ctx = build_context(config, source.clone(), store.clone());

    let (tx, rx) = mpsc::channel(config.watch.queue_capacity);
    // Started before the startup scan so edits made during it are queued.
    let watcher = ChangeWatcher::start(
        source.root(),
        source.recursive(),
        source.filter().clone(),
        tx,
    )
    .with_context(|| format!("Failed to watch {}", source.root().display()))?;

    let worker = SyncWorker::new(ctx, rx);
    tokio::select! {
        result = worker.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted; shutting down"),
    }

    drop(watcher);
    store.close().await;
    Ok(())
}
