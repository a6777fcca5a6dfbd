//! # docsync
//!
//! Keeps a searchable chunk index in sync with a directory of text
//! documents. Changes are detected by content fingerprint, never by
//! timestamp, so unchanged files are never re-embedded.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌────────────┐
//! │  Watcher   │──▶│  SyncWorker   │──▶│   SQLite    │
//! │  (notify)  │   │  reconcile_*  │   │  chunks+vec │
//! └────────────┘   └──────┬────────┘   └─────┬──────┘
//!                         │                  │
//!                  ┌──────▼──────┐     ┌─────▼──────┐
//!                  │ FsDocument  │     │   search   │
//!                  │   Source    │     │  context   │
//!                  └─────────────┘     └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsync sync                          # one full reconciliation pass
//! docsync watch                         # startup pass, then live updates
//! docsync search "borrow checker"       # ranked chunks
//! docsync context "how do lifetimes work?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`frontmatter`] | YAML/TOML front-matter extraction |
//! | [`source_fs`] | Filesystem document source |
//! | [`embedding`] | Embedding provider selection |
//! | [`db`] | Database connection and schema |
//! | [`sqlite_store`] | SQLite index store |
//! | [`watcher`] | Filesystem change notifications |
//! | [`sync`] | Sequential sync worker, `sync` and `watch` commands |
//! | [`search`] | `search` and `context` commands |
//!
//! The engine itself (chunking, reconciliation, store traits) lives in
//! [`docsync_core`].

pub mod config;
pub mod db;
pub mod embedding;
pub mod frontmatter;
pub mod logging;
pub mod search;
pub mod source_fs;
pub mod sqlite_store;
pub mod sync;
pub mod watcher;

pub use docsync_core;
