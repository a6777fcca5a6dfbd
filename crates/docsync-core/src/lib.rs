//! # docsync core
//!
//! Runtime-free logic for docsync: data models, the paragraph chunker,
//! the fingerprint reconciliation engine, and the capability traits the
//! application plugs its backends into ([`source::DocumentSource`],
//! [`embedding::EmbeddingProvider`], [`store::IndexStore`]).
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Async trait
//! methods are plain futures, so any executor can drive them.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod search;
pub mod source;
pub mod store;

pub use error::{Result, SyncError};
