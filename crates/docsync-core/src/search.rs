//! Query surface over an [`IndexStore`].
//!
//! [`search`] returns ranked hits; [`get_context`] concatenates the best
//! few into a single block of text for a downstream prompt.

use serde::Serialize;

use crate::error::Result;
use crate::models::SearchHit;
use crate::store::IndexStore;

/// Default number of hits returned by [`search`].
pub const DEFAULT_TOP_K: usize = 5;

/// Number of hits concatenated by [`get_context`].
pub const CONTEXT_TOP_K: usize = 3;

/// Default inclusive distance bound.
pub const DEFAULT_THRESHOLD: f32 = 1.0;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchParams {
    /// Maximum hits returned by [`search`].
    pub top_k: usize,
    /// Maximum hits concatenated by [`get_context`].
    pub context_top_k: usize,
    /// Hits farther than this are dropped.
    pub threshold: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            context_top_k: CONTEXT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Nearest chunks to `query`, closest first.
///
/// A blank query matches nothing.
pub async fn search(
    store: &dyn IndexStore,
    query: &str,
    params: &SearchParams,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }
    let hits = store.search(query, params.top_k, params.threshold).await?;
    tracing::debug!(query, hits = hits.len(), "search complete");
    Ok(hits)
}

/// The best [`SearchParams::context_top_k`] matches for `question`, each
/// rendered as `Title:…\nContent:…` and joined by `---` separators.
///
/// Returns `None` when nothing lies within the threshold.
pub async fn get_context(
    store: &dyn IndexStore,
    question: &str,
    params: &SearchParams,
) -> Result<Option<String>> {
    let params = SearchParams {
        top_k: params.context_top_k,
        ..*params
    };
    let hits = search(store, question, &params).await?;
    if hits.is_empty() {
        return Ok(None);
    }

    let blocks: Vec<String> = hits
        .iter()
        .map(|hit| format!("Title:{}\nContent:{}", hit.title, hit.text))
        .collect();
    Ok(Some(blocks.join(CONTEXT_SEPARATOR)))
}

/// Render hits as the plain-text listing printed by the CLI.
pub fn format_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No relevant content found.".to_string();
    }
    hits.iter()
        .map(|hit| {
            format!(
                "Title: {}\nDocId: {}\nContent: {}\n---",
                hit.title, hit.doc_id, hit.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::Chunk;
    use crate::store::memory::InMemoryStore;
    use futures::executor::block_on;
    use std::sync::Arc;

    fn store_with(docs: &[(&str, &str, &str)]) -> InMemoryStore {
        let store = InMemoryStore::new(Arc::new(HashEmbedder));
        block_on(store.initialize()).unwrap();
        for (doc_id, title, text) in docs {
            let chunk = Chunk {
                text: text.to_string(),
                doc_id: doc_id.to_string(),
                title: title.to_string(),
                chunk_index: 0,
            };
            block_on(store.add_chunks(&[chunk], "fp")).unwrap();
        }
        store
    }

    fn hit(title: &str, doc_id: &str, text: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            doc_id: doc_id.to_string(),
            text: text.to_string(),
            chunk_index: 0,
            distance: 0.5,
        }
    }

    #[test]
    fn test_default_params() {
        let params = SearchParams::default();
        assert_eq!(params.top_k, 5);
        assert_eq!(params.context_top_k, 3);
        assert_eq!(params.threshold, 1.0);
    }

    #[test]
    fn test_blank_query_returns_nothing() {
        let store = store_with(&[("a", "A", "anything at all")]);
        let hits = block_on(search(&store, "   ", &SearchParams::default())).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_no_hit_within_threshold_is_empty_not_error() {
        let store = store_with(&[("a", "A", "alpha beta gamma"), ("b", "B", "delta epsilon")]);
        let hits = block_on(search(&store, "x", &SearchParams::default())).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_search_finds_matching_chunk() {
        let store = store_with(&[
            ("rust", "Rust Notes", "ownership borrow checker lifetimes"),
            ("cook", "Cooking", "pasta tomato basil"),
        ]);
        let hits = block_on(search(
            &store,
            "ownership borrow checker lifetimes",
            &SearchParams::default(),
        ))
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "rust");
        assert!(hits[0].distance < 1e-5);
    }

    #[test]
    fn test_context_joins_top_three() {
        let store = store_with(&[
            ("a", "A", "shared words one"),
            ("b", "B", "shared words two"),
            ("c", "C", "shared words three"),
            ("d", "D", "shared words four"),
        ]);
        let context = block_on(get_context(&store, "shared words", &SearchParams::default()))
            .unwrap()
            .unwrap();
        assert_eq!(context.matches("\n\n---\n\n").count(), 2);
        assert!(context.starts_with("Title:"));
        assert!(context.contains("\nContent:shared words"));
    }

    #[test]
    fn test_context_none_when_nothing_matches() {
        let store = store_with(&[("a", "A", "alpha")]);
        let context = block_on(get_context(&store, "zeta", &SearchParams::default())).unwrap();
        assert!(context.is_none());
    }

    #[test]
    fn test_format_results() {
        let out = format_results(&[hit("Hello", "hello", "Hi there")]);
        assert_eq!(out, "Title: Hello\nDocId: hello\nContent: Hi there\n---");
        assert_eq!(format_results(&[]), "No relevant content found.");
    }
}
