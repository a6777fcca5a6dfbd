//! `docsync search` and `docsync context`.

use anyhow::Result;

use docsync_core::search::{format_results, get_context, search, SearchParams};

use crate::config::Config;
use crate::sync::open_store;

const NO_RESULTS: &str = "No relevant content found.";

/// Config retrieval parameters with CLI overrides applied.
pub fn resolve_params(config: &Config, top_k: Option<usize>, threshold: Option<f32>) -> SearchParams {
    let mut params = config.retrieval.params();
    if let Some(k) = top_k {
        params.top_k = k.max(1);
    }
    if let Some(t) = threshold {
        params.threshold = t;
    }
    params
}

pub async fn run_search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    threshold: Option<f32>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("{}", NO_RESULTS);
        return Ok(());
    }

    let params = resolve_params(config, top_k, threshold);
    let store = open_store(config).await?;
    let hits = search(store.as_ref(), query, &params).await?;
    store.close().await;

    println!("{}", format_results(&hits));
    Ok(())
}

pub async fn run_context(config: &Config, question: &str, threshold: Option<f32>) -> Result<()> {
    let params = resolve_params(config, None, threshold);
    let store = open_store(config).await?;
    let context = get_context(store.as_ref(), question, &params).await?;
    store.close().await;

    println!("{}", context.as_deref().unwrap_or(NO_RESULTS));
    Ok(())
}
