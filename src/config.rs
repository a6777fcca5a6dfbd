//! TOML configuration.
//!
//! Every section except `[source]` is optional and falls back to the
//! defaults below. API keys are never read from the file; see
//! [`crate::embedding`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docsync_core::chunk::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use docsync_core::search::{SearchParams, CONTEXT_TOP_K, DEFAULT_THRESHOLD, DEFAULT_TOP_K};
use docsync_core::store::DEFAULT_EMBED_CONCURRENCY;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub root: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_context_top_k")]
    pub context_top_k: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            context_top_k: CONTEXT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> SearchParams {
        SearchParams {
            top_k: self.top_k,
            context_top_k: self.context_top_k,
            threshold: self.threshold,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_context_top_k() -> usize {
    CONTEXT_TOP_K
}
fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_provider() -> String {
    "simple".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}
fn default_concurrency() -> usize {
    DEFAULT_EMBED_CONCURRENCY
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/docsync.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Directory for daily-rotated JSON log files. Unset disables file logging.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.source.extensions.is_empty() {
        bail!("source.extensions must list at least one extension");
    }

    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!("chunking.overlap must be < chunking.chunk_size");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.context_top_k < 1 {
        bail!("retrieval.context_top_k must be >= 1");
    }
    if config.retrieval.threshold.is_nan() || config.retrieval.threshold < 0.0 {
        bail!("retrieval.threshold must be >= 0");
    }

    match config.embedding.provider.as_str() {
        "simple" | "openai" | "qwen" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be simple, openai, or qwen.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.concurrency == 0 {
        bail!("embedding.concurrency must be >= 1");
    }

    if config.watch.queue_capacity == 0 {
        bail!("watch.queue_capacity must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(toml_text: &str) -> Result<Config> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml_text.as_bytes()).unwrap();
        load_config(file.path())
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[source]\nroot = \"./posts\"\n").unwrap();
        assert_eq!(cfg.source.extensions, vec!["md"]);
        assert!(!cfg.source.recursive);
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.retrieval.context_top_k, 3);
        assert_eq!(cfg.retrieval.threshold, 1.0);
        assert_eq!(cfg.embedding.provider, "simple");
        assert_eq!(cfg.embedding.concurrency, 8);
        assert_eq!(cfg.db.path, PathBuf::from("./data/docsync.sqlite"));
        assert_eq!(cfg.watch.queue_capacity, 256);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.dir.is_none());
    }

    #[test]
    fn test_missing_source_rejected() {
        assert!(parse("[db]\npath = \"x.sqlite\"\n").is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let err = parse("[source]\nroot = \".\"\n[chunking]\nchunk_size = 100\noverlap = 100\n")
            .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[source]\nroot = \".\"\n[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        assert!(parse("[source]\nroot = \".\"\n[retrieval]\nthreshold = -0.5\n").is_err());
    }

    #[test]
    fn test_retrieval_params() {
        let cfg = parse("[source]\nroot = \".\"\n[retrieval]\ntop_k = 7\nthreshold = 0.4\n").unwrap();
        let params = cfg.retrieval.params();
        assert_eq!(params.top_k, 7);
        assert_eq!(params.context_top_k, 3);
        assert!((params.threshold - 0.4).abs() < 1e-6);
    }
}
