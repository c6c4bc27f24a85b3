//! Configuration parsing and validation.
//!
//! paperqa is configured with a TOML file (default `./config/pqa.toml`).
//! Every section has defaults, so an empty file is a valid configuration
//! with embeddings and generation disabled.
//!
//! ```toml
//! [index]
//! dir = "./data/index"
//! collection = "default"
//!
//! [retrieval]
//! k = 4
//! fetch_k = 20
//! lambda = 0.5
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [llm]
//! provider = "gemini"
//! model = "gemini-1.5-flash"
//! temperature = 0.4
//!
//! [fetch]
//! dir = "./data/papers"
//! max_results = 3
//! ```
//!
//! API keys are read from the environment (`OPENAI_API_KEY`,
//! `GEMINI_API_KEY`), never from the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use paperqa_core::retrieve::RetrievalParams;

/// SQLite file created inside `[index].dir`.
pub const INDEX_DB_FILE: &str = "index.sqlite";

/// Upper bound on papers requested from the catalog in one fetch.
pub const MAX_FETCH_RESULTS: usize = 10;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Defaults for every section. Used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Persistence directory for the vector index.
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            collection: default_collection(),
        }
    }
}

impl IndexConfig {
    pub fn db_path(&self) -> PathBuf {
        self.dir.join(INDEX_DB_FILE)
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./data/index")
}
fn default_collection() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Sections whose trimmed content has at most this many characters
    /// are not indexed.
    #[serde(default = "default_min_section_chars")]
    pub min_section_chars: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_section_chars: default_min_section_chars(),
        }
    }
}

fn default_min_section_chars() -> usize {
    paperqa_core::builder::MIN_SECTION_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    #[serde(default = "default_lambda")]
    pub lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            fetch_k: default_fetch_k(),
            lambda: default_lambda(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            k: self.k,
            fetch_k: self.fetch_k,
            lambda: self.lambda,
        }
    }
}

fn default_k() -> usize {
    4
}
fn default_fetch_k() -> usize {
    20
}
fn default_lambda() -> f32 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama host, or a proxy for the hosted APIs).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    paperqa_core::index::DEFAULT_BATCH_SIZE
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Generation is not retried unless configured.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_retries: 0,
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_temperature() -> f32 {
    0.4
}
fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Directory downloaded PDFs are written to.
    #[serde(default = "default_papers_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Pause between successive catalog requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            dir: default_papers_dir(),
            base_url: default_base_url(),
            max_results: default_max_results(),
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_papers_dir() -> PathBuf {
    PathBuf::from("./data/papers")
}
fn default_base_url() -> String {
    "https://export.arxiv.org/api/query".to_string()
}
fn default_max_results() -> usize {
    3
}
fn default_request_delay_ms() -> u64 {
    3000
}
fn default_fetch_timeout() -> u64 {
    30
}

/// Clamp a requested result count into `1..=MAX_FETCH_RESULTS`.
pub fn clamp_max_results(n: usize) -> usize {
    n.clamp(1, MAX_FETCH_RESULTS)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde defaults cannot express.
pub fn validate(config: &Config) -> Result<()> {
    if config.index.collection.trim().is_empty() {
        bail!("index.collection must not be empty");
    }

    let r = &config.retrieval;
    if r.k == 0 {
        bail!("retrieval.k must be >= 1");
    }
    if r.fetch_k < r.k {
        bail!("retrieval.fetch_k ({}) must be >= retrieval.k ({})", r.fetch_k, r.k);
    }
    if !(0.0..=1.0).contains(&r.lambda) {
        bail!("retrieval.lambda must be in [0.0, 1.0]");
    }

    let e = &config.embedding;
    match e.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" | "gemini" => {
            if e.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    e.provider
                );
            }
            if e.dims.is_none() || e.dims == Some(0) {
                bail!("embedding.dims must be > 0 when provider is '{}'", e.provider);
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, gemini, or local.",
            other
        ),
    }
    if e.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    let l = &config.llm;
    match l.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" | "gemini" => {
            if l.model.is_none() {
                bail!("llm.model must be specified when provider is '{}'", l.provider);
            }
        }
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, ollama, or gemini.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&l.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }

    if config.fetch.base_url.trim().is_empty() {
        bail!("fetch.base_url must not be empty");
    }

    Ok(())
}
