use serde::Deserialize;
use std::path::PathBuf;

use crate::memory::signal::DecaySchedule;
use crate::memory::retrieval::RetrievalConfig;

/// Main configuration structure for engramd
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage driver configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Completion provider configuration (fact extraction)
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Retrieval defaults
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    /// Per-strand decay rates
    #[serde(default)]
    pub decay: DecaySettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g. "127.0.0.1:7979")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Request timeout in seconds
    #[serde(default = "default_server_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_server_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:7979".to_string()
}

fn default_server_timeout_secs() -> u64 {
    60
}

/// Storage driver configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for persisted data (snapshot file)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Skip the snapshot file entirely; everything stays in memory
    #[serde(default)]
    pub ephemeral: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            ephemeral: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".engramd"))
        .unwrap_or_else(|| PathBuf::from(".engramd"))
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "hash" (deterministic local) or "remote"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Embedding dimension; fixes the store dimension at creation
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// Base URL of an OpenAI-compatible API (remote provider)
    #[serde(default)]
    pub api_url: String,
    /// Model identifier (remote provider)
    #[serde(default)]
    pub model: String,
    /// Environment variable holding the API key (remote provider)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in seconds (remote provider)
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            dimension: default_embedding_dimension(),
            api_url: String::new(),
            model: String::new(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_api_key_env() -> String {
    "ENGRAMD_API_KEY".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

/// Completion provider configuration for fact extraction
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    /// Provider name: "native" (deterministic local) or "remote"
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    /// Base URL of an OpenAI-compatible API (remote provider)
    #[serde(default)]
    pub api_url: String,
    /// Model identifier (remote provider)
    #[serde(default)]
    pub model: String,
    /// Environment variable holding the API key (remote provider)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in seconds (remote provider)
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            api_url: String::new(),
            model: String::new(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_completion_provider() -> String {
    "native".to_string()
}

/// Retrieval defaults
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSettings {
    /// Result count when a search omits `limit`
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
    /// Floor on the fused score
    #[serde(default = "default_min_final_score")]
    pub min_final_score: f32,
    /// Candidate pool multiplier over the requested limit
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            min_final_score: default_min_final_score(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

impl RetrievalSettings {
    pub fn to_pipeline_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            default_limit: self.default_limit,
            candidate_multiplier: self.candidate_multiplier,
            default_min_final_score: self.min_final_score,
            ..RetrievalConfig::default()
        }
    }
}

fn default_search_limit() -> usize {
    10
}

fn default_min_final_score() -> f32 {
    0.35
}

fn default_candidate_multiplier() -> usize {
    3
}

/// Per-strand decay rates and floor
#[derive(Debug, Clone, Deserialize)]
pub struct DecaySettings {
    #[serde(default = "default_rate_factual")]
    pub factual: f32,
    #[serde(default = "default_rate_experiential")]
    pub experiential: f32,
    #[serde(default = "default_rate_procedural")]
    pub procedural: f32,
    #[serde(default = "default_rate_preferential")]
    pub preferential: f32,
    #[serde(default = "default_rate_relational")]
    pub relational: f32,
    #[serde(default = "default_rate_general")]
    pub general: f32,
    #[serde(default = "default_min_signal")]
    pub min_signal: f32,
}

impl Default for DecaySettings {
    fn default() -> Self {
        Self {
            factual: default_rate_factual(),
            experiential: default_rate_experiential(),
            procedural: default_rate_procedural(),
            preferential: default_rate_preferential(),
            relational: default_rate_relational(),
            general: default_rate_general(),
            min_signal: default_min_signal(),
        }
    }
}

impl DecaySettings {
    pub fn to_schedule(&self) -> DecaySchedule {
        DecaySchedule {
            factual: self.factual,
            experiential: self.experiential,
            procedural: self.procedural,
            preferential: self.preferential,
            relational: self.relational,
            general: self.general,
            min_signal: self.min_signal,
        }
    }
}

fn default_rate_factual() -> f32 {
    0.95
}

fn default_rate_experiential() -> f32 {
    0.90
}

fn default_rate_procedural() -> f32 {
    0.97
}

fn default_rate_preferential() -> f32 {
    0.93
}

fn default_rate_relational() -> f32 {
    0.92
}

fn default_rate_general() -> f32 {
    0.88
}

fn default_min_signal() -> f32 {
    0.01
}
