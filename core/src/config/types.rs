use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub stage_loop: StageLoopConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "agentflow_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    4
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Total attempts, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    3
}

/// Stage control loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageLoopConfig {
    #[serde(default = "default_stages")]
    pub stages: Vec<String>,

    /// Number of loop-backs allowed before the loop is exhausted.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Stage to return to when a check is not done and recommends nothing.
    #[serde(default = "default_fallback_stage")]
    pub fallback_stage: String,
}

fn default_stages() -> Vec<String> {
    ["plan", "code", "test", "check"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_iterations() -> u32 {
    5
}

fn default_fallback_stage() -> String {
    "code".to_string()
}

impl Default for StageLoopConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            max_iterations: default_max_iterations(),
            fallback_stage: default_fallback_stage(),
        }
    }
}

/// Command line used to launch one provider's agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub envs: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_claude")]
    pub claude: ProviderCommand,
    #[serde(default = "default_codex")]
    pub codex: ProviderCommand,
    #[serde(default = "default_gemini")]
    pub gemini: ProviderCommand,
}

fn default_claude() -> ProviderCommand {
    ProviderCommand {
        command: "claude".to_string(),
        args: vec!["-p".to_string()],
        envs: HashMap::new(),
    }
}

fn default_codex() -> ProviderCommand {
    ProviderCommand {
        command: "codex".to_string(),
        args: vec!["exec".to_string()],
        envs: HashMap::new(),
    }
}

fn default_gemini() -> ProviderCommand {
    ProviderCommand {
        command: "gemini".to_string(),
        args: vec!["-p".to_string()],
        envs: HashMap::new(),
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            claude: default_claude(),
            codex: default_codex(),
            gemini: default_gemini(),
        }
    }
}

impl ProvidersConfig {
    pub fn command_for(&self, kind: ProviderKind) -> &ProviderCommand {
        match kind {
            ProviderKind::Claude => &self.claude,
            ProviderKind::Codex => &self.codex,
            ProviderKind::Gemini => &self.gemini,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_directory")]
    pub directory: String,
}

fn default_storage_directory() -> String {
    ".agentflow".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
        }
    }
}
