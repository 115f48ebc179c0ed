use std::path::Path;

use super::types::EngineConfig;
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "agentflow.toml";

/// Parse a config file.
pub fn load_from_path(path: &Path) -> Result<EngineConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<EngineConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Load from `path`, else `./agentflow.toml`, else defaults; then apply env overrides.
pub fn load(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let local = Path::new(DEFAULT_CONFIG_FILE);
    let mut cfg = match path {
        Some(p) => load_from_path(p)?,
        None if local.exists() => load_from_path(local)?,
        None => EngineConfig::default(),
    };
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

pub fn load_default() -> Result<EngineConfig, ConfigError> {
    load(None)
}

fn apply_env_overrides<F>(cfg: &mut EngineConfig, get: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("AGENTFLOW_MAX_WORKERS") {
        cfg.pool.max_workers = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            key: "AGENTFLOW_MAX_WORKERS".to_string(),
            value: v.clone(),
        })?;
    }
    if let Some(v) = non_empty("AGENTFLOW_MAX_ITERATIONS") {
        cfg.stage_loop.max_iterations =
            v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "AGENTFLOW_MAX_ITERATIONS".to_string(),
                value: v.clone(),
            })?;
    }
    if let Some(v) = non_empty("AGENTFLOW_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = non_empty("AGENTFLOW_STORAGE_DIR") {
        cfg.storage.directory = v;
    }

    Ok(())
}
