//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use anyhow::Context;
use carmatch::EngineConfig;

pub const CATALOG_ENV: &str = "CARMATCH_CATALOG";
pub const CONFIG_ENV: &str = "CARMATCH_CONFIG";

/// Resolve the catalog path: flag, then `CARMATCH_CATALOG`, then
/// `./catalog.json`, then `~/.carmatch/catalog.json`.
pub fn resolve_catalog_path(explicit: Option<&str>) -> String {
    if let Some(path) = explicit {
        return path.to_string();
    }

    if let Ok(env_path) = std::env::var(CATALOG_ENV) {
        return env_path;
    }

    let cwd_catalog = PathBuf::from("catalog.json");
    if cwd_catalog.exists() {
        return cwd_catalog.display().to_string();
    }

    format!("{}/.carmatch/catalog.json", home_dir())
}

/// Resolve the engine config path. `None` means built-in defaults.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<String> {
    if let Some(path) = explicit {
        return Some(path.to_string());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(env_path);
    }

    let cwd_config = PathBuf::from("carmatch.json");
    if cwd_config.exists() {
        return Some(cwd_config.display().to_string());
    }

    let home_config = PathBuf::from(format!("{}/.carmatch/config.json", home_dir()));
    home_config
        .exists()
        .then(|| home_config.display().to_string())
}

/// Load the engine config from the resolved path, or fall back to defaults.
pub fn load_engine_config(explicit: Option<&str>) -> anyhow::Result<EngineConfig> {
    match resolve_config_path(explicit) {
        Some(path) => EngineConfig::from_file(Path::new(&path))
            .with_context(|| format!("Failed to load config {path}")),
        None => {
            tracing::debug!("No config file found, using defaults");
            Ok(EngineConfig::default())
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}
