//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies the `TESSERA_LOG_LEVEL` override. A missing file resolves to
//! built-in defaults so the binary runs standalone.

use std::{env, fs, path::Path};

use serde::Deserialize;

use crate::error::AppError;
use crate::loader::DEFAULT_MEMORY_THRESHOLD_BYTES;

/// Modular-loading configuration.
#[derive(Debug, Clone)]
pub struct ModularConfig {
    /// Route capabilities through loadable feature units.
    pub enabled: bool,
    /// Degrade failed loads to fallback units instead of raising the error.
    pub fallback_enabled: bool,
    /// Advisory per-unit memory budget in MiB. Never blocks a load.
    pub memory_threshold_mib: u64,
}

impl ModularConfig {
    pub fn memory_threshold_bytes(&self) -> u64 {
        self.memory_threshold_mib * 1024 * 1024
    }
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub modular: ModularConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            modular: ModularConfig {
                enabled: true,
                fallback_enabled: true,
                memory_threshold_mib: DEFAULT_MEMORY_THRESHOLD_BYTES / (1024 * 1024),
            },
        }
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    modular: RawModular,
}

#[derive(Deserialize)]
struct RawModular {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_true")]
    fallback_enabled: bool,
    #[serde(default = "default_threshold_mib")]
    memory_threshold_mib: u64,
}

impl Default for RawModular {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_enabled: true,
            memory_threshold_mib: default_threshold_mib(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_threshold_mib() -> u64 {
    DEFAULT_MEMORY_THRESHOLD_BYTES / (1024 * 1024)
}

fn default_true() -> bool {
    true
}

/// Load config from `TESSERA_CONFIG` or `config/default.toml`, then apply
/// env-var overrides. A missing default file is not an error.
pub fn load() -> Result<Config, AppError> {
    let log_level_override = env::var("TESSERA_LOG_LEVEL").ok();
    match env::var("TESSERA_CONFIG").ok() {
        Some(path) => load_from(Path::new(&path), log_level_override.as_deref()),
        None => {
            let path = Path::new("config/default.toml");
            if path.exists() {
                load_from(path, log_level_override.as_deref())
            } else {
                let mut config = Config::default();
                if let Some(level) = log_level_override {
                    config.log_level = level;
                }
                Ok(config)
            }
        }
    }
}

/// Internal loader — accepts an explicit path and optional override.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, log_level_override: Option<&str>) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let log_level = log_level_override.unwrap_or(&parsed.log_level).to_string();

    Ok(Config {
        log_level,
        modular: ModularConfig {
            enabled: parsed.modular.enabled,
            fallback_enabled: parsed.modular.fallback_enabled,
            memory_threshold_mib: parsed.modular.memory_threshold_mib,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
log_level = "debug"

[modular]
enabled = false
memory_threshold_mib = 64
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert!(!cfg.modular.enabled);
        assert!(cfg.modular.fallback_enabled);
        assert_eq!(cfg.modular.memory_threshold_mib, 64);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), None).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.modular.enabled);
        assert_eq!(cfg.modular.memory_threshold_mib, 512);
    }

    #[test]
    fn log_level_override_wins() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("trace")).unwrap();
        assert_eq!(cfg.log_level, "trace");
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("config error"));
    }

    #[test]
    fn threshold_converts_to_bytes() {
        let cfg = Config::default();
        assert_eq!(cfg.modular.memory_threshold_bytes(), 512 * 1024 * 1024);
    }
}
