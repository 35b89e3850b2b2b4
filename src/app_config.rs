//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// SQLite database file.
    pub db_path: Option<PathBuf>,
    /// Directory where archives are downloaded and unpacked.
    pub work_dir: Option<PathBuf>,
    /// Maximum simultaneous downloads.
    pub concurrency: Option<usize>,
    /// Retry attempts for transient download failures.
    pub max_retries: Option<u32>,
    /// Download connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Download read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Copy limit for non-basic cards.
    pub max_copies: Option<u32>,
    /// Advisory minimum deck size.
    pub min_deck_size: Option<u32>,
    /// Fuzzy match threshold in `0.0..=1.0`.
    pub fuzzy_threshold: Option<f64>,
    /// Ollama base URL.
    pub ollama_url: Option<String>,
    /// Ollama model name.
    pub ollama_model: Option<String>,
    /// Database pool max connections (1..=20).
    pub db_max_connections: Option<u32>,
    /// Database busy timeout in milliseconds.
    pub db_busy_timeout_ms: Option<u32>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(mtgdb_core::fetch::MIN_CONCURRENCY..=mtgdb_core::fetch::MAX_CONCURRENCY)
                .contains(&concurrency)
        {
            bail!(
                "Invalid config value for `concurrency`: {concurrency}. Expected range: {}..={}",
                mtgdb_core::fetch::MIN_CONCURRENCY,
                mtgdb_core::fetch::MAX_CONCURRENCY
            );
        }

        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }

        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        if let Some(max_copies) = self.max_copies
            && max_copies == 0
        {
            bail!("Invalid config value for `max_copies`: 0. Expected at least 1");
        }

        if let Some(threshold) = self.fuzzy_threshold
            && !(0.0..=1.0).contains(&threshold)
        {
            bail!(
                "Invalid config value for `fuzzy_threshold`: {threshold}. Expected range: 0.0..=1.0"
            );
        }

        if let Some(url) = &self.ollama_url
            && url::Url::parse(url).is_err()
        {
            bail!("Invalid config value for `ollama_url`: '{url}' is not a URL");
        }

        validate_db_max_connections(self.db_max_connections)?;
        validate_db_busy_timeout_ms(self.db_busy_timeout_ms)?;

        Ok(())
    }
}

fn validate_db_max_connections(value: Option<u32>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=20).contains(&value) {
        bail!("Invalid config value for `db_max_connections`: {value}. Expected range: 1..=20");
    }
    Ok(())
}

fn validate_db_busy_timeout_ms(value: Option<u32>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > 120_000 {
        bail!("Invalid config value for `db_busy_timeout_ms`: {value}. Expected range: 0..=120000");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if one is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mtgdb/config.toml`
/// 2. `$HOME/.config/mtgdb/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("mtgdb").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("mtgdb")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = read_config_file(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig::default());
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = read_config_file(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_all_keys() {
        let config = parse_config_str(
            r#"
            db_path = "/data/cards.db"
            work_dir = "/tmp/mtg"
            concurrency = 8
            max_retries = 2
            connect_timeout_secs = 10
            read_timeout_secs = 120
            max_copies = 1
            min_deck_size = 100
            fuzzy_threshold = 0.9
            ollama_url = "http://gpu-box:11434"
            ollama_model = "mistral"
            db_max_connections = 3
            db_busy_timeout_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.db_path, Some(PathBuf::from("/data/cards.db")));
        assert_eq!(config.concurrency, Some(8));
        assert_eq!(config.max_copies, Some(1));
        assert_eq!(config.fuzzy_threshold, Some(0.9));
        assert_eq!(config.ollama_model.as_deref(), Some("mistral"));
    }

    #[test]
    fn test_parse_config_empty_is_default() {
        assert_eq!(parse_config_str("").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_parse_config_unknown_key_rejected() {
        let err = parse_config_str("rate_limit = 5").unwrap_err();
        assert!(format!("{err:#}").contains("rate_limit"));
    }

    #[test]
    fn test_parse_config_out_of_range_rejected() {
        assert!(parse_config_str("concurrency = 0").is_err());
        assert!(parse_config_str("concurrency = 33").is_err());
        assert!(parse_config_str("fuzzy_threshold = 1.5").is_err());
        assert!(parse_config_str("read_timeout_secs = 0").is_err());
        assert!(parse_config_str("db_max_connections = 21").is_err());
        assert!(parse_config_str("ollama_url = \"not a url\"").is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = load_file_config(Some(&temp_dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "max_copies = 2\n").unwrap();

        let loaded = load_file_config(Some(&path)).unwrap();
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.config.unwrap().max_copies, Some(2));
    }
}
