//! Effective settings: CLI flag > config file > built-in default.

use std::path::PathBuf;

use mtgdb_core::DatabaseOptions;
use mtgdb_core::deck::DeckRules;
use mtgdb_core::deck::generator::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use mtgdb_core::fetch::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use mtgdb_core::fetch::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};

use crate::app_config::{FileConfig, LoadedConfig};
use crate::cli::{Cli, Command, DeckCommand};

/// Database file used when neither `--db` nor `db_path` is given.
pub(crate) const DEFAULT_DB_PATH: &str = "mtg_cards.db";

const DEFAULT_WORK_DIR_NAME: &str = "mtgdb-work";

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) config_loaded: bool,
    pub(crate) db_path: PathBuf,
    pub(crate) work_dir: PathBuf,
    pub(crate) concurrency: usize,
    pub(crate) max_retries: u32,
    pub(crate) connect_timeout_secs: u64,
    pub(crate) read_timeout_secs: u64,
    pub(crate) rules: DeckRules,
    pub(crate) ollama_url: String,
    pub(crate) ollama_model: String,
    pub(crate) db_options: DatabaseOptions,
}

pub(crate) fn resolve_settings(cli: &Cli, loaded: &LoadedConfig) -> Settings {
    let file = loaded.config.clone().unwrap_or_default();
    let FileConfig {
        db_path,
        work_dir,
        concurrency,
        max_retries,
        connect_timeout_secs,
        read_timeout_secs,
        max_copies,
        min_deck_size,
        fuzzy_threshold,
        ollama_url,
        ollama_model,
        db_max_connections,
        db_busy_timeout_ms,
    } = file;

    let mut settings = Settings {
        config_path: loaded.path.clone(),
        config_loaded: loaded.loaded_from_file,
        db_path: cli
            .db
            .clone()
            .or(db_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
        work_dir: work_dir.unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_WORK_DIR_NAME)),
        concurrency: concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        max_retries: max_retries.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        connect_timeout_secs: connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
        read_timeout_secs: read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
        rules: DeckRules::default(),
        ollama_url: ollama_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
        ollama_model: ollama_model.unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
        db_options: DatabaseOptions::default(),
    };

    if let Some(value) = max_copies {
        settings.rules.max_copies = value;
    }
    if let Some(value) = min_deck_size {
        settings.rules.min_deck_size = value;
    }
    if let Some(value) = fuzzy_threshold {
        settings.rules.fuzzy_threshold = value;
    }
    if let Some(n) = db_max_connections {
        settings.db_options.max_connections = n;
    }
    if let Some(ms) = db_busy_timeout_ms {
        settings.db_options.busy_timeout_ms = ms;
    }

    match &cli.command {
        Command::Ingest(args) => {
            if let Some(concurrency) = args.concurrency {
                settings.concurrency = usize::from(concurrency);
            }
            if let Some(max_retries) = args.max_retries {
                settings.max_retries = u32::from(max_retries);
            }
            if let Some(work_dir) = &args.work_dir {
                settings.work_dir.clone_from(work_dir);
            }
        }
        Command::Deck {
            command:
                DeckCommand::Generate {
                    model, ollama_url, ..
                },
        } => {
            if let Some(model) = model {
                settings.ollama_model.clone_from(model);
            }
            if let Some(url) = ollama_url {
                settings.ollama_url.clone_from(url);
            }
        }
        _ => {}
    }

    settings
}

/// Log level when `RUST_LOG` is unset.
pub(crate) fn resolve_default_log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
