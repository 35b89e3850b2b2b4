//! CLI command handlers.

mod config;
mod db;
mod deck;
mod ingest;
mod links;
mod view;

pub(crate) use config::run_config_show_command;
pub(crate) use db::run_db_command;
pub(crate) use deck::{run_deck_generate_command, run_deck_validate_command};
pub(crate) use ingest::run_ingest_command;
pub(crate) use links::{run_links_import_command, run_links_list_command};
pub(crate) use view::run_view_command;

use anyhow::{Context, Result};
use mtgdb_core::Database;

use crate::app::config_runtime::Settings;

/// Opens (creating and migrating if needed) the configured database.
pub(crate) async fn open_database(settings: &Settings) -> Result<Database> {
    Database::new_with_options(&settings.db_path, settings.db_options)
        .await
        .with_context(|| format!("Failed to open database '{}'", settings.db_path.display()))
}
