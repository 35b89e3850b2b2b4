//! Links command handlers: import and list the link registry.

use std::path::Path;

use anyhow::{Context, Result};
use mtgdb_core::store::{LinkRegistry, parse_link_list};
use tracing::warn;

use super::open_database;
use crate::app::config_runtime::Settings;

pub(crate) async fn run_links_import_command(file: &Path, settings: &Settings) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read link list '{}'", file.display()))?;

    let parsed = parse_link_list(&text);
    for skipped in &parsed.skipped {
        warn!(
            line = skipped.line_number,
            content = %skipped.content,
            reason = %skipped.reason,
            "Skipped link line"
        );
    }

    let registry = LinkRegistry::new(open_database(settings).await?);
    let stored = registry.replace_all(&parsed.links).await?;

    println!(
        "Imported {stored} links ({} lines skipped)",
        parsed.skipped.len()
    );
    Ok(())
}

pub(crate) async fn run_links_list_command(settings: &Settings) -> Result<()> {
    let registry = LinkRegistry::new(open_database(settings).await?);
    let links = registry.list().await?;

    if links.is_empty() {
        println!("No links registered. Import some with `mtgdb links import <file>`.");
        return Ok(());
    }

    for link in &links {
        println!("{:<24} {}  ({})", link.category, link.url, link.discovered_at);
    }
    Ok(())
}
