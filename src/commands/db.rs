//! Db command handlers: statistics, listings and reinitialization.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Result, bail};
use mtgdb_core::dataset::Rarity;
use mtgdb_core::store::{CardStore, ReinitConfirmation, StoredCard};

use super::open_database;
use crate::app::config_runtime::Settings;
use crate::cli::DbCommand;

pub(crate) async fn run_db_command(command: &DbCommand, settings: &Settings) -> Result<()> {
    let store = CardStore::new(open_database(settings).await?);

    match command {
        DbCommand::Stats => {
            let stats = store.stats().await?;
            println!("database = {}", settings.db_path.display());
            println!("sets     = {}", stats.total_sets);
            println!("cards    = {}", stats.total_cards);
            for rarity in Rarity::ALL {
                println!("  {:<9} {}", rarity.as_str(), stats.by_rarity.get(rarity));
            }
            for set in &stats.by_set {
                println!("  {:<6} {:<40} {}", set.code, set.name, set.cards);
            }
        }
        DbCommand::List { limit, offset } => {
            let cards = store.list_cards(*limit, *offset).await?;
            if cards.is_empty() {
                println!("No cards at offset {offset}.");
            }
            for card in &cards {
                println!("{}", render_card_row(card));
            }
        }
        DbCommand::Sets => {
            let sets = store.list_sets().await?;
            if sets.is_empty() {
                println!("No sets stored.");
            }
            for set in &sets {
                println!(
                    "{:<6} {:<40} {:<10} {}",
                    set.code,
                    set.name,
                    set.release_date.as_deref().unwrap_or("-"),
                    set.category
                );
            }
        }
        DbCommand::Init { yes } => {
            let confirmed = *yes || confirm_reinit(&settings.db_path.display().to_string())?;
            if !confirmed {
                println!("Aborted; nothing was changed.");
                return Ok(());
            }
            store.reinitialize(ReinitConfirmation::Confirmed).await?;
            println!("Database reinitialized: {}", settings.db_path.display());
        }
    }
    Ok(())
}

pub(crate) fn render_card_row(card: &StoredCard) -> String {
    format!(
        "{:<6} {:<36} {:<10} {:<9} {}",
        card.set_code,
        card.name,
        card.mana_cost.as_deref().unwrap_or(""),
        card.rarity.as_str(),
        card.type_line
    )
}

fn confirm_reinit(db_label: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        bail!(
            "Refusing to reinitialize without confirmation\n  Suggestion: Re-run with `mtgdb db init --yes`"
        );
    }

    print!("This deletes every card, set and link in {db_label}. Type 'yes' to continue: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
