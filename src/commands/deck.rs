//! Deck command handlers: validate a candidate list, or generate one first.

use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};
use mtgdb_core::Database;
use mtgdb_core::deck::{
    CandidateList, DeckCard, DeckGenerator, DeckRequest, DeckValidation, DeckValidator,
    GeneratedDeck, OllamaGenerator, parse_candidate_list, save_deck, save_generated_deck,
};
use mtgdb_core::store::CardStore;
use tracing::{info, warn};

use super::open_database;
use crate::app::config_runtime::Settings;

pub(crate) async fn run_deck_validate_command(
    input: &str,
    save: Option<&Path>,
    settings: &Settings,
) -> Result<()> {
    let text = if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read candidate list from stdin")?;
        buffer
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read candidate list '{input}'"))?
    };

    let db = open_database(settings).await?;
    let validation = validate_and_print(db, &parse_candidate_list(&text), settings).await?;

    if let Some(path) = save {
        save_deck(path, &validation).await?;
        println!("Saved deck to {}", path.display());
    }
    Ok(())
}

pub(crate) async fn run_deck_generate_command(
    theme: &str,
    include: &[String],
    save: Option<&Path>,
    settings: &Settings,
) -> Result<()> {
    let db = open_database(settings).await?;
    let request = DeckRequest::new(theme)
        .with_rules(&settings.rules)
        .with_include(include.iter().cloned())
        .with_store_cards(&CardStore::new(db.clone()))
        .await?;

    let generator: Box<dyn DeckGenerator> = Box::new(OllamaGenerator::new(
        &settings.ollama_url,
        &settings.ollama_model,
    ));
    info!(
        generator = generator.name(),
        model = %settings.ollama_model,
        theme,
        theme_cards = request.theme_cards.len(),
        "Requesting deck"
    );

    let text = generator.generate(&request).await?;
    let mut candidates = parse_candidate_list(&text);
    info!(entries = candidates.len(), "Parsed generated list");
    let forced = candidates.ensure_included(&request.include);
    if !forced.is_empty() {
        warn!(cards = ?forced, "Generator left out required cards; adding one copy each");
    }

    let validation = validate_and_print(db, &candidates, settings).await?;

    if let Some(path) = save {
        let generated = GeneratedDeck {
            theme: &request.theme,
            included: &request.include,
            strategy: &text,
            validation: &validation,
        };
        save_generated_deck(path, &generated).await?;
        println!("Saved deck to {}", path.display());
    }
    Ok(())
}

async fn validate_and_print(
    db: Database,
    candidates: &CandidateList,
    settings: &Settings,
) -> Result<DeckValidation> {
    if candidates.is_empty() {
        bail!(
            "No card entries found in the input\n  Suggestion: Use one `<quantity> <card name>` per line"
        );
    }

    let validator = DeckValidator::new(db, settings.rules);
    let validation = validator.validate(candidates).await?;

    print_validation(&validation);
    Ok(validation)
}

fn print_validation(validation: &DeckValidation) {
    let deck = &validation.deck;
    print_section("Creatures", &deck.creatures);
    print_section("Spells", &deck.spells);
    print_section("Lands", &deck.lands);
    println!("Total: {} cards", deck.total_cards());

    if let Some(deficit) = validation.deficit {
        println!(
            "Warning: deck has {} cards, {} required",
            deficit.actual, deficit.required
        );
    }

    if !validation.report.is_empty() {
        println!();
        println!("Changes:");
        for entry in &validation.report.entries {
            println!("  {entry}");
        }
    }
}

fn print_section(title: &str, cards: &[DeckCard]) {
    if cards.is_empty() {
        return;
    }
    let count: u32 = cards.iter().map(|card| card.quantity).sum();
    println!("{title} ({count}):");
    for card in cards {
        println!("  {:>2} {} [{}]", card.quantity, card.name, card.set_code);
    }
}
