//! View command handler: search cards by name, type line and rules text.

use anyhow::{Result, bail};
use mtgdb_core::store::{CardCriteria, CardStore};

use super::db::render_card_row;
use super::open_database;
use crate::app::config_runtime::Settings;
use crate::cli::ViewArgs;

pub(crate) async fn run_view_command(args: &ViewArgs, settings: &Settings) -> Result<()> {
    let criteria = criteria(args);
    if criteria.is_empty() {
        bail!("Nothing to search for\n  Suggestion: Pass a name fragment, --type or --text");
    }
    let store = CardStore::new(open_database(settings).await?);
    let cards = store.find_cards(&criteria, args.limit).await?;

    if cards.is_empty() {
        println!("No cards match {}.", describe(&criteria));
        return Ok(());
    }

    for card in &cards {
        println!("{}", render_card_row(card));
        if let Some(text) = card.text.as_deref().filter(|text| !text.is_empty()) {
            for line in text.lines() {
                println!("         {line}");
            }
        }
    }
    Ok(())
}

fn criteria(args: &ViewArgs) -> CardCriteria {
    let mut criteria = CardCriteria::default();
    if let Some(term) = &args.term {
        criteria = criteria.name(term);
    }
    if let Some(type_line) = &args.type_line {
        criteria = criteria.type_line(type_line);
    }
    if let Some(text) = &args.text {
        criteria = criteria.text(text);
    }
    criteria
}

fn describe(criteria: &CardCriteria) -> String {
    [
        ("name", &criteria.name),
        ("type", &criteria.type_line),
        ("text", &criteria.text),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.as_ref().map(|value| format!("{label} '{value}'")))
    .collect::<Vec<_>>()
    .join(", ")
}
