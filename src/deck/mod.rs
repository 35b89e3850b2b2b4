//! Deck validation: turning untrusted candidate lists into legal decks.
//!
//! # Overview
//!
//! - [`parse_candidate_list`] - extracts name/quantity pairs from free text
//! - [`DeckValidator`] - resolves each entry against the store (exact, then
//!   fuzzy, then removed) and assembles a partitioned [`Deck`]
//! - [`SubstitutionReport`] - every fuzzy match, trim and removal made
//! - [`DeckGenerator`] - external source of candidate text
//! - [`DeckRequest`] - theme, required cards and matching store cards sent
//!   to a generator
//!
//! # Example
//!
//! ```no_run
//! use mtgdb_core::Database;
//! use mtgdb_core::deck::{DeckRules, DeckValidator, parse_candidate_list};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("mtg_cards.db")).await?;
//! let validator = DeckValidator::new(db, DeckRules::default());
//! let candidates = parse_candidate_list("4 Lightning Bolt\n20 Mountain");
//! let result = validator.validate(&candidates).await?;
//! for line in &result.report.entries {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

mod candidate;
pub mod generator;
mod prompt;
mod report;
pub mod resolve;
mod validator;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub use candidate::{CandidateEntry, CandidateList, parse_candidate_list};
pub use generator::{DeckGenerator, GeneratorError, OllamaGenerator};
pub use prompt::{DeckRequest, THEME_CARD_LIMIT, ThemeCard, theme_keywords};
pub use report::{RemovalReason, ReportEntry, ReportOutcome, SubstitutionReport};
pub use validator::{
    DEFAULT_FUZZY_MARGIN, DEFAULT_FUZZY_THRESHOLD, DEFAULT_MAX_COPIES, DEFAULT_MIN_DECK_SIZE, Deck,
    DeckCard, DeckDeficit, DeckRules, DeckValidation, DeckValidator, ValidatorError,
};

/// Errors writing an exported deck.
#[derive(Debug, Error)]
pub enum DeckExportError {
    /// The deck could not be serialized.
    #[error("failed to serialize deck: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The file could not be written.
    #[error("failed to write deck to {path}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// A generated deck as exported: what was asked for, the generator's
/// write-up and the validated result.
#[derive(Debug, Serialize)]
pub struct GeneratedDeck<'a> {
    /// Theme the deck was generated for.
    pub theme: &'a str,
    /// Cards the deck was required to contain.
    pub included: &'a [String],
    /// Full generator reply, card list and strategy notes.
    pub strategy: &'a str,
    /// Validated deck and substitution report.
    #[serde(flatten)]
    pub validation: &'a DeckValidation,
}

/// Writes `validation` to `path` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`DeckExportError`] if serialization or writing fails.
pub async fn save_deck(path: &Path, validation: &DeckValidation) -> Result<(), DeckExportError> {
    write_json(path, validation).await
}

/// Writes a generated deck with its theme and strategy to `path`.
///
/// # Errors
///
/// Returns [`DeckExportError`] if serialization or writing fails.
pub async fn save_generated_deck(
    path: &Path,
    deck: &GeneratedDeck<'_>,
) -> Result<(), DeckExportError> {
    write_json(path, deck).await
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DeckExportError> {
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| DeckExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), "deck saved");
    Ok(())
}
