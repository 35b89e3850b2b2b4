//! Deck assembly from an untrusted candidate list.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::candidate::CandidateList;
use super::report::{RemovalReason, ReportOutcome, SubstitutionReport};
use super::resolve::{FuzzyPolicy, NameEntry, Resolution, resolve_name};
use crate::db::Database;
use crate::store::{StoredCard, name_key};

/// Default copy limit for non-basic cards.
pub const DEFAULT_MAX_COPIES: u32 = 4;

/// Default minimum deck size.
pub const DEFAULT_MIN_DECK_SIZE: u32 = 60;

/// Default fuzzy similarity threshold.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// Default lead required over the fuzzy runner-up.
pub const DEFAULT_FUZZY_MARGIN: f64 = 0.05;

/// Errors that prevent validation altogether.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The store holds no cards; nothing could ever resolve.
    #[error(
        "card store is empty\n  Suggestion: Ingest data first (e.g. `mtgdb ingest --registry`)"
    )]
    EmptyStore,

    /// The store could not be queried.
    #[error("card store unavailable: {message}")]
    StoreUnavailable {
        /// Database error text.
        message: String,
    },
}

impl From<sqlx::Error> for ValidatorError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreUnavailable {
            message: err.to_string(),
        }
    }
}

/// Deck construction rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeckRules {
    /// Maximum copies of any non-basic card.
    pub max_copies: u32,
    /// Advisory minimum deck size.
    pub min_deck_size: u32,
    /// Minimum similarity for a fuzzy match.
    pub fuzzy_threshold: f64,
    /// Minimum lead of the best fuzzy score over the runner-up.
    pub fuzzy_margin: f64,
}

impl Default for DeckRules {
    fn default() -> Self {
        Self {
            max_copies: DEFAULT_MAX_COPIES,
            min_deck_size: DEFAULT_MIN_DECK_SIZE,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            fuzzy_margin: DEFAULT_FUZZY_MARGIN,
        }
    }
}

impl DeckRules {
    fn fuzzy_policy(&self) -> FuzzyPolicy {
        FuzzyPolicy {
            threshold: self.fuzzy_threshold,
            margin: self.fuzzy_margin,
        }
    }
}

/// A card slot in the assembled deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckCard {
    /// Card id (uuid).
    pub card_id: String,
    /// Card name.
    pub name: String,
    /// Type line.
    pub type_line: String,
    /// Set code of the chosen printing.
    pub set_code: String,
    /// Copies.
    pub quantity: u32,
}

/// Assembled deck, partitioned by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Deck {
    /// Cards whose type line contains `Creature` (and not `Land`).
    pub creatures: Vec<DeckCard>,
    /// Everything that is neither a land nor a creature.
    pub spells: Vec<DeckCard>,
    /// Cards whose type line contains `Land`.
    pub lands: Vec<DeckCard>,
}

impl Deck {
    /// Total copies across all sections.
    #[must_use]
    pub fn total_cards(&self) -> u32 {
        self.cards().map(|card| card.quantity).sum()
    }

    /// Every slot: creatures, then spells, then lands.
    pub fn cards(&self) -> impl Iterator<Item = &DeckCard> {
        self.creatures
            .iter()
            .chain(self.spells.iter())
            .chain(self.lands.iter())
    }

    /// True when no card survived validation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creatures.is_empty() && self.spells.is_empty() && self.lands.is_empty()
    }

    fn push(&mut self, card: DeckCard) {
        let section = if card.type_line.contains("Land") {
            &mut self.lands
        } else if card.type_line.contains("Creature") {
            &mut self.creatures
        } else {
            &mut self.spells
        };
        section.push(card);
    }
}

/// How far short of the minimum the deck is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeckDeficit {
    /// Minimum deck size.
    pub required: u32,
    /// Actual size.
    pub actual: u32,
}

/// Result of validating one candidate list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeckValidation {
    /// The assembled deck.
    pub deck: Deck,
    /// Fuzzy matches, trims and removals.
    pub report: SubstitutionReport,
    /// Present when the deck is smaller than the minimum. Advisory only.
    pub deficit: Option<DeckDeficit>,
}

/// A resolved card with its accumulated requested count.
struct Slot {
    card: StoredCard,
    requested: u32,
}

/// Validates candidate lists against the card store.
#[derive(Debug, Clone)]
pub struct DeckValidator {
    db: Database,
    rules: DeckRules,
}

impl DeckValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(db: Database, rules: DeckRules) -> Self {
        Self { db, rules }
    }

    /// Returns the rules in use.
    #[must_use]
    pub fn rules(&self) -> &DeckRules {
        &self.rules
    }

    /// Resolves every entry against the store and assembles a deck.
    ///
    /// All lookups run inside one read transaction, so a concurrent ingestion
    /// is observed entirely or not at all. The same candidate list against the
    /// same store contents always gives the same result.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError::EmptyStore`] if the store has no cards and
    /// [`ValidatorError::StoreUnavailable`] if it cannot be queried.
    #[instrument(skip(self, candidates), fields(entries = candidates.len()))]
    pub async fn validate(&self, candidates: &CandidateList) -> Result<DeckValidation, ValidatorError> {
        let mut tx = self.db.pool().begin().await?;

        let has_cards: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM cards)")
            .fetch_one(&mut *tx)
            .await?;
        if !has_cards {
            return Err(ValidatorError::EmptyStore);
        }

        let mut report = SubstitutionReport::default();
        let mut slots: Vec<Slot> = Vec::new();
        let mut slot_index: HashMap<String, usize> = HashMap::new();
        let mut distinct_names: Option<Vec<NameEntry>> = None;

        for entry in &candidates.entries {
            let requested = entry.requested();
            if requested == 0 {
                continue;
            }
            let key = name_key(&entry.name);

            let card = if let Some(card) = exact_lookup(&mut tx, &key).await? {
                card
            } else {
                if distinct_names.is_none() {
                    distinct_names = Some(load_distinct_names(&mut tx).await?);
                }
                let names = distinct_names.as_deref().unwrap_or_default();

                match resolve_name(&key, names, self.rules.fuzzy_policy()) {
                    Resolution::Matched { entry: matched, similarity } => {
                        let Some(card) = exact_lookup(&mut tx, &matched.key).await? else {
                            report.push(
                                &entry.name,
                                ReportOutcome::Removed {
                                    reason: RemovalReason::NoMatch,
                                },
                            );
                            continue;
                        };
                        debug!(requested = %entry.name, resolved = %card.name, similarity, "fuzzy match");
                        report.push(
                            &entry.name,
                            ReportOutcome::FuzzyMatched {
                                resolved_name: card.name.clone(),
                                card_id: card.uuid.clone(),
                                similarity,
                            },
                        );
                        card
                    }
                    Resolution::Ambiguous { candidates } => {
                        debug!(requested = %entry.name, ?candidates, "ambiguous request removed");
                        report.push(
                            &entry.name,
                            ReportOutcome::Removed {
                                reason: RemovalReason::Ambiguous { candidates },
                            },
                        );
                        continue;
                    }
                    Resolution::NoMatch => {
                        debug!(requested = %entry.name, "unresolved request removed");
                        report.push(
                            &entry.name,
                            ReportOutcome::Removed {
                                reason: RemovalReason::NoMatch,
                            },
                        );
                        continue;
                    }
                }
            };

            match slot_index.get(&card.uuid) {
                Some(&index) => {
                    slots[index].requested = slots[index].requested.saturating_add(requested);
                }
                None => {
                    slot_index.insert(card.uuid.clone(), slots.len());
                    slots.push(Slot { card, requested });
                }
            }
        }

        tx.commit().await?;

        let mut deck = Deck::default();
        for slot in slots {
            let unbounded = slot.card.is_basic_land();
            let kept = if unbounded {
                slot.requested
            } else {
                slot.requested.min(self.rules.max_copies)
            };
            if kept < slot.requested {
                report.push(
                    &slot.card.name,
                    ReportOutcome::Trimmed {
                        requested: slot.requested,
                        kept,
                        limit: self.rules.max_copies,
                    },
                );
            }
            if kept == 0 {
                continue;
            }
            deck.push(DeckCard {
                card_id: slot.card.uuid,
                name: slot.card.name,
                type_line: slot.card.type_line,
                set_code: slot.card.set_code,
                quantity: kept,
            });
        }

        let actual = deck.total_cards();
        let deficit = (actual < self.rules.min_deck_size).then_some(DeckDeficit {
            required: self.rules.min_deck_size,
            actual,
        });

        info!(
            total_cards = actual,
            report_entries = report.len(),
            short = deficit.is_some(),
            "deck validated"
        );

        Ok(DeckValidation {
            deck,
            report,
            deficit,
        })
    }
}

/// Lowest-uuid printing whose name key matches exactly.
async fn exact_lookup(
    tx: &mut Transaction<'_, Sqlite>,
    key: &str,
) -> Result<Option<StoredCard>, sqlx::Error> {
    if key.is_empty() {
        return Ok(None);
    }
    sqlx::query_as::<_, StoredCard>(
        r"SELECT uuid, name, mana_cost, type_line, rarity, text, set_code
          FROM cards
          WHERE name_key = ?
          ORDER BY uuid
          LIMIT 1",
    )
    .bind(key)
    .fetch_optional(&mut **tx)
    .await
}

async fn load_distinct_names(
    tx: &mut Transaction<'_, Sqlite>,
) -> Result<Vec<NameEntry>, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r"SELECT name_key, MIN(name)
          FROM cards
          GROUP BY name_key
          ORDER BY name_key",
    )
    .fetch_all(&mut **tx)
    .await?;

    debug!(names = rows.len(), "loaded distinct card names");
    Ok(rows
        .into_iter()
        .map(|(key, name)| NameEntry { key, name })
        .collect())
}
