//! Persistent card store.
//!
//! [`CardStore`] writes parsed datasets into the `SQLite` mirror and answers
//! maintenance queries. Every ingestion batch runs in its own transaction;
//! dropping an uncommitted [`sqlx::Transaction`] rolls it back, so a failed
//! batch leaves no partial rows behind.
//!
//! # Example
//!
//! ```no_run
//! use mtgdb_core::Database;
//! use mtgdb_core::dataset::parse_dataset;
//! use mtgdb_core::store::CardStore;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CardStore::new(Database::new(Path::new("mtg_cards.db")).await?);
//! let dataset = parse_dataset(br#"{"data": {}}"#)?;
//! store.upsert_dataset(&dataset, "AllPrintings").await?;
//! println!("{} cards", store.stats().await?.total_cards);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod links;
mod models;

pub use error::{StoreDbErrorKind, StoreError};
pub use links::{Link, LinkListParse, LinkRegistry, NewLink, SkippedLine, parse_link_list};
pub use models::{
    CardCriteria, RarityCounts, ReinitConfirmation, SetCount, StoreStats, StoredCard, StoredSet, UpsertSummary,
};

use sqlx::{Sqlite, Transaction};
use tracing::{info, instrument, warn};

use crate::dataset::{CardRecord, ParsedDataset, Rarity, SetRecord};
use crate::db::Database;

/// Normalized lookup form of a card name: Unicode lowercase with runs of
/// whitespace collapsed to one space.
#[must_use]
pub fn name_key(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writer and maintenance interface over the card tables.
#[derive(Debug, Clone)]
pub struct CardStore {
    db: Database,
}

impl CardStore {
    /// Creates a store over the given database handle.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Upserts every set and card of `dataset` in one transaction.
    ///
    /// Sets are keyed by code and cards by uuid, so re-ingesting the same
    /// dataset leaves the store unchanged. Placeholder sets never overwrite
    /// an existing set row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if any statement fails; nothing from
    /// this dataset is kept in that case.
    #[instrument(skip(self, dataset), fields(sets = dataset.sets.len(), cards = dataset.cards.len()))]
    pub async fn upsert_dataset(
        &self,
        dataset: &ParsedDataset,
        category: &str,
    ) -> Result<UpsertSummary, StoreError> {
        let mut tx = self.db.pool().begin().await?;
        let mut summary = UpsertSummary::default();

        for set in &dataset.sets {
            summary.sets_written += upsert_set(&mut tx, set, category).await?;
        }
        for card in &dataset.cards {
            summary.cards_written += upsert_card(&mut tx, card).await?;
        }

        tx.commit().await?;

        info!(
            category,
            sets_written = summary.sets_written,
            cards_written = summary.cards_written,
            "dataset committed"
        );
        Ok(summary)
    }

    /// Aggregate counts, read from one consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a query fails.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut tx = self.db.pool().begin().await?;

        let total_cards: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards")
            .fetch_one(&mut *tx)
            .await?;
        let total_sets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sets")
            .fetch_one(&mut *tx)
            .await?;

        let rarity_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT rarity, COUNT(*) FROM cards GROUP BY rarity")
                .fetch_all(&mut *tx)
                .await?;
        let mut by_rarity = RarityCounts::default();
        for (value, count) in rarity_rows {
            match value.parse::<Rarity>() {
                Ok(rarity) => by_rarity.set(rarity, to_count(count)),
                Err(e) => warn!(error = %e, "ignoring unknown stored rarity"),
            }
        }

        let by_set = sqlx::query_as::<_, SetCount>(
            r"SELECT s.code AS code, s.name AS name, COUNT(c.uuid) AS cards
              FROM sets s
              LEFT JOIN cards c ON c.set_code = s.code
              GROUP BY s.code, s.name
              ORDER BY s.code",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(StoreStats {
            total_cards: to_count(total_cards),
            total_sets: to_count(total_sets),
            by_rarity,
            by_set,
        })
    }

    /// Lists cards ordered by name, then uuid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_cards(&self, limit: u32, offset: u32) -> Result<Vec<StoredCard>, StoreError> {
        let cards = sqlx::query_as::<_, StoredCard>(
            r"SELECT uuid, name, mana_cost, type_line, rarity, text, set_code
              FROM cards
              ORDER BY name, uuid
              LIMIT ? OFFSET ?",
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(self.db.pool())
        .await?;
        Ok(cards)
    }

    /// Lists every set ordered by code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_sets(&self) -> Result<Vec<StoredSet>, StoreError> {
        let sets = sqlx::query_as::<_, StoredSet>(
            "SELECT code, name, release_date, category FROM sets ORDER BY code",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(sets)
    }

    /// Case-insensitive substring search on card names.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn search_cards(&self, term: &str, limit: u32) -> Result<Vec<StoredCard>, StoreError> {
        self.find_cards(&CardCriteria::default().name(term), limit)
            .await
    }

    /// Cards matching every filter in `criteria`, ordered by name then uuid.
    ///
    /// An empty `criteria` matches every card.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_cards(
        &self,
        criteria: &CardCriteria,
        limit: u32,
    ) -> Result<Vec<StoredCard>, StoreError> {
        let cards = sqlx::query_as::<_, StoredCard>(
            r"SELECT uuid, name, mana_cost, type_line, rarity, text, set_code
              FROM cards
              WHERE (?1 IS NULL OR name_key LIKE ?1 ESCAPE '\')
                AND (?2 IS NULL OR type_line LIKE ?2 ESCAPE '\')
                AND (?3 IS NULL OR text LIKE ?3 ESCAPE '\')
                AND (?4 IS NULL
                     OR name_key LIKE ?4 ESCAPE '\'
                     OR type_line LIKE ?4 ESCAPE '\'
                     OR text LIKE ?4 ESCAPE '\')
              ORDER BY name, uuid
              LIMIT ?5",
        )
        .bind(criteria.name.as_deref().map(|name| contains_pattern(&name_key(name))))
        .bind(criteria.type_line.as_deref().map(contains_pattern))
        .bind(criteria.text.as_deref().map(contains_pattern))
        .bind(criteria.keyword.as_deref().map(contains_pattern))
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;
        Ok(cards)
    }

    /// Drops every table, including the migration ledger, and re-creates
    /// the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReinitNotConfirmed`] without touching anything
    /// unless `confirmation` is [`ReinitConfirmation::Confirmed`], and
    /// [`StoreError::Database`] / [`StoreError::Schema`] if dropping or
    /// re-creating fails.
    #[instrument(skip(self))]
    pub async fn reinitialize(&self, confirmation: ReinitConfirmation) -> Result<(), StoreError> {
        if confirmation != ReinitConfirmation::Confirmed {
            return Err(StoreError::ReinitNotConfirmed);
        }

        let mut tx = self.db.pool().begin().await?;
        for statement in [
            "DROP TABLE IF EXISTS cards",
            "DROP TABLE IF EXISTS sets",
            "DROP TABLE IF EXISTS links",
            "DROP TABLE IF EXISTS _sqlx_migrations",
        ] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        self.db.run_migrations().await?;
        warn!("store reinitialized; all sets, cards and links deleted");
        Ok(())
    }
}

async fn upsert_set(
    tx: &mut Transaction<'_, Sqlite>,
    set: &SetRecord,
    category: &str,
) -> Result<u64, sqlx::Error> {
    let sql = if set.placeholder {
        r"INSERT INTO sets (code, name, release_date, category)
          VALUES (?, ?, ?, ?)
          ON CONFLICT(code) DO NOTHING"
    } else {
        r"INSERT INTO sets (code, name, release_date, category)
          VALUES (?, ?, ?, ?)
          ON CONFLICT(code) DO UPDATE SET
              name = excluded.name,
              release_date = excluded.release_date,
              category = excluded.category"
    };

    let result = sqlx::query(sql)
        .bind(&set.code)
        .bind(&set.name)
        .bind(set.release_date.as_deref())
        .bind(category)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

async fn upsert_card(
    tx: &mut Transaction<'_, Sqlite>,
    card: &CardRecord,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r"INSERT INTO cards (uuid, name, name_key, mana_cost, type_line, rarity, text, set_code)
          VALUES (?, ?, ?, ?, ?, ?, ?, ?)
          ON CONFLICT(uuid) DO UPDATE SET
              name = excluded.name,
              name_key = excluded.name_key,
              mana_cost = excluded.mana_cost,
              type_line = excluded.type_line,
              rarity = excluded.rarity,
              text = excluded.text,
              set_code = excluded.set_code",
    )
    .bind(&card.uuid)
    .bind(&card.name)
    .bind(name_key(&card.name))
    .bind(card.mana_cost.as_deref())
    .bind(&card.type_line)
    .bind(card.rarity.as_str())
    .bind(card.text.as_deref())
    .bind(&card.set_code)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// `%value%` with LIKE wildcards in `value` escaped.
fn contains_pattern(value: &str) -> String {
    format!("%{}%", escape_like(value))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[allow(clippy::cast_sign_loss)]
fn to_count(value: i64) -> u64 {
    value.max(0) as u64
}
