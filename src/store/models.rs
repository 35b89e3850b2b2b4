//! Row types and summaries returned by the store.

use serde::Serialize;
use sqlx::FromRow;

use crate::dataset::Rarity;

/// A card row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct StoredCard {
    /// Stable upstream identifier.
    pub uuid: String,
    /// Card name.
    pub name: String,
    /// Mana cost.
    pub mana_cost: Option<String>,
    /// Full type line.
    pub type_line: String,
    /// Rarity.
    #[sqlx(try_from = "String")]
    pub rarity: Rarity,
    /// Oracle text.
    pub text: Option<String>,
    /// Owning set code.
    pub set_code: String,
}

impl StoredCard {
    /// Basic lands are exempt from copy limits.
    #[must_use]
    pub fn is_basic_land(&self) -> bool {
        self.type_line.contains("Basic") && self.type_line.contains("Land")
    }
}

/// Filters for [`CardStore::find_cards`](super::CardStore::find_cards).
///
/// Every present field is a case-insensitive substring match and all present
/// fields must hold. `keyword` matches name, type line or rules text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardCriteria {
    /// Name fragment.
    pub name: Option<String>,
    /// Type line fragment, e.g. `Goblin` or `Instant`.
    pub type_line: Option<String>,
    /// Rules text fragment.
    pub text: Option<String>,
    /// Fragment of any of the above.
    pub keyword: Option<String>,
}

impl CardCriteria {
    /// Matches cards whose name contains `name`.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = non_blank(name.into());
        self
    }

    /// Matches cards whose type line contains `type_line`.
    #[must_use]
    pub fn type_line(mut self, type_line: impl Into<String>) -> Self {
        self.type_line = non_blank(type_line.into());
        self
    }

    /// Matches cards whose rules text contains `text`.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = non_blank(text.into());
        self
    }

    /// Matches cards mentioning `keyword` in name, type line or text.
    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = non_blank(keyword.into());
        self
    }

    /// True when no filter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.type_line.is_none() && self.text.is_none() && self.keyword.is_none()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A set row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct StoredSet {
    /// Set code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Release date, `YYYY-MM-DD`.
    pub release_date: Option<String>,
    /// Category of the archive that last wrote the set.
    pub category: String,
}

/// Rows written by one `upsert_dataset` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    /// Sets inserted or updated (placeholders that already existed are not counted).
    pub sets_written: u64,
    /// Cards inserted or updated.
    pub cards_written: u64,
}

/// Card counts per rarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RarityCounts {
    /// `common`
    pub common: u64,
    /// `uncommon`
    pub uncommon: u64,
    /// `rare`
    pub rare: u64,
    /// `mythic`
    pub mythic: u64,
    /// `special`
    pub special: u64,
}

impl RarityCounts {
    /// Count for one rarity.
    #[must_use]
    pub fn get(&self, rarity: Rarity) -> u64 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Uncommon => self.uncommon,
            Rarity::Rare => self.rare,
            Rarity::Mythic => self.mythic,
            Rarity::Special => self.special,
        }
    }

    pub(crate) fn set(&mut self, rarity: Rarity, count: u64) {
        let slot = match rarity {
            Rarity::Common => &mut self.common,
            Rarity::Uncommon => &mut self.uncommon,
            Rarity::Rare => &mut self.rare,
            Rarity::Mythic => &mut self.mythic,
            Rarity::Special => &mut self.special,
        };
        *slot = count;
    }
}

/// Card count for one set.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct SetCount {
    /// Set code.
    pub code: String,
    /// Set name.
    pub name: String,
    /// Cards in the set.
    pub cards: i64,
}

/// Aggregate store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of card rows.
    pub total_cards: u64,
    /// Number of set rows.
    pub total_sets: u64,
    /// Cards per rarity.
    pub by_rarity: RarityCounts,
    /// Cards per set, ordered by code.
    pub by_set: Vec<SetCount>,
}

/// Explicit confirmation for destructive reinitialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReinitConfirmation {
    /// The caller confirmed that all data may be deleted.
    Confirmed,
    /// No confirmation; nothing is touched.
    NotConfirmed,
}

impl From<bool> for ReinitConfirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Self::Confirmed
        } else {
            Self::NotConfirmed
        }
    }
}
