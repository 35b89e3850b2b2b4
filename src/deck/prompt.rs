//! What a generator is asked for: theme, required cards and store cards that
//! fit the theme.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::{debug, instrument};

use super::validator::{DEFAULT_MAX_COPIES, DEFAULT_MIN_DECK_SIZE, DeckRules};
use crate::dataset::Rarity;
use crate::store::{CardCriteria, CardStore, StoreError, StoredCard};

/// Most store cards quoted in one prompt.
pub const THEME_CARD_LIMIT: usize = 20;

/// Rows fetched per theme keyword before de-duplication.
const CARDS_PER_KEYWORD: u32 = 40;

const MIN_KEYWORD_LEN: usize = 3;

const FILLER_WORDS: &[&str] = &[
    "and", "but", "deck", "for", "from", "into", "that", "the", "theme", "with",
];

/// A store card quoted in the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeCard {
    /// Card name.
    pub name: String,
    /// Full type line.
    pub type_line: String,
    /// Rules text.
    pub text: Option<String>,
    /// Rarity.
    pub rarity: Rarity,
    /// Set code of the quoted printing.
    pub set_code: String,
}

impl From<StoredCard> for ThemeCard {
    fn from(card: StoredCard) -> Self {
        Self {
            name: card.name,
            type_line: card.type_line,
            text: card.text,
            rarity: card.rarity,
            set_code: card.set_code,
        }
    }
}

/// Input to a [`DeckGenerator`](super::DeckGenerator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckRequest {
    /// Free-form theme, e.g. `goblin aggro`.
    pub theme: String,
    /// Cards the deck must contain.
    pub include: Vec<String>,
    /// Store cards matching the theme keywords.
    pub theme_cards: Vec<ThemeCard>,
    /// Target deck size.
    pub deck_size: u32,
    /// Copy limit for non-basic cards.
    pub max_copies: u32,
}

impl DeckRequest {
    /// A request for `theme` under default deck rules.
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            include: Vec::new(),
            theme_cards: Vec::new(),
            deck_size: DEFAULT_MIN_DECK_SIZE,
            max_copies: DEFAULT_MAX_COPIES,
        }
    }

    /// Uses the size and copy limit of `rules`.
    #[must_use]
    pub fn with_rules(mut self, rules: &DeckRules) -> Self {
        self.deck_size = rules.min_deck_size;
        self.max_copies = rules.max_copies;
        self
    }

    /// Cards the deck must contain; blank names are dropped.
    #[must_use]
    pub fn with_include(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.include = names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        self
    }

    /// Looks up store cards mentioning each theme keyword in their name, type
    /// line or text. Cards are de-duplicated by name and capped at
    /// [`THEME_CARD_LIMIT`], keyword order first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a lookup fails.
    #[instrument(skip(self, store), fields(theme = %self.theme))]
    pub async fn with_store_cards(mut self, store: &CardStore) -> Result<Self, StoreError> {
        let mut seen = HashSet::new();
        let mut cards = Vec::new();

        'keywords: for keyword in theme_keywords(&self.theme) {
            let found = store
                .find_cards(&CardCriteria::default().keyword(&keyword), CARDS_PER_KEYWORD)
                .await?;
            debug!(%keyword, matches = found.len(), "theme keyword lookup");
            for card in found {
                if cards.len() == THEME_CARD_LIMIT {
                    break 'keywords;
                }
                if seen.insert(card.name.clone()) {
                    cards.push(ThemeCard::from(card));
                }
            }
        }

        self.theme_cards = cards;
        Ok(self)
    }

    /// Prompt text sent to the generator.
    #[must_use]
    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            "Build a {}-card Magic: The Gathering deck with this theme: {}\n",
            self.deck_size, self.theme
        );

        if !self.theme_cards.is_empty() {
            prompt.push_str("\nCards from the local database that fit the theme:\n");
            for card in &self.theme_cards {
                let _ = write!(
                    prompt,
                    "- {} ({}, {}, {})",
                    card.name,
                    card.type_line,
                    card.rarity.as_str(),
                    card.set_code
                );
                if let Some(text) = card.text.as_deref().filter(|text| !text.is_empty()) {
                    let _ = write!(prompt, ": {}", text.replace('\n', " "));
                }
                prompt.push('\n');
            }
        }

        prompt.push_str("\nRequirements:\n");
        let _ = writeln!(prompt, "- exactly {} cards", self.deck_size);
        let _ = writeln!(
            prompt,
            "- at most {} copies of any card except basic lands",
            self.max_copies
        );
        if !self.theme_cards.is_empty() {
            prompt.push_str("- prefer the database cards above where they fit\n");
        }
        if !self.include.is_empty() {
            let _ = writeln!(prompt, "- must include: {}", self.include.join(", "));
        }
        prompt.push_str(
            "- use only real card names\n\
             \n\
             List one card per line as `4x Card Name`, grouped under the headers \
             Creatures:, Spells: and Lands:. After the list, explain the key \
             synergies and how the deck wins.\n",
        );
        prompt
    }
}

/// Lowercased theme words worth looking up, in order, without repeats.
#[must_use]
pub fn theme_keywords(theme: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    theme
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|word| !FILLER_WORDS.contains(&word.as_str()))
        .filter(|word| seen.insert(word.clone()))
        .collect()
}
