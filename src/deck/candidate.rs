//! Candidate card lists: untrusted name/quantity pairs awaiting validation.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::store::name_key;

/// `4x Name`, `4 x Name`, `4 Name`
#[allow(clippy::expect_used)]
static LEADING_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3})\s*[xX×]?\s+(.+)$").expect("leading quantity regex is valid") // Static pattern, safe to panic
});

/// `Name x4`, `Name ×4`
#[allow(clippy::expect_used)]
static TRAILING_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+[xX×]\s*(\d{1,3})$").expect("trailing quantity regex is valid") // Static pattern, safe to panic
});

/// Markdown bullets and list numbering: `- `, `* `, `• `, `1. `, `2) `
#[allow(clippy::expect_used)]
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•+]\s+|\d{1,3}[.)]\s+)").expect("list marker regex is valid") // Static pattern, safe to panic
});

/// Trailing `(M19)`, `[M19]`, `(24)` hints.
#[allow(clippy::expect_used)]
static TRAILING_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:\([^()]*\)|\[[^\[\]]*\])\s*$").expect("trailing hint regex is valid") // Static pattern, safe to panic
});

const SECTION_WORDS: &[&str] = &[
    "artifacts",
    "commander",
    "creatures",
    "creature",
    "deck",
    "decklist",
    "deck list",
    "enchantments",
    "instants",
    "lands",
    "land",
    "mainboard",
    "main deck",
    "non-creature spells",
    "other spells",
    "planeswalkers",
    "sideboard",
    "sorceries",
    "spells",
];

/// One requested card. `quantity` defaults to 1 when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEntry {
    /// Requested card name, as written.
    pub name: String,
    /// Requested copies.
    pub quantity: Option<u32>,
}

impl CandidateEntry {
    /// Creates an entry.
    pub fn new(name: impl Into<String>, quantity: Option<u32>) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }

    /// Requested copies, defaulting to 1.
    #[must_use]
    pub fn requested(&self) -> u32 {
        self.quantity.unwrap_or(1)
    }
}

/// Ordered list of candidate entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateList {
    /// Entries in request order.
    pub entries: Vec<CandidateEntry>,
}

impl CandidateList {
    /// Creates a list from entries.
    #[must_use]
    pub fn new(entries: Vec<CandidateEntry>) -> Self {
        Self { entries }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends each of `names` that no entry already requests, one copy each.
    /// Returns the names that were appended.
    pub fn ensure_included(&mut self, names: &[String]) -> Vec<String> {
        let mut present: HashSet<String> =
            self.entries.iter().map(|entry| name_key(&entry.name)).collect();
        let mut added = Vec::new();
        for name in names {
            let name = name.trim();
            if name.is_empty() || !present.insert(name_key(name)) {
                continue;
            }
            self.entries.push(CandidateEntry::new(name, None));
            added.push(name.to_string());
        }
        added
    }
}

impl FromIterator<CandidateEntry> for CandidateList {
    fn from_iter<I: IntoIterator<Item = CandidateEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Extracts candidate entries from free text such as a generator reply.
///
/// Section headers, blank lines and zero-quantity lines are dropped.
/// Trailing set hints and ` - comment` suffixes are stripped from names.
#[must_use]
pub fn parse_candidate_list(text: &str) -> CandidateList {
    text.lines().filter_map(parse_candidate_line).collect()
}

fn parse_candidate_line(raw: &str) -> Option<CandidateEntry> {
    let line = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '`'))
        .trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("//") || is_header(line) {
        return None;
    }

    let line = LIST_MARKER.replace(line, "");
    let line = line.trim().trim_matches(|c: char| matches!(c, '*' | '_' | '`'));

    let (quantity, name) = if let Some(caps) = LEADING_QUANTITY.captures(line) {
        (caps[1].parse::<u32>().ok(), caps[2].to_string())
    } else if let Some(caps) = TRAILING_QUANTITY.captures(line) {
        (caps[2].parse::<u32>().ok(), caps[1].to_string())
    } else {
        (None, line.to_string())
    };

    if quantity == Some(0) {
        trace!(line = raw, "skipping zero-quantity line");
        return None;
    }

    let name = clean_name(&name);
    if name.is_empty() {
        return None;
    }
    Some(CandidateEntry::new(name, quantity))
}

fn is_header(line: &str) -> bool {
    if line.ends_with(':') {
        return true;
    }
    let bare = TRAILING_HINT.replace(line, "");
    let bare = bare.trim().to_lowercase();
    SECTION_WORDS.contains(&bare.as_str())
}

fn clean_name(name: &str) -> String {
    let mut name = name.trim();
    for separator in [" - ", " – ", " — ", " : "] {
        if let Some((head, _)) = name.split_once(separator) {
            name = head.trim();
        }
    }

    let mut cleaned = name.to_string();
    loop {
        let stripped = TRAILING_HINT.replace(&cleaned, "").into_owned();
        if stripped == cleaned {
            break;
        }
        cleaned = stripped;
    }

    cleaned
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '`' | '"'))
        .trim()
        .to_string()
}
