//! Parsing of upstream JSON data files into normalized records.
//!
//! Two document shapes are accepted:
//!
//! - a set map, `{"data": {"<CODE>": {"name", "releaseDate", "cards": [...]}}}`
//! - a flat card list, `{"data": [card, ...]}` where cards may carry `setCode`
//!
//! Malformed records are skipped and counted; only an unusable document as a
//! whole is an error. Parsing is deterministic: the same bytes always yield
//! an equal [`ParsedDataset`].

mod error;
mod records;

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

pub use error::DatasetError;
pub use records::{
    CardRecord, Rarity, SENTINEL_SET_CODE, SENTINEL_SET_NAME, SetRecord, UnknownRarity,
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Number of records dropped while parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SkipCounts {
    /// Set entries that were not usable (their cards are unreachable).
    pub sets: usize,
    /// Individual card records that were malformed.
    pub cards: usize,
}

impl SkipCounts {
    /// Total skipped records.
    #[must_use]
    pub fn total(&self) -> usize {
        self.sets + self.cards
    }

    /// Adds another file's counts to this one.
    pub fn merge(&mut self, other: Self) {
        self.sets += other.sets;
        self.cards += other.cards;
    }
}

/// Records parsed from one data file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDataset {
    /// Sets sorted by code, placeholders included.
    pub sets: Vec<SetRecord>,
    /// Cards grouped by set code, file order within a set.
    pub cards: Vec<CardRecord>,
    /// What was dropped.
    pub skipped: SkipCounts,
}

/// Reads and parses the data file at `path`.
///
/// # Errors
///
/// Returns [`DatasetError::Io`] if the file cannot be read, otherwise see
/// [`parse_dataset`].
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn parse_dataset_file(path: &Path) -> Result<ParsedDataset, DatasetError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let parsed = tokio::task::spawn_blocking(move || parse_dataset(&bytes))
        .await
        .map_err(|e| DatasetError::fatal(format!("parser task panicked: {e}")))??;

    info!(
        sets = parsed.sets.len(),
        cards = parsed.cards.len(),
        skipped_sets = parsed.skipped.sets,
        skipped_cards = parsed.skipped.cards,
        "dataset parsed"
    );
    Ok(parsed)
}

/// Parses one JSON data document.
///
/// # Errors
///
/// Returns [`DatasetError::Fatal`] if the bytes are not JSON, have no `data`
/// member, or `data` is neither an object nor an array.
pub fn parse_dataset(bytes: &[u8]) -> Result<ParsedDataset, DatasetError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut root: Value = serde_json::from_slice(bytes)
        .map_err(|e| DatasetError::fatal(format!("invalid JSON: {e}")))?;

    let data = root
        .as_object_mut()
        .and_then(|object| object.remove("data"))
        .ok_or_else(|| DatasetError::fatal("missing top-level `data` member"))?;

    match data {
        Value::Object(sets) => Ok(parse_set_map(sets)),
        Value::Array(cards) => Ok(parse_card_list(cards)),
        other => Err(DatasetError::fatal(format!(
            "`data` must be an object or an array, found {}",
            json_type_name(&other)
        ))),
    }
}

fn parse_set_map(sets: Map<String, Value>) -> ParsedDataset {
    let ordered: BTreeMap<String, Value> = sets.into_iter().collect();
    let mut parsed = ParsedDataset::default();

    for (code, entry) in ordered {
        let Some((set, cards)) = parse_set_entry(&code, entry) else {
            debug!(%code, "skipping malformed set entry");
            parsed.skipped.sets += 1;
            continue;
        };

        for card in cards {
            match parse_card(&card, Some(&code)) {
                Some(record) => parsed.cards.push(record),
                None => parsed.skipped.cards += 1,
            }
        }
        parsed.sets.push(set);
    }

    parsed
}

fn parse_set_entry(code: &str, entry: Value) -> Option<(SetRecord, Vec<Value>)> {
    if code.trim().is_empty() {
        return None;
    }
    let Value::Object(mut object) = entry else {
        return None;
    };

    let name = required_str(&object, "name")?;
    let release_date = optional_str(&object, "releaseDate")?;
    let cards = match object.remove("cards") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(cards)) => cards,
        Some(_) => return None,
    };

    let set = SetRecord {
        code: code.to_string(),
        name,
        release_date,
        placeholder: false,
    };
    Some((set, cards))
}

fn parse_card_list(cards: Vec<Value>) -> ParsedDataset {
    let mut parsed = ParsedDataset::default();
    let mut by_set: BTreeMap<String, Vec<CardRecord>> = BTreeMap::new();

    for card in &cards {
        match parse_card(card, None) {
            Some(record) => {
                by_set.entry(record.set_code.clone()).or_default().push(record);
            }
            None => parsed.skipped.cards += 1,
        }
    }

    parsed.sets = by_set.keys().map(|code| SetRecord::placeholder(code)).collect();
    parsed.cards = by_set.into_values().flatten().collect();
    parsed
}

/// Parses one card. `set_code` overrides the card's own `setCode`.
fn parse_card(value: &Value, set_code: Option<&str>) -> Option<CardRecord> {
    let object = value.as_object()?;

    let uuid = required_str(object, "uuid")?;
    let name = required_str(object, "name")?;
    let type_line = required_str(object, "type")?;
    let rarity = Rarity::from_upstream(&required_str(object, "rarity")?)?;
    let mana_cost = optional_str(object, "manaCost")?;
    let text = optional_str(object, "text")?;
    let own_code = optional_str(object, "setCode")?;

    let set_code = match set_code {
        Some(code) => code.to_string(),
        None => own_code
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| SENTINEL_SET_CODE.to_string()),
    };

    Some(CardRecord {
        uuid,
        name,
        mana_cost,
        type_line,
        rarity,
        text,
        set_code,
    })
}

/// A present, non-blank string member.
fn required_str(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// `Some(None)` when absent or null, `Some(Some(_))` for a string, `None`
/// when the member has the wrong type.
fn optional_str(object: &Map<String, Value>, key: &str) -> Option<Option<String>> {
    match object.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SET_MAP: &str = r#"{
        "meta": {"version": "5.2.2"},
        "data": {
            "TST": {
                "name": "Test Set",
                "code": "IGNORED",
                "releaseDate": "2020-01-01",
                "cards": [
                    {"uuid": "c1", "name": "Bolt", "type": "Instant", "rarity": "common",
                     "manaCost": "{R}", "text": "Deal 3 damage.", "foreignData": []},
                    {"uuid": "c2", "name": "Bear", "type": "Creature — Bear", "rarity": "bonus"}
                ]
            },
            "AAA": {"name": "First Set", "cards": []}
        }
    }"#;

    #[test]
    fn test_parse_set_map() {
        let parsed = parse_dataset(SET_MAP.as_bytes()).unwrap();

        let codes: Vec<_> = parsed.sets.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, ["AAA", "TST"], "sets should be sorted by code");
        assert_eq!(parsed.sets[1].name, "Test Set");
        assert_eq!(parsed.sets[1].release_date.as_deref(), Some("2020-01-01"));
        assert!(!parsed.sets[1].placeholder);

        assert_eq!(parsed.cards.len(), 2);
        let bolt = &parsed.cards[0];
        assert_eq!(bolt.uuid, "c1");
        assert_eq!(bolt.set_code, "TST");
        assert_eq!(bolt.mana_cost.as_deref(), Some("{R}"));
        assert_eq!(bolt.rarity, Rarity::Common);
        assert_eq!(parsed.cards[1].rarity, Rarity::Special);
        assert_eq!(parsed.skipped, SkipCounts::default());
    }

    #[test]
    fn test_parse_card_list_uses_set_code_and_sentinel() {
        let json = r#"{"data": [
            {"uuid": "a", "name": "Shock", "type": "Instant", "rarity": "common", "setCode": "M19"},
            {"uuid": "b", "name": "Mystery", "type": "Sorcery", "rarity": "rare"},
            {"uuid": "c", "name": "Opt", "type": "Instant", "rarity": "common", "setCode": "M19"}
        ]}"#;

        let parsed = parse_dataset(json.as_bytes()).unwrap();

        assert_eq!(parsed.sets.len(), 2);
        assert_eq!(parsed.sets[0].code, "M19");
        assert!(parsed.sets[0].placeholder);
        assert_eq!(parsed.sets[1].code, SENTINEL_SET_CODE);
        assert_eq!(parsed.sets[1].name, SENTINEL_SET_NAME);

        let uuids: Vec<_> = parsed.cards.iter().map(|c| c.uuid.as_str()).collect();
        assert_eq!(uuids, ["a", "c", "b"]);
        assert_eq!(parsed.cards[2].set_code, SENTINEL_SET_CODE);
    }

    #[test]
    fn test_malformed_cards_are_skipped_and_counted() {
        let json = r#"{"data": {"TST": {"name": "Test", "cards": [
            {"uuid": "ok", "name": "Fine", "type": "Instant", "rarity": "common"},
            {"name": "No Id", "type": "Instant", "rarity": "common"},
            {"uuid": "x1", "type": "Instant", "rarity": "common"},
            {"uuid": "x2", "name": "No Type", "rarity": "common"},
            {"uuid": "x3", "name": "No Rarity", "type": "Instant"},
            {"uuid": "x4", "name": "Bad Cost", "type": "Instant", "rarity": "common", "manaCost": 3},
            "not an object"
        ]}}}"#;

        let parsed = parse_dataset(json.as_bytes()).unwrap();

        assert_eq!(parsed.cards.len(), 1);
        assert_eq!(parsed.skipped.cards, 6);
        assert_eq!(parsed.skipped.sets, 0);
    }

    #[test]
    fn test_malformed_sets_are_skipped_once() {
        let json = r#"{"data": {
            "BAD": {"cards": [{"uuid": "a", "name": "A", "type": "Instant", "rarity": "common"}]},
            "NUM": 42,
            "GOOD": {"name": "Good", "cards": []}
        }}"#;

        let parsed = parse_dataset(json.as_bytes()).unwrap();

        assert_eq!(parsed.sets.len(), 1);
        assert_eq!(parsed.sets[0].code, "GOOD");
        assert_eq!(parsed.skipped.sets, 2);
        assert_eq!(parsed.skipped.cards, 0);
        assert_eq!(parsed.skipped.total(), 2);
    }

    #[test]
    fn test_fatal_documents() {
        for input in [
            "not json at all",
            r#"{"meta": {}}"#,
            r#"{"data": 5}"#,
            r#"{"data": "text"}"#,
            "[1, 2, 3]",
        ] {
            let result = parse_dataset(input.as_bytes());
            assert!(
                matches!(result, Err(DatasetError::Fatal { .. })),
                "expected fatal error for {input}"
            );
        }
    }

    #[test]
    fn test_leading_bom_is_ignored() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(SET_MAP.as_bytes());

        let parsed = parse_dataset(&bytes).unwrap();

        assert_eq!(parsed, parse_dataset(SET_MAP.as_bytes()).unwrap());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = parse_dataset(SET_MAP.as_bytes()).unwrap();
        let second = parse_dataset(SET_MAP.as_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_parse_dataset_file_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = parse_dataset_file(&temp_dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }
}
