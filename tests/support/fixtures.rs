//! Dataset and archive fixtures.

use std::io::Write;
use std::path::Path;

use serde_json::{Value, json};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A card fixture: `(uuid, name, type line, rarity)`.
pub type CardRow<'a> = (&'a str, &'a str, &'a str, &'a str);

/// Builds an MTGJSON-style set map document.
pub fn set_map_json(sets: &[(&str, &str, &[CardRow<'_>])]) -> String {
    let mut data = serde_json::Map::new();
    for (code, name, cards) in sets {
        let cards: Vec<Value> = cards
            .iter()
            .map(|(uuid, card_name, type_line, rarity)| {
                json!({"uuid": uuid, "name": card_name, "type": type_line, "rarity": rarity})
            })
            .collect();
        data.insert(
            (*code).to_string(),
            json!({"name": name, "releaseDate": "2020-01-01", "cards": cards}),
        );
    }
    json!({"meta": {"version": "test"}, "data": data}).to_string()
}

/// One set with `count` cards; the card at `corrupt_index` lacks its `name`.
pub fn large_set_json(code: &str, count: usize, corrupt_index: Option<usize>) -> String {
    let cards: Vec<Value> = (0..count)
        .map(|i| {
            if Some(i) == corrupt_index {
                json!({"uuid": format!("{code}-{i:05}"), "type": "Instant", "rarity": "common"})
            } else {
                json!({
                    "uuid": format!("{code}-{i:05}"),
                    "name": format!("Card {i}"),
                    "type": "Instant",
                    "rarity": "common"
                })
            }
        })
        .collect();
    json!({"data": {code: {"name": format!("{code} Set"), "cards": cards}}}).to_string()
}

/// Zip archive bytes holding `entries`.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Writes a zip archive holding `entries` to `path`.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    std::fs::write(path, zip_bytes(entries)).unwrap();
}

/// The TST fixture used by end-to-end scenarios: one set, one common card `c1`.
pub fn tst_bolt_json() -> String {
    set_map_json(&[("TST", "Test Set", &[("c1", "Bolt", "Instant", "common")])])
}
