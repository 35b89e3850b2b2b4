//! Integration tests for deck validation against a populated store.

use mtgdb_core::Database;
use mtgdb_core::dataset::parse_dataset;
use mtgdb_core::deck::{
    CandidateEntry, CandidateList, DeckCard, DeckDeficit, DeckRequest, DeckRules, DeckValidator,
    GeneratedDeck, RemovalReason, ReportOutcome, ValidatorError, parse_candidate_list, save_deck,
    save_generated_deck,
};
use mtgdb_core::store::CardStore;
use tempfile::TempDir;

mod support;
use support::fixtures::{large_set_json, set_map_json, tst_bolt_json};

async fn store_with(json: &str) -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("cards.db")).await.unwrap();
    let dataset = parse_dataset(json.as_bytes()).unwrap();
    CardStore::new(db.clone())
        .upsert_dataset(&dataset, "Test")
        .await
        .unwrap();
    (db, temp_dir)
}

fn library_json() -> String {
    set_map_json(&[
        (
            "TST",
            "Test Set",
            &[
                ("c1", "Bolt", "Instant", "common"),
                ("l1", "Lightning Bolt", "Instant", "common"),
                ("s2", "Shock", "Instant", "common"),
                ("g1", "Goblin Guide", "Creature — Goblin Scout", "rare"),
                ("g2", "Goblin Guida", "Creature — Goblin", "common"),
                ("m1", "Mountain", "Basic Land — Mountain", "common"),
                ("d1", "Dryad Arbor", "Land Creature — Forest Dryad", "uncommon"),
            ],
        ),
        ("AAA", "Alpha", &[("s1", "Shock", "Instant", "common")]),
    ])
}

fn validator(db: Database) -> DeckValidator {
    DeckValidator::new(db, DeckRules::default())
}

#[tokio::test]
async fn test_end_to_end_exact_match_has_empty_report() {
    let (db, _temp) = store_with(&tst_bolt_json()).await;
    let candidates = CandidateList::new(vec![CandidateEntry::new("Bolt", Some(2))]);

    let result = validator(db).validate(&candidates).await.unwrap();

    assert_eq!(
        result.deck.spells,
        vec![DeckCard {
            card_id: "c1".to_string(),
            name: "Bolt".to_string(),
            type_line: "Instant".to_string(),
            set_code: "TST".to_string(),
            quantity: 2,
        }]
    );
    assert!(result.deck.creatures.is_empty());
    assert!(result.deck.lands.is_empty());
    assert!(result.report.is_empty());
    assert_eq!(
        result.deficit,
        Some(DeckDeficit {
            required: 60,
            actual: 2
        })
    );
}

#[tokio::test]
async fn test_copies_over_limit_are_trimmed_and_reported() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates = parse_candidate_list("6 Lightning Bolt");

    let result = validator(db).validate(&candidates).await.unwrap();

    assert_eq!(result.deck.spells[0].quantity, 4);
    assert_eq!(result.report.len(), 1);
    assert_eq!(
        result.report.entries[0].outcome,
        ReportOutcome::Trimmed {
            requested: 6,
            kept: 4,
            limit: 4
        }
    );
}

#[tokio::test]
async fn test_repeated_entries_accumulate_before_trimming() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates = parse_candidate_list("3 Lightning Bolt\n2 Shock\n3 lightning  bolt");

    let result = validator(db).validate(&candidates).await.unwrap();

    let names: Vec<(&str, u32)> = result
        .deck
        .spells
        .iter()
        .map(|card| (card.name.as_str(), card.quantity))
        .collect();
    assert_eq!(names, vec![("Lightning Bolt", 4), ("Shock", 2)]);
    assert!(matches!(
        result.report.entries[0].outcome,
        ReportOutcome::Trimmed { requested: 6, .. }
    ));
}

#[tokio::test]
async fn test_basic_lands_are_unbounded() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates = parse_candidate_list("24 Mountain\n4 Dryad Arbor");

    let result = validator(db).validate(&candidates).await.unwrap();

    assert_eq!(result.deck.lands.len(), 2);
    assert_eq!(result.deck.lands[0].quantity, 24);
    assert_eq!(result.deck.lands[1].name, "Dryad Arbor");
    assert!(result.report.is_empty());
}

#[tokio::test]
async fn test_unresolved_name_is_removed_not_fabricated() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates = parse_candidate_list("4 Black Lotus\n2 Shock");

    let result = validator(db).validate(&candidates).await.unwrap();

    assert_eq!(result.deck.total_cards(), 2);
    assert!(result.deck.cards().all(|card| card.name != "Black Lotus"));
    assert_eq!(result.report.removals().count(), 1);
    assert_eq!(
        result.report.entries[0].to_string(),
        "Black Lotus: removed: no match"
    );
}

#[tokio::test]
async fn test_typo_resolves_by_fuzzy_match() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates = parse_candidate_list("4 Lightnin Bolt");

    let result = validator(db).validate(&candidates).await.unwrap();

    assert_eq!(result.deck.spells[0].card_id, "l1");
    match &result.report.entries[0].outcome {
        ReportOutcome::FuzzyMatched {
            resolved_name,
            card_id,
            similarity,
        } => {
            assert_eq!(resolved_name, "Lightning Bolt");
            assert_eq!(card_id, "l1");
            assert!(*similarity >= 0.85);
        }
        other => panic!("expected fuzzy match, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ambiguous_name_is_removed_with_candidates() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates = parse_candidate_list("4 Goblin Guid");

    let result = validator(db).validate(&candidates).await.unwrap();

    assert!(result.deck.is_empty());
    assert_eq!(
        result.report.entries[0].outcome,
        ReportOutcome::Removed {
            reason: RemovalReason::Ambiguous {
                candidates: vec!["Goblin Guida".to_string(), "Goblin Guide".to_string()]
            }
        }
    );
}

#[tokio::test]
async fn test_lowest_uuid_printing_wins() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates = parse_candidate_list("2 Shock");

    let result = validator(db).validate(&candidates).await.unwrap();

    assert_eq!(result.deck.spells[0].card_id, "s1");
    assert_eq!(result.deck.spells[0].set_code, "AAA");
}

#[tokio::test]
async fn test_partition_by_type_line() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates = parse_candidate_list(
        "Creatures:\n4 Goblin Guide\nSpells:\n4 Shock\nLands:\n20 Mountain\n1 Dryad Arbor",
    );

    let result = validator(db).validate(&candidates).await.unwrap();

    assert_eq!(result.deck.creatures.len(), 1);
    assert_eq!(result.deck.creatures[0].name, "Goblin Guide");
    assert_eq!(result.deck.spells.len(), 1);
    assert_eq!(result.deck.lands.len(), 2);
    assert_eq!(result.deck.total_cards(), 29);
}

#[tokio::test]
async fn test_validation_is_deterministic() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates =
        parse_candidate_list("4 Goblin Guid\n6 Shock\n3 Lightnin Bolt\n20 Mountain\n1 Nothing");
    let validator = validator(db);

    let first = validator.validate(&candidates).await.unwrap();
    let second = validator.validate(&candidates).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_full_deck_has_no_deficit() {
    let (db, _temp) = store_with(&library_json()).await;
    let candidates = parse_candidate_list("4 Shock\n56 Mountain");

    let result = validator(db).validate(&candidates).await.unwrap();

    assert_eq!(result.deck.total_cards(), 60);
    assert!(result.deficit.is_none());
}

#[tokio::test]
async fn test_empty_store_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("empty.db")).await.unwrap();
    let candidates = parse_candidate_list("4 Shock");

    let result = validator(db).validate(&candidates).await;

    assert!(matches!(result, Err(ValidatorError::EmptyStore)));
}

#[tokio::test]
async fn test_save_deck_writes_json() {
    let (db, temp_dir) = store_with(&library_json()).await;
    let candidates = parse_candidate_list("4 Goblin Guide\n6 Shock\n20 Mountain");
    let result = validator(db).validate(&candidates).await.unwrap();

    let out = temp_dir.path().join("deck.json");
    save_deck(&out, &result).await.unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["deck"]["creatures"][0]["name"], "Goblin Guide");
    assert_eq!(json["deck"]["lands"][0]["quantity"], 20);
    assert_eq!(json["report"]["entries"][0]["outcome"]["kind"], "trimmed");
    assert_eq!(json["deficit"]["actual"], 28);
}

#[tokio::test]
async fn test_generated_deck_keeps_theme_included_cards_and_strategy() {
    let (db, temp_dir) = store_with(&library_json()).await;
    let request = DeckRequest::new("goblin burn")
        .with_include(vec!["Dryad Arbor".to_string()])
        .with_store_cards(&CardStore::new(db.clone()))
        .await
        .unwrap();
    let theme_names: Vec<_> = request.theme_cards.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(theme_names, ["Goblin Guida", "Goblin Guide"]);

    let reply = "Creatures:\n4x Goblin Guide\nLands:\n20x Mountain\n\nGo fast, burn the rest.";
    let mut candidates = parse_candidate_list(reply);
    assert_eq!(candidates.ensure_included(&request.include), ["Dryad Arbor"]);
    let result = validator(db).validate(&candidates).await.unwrap();

    let out = temp_dir.path().join("generated.json");
    let generated = GeneratedDeck {
        theme: &request.theme,
        included: &request.include,
        strategy: reply,
        validation: &result,
    };
    save_generated_deck(&out, &generated).await.unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["theme"], "goblin burn");
    assert_eq!(json["included"][0], "Dryad Arbor");
    assert!(json["strategy"].as_str().unwrap().contains("burn the rest"));
    assert_eq!(json["deck"]["creatures"][0]["name"], "Goblin Guide");
    assert!(json["deficit"].is_object());
    assert!(
        json["deck"]["lands"]
            .as_array()
            .unwrap()
            .iter()
            .any(|card| card["name"] == "Dryad Arbor")
    );
}

#[tokio::test]
async fn test_uncommitted_ingestion_is_invisible() {
    let (db, _temp) = store_with(&library_json()).await;
    let validator = validator(db.clone());
    let candidates = parse_candidate_list("3 Fresh Print");

    let mut tx = db.pool().begin().await.unwrap();
    sqlx::query(
        "INSERT INTO cards (uuid, name, name_key, type_line, rarity, set_code)
         VALUES ('n1', 'Fresh Print', 'fresh print', 'Sorcery', 'rare', 'TST')",
    )
    .execute(&mut *tx)
    .await
    .unwrap();

    let before = validator.validate(&candidates).await.unwrap();
    assert!(before.deck.is_empty());
    assert!(matches!(
        before.report.entries[0].outcome,
        ReportOutcome::Removed { .. }
    ));

    tx.commit().await.unwrap();

    let after = validator.validate(&candidates).await.unwrap();
    assert_eq!(after.deck.spells[0].card_id, "n1");
    assert!(after.report.is_empty());
}

#[tokio::test]
async fn test_validation_during_large_ingestion_sees_all_or_nothing() {
    let (db, _temp) = store_with(&tst_bolt_json()).await;
    let store = CardStore::new(db.clone());
    let dataset = parse_dataset(large_set_json("BIG", 20_000, None).as_bytes()).unwrap();
    let validator = validator(db);
    let candidates = parse_candidate_list("1 Card 0\n1 Card 19999");

    let writer = tokio::spawn(async move { store.upsert_dataset(&dataset, "Big").await });

    let mut observed = Vec::new();
    while !writer.is_finished() {
        let result = validator.validate(&candidates).await.unwrap();
        observed.push(result.deck.total_cards());
        tokio::task::yield_now().await;
    }
    writer.await.unwrap().unwrap();
    observed.push(validator.validate(&candidates).await.unwrap().deck.total_cards());

    assert!(
        observed.iter().all(|total| *total == 0 || *total == 2),
        "a validation saw a partial ingestion: {observed:?}"
    );
    assert_eq!(observed.last(), Some(&2));
}

#[tokio::test]
async fn test_closed_store_is_unavailable_not_empty() {
    let (db, _temp) = store_with(&tst_bolt_json()).await;
    let validator = validator(db.clone());
    db.close().await;

    let result = validator.validate(&parse_candidate_list("1 Bolt")).await;

    assert!(
        matches!(result, Err(ValidatorError::StoreUnavailable { .. })),
        "{result:?}"
    );
}
