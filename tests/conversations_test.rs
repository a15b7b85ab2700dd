// tests/conversations_test.rs - Integration test: conversation files on disk

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use geoexplorer::core::notice::CollectedNotices;
use geoexplorer::core::SessionState;
use geoexplorer::infra::errors::GeoError;
use geoexplorer::memory::{load, load_file, ConversationStore};
use geoexplorer::provider::Message;

fn sample() -> Vec<Message> {
    vec![
        Message::user("Explorer: What is the highest waterfall?"),
        Message::assistant("Angel Falls in Venezuela, at 979 m."),
    ]
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path());
    let notices = CollectedNotices::new();

    let path = store
        .save(&sample(), "geography_exploration_conversation.json")
        .unwrap();
    let records = load_file(&path, &notices);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].messages, sample());
    assert!(!records[0].timestamp.is_empty());
    assert!(notices.all().is_empty());
}

#[test]
fn test_save_appends_and_keeps_prior_records() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path());

    store.save(&sample(), "trip.json").unwrap();
    let before = store.read("trip.json").unwrap();

    let mut longer = sample();
    longer.push(Message::user("Explorer: And the second highest?"));
    store.save(&longer, "trip.json").unwrap();
    let after = store.read("trip.json").unwrap();

    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1].messages, longer);
}

#[test]
fn test_invalid_json_yields_empty_and_error_notice() {
    let notices = CollectedNotices::new();
    let records = load(b"this is not json", &notices);

    assert!(records.is_empty());
    assert_eq!(
        notices.errors(),
        vec![
            "Error decoding the uploaded file. The file may be corrupted or not in JSON format."
                .to_string()
        ]
    );
}

#[test]
fn test_json_without_records_is_rejected() {
    let notices = CollectedNotices::new();
    assert!(load(br#""just a string""#, &notices).is_empty());
    assert!(load(b"42", &notices).is_empty());
    assert_eq!(
        notices.errors(),
        vec![
            "The uploaded file is JSON but does not contain a list of conversations.".to_string();
            2
        ]
    );
}

#[test]
fn test_load_keeps_readable_parts_of_well_formed_file() {
    let notices = CollectedNotices::new();
    let blob = br#"[
        {"timestamp": 1722500000, "model": "gpt-4o", "messages": [
            {"role": "user", "content": "Explorer: Where is Timbuktu?"},
            {"role": "tool", "content": "{\"lookup\": \"Mali\"}"},
            {"role": "assistant", "content": "In Mali."}
        ]},
        "not a record",
        {"timestamp": "2024-08-01T12:00:00.000000", "messages": []}
    ]"#;

    let records = load(blob, &notices);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].timestamp, "1722500000");
    assert_eq!(
        records[0].messages,
        vec![
            Message::user("Explorer: Where is Timbuktu?"),
            Message::assistant("In Mali."),
        ]
    );
    assert!(records[1].messages.is_empty());
    assert!(notices.errors().is_empty());
    assert_eq!(
        notices.warnings(),
        vec![
            "Skipped 1 conversation(s) that could not be read.".to_string(),
            "Skipped 1 message(s) with an unknown role or no text.".to_string(),
        ]
    );
}

#[test]
fn test_save_preserves_prior_records_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path());
    let prior = serde_json::json!([
        {
            "timestamp": 1722500000,
            "model": "gpt-4o",
            "messages": [{"role": "tool", "content": "{}"}]
        },
        {
            "timestamp": "2024-08-01T12:00:00.000000",
            "messages": [],
            "tags": ["andes"]
        }
    ]);
    let path = dir.path().join("trip.json");
    std::fs::write(&path, serde_json::to_string(&prior).unwrap()).unwrap();

    store.save(&sample(), "trip.json").unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let saved = saved.as_array().unwrap();
    assert_eq!(saved.len(), 3);
    assert_eq!(saved[0], prior[0]);
    assert_eq!(saved[1], prior[1]);
    assert_eq!(saved[2]["messages"], serde_json::to_value(sample()).unwrap());
}

#[test]
fn test_empty_array_is_valid_and_empty() {
    let notices = CollectedNotices::new();
    assert!(load(b"[]", &notices).is_empty());
    assert!(notices.all().is_empty());
}

#[test]
fn test_save_rejects_paths_outside_store() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path().join("conv"));

    let err = store.save(&sample(), "../escape.json").unwrap_err();
    assert!(matches!(err, GeoError::InvalidFilename(_)));
    assert!(!dir.path().join("escape.json").exists());
}

#[test]
fn test_loaded_conversation_continues_in_session() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path());
    let notices = CollectedNotices::new();
    let path = store.save(&sample(), "a.json").unwrap();

    let mut state = SessionState::new("Explorer");
    state.push_user_input("unrelated");
    let records = load_file(&path, &notices);
    state.replace_messages(records[0].messages.clone());
    assert_eq!(state.messages(), sample().as_slice());

    state.push_user_input("Where is it?");
    store.save(state.messages(), "b.json").unwrap();
    let saved = store.read("b.json").unwrap();
    assert_eq!(saved[0].messages.len(), 3);
    assert_eq!(store.list(), vec!["a.json".to_string(), "b.json".to_string()]);
}
