mod common;

use common::{Content, Note, content, open};
use rowkeeper::entity::Record;
use rowkeeper::{Entity, Value, datatype::row};

#[test]
fn new_entity_is_dirty_and_does_not_exist() {
    let (db, _) = open();
    let content = Content::new(&db);
    assert!(content.is_dirty());
    assert!(!content.exists());
    assert_eq!(content.key(), 0);
}

#[test]
fn store_inserts_and_reflects_generated_values() {
    let (db, _) = open();
    let mut content = Content::new(&db);
    content.set_header("Hello");
    assert!(content.store().expect("store"));
    assert!(content.exists());
    assert!(!content.is_dirty());
    assert!(content.key() > 0);
    assert!(content.get("crdate").expect("crdate").as_i64().unwrap_or(0) > 0);
    assert!(content.get("tstamp").expect("tstamp").as_i64().unwrap_or(0) > 0);

    let mut found = Content::find(&db, content.key()).expect("find");
    assert!(found.exists());
    assert!(!found.is_dirty());
    assert_eq!(found.header().expect("header"), "Hello");
}

#[test]
fn storing_a_clean_entity_does_nothing() {
    let (db, _) = open();
    let mut content = content(&db, "Once");
    assert!(!content.is_dirty());
    assert!(!content.store().expect("store"));
}

#[test]
fn store_updates_an_existing_row() {
    let (db, _) = open();
    let mut content = content(&db, "Before");
    let key = content.key();
    content.set_header("After");
    assert!(content.is_dirty());
    assert!(content.store().expect("store"));
    assert_eq!(content.key(), key);
    assert!(!content.is_dirty());
    let mut found = Content::find(&db, key).expect("find");
    assert_eq!(found.header().expect("header"), "After");
    assert_eq!(Content::all(&db).expect("all").len(), 1);
}

#[test]
fn store_of_a_vanished_row_reports_false_and_stays_dirty() {
    let (db, connection) = open();
    let mut content = content(&db, "Gone soon");
    connection
        .execute_batch(&format!("delete from tt_content where uid = {}", content.key()))
        .expect("delete");
    content.set_header("Too late");
    assert!(!content.store().expect("store"));
    assert!(content.is_dirty());
}

#[test]
fn only_fillable_attributes_are_written() {
    let (db, _) = open();
    let mut content = Content::new(&db);
    content.set_header("Fillable");
    // not a column of the table, would fail the insert if written
    content.set("scratch", "kept in memory");
    assert!(content.store().expect("store"));
    assert!(content.has("scratch"));
    let found = Content::find(&db, content.key()).expect("find");
    assert!(!found.has("scratch"));
}

#[test]
fn write_casts_run_on_set() {
    let (db, _) = open();
    let mut content = Content::new(&db);
    content.set("header", "  padded  ");
    content.set("hidden", "1");
    assert_eq!(content.to_map().get("header"), Some(&Value::from("padded")));
    assert_eq!(content.to_map().get("hidden"), Some(&Value::Boolean(true)));
    assert!(content.store().expect("store"));

    let mut found = Content::find(&db, content.key()).expect("find");
    // stored as an integer, read back through the boolean cast
    assert_eq!(found.to_map().get("hidden"), Some(&Value::Integer(1)));
    assert_eq!(found.get("hidden").expect("hidden"), Value::Boolean(true));
}

#[test]
fn entity_built_from_request_data_exists_only_with_a_key() {
    let (db, _) = open();
    let keyed = Note::from_record(Record::from_request(
        Note::meta(),
        db.clone(),
        row([("uid", Value::from(4)), ("body", Value::from("x"))]),
    ));
    assert!(keyed.exists());
    assert!(keyed.is_dirty());

    let unkeyed = Note::from_record(Record::from_request(
        Note::meta(),
        db.clone(),
        row([("uid", 0)]),
    ));
    assert!(!unkeyed.exists());
}

#[test]
fn new_entity_with_a_zero_key_gets_one_from_storage() {
    let (db, _) = open();
    let mut note = Note::new(&db);
    note.set("uid", 0);
    note.set("body", "auto");
    assert!(note.store().expect("store"));
    assert!(note.key() > 0);
    assert!(note.exists());
}

#[test]
fn clones_share_values_but_not_state_changes() {
    let (db, _) = open();
    let mut original = content(&db, "Shared");
    let copy = original.clone();
    original.set_header("Changed");
    assert!(original.is_dirty());
    assert!(!copy.is_dirty());
    assert_eq!(copy.to_map().get("header"), Some(&Value::from("Shared")));
}

#[test]
fn store_without_persisted_attributes_does_nothing() {
    let (db, _) = open();
    let mut content = Content::new(&db);
    // not fillable, so never written
    content.set("scratch", "x");
    assert!(!content.store().expect("store"));
    assert!(content.is_dirty());
    assert!(!content.exists());

    let mut note = Note::new(&db);
    assert!(!note.store().expect("store"));
    assert!(note.is_dirty());
    assert!(!note.exists());
    assert!(Note::all(&db).expect("all").is_empty());
}

#[test]
fn stored_entity_with_its_key_cleared_does_not_exist() {
    let (db, _) = open();
    let mut content = content(&db, "Keyed");
    assert!(content.exists());
    content.set("uid", 0);
    assert_eq!(content.key(), 0);
    assert!(!content.exists());
}
