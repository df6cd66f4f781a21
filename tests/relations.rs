mod common;

use std::sync::Arc;

use common::{Content, Item, Note, content, open, reference};
use rowkeeper::{Entity, Value};

fn item(db: &rowkeeper::Database, owner: &Content, title: &str, sorting: i64) -> Item {
    let mut item = Item::new(db);
    item.set("parentid", owner.key());
    item.set("parenttable", "tt_content");
    item.set("title", title);
    item.set("sorting", sorting);
    item.store().expect("store item");
    item
}

#[test]
fn assets_are_cached_until_forced() {
    let (db, connection) = open();
    let mut content = content(&db, "With images");
    reference(&connection, content.key(), "image", 2, "second");
    reference(&connection, content.key(), "image", 1, "first");

    let first = content.resolve_assets("image", false).expect("assets");
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].get("title"), Some(&Value::from("first")));

    reference(&connection, content.key(), "image", 3, "third");
    let cached = content.resolve_assets("image", false).expect("cached");
    assert!(Arc::ptr_eq(&first, &cached));
    assert_eq!(cached.len(), 2);

    let forced = content.resolve_assets("image", true).expect("forced");
    assert!(!Arc::ptr_eq(&first, &forced));
    assert_eq!(forced.len(), 3);
    // the forced result replaces the cache entry
    let again = content.resolve_assets("image", false).expect("again");
    assert!(Arc::ptr_eq(&forced, &again));
}

#[test]
fn assets_of_other_fields_and_deleted_references_are_ignored() {
    let (db, connection) = open();
    let mut content = content(&db, "Mixed");
    reference(&connection, content.key(), "image", 1, "kept");
    reference(&connection, content.key(), "media", 1, "other field");
    reference(&connection, content.key() + 1, "image", 1, "other owner");
    connection
        .execute_batch("update sys_file_reference set deleted = 1 where title = 'other owner'")
        .expect("flag");
    reference(&connection, content.key(), "image", 2, "removed");
    connection
        .execute_batch("update sys_file_reference set deleted = 1 where title = 'removed'")
        .expect("flag");

    let assets = content.resolve_assets("image", false).expect("assets");
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].get("title"), Some(&Value::from("kept")));
    let single = content.resolve_asset("media").expect("asset").expect("media asset");
    assert_eq!(single.get("title"), Some(&Value::from("other field")));
    assert!(content.resolve_asset("assets").expect("none").is_none());
}

#[test]
fn asset_casts_resolve_through_get() {
    let (db, connection) = open();
    let mut content = content(&db, "Cast");
    reference(&connection, content.key(), "image", 1, "a");
    reference(&connection, content.key(), "image", 2, "b");
    reference(&connection, content.key(), "media", 1, "m");

    let images = content.get("image").expect("image");
    let images = images.as_list().expect("list of assets");
    assert_eq!(images.len(), 2);
    assert!(images.iter().all(|v| v.as_asset().is_some()));

    let media = content.get("media").expect("media");
    assert_eq!(
        media.as_asset().and_then(|a| a.get("title")),
        Some(&Value::from("m"))
    );

    // writing the column itself is not intercepted
    content.set("image", 2);
    assert_eq!(content.to_map().get("image"), Some(&Value::Integer(2)));
}

#[test]
fn inline_records_are_cached_per_child_type() {
    let (db, _) = open();
    let mut owner = content(&db, "Owner");
    let other = content(&db, "Other");
    item(&db, &owner, "second", 2);
    item(&db, &owner, "first", 1);
    item(&db, &other, "foreign", 1);

    let items = owner.inline_records::<Item>(false).expect("items");
    let mut titles: Vec<String> = Vec::new();
    for item in items.iter() {
        titles.push(item.to_map().get("title").map(|v| v.to_string()).unwrap_or_default());
    }
    assert_eq!(titles, vec!["first", "second"]);

    item(&db, &owner, "third", 3);
    let cached = owner.inline_records::<Item>(false).expect("cached");
    assert!(Arc::ptr_eq(&items, &cached));
    let forced = owner.inline_records::<Item>(true).expect("forced");
    assert_eq!(forced.len(), 3);

    owner.clear_caches();
    let fresh = owner.inline_records::<Item>(false).expect("fresh");
    assert!(!Arc::ptr_eq(&forced, &fresh));
}

#[test]
fn cloned_entities_start_with_empty_caches() {
    let (db, connection) = open();
    let mut content = content(&db, "Cloned");
    reference(&connection, content.key(), "image", 1, "a");
    let first = content.resolve_assets("image", false).expect("assets");
    let mut copy = content.clone();
    let from_copy = copy.resolve_assets("image", false).expect("copy assets");
    assert!(!Arc::ptr_eq(&first, &from_copy));
    assert_eq!(from_copy.len(), 1);
}

#[test]
fn translate_without_locale_column_returns_the_same_entity() {
    let (db, _) = open();
    let mut note = Note::new(&db);
    note.set("body", "untranslatable");
    note.store().expect("store");
    note.set("body", "unsaved change");
    let translated = note.translate(1).expect("translate");
    // same instance: the unsaved change is still there
    assert!(translated.is_dirty());
    assert_eq!(translated.to_map().get("body"), Some(&Value::from("unsaved change")));
}

#[test]
fn translate_to_the_current_locale_is_a_no_op() {
    let (db, _) = open();
    let content = content(&db, "Default language");
    let found = Content::find(&db, content.key()).expect("find");
    let translated = found.translate(0).expect("translate");
    assert_eq!(translated.key(), content.key());
}

#[test]
fn translate_hydrates_the_overlay_row() {
    let (db, _) = open();
    let base = content(&db, "Hello");
    let mut overlay = Content::new(&db);
    overlay.set_header("Hallo");
    overlay.set("sys_language_uid", 1);
    overlay.set("l10n_parent", base.key());
    overlay.store().expect("store overlay");

    let found = Content::find(&db, base.key()).expect("find");
    let mut translated = found.translate(1).expect("translate");
    assert_eq!(translated.key(), overlay.key());
    assert!(translated.exists());
    assert!(!translated.is_dirty());
    assert_eq!(translated.header().expect("header"), "Hallo");
    assert_eq!(translated.get("sys_language_uid").expect("locale"), Value::Integer(1));

    // no overlay for this locale
    let found = Content::find(&db, base.key()).expect("find");
    let untranslated = found.translate(2).expect("translate");
    assert_eq!(untranslated.key(), base.key());
}
