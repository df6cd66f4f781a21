mod common;

use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Content, Note, open};
use rowkeeper::binder::{INJECTED_ENTITY_KEY, Payload};
use rowkeeper::entity::Record;
use rowkeeper::{Binder, Database, DispatchContext, Entity, Inject, Parameter, TableMeta, Value};
use serde_json::json;

static OTHER_INJECTIONS: AtomicUsize = AtomicUsize::new(0);

rowkeeper::entity! {
    /// Injectable too, and counts every construction.
    pub struct Other => TableMeta::new("notes");
}

impl Inject for Other {
    fn inject(payload: &Payload, db: &Database) -> Self {
        OTHER_INJECTIONS.fetch_add(1, Ordering::SeqCst);
        let row = payload
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect();
        Self::from_record(Record::from_request(Self::meta(), db.clone(), row))
    }
}

// stands in for the framework's request type
struct Request;

fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}

fn binder() -> Binder {
    let mut binder = Binder::new();
    binder.register::<Content>().register::<Other>();
    binder
}

#[test]
fn only_the_first_qualifying_parameter_is_injected() {
    let (db, _) = open();
    let mut context = DispatchContext::new(
        vec![
            Parameter::of::<Request>("r"),
            Parameter::of::<Content>("c"),
            Parameter::of::<Other>("o"),
        ],
        payload(json!({ "uid": 7, "header": "From request" })),
    );
    assert!(binder().bind(&mut context, &db));
    assert_eq!(context.attribute_count(), 1);
    assert_eq!(OTHER_INJECTIONS.load(Ordering::SeqCst), 0);

    let content = context.injected::<Content>().expect("injected content");
    assert_eq!(content.key(), 7);
    assert!(content.exists());
    assert!(content.is_dirty());
    assert_eq!(
        content.to_map().get("header"),
        Some(&Value::from("From request"))
    );
    assert!(context.injected::<Other>().is_none());
}

#[test]
fn injection_does_not_read_storage() {
    let (db, _) = open();
    let mut context = DispatchContext::new(
        vec![Parameter::of::<Content>("c")],
        payload(json!({ "uid": 99 })),
    );
    assert!(binder().bind(&mut context, &db));
    let content: Content = context
        .take_attribute(INJECTED_ENTITY_KEY)
        .expect("injected content");
    // no row 99 exists, yet the entity claims to
    assert!(content.exists());
    assert!(!context.has_attribute(INJECTED_ENTITY_KEY));
}

#[test]
fn payload_without_a_key_injects_a_new_entity() {
    let (db, _) = open();
    let mut context = DispatchContext::new(
        vec![Parameter::of::<Content>("c")],
        payload(json!({ "header": "Draft", "hidden": true })),
    );
    assert!(binder().bind(&mut context, &db));
    let mut content: Content = context
        .take_attribute(INJECTED_ENTITY_KEY)
        .expect("injected content");
    assert!(!content.exists());
    assert!(content.store().expect("store"));
    let mut stored = Content::find(&db, content.key()).expect("find");
    assert_eq!(stored.header().expect("header"), "Draft");
    assert_eq!(stored.get("hidden").expect("hidden"), Value::Boolean(true));
}

#[test]
fn unresolved_and_unregistered_parameters_are_skipped() {
    let (db, _) = open();
    let mut context = DispatchContext::new(
        vec![
            Parameter::unresolved("untyped"),
            Parameter::of::<Request>("r"),
            Parameter::of::<Note>("n"),
            Parameter::of::<String>("s"),
        ],
        payload(json!({ "uid": 3 })),
    );
    assert!(!binder().bind(&mut context, &db));
    assert_eq!(context.attribute_count(), 0);
    assert!(context.parameters()[0].type_id().is_none());
}

#[test]
fn registry_reports_registered_types() {
    let binder = binder();
    assert!(binder.is_registered(TypeId::of::<Content>()));
    assert!(!binder.is_registered(TypeId::of::<Note>()));
    let parameter = Parameter::of::<Content>("c");
    assert_eq!(parameter.name(), "c");
    assert!(parameter.type_name().is_some_and(|n| n.ends_with("Content")));
}
