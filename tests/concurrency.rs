mod common;

use std::thread;

use common::{Note, open};
use rowkeeper::{Entity, Value};

#[test]
fn concurrent_stores_keep_their_own_keys() {
    let (db, _) = open();
    thread::scope(|scope| {
        for t in 0..4 {
            let db = db.clone();
            scope.spawn(move || {
                for i in 0..500 {
                    let body = format!("{}-{}", t, i);
                    let mut note = Note::new(&db);
                    note.set("body", body.as_str());
                    assert!(note.store().expect("store"));
                    let found = Note::find(&db, note.key()).expect("find");
                    assert_eq!(found.to_map().get("body"), Some(&Value::from(body)));
                }
            });
        }
    });
    assert_eq!(Note::all(&db).expect("all").len(), 2000);
}
