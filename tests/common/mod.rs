#![allow(dead_code)]

use std::sync::Arc;

use rowkeeper::cast::{CastDirection, to_text};
use rowkeeper::config::Settings;
use rowkeeper::persist::{PersistenceMode, SqliteConnection};
use rowkeeper::{CastKind, Casts, Database, Entity, Inject, TableMeta, Value};

pub const SCHEMA: &str = "
    create table tt_content (
        uid integer primary key autoincrement,
        pid integer not null default 0,
        crdate integer not null default 0,
        tstamp integer not null default 0,
        deleted integer not null default 0,
        sys_language_uid integer not null default 0,
        l10n_parent integer not null default 0,
        sorting integer not null default 0,
        colpos integer not null default 0,
        hidden integer not null default 0,
        image integer not null default 0,
        media integer not null default 0,
        categories text,
        header text,
        bodytext text
    );
    create table sys_file_reference (
        uid integer primary key autoincrement,
        uid_foreign integer not null default 0,
        tablenames text,
        fieldname text,
        deleted integer not null default 0,
        sorting_foreign integer not null default 0,
        title text
    );
    create table tx_items (
        uid integer primary key autoincrement,
        pid integer not null default 0,
        crdate integer not null default 0,
        tstamp integer not null default 0,
        deleted integer not null default 0,
        parentid integer not null default 0,
        parenttable text,
        sorting integer not null default 0,
        title text
    );
    create table notes (
        uid integer primary key autoincrement,
        pid integer not null default 0,
        crdate integer not null default 0,
        tstamp integer not null default 0,
        body text
    );
";

// headers are stored without surrounding whitespace
fn header_cast(direction: CastDirection, value: Value) -> Value {
    match (direction, to_text(value)) {
        (CastDirection::Write, Value::Text(s)) => Value::Text(s.trim().to_owned()),
        (_, text) => text,
    }
}

rowkeeper::entity! {
    /// A content element.
    pub struct Content => TableMeta {
        sort_column: "sorting",
        sort_order: "ASC",
        fillable: &[
            "header", "bodytext", "sorting", "colpos", "hidden", "image", "media",
            "categories", "sys_language_uid", "l10n_parent",
        ],
        casts: Casts::new(
            &[
                ("colPos", CastKind::Integer),
                ("hidden", CastKind::Boolean),
                ("categories", CastKind::List),
                ("image", CastKind::Assets),
                ("media", CastKind::Asset),
                ("sys_language_uid", CastKind::Integer),
            ],
            &[("header", header_cast)],
        ),
        ..TableMeta::new("tt_content")
    };
}

impl Content {
    pub fn header(&mut self) -> rowkeeper::Result<String> {
        Ok(self.get("header")?.to_string())
    }
    pub fn set_header(&mut self, header: &str) {
        self.set("header", header);
    }
}

impl Inject for Content {}

rowkeeper::entity! {
    /// A child row owned by a content element.
    pub struct Item => TableMeta {
        locale_column: "",
        sort_column: "sorting",
        sort_order: "ASC",
        ..TableMeta::new("tx_items")
    };
}

rowkeeper::entity! {
    /// A table without soft delete or locale support.
    pub struct Note => TableMeta {
        soft_delete_column: "",
        locale_column: "",
        ..TableMeta::new("notes")
    };
}

pub fn open() -> (Database, Arc<SqliteConnection>) {
    let connection = Arc::new(SqliteConnection::open(&PersistenceMode::InMemory).expect("sqlite"));
    connection.execute_batch(SCHEMA).expect("schema");
    let db = Database::with_connection(connection.clone(), &Settings::default());
    (db, connection)
}

pub fn content(db: &Database, header: &str) -> Content {
    let mut content = Content::new(db);
    content.set_header(header);
    content.store().expect("store");
    content
}

pub fn reference(connection: &SqliteConnection, owner: i64, field: &str, sorting: i64, title: &str) {
    connection
        .execute_batch(&format!(
            "insert into sys_file_reference (uid_foreign, tablenames, fieldname, sorting_foreign, title) \
             values ({}, 'tt_content', '{}', {}, '{}')",
            owner, field, sorting, title
        ))
        .expect("reference");
}
