//! Rowkeeper – an active-record data-access layer over relational tables.
//!
//! Rowkeeper maps a row of a table to a mutable in-memory record:
//! * An [`entity::Entity`] is a concrete record type, described by a static
//!   [`entity::TableMeta`] (table name, key column, timestamp, soft-delete,
//!   locale and sort columns, fillable attributes, casts).
//! * A [`entity::Record`] holds the state of one instance: its attributes, the
//!   dirty flag, whether it exists in storage, and its relation caches.
//! * Every attribute read and write goes through the [`cast`] pipeline.
//!
//! Storage, asset lookup and locale overlays are collaborators reached through
//! traits and bundled in a [`database::Database`]. SQLite-backed defaults for
//! all three are included.
//!
//! ## Modules
//! * [`datatype`] – The dynamic [`datatype::Value`] held by attributes and rows.
//! * [`attribute`] – The per-instance attribute store with its dirty flag.
//! * [`cast`] – Per-attribute type coercion.
//! * [`query`] – Query values, the fluent builder and criteria-based reads.
//! * [`connection`] / [`persist`] – The connection contract and its SQLite implementation.
//! * [`assets`] / [`overlay`] – Asset and locale overlay lookup.
//! * [`entity`] – The active record itself, plus the [`entity!`] macro.
//! * [`binder`] – Injecting an entity built from request data at dispatch time.
//! * [`config`] / [`telemetry`] – Settings and logging setup.
//!
//! ## Quick Start
//! ```
//! use rowkeeper::{Database, Entity, TableMeta, config::Settings};
//!
//! rowkeeper::entity! {
//!     pub struct Note => TableMeta {
//!         locale_column: "",
//!         soft_delete_column: "",
//!         ..TableMeta::new("notes")
//!     };
//! }
//!
//! let settings = Settings::default();
//! let connection = rowkeeper::persist::SqliteConnection::open(&settings.database.persistence_mode()).unwrap();
//! connection
//!     .execute_batch("create table notes (uid integer primary key, pid integer, crdate integer, tstamp integer, body text)")
//!     .unwrap();
//! let db = Database::with_connection(std::sync::Arc::new(connection), &settings);
//!
//! let mut note = Note::new(&db);
//! note.set("body", "Remember the milk");
//! assert!(note.store().unwrap());
//! assert!(note.exists());
//! let mut found = Note::find(&db, note.key()).unwrap();
//! assert_eq!(found.get("body").unwrap().as_str(), Some("Remember the milk"));
//! ```

pub mod assets;
pub mod attribute;
pub mod binder;
pub mod cast;
pub mod config;
pub mod connection;
pub mod database;
pub mod datatype;
pub mod entity;
pub mod error;
pub mod overlay;
pub mod persist;
pub mod query;
pub mod telemetry;

pub use binder::{Binder, DispatchContext, Inject, Parameter};
pub use cast::{CastKind, Casts};
pub use database::Database;
pub use datatype::{Row, Value};
pub use entity::{Entity, Record, TableMeta};
pub use error::{Result, RowkeeperError};
pub use query::{Conjunction, Criteria};
