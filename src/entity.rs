//! The active record.
//!
//! A concrete entity type is a newtype over [`Record`] paired with a static
//! [`TableMeta`] describing its table. The [`Entity`] trait supplies the whole
//! behaviour on top of those two: attribute access through the cast
//! pipeline, persistence, soft/hard deletion, inline child records, attached
//! assets, locale overlays and the finders. Most types are declared with the
//! [`entity!`](crate::entity!) macro.
//!
//! Lifecycle of one instance:
//!
//! * new (dirty, not existing) → `store` → persisted (clean, existing)
//! * persisted → `set` → persisted and dirty → `store` → persisted
//! * existing → `soft_delete` → still existing, flagged deleted
//! * existing → `hard_delete` → row removed

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// used for the created/updated timestamp columns
use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::assets::Asset;
use crate::attribute::AttributeStore;
use crate::cast::{Cast, CastDirection, CastKind, Casts, to_boolean, to_integer};
use crate::database::Database;
use crate::datatype::{Row, Value, row};
use crate::error::Result;
use crate::query::{Conjunction, Criteria, build_query};

/// Value written to the soft-delete column when a row is flagged deleted.
pub const SOFT_DELETED: i64 = 1;

// ------------- Table metadata -------------
/// Static description of the table behind an entity type.
///
/// Any column name may be set to the empty string to switch off the
/// behaviour that depends on it.
#[derive(Debug, Clone, Copy)]
pub struct TableMeta {
    pub table: &'static str,
    pub key_column: &'static str,
    /// Page or folder the row lives in.
    pub parent_column: &'static str,
    pub created_at_column: &'static str,
    pub updated_at_column: &'static str,
    pub soft_delete_column: &'static str,
    pub locale_column: &'static str,
    pub sort_column: &'static str,
    pub sort_order: &'static str,
    /// On a child table: holds the key of the owning record.
    pub inline_parent_column: &'static str,
    /// On a child table: holds the table name of the owning record.
    pub inline_table_column: &'static str,
    /// Attributes written by `store`. Empty means all of them.
    pub fillable: &'static [&'static str],
    pub casts: Casts,
}

impl TableMeta {
    pub const DEFAULT: TableMeta = TableMeta {
        table: "",
        key_column: "uid",
        parent_column: "pid",
        created_at_column: "crdate",
        updated_at_column: "tstamp",
        soft_delete_column: "deleted",
        locale_column: "sys_language_uid",
        sort_column: "",
        sort_order: "",
        inline_parent_column: "parentid",
        inline_table_column: "parenttable",
        fillable: &[],
        casts: Casts::NONE,
    };

    pub const fn new(table: &'static str) -> Self {
        TableMeta {
            table,
            ..Self::DEFAULT
        }
    }

    // columns that are written whenever present, whatever `fillable` says
    fn always_persisted(&self, column: &str) -> bool {
        [
            self.key_column,
            self.parent_column,
            self.created_at_column,
            self.updated_at_column,
            self.soft_delete_column,
        ]
        .iter()
        .any(|c| !c.is_empty() && *c == column)
    }

    fn is_persisted(&self, column: &str) -> bool {
        self.fillable.is_empty()
            || self.fillable.iter().any(|c| *c == column)
            || self.always_persisted(column)
    }
}

// ------------- Record -------------
/// The state of one entity instance.
pub struct Record {
    meta: &'static TableMeta,
    db: Database,
    attributes: AttributeStore,
    exists: bool,
    relation_cache: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
    asset_cache: HashMap<String, Arc<Vec<Asset>>>,
}

impl Record {
    /// An unpersisted row.
    pub fn new(meta: &'static TableMeta, db: Database) -> Self {
        Self::with_attributes(meta, db, AttributeStore::new(), false)
    }
    /// A row read from storage: existing and clean.
    pub fn hydrate(meta: &'static TableMeta, db: Database, row: Row) -> Self {
        Self::with_attributes(meta, db, AttributeStore::with_values(row, false), true)
    }
    /// A row handed in from outside: still dirty, existing only if it
    /// carries a key.
    pub fn from_request(meta: &'static TableMeta, db: Database, row: Row) -> Self {
        let attributes = AttributeStore::with_values(row, true);
        let mut record = Self::with_attributes(meta, db, attributes, false);
        record.exists = record.key() > 0;
        record
    }
    fn with_attributes(
        meta: &'static TableMeta,
        db: Database,
        attributes: AttributeStore,
        exists: bool,
    ) -> Self {
        Self {
            meta,
            db,
            attributes,
            exists,
            relation_cache: HashMap::new(),
            asset_cache: HashMap::new(),
        }
    }

    pub fn meta(&self) -> &'static TableMeta {
        self.meta
    }
    pub fn database(&self) -> &Database {
        &self.db
    }
    pub fn key(&self) -> i64 {
        if self.meta.key_column.is_empty() {
            return 0;
        }
        self.attributes
            .get(self.meta.key_column)
            .cloned()
            .map(to_integer)
            .as_ref()
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }
    /// Only a row with a positive key can exist.
    pub fn exists(&self) -> bool {
        self.exists && self.key() > 0
    }
    pub fn is_dirty(&self) -> bool {
        self.attributes.is_dirty()
    }
    pub fn has(&self, name: &str) -> bool {
        self.attributes.has(name)
    }
    pub fn to_map(&self) -> Row {
        self.attributes.to_map()
    }

    fn cast(&self, name: &str) -> Cast {
        let raw = self.attributes.get(name).cloned().unwrap_or_default();
        self.meta.casts.apply(CastDirection::Read, name, raw)
    }
    pub fn get(&mut self, name: &str) -> Result<Value> {
        match self.cast(name) {
            Cast::Value(value) => Ok(value),
            Cast::Resolve(CastKind::Asset) => {
                Ok(self.resolve_asset(name)?.map_or(Value::Null, Value::Asset))
            }
            Cast::Resolve(_) => {
                let assets = self.resolve_assets(name, false)?;
                Ok(Value::List(assets.iter().cloned().map(Value::Asset).collect()))
            }
        }
    }
    pub fn set(&mut self, name: &str, value: Value) {
        let value = match self.meta.casts.apply(CastDirection::Write, name, value) {
            Cast::Value(value) => value,
            // not produced for writes
            Cast::Resolve(_) => Value::Null,
        };
        trace!(table = self.meta.table, attribute = name, kind = value.kind(), "set");
        self.attributes.set(name, value);
    }

    pub fn is_soft_deleted(&self) -> bool {
        let column = self.meta.soft_delete_column;
        if column.is_empty() {
            return false;
        }
        let flag = self.attributes.get(column).cloned().unwrap_or_default();
        to_boolean(flag) == Value::Boolean(true)
    }

    // ------------- Persistence -------------
    fn persistable(&self) -> Row {
        self.attributes
            .iter()
            .filter(|(name, _)| self.meta.is_persisted(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn key_criteria(&self) -> Row {
        row([(self.meta.key_column, self.key())])
    }

    pub fn store(&mut self) -> Result<bool> {
        let meta = self.meta;
        if !self.is_dirty() {
            trace!(table = meta.table, key = self.key(), "store skipped, nothing changed");
            return Ok(false);
        }
        let mut values = self.persistable();
        if values.is_empty() {
            debug!(table = meta.table, "store skipped, nothing to persist");
            return Ok(false);
        }
        // written locally only once storage has accepted them
        let mut reflected: Vec<(&'static str, Value)> = Vec::new();
        let now = Value::Integer(Utc::now().timestamp());
        if !meta.updated_at_column.is_empty() {
            reflected.push((meta.updated_at_column, now.clone()));
        }
        let existing = self.exists();
        if !existing && !meta.created_at_column.is_empty() {
            reflected.push((meta.created_at_column, now));
        }
        for (column, value) in &reflected {
            values.insert((*column).to_owned(), value.clone());
        }

        let connection = self.db.connection();
        let stored = if existing {
            connection.update(meta.table, &values, &self.key_criteria())? == 1
        } else {
            if !meta.key_column.is_empty() && self.key() <= 0 {
                // leave the key to storage
                values.remove(meta.key_column);
            }
            let inserted = connection.insert(meta.table, &values)? > 0;
            if inserted && !meta.key_column.is_empty() {
                let key = connection.last_insert_id(meta.table, meta.key_column)?;
                reflected.push((meta.key_column, Value::Integer(key)));
            }
            inserted
        };
        if !stored {
            warn!(table = meta.table, key = self.key(), existing, "store affected no rows");
            return Ok(false);
        }
        for (column, value) in reflected {
            self.attributes.restore(column, value);
        }
        self.attributes.mark_clean();
        self.exists = true;
        debug!(table = meta.table, key = self.key(), inserted = !existing, "stored");
        Ok(true)
    }

    pub fn hard_delete(&mut self) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }
        let affected = self
            .db
            .connection()
            .delete(self.meta.table, &self.key_criteria())?;
        if affected != 1 {
            warn!(table = self.meta.table, key = self.key(), affected, "hard delete missed");
            return Ok(false);
        }
        self.exists = false;
        debug!(table = self.meta.table, key = self.key(), "hard deleted");
        Ok(true)
    }

    pub fn soft_delete(&mut self) -> Result<bool> {
        let column = self.meta.soft_delete_column;
        if !self.exists() || column.is_empty() || self.is_soft_deleted() {
            return Ok(false);
        }
        let values = row([(column, SOFT_DELETED)]);
        let affected = self
            .db
            .connection()
            .update(self.meta.table, &values, &self.key_criteria())?;
        if affected != 1 {
            warn!(table = self.meta.table, key = self.key(), affected, "soft delete missed");
            return Ok(false);
        }
        self.attributes.restore(column, Value::Integer(SOFT_DELETED));
        debug!(table = self.meta.table, key = self.key(), "soft deleted");
        Ok(true)
    }

    /// Soft delete when the table supports it and the row is not flagged
    /// yet, hard delete otherwise.
    pub fn delete(&mut self) -> Result<bool> {
        if !self.meta.soft_delete_column.is_empty() && !self.is_soft_deleted() {
            self.soft_delete()
        } else {
            self.hard_delete()
        }
    }

    // ------------- Relations -------------
    pub fn resolve_assets(&mut self, column: &str, force: bool) -> Result<Arc<Vec<Asset>>> {
        if !force {
            if let Some(cached) = self.asset_cache.get(column) {
                trace!(table = self.meta.table, column, "asset cache hit");
                return Ok(Arc::clone(cached));
            }
        }
        let assets = self
            .db
            .assets()
            .find_by_relation(self.meta.table, column, self.key())?;
        let assets = Arc::new(assets);
        self.asset_cache.insert(column.to_owned(), Arc::clone(&assets));
        Ok(assets)
    }

    pub fn resolve_asset(&mut self, column: &str) -> Result<Option<Asset>> {
        Ok(self.resolve_assets(column, false)?.first().cloned())
    }

    /// Child records of type `C` pointing at this record.
    pub fn inline_records<C: Entity>(&mut self, force: bool) -> Result<Arc<Vec<C>>> {
        let cache_key = type_name::<C>();
        if !force {
            if let Some(cached) = self.relation_cache.get(cache_key) {
                if let Ok(records) = Arc::clone(cached).downcast::<Vec<C>>() {
                    trace!(table = self.meta.table, child = cache_key, "relation cache hit");
                    return Ok(records);
                }
            }
        }
        let child = C::meta();
        if child.inline_parent_column.is_empty() {
            return Ok(Arc::new(Vec::new()));
        }
        let mut criteria = Criteria::new().with(child.inline_parent_column, self.key());
        if !child.inline_table_column.is_empty() {
            criteria = criteria.with(child.inline_table_column, self.meta.table);
        }
        let records = Arc::new(C::find_all_by(&self.db, criteria, Conjunction::And, 0, 0)?);
        self.relation_cache.insert(cache_key, records.clone());
        Ok(records)
    }

    pub fn clear_caches(&mut self) {
        self.relation_cache.clear();
        self.asset_cache.clear();
    }

    fn is_in_locale(&self, target_locale: i64) -> bool {
        match self.cast(self.meta.locale_column) {
            Cast::Value(value) => value == Value::Integer(target_locale),
            Cast::Resolve(_) => false,
        }
    }
}

// caches belong to one instance, a copy starts without them
impl Clone for Record {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta,
            db: self.db.clone(),
            attributes: self.attributes.clone(),
            exists: self.exists,
            relation_cache: HashMap::new(),
            asset_cache: HashMap::new(),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.meta.table)
            .field("key", &self.key())
            .field("exists", &self.exists())
            .field("dirty", &self.is_dirty())
            .field("attributes", &self.attributes)
            .finish()
    }
}

// ------------- Entity -------------
pub trait Entity: Sized + Send + Sync + 'static {
    fn meta() -> &'static TableMeta;
    fn from_record(record: Record) -> Self;
    fn record(&self) -> &Record;
    fn record_mut(&mut self) -> &mut Record;

    fn new(db: &Database) -> Self {
        Self::from_record(Record::new(Self::meta(), db.clone()))
    }
    /// Maps a storage row onto a new instance.
    fn hydrate(db: &Database, row: Row) -> Self {
        Self::from_record(Record::hydrate(Self::meta(), db.clone(), row))
    }

    fn key(&self) -> i64 {
        self.record().key()
    }
    fn exists(&self) -> bool {
        self.record().exists()
    }
    fn is_dirty(&self) -> bool {
        self.record().is_dirty()
    }
    fn has(&self, name: &str) -> bool {
        self.record().has(name)
    }
    fn get(&mut self, name: &str) -> Result<Value> {
        self.record_mut().get(name)
    }
    fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.record_mut().set(name, value.into())
    }
    fn to_map(&self) -> Row {
        self.record().to_map()
    }
    fn is_soft_deleted(&self) -> bool {
        self.record().is_soft_deleted()
    }

    fn store(&mut self) -> Result<bool> {
        self.record_mut().store()
    }
    fn hard_delete(&mut self) -> Result<bool> {
        self.record_mut().hard_delete()
    }
    fn soft_delete(&mut self) -> Result<bool> {
        self.record_mut().soft_delete()
    }
    fn delete(&mut self) -> Result<bool> {
        self.record_mut().delete()
    }

    fn inline_records<C: Entity>(&mut self, force: bool) -> Result<Arc<Vec<C>>> {
        self.record_mut().inline_records::<C>(force)
    }
    fn resolve_assets(&mut self, column: &str, force: bool) -> Result<Arc<Vec<Asset>>> {
        self.record_mut().resolve_assets(column, force)
    }
    fn resolve_asset(&mut self, column: &str) -> Result<Option<Asset>> {
        self.record_mut().resolve_asset(column)
    }
    fn clear_caches(&mut self) {
        self.record_mut().clear_caches()
    }

    /// The variant of this record in `target_locale`.
    ///
    /// Hands back `self` when the table has no locale column, when the record
    /// already is in that locale, or when no overlay exists.
    fn translate(self, target_locale: i64) -> Result<Self> {
        let record = self.record();
        let meta = record.meta();
        if meta.locale_column.is_empty() || record.is_in_locale(target_locale) {
            return Ok(self);
        }
        let db = record.database();
        let overlay = db.overlays().resolve(meta.table, &record.to_map(), target_locale)?;
        match overlay {
            Some(overlay) if !overlay.is_empty() => Ok(Self::hydrate(db, overlay)),
            _ => Ok(self),
        }
    }

    // ------------- Finders -------------
    fn find_all_by(
        db: &Database,
        criteria: Criteria,
        conjunction: Conjunction,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Self>> {
        let query = build_query(Self::meta(), criteria, conjunction, offset, limit);
        let rows = db.connection().select(&query)?;
        Ok(rows.into_iter().map(|row| Self::hydrate(db, row)).collect())
    }
    fn get_all(db: &Database) -> Result<Vec<Self>> {
        Self::find_all_by(db, Criteria::new(), Conjunction::And, 0, 0)
    }
    fn all(db: &Database) -> Result<Vec<Self>> {
        Self::get_all(db)
    }
    /// First match, or a fresh unpersisted instance when nothing matches.
    fn find_by(db: &Database, criteria: Criteria, conjunction: Conjunction) -> Result<Self> {
        let found = Self::find_all_by(db, criteria, conjunction, 0, 1)?;
        Ok(found.into_iter().next().unwrap_or_else(|| Self::new(db)))
    }
    fn find_by_column(
        db: &Database,
        column: &str,
        value: impl Into<Value>,
        operator: &str,
    ) -> Result<Self> {
        let criteria = Criteria::new().with_operator(column, operator, value);
        Self::find_by(db, criteria, Conjunction::And)
    }
    fn find(db: &Database, key: i64) -> Result<Self> {
        Self::find_by_column(db, Self::meta().key_column, key, "=")
    }
    /// Rows for `keys`, in the order of `keys`.
    ///
    /// Keys without a row are dropped. A repeated key is matched against the
    /// rows not handed out yet, so its second occurrence finds nothing.
    fn find_multiple(db: &Database, keys: &[i64]) -> Result<Vec<Self>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let criteria = Criteria::new().with_operator(Self::meta().key_column, "in", keys.to_vec());
        let found = Self::find_all_by(db, criteria, Conjunction::And, 0, 0)?;
        let mut pool: Vec<Option<Self>> = found.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(keys.len());
        for key in keys {
            let slot = pool
                .iter_mut()
                .find(|slot| matches!(slot, Some(e) if e.key() == *key));
            if let Some(entity) = slot.and_then(Option::take) {
                ordered.push(entity);
            }
        }
        Ok(ordered)
    }
}

/// Declares a concrete entity type.
///
/// ```
/// use rowkeeper::entity::TableMeta;
///
/// rowkeeper::entity! {
///     /// A content element.
///     pub struct Content => TableMeta {
///         sort_column: "sorting",
///         sort_order: "ASC",
///         ..TableMeta::new("tt_content")
///     };
/// }
/// ```
#[macro_export]
macro_rules! entity {
    ($(#[$attr:meta])* $vis:vis struct $name:ident => $meta:expr;) => {
        $(#[$attr])*
        #[derive(Debug, Clone)]
        $vis struct $name($crate::entity::Record);

        impl $crate::entity::Entity for $name {
            fn meta() -> &'static $crate::entity::TableMeta {
                static META: $crate::entity::TableMeta = $meta;
                &META
            }
            fn from_record(record: $crate::entity::Record) -> Self {
                Self(record)
            }
            fn record(&self) -> &$crate::entity::Record {
                &self.0
            }
            fn record_mut(&mut self) -> &mut $crate::entity::Record {
                &mut self.0
            }
        }
    };
}
