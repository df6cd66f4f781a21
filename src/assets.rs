use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::connection::Connection;
use crate::datatype::{Row, Value};
use crate::error::Result;
use crate::query::{Direction, Expr, QueryBuilder};

// ------------- Asset -------------
/// Handle to a binary asset attached to a record.
///
/// Only the identity and the raw reference row are kept; fetching the bytes
/// is the business of whoever owns the asset storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    uid: i64,
    properties: Row,
}

impl Asset {
    pub fn new(uid: i64, properties: Row) -> Self {
        Self { uid, properties }
    }
    pub fn uid(&self) -> i64 {
        self.uid
    }
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }
    pub fn properties(&self) -> &Row {
        &self.properties
    }
}

/// Finds the assets owned by one column of one record.
pub trait AssetResolver: Send + Sync {
    fn find_by_relation(&self, table: &str, column: &str, owner_key: i64) -> Result<Vec<Asset>>;
}

/// Column layout of the file-reference table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    pub table: String,
    pub key_column: String,
    pub owner_key_column: String,
    pub owner_table_column: String,
    pub field_column: String,
    /// Empty to disable.
    pub soft_delete_column: String,
    /// Empty to disable.
    pub sort_column: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            table: "sys_file_reference".to_owned(),
            key_column: "uid".to_owned(),
            owner_key_column: "uid_foreign".to_owned(),
            owner_table_column: "tablenames".to_owned(),
            field_column: "fieldname".to_owned(),
            soft_delete_column: "deleted".to_owned(),
            sort_column: "sorting_foreign".to_owned(),
        }
    }
}

/// [`AssetResolver`] reading a file-reference table through any [`Connection`].
pub struct ReferenceTableAssets {
    connection: Arc<dyn Connection>,
    settings: AssetSettings,
}

impl ReferenceTableAssets {
    pub fn new(connection: Arc<dyn Connection>, settings: AssetSettings) -> Self {
        Self {
            connection,
            settings,
        }
    }
}

impl AssetResolver for ReferenceTableAssets {
    fn find_by_relation(&self, table: &str, column: &str, owner_key: i64) -> Result<Vec<Asset>> {
        let s = &self.settings;
        let mut builder = QueryBuilder::new(self.connection.as_ref())
            .select(&["*"])
            .from(&s.table)
            .where_(Expr::eq(&s.owner_key_column, owner_key))
            .and_where(Expr::eq(&s.owner_table_column, table))
            .and_where(Expr::eq(&s.field_column, column));
        if !s.soft_delete_column.is_empty() {
            builder = builder.and_where(Expr::eq(&s.soft_delete_column, 0));
        }
        if !s.sort_column.is_empty() {
            builder = builder.order_by(&s.sort_column, Direction::Asc);
        }
        let assets: Vec<Asset> = builder
            .execute()?
            .into_iter()
            .map(|row| {
                let uid = row.get(&s.key_column).and_then(Value::as_i64).unwrap_or(0);
                Asset::new(uid, row)
            })
            .collect();
        debug!(table, column, owner_key, found = assets.len(), "resolved assets");
        Ok(assets)
    }
}
