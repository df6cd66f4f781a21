use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::cast::to_integer;
use crate::connection::Connection;
use crate::datatype::{Row, Value};
use crate::error::Result;
use crate::query::{Expr, QueryBuilder};

/// Looks up the locale-specific variant of a base row.
///
/// `Ok(None)` means there is no overlay for the requested locale.
pub trait OverlayResolver: Send + Sync {
    fn resolve(&self, table: &str, attributes: &Row, target_locale: i64) -> Result<Option<Row>>;
}

/// Columns linking overlay rows to their base rows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub key_column: String,
    pub parent_pointer_column: String,
    pub locale_column: String,
    /// Empty to disable.
    pub soft_delete_column: String,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            key_column: "uid".to_owned(),
            parent_pointer_column: "l10n_parent".to_owned(),
            locale_column: "sys_language_uid".to_owned(),
            soft_delete_column: "deleted".to_owned(),
        }
    }
}

/// [`OverlayResolver`] for tables that keep their overlays in the same
/// table, pointing back at the base row.
///
/// Tables with a separate overlay table are not handled.
pub struct ParentPointerOverlays {
    connection: Arc<dyn Connection>,
    settings: OverlaySettings,
}

impl ParentPointerOverlays {
    pub fn new(connection: Arc<dyn Connection>, settings: OverlaySettings) -> Self {
        Self {
            connection,
            settings,
        }
    }
}

impl OverlayResolver for ParentPointerOverlays {
    fn resolve(&self, table: &str, attributes: &Row, target_locale: i64) -> Result<Option<Row>> {
        let s = &self.settings;
        let key = attributes
            .get(&s.key_column)
            .cloned()
            .map(to_integer)
            .as_ref()
            .and_then(Value::as_i64);
        let key = match key {
            Some(key) if key > 0 => key,
            _ => return Ok(None),
        };
        let mut builder = QueryBuilder::new(self.connection.as_ref())
            .select(&["*"])
            .from(table)
            .where_(Expr::eq(&s.parent_pointer_column, key))
            .and_where(Expr::eq(&s.locale_column, target_locale));
        if !s.soft_delete_column.is_empty() {
            builder = builder.and_where(Expr::eq(&s.soft_delete_column, 0));
        }
        let overlay = builder.set_max_results(1).execute()?.into_iter().next();
        debug!(table, key, target_locale, found = overlay.is_some(), "resolved overlay");
        Ok(overlay)
    }
}
