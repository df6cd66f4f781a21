use crate::datatype::Row;
use crate::error::Result;
use crate::query::Query;

/// The relational connection the entity layer writes through.
///
/// Keyed writes report the number of affected rows; the entity layer treats
/// a count other than the expected one as a plain `false`, never as an error.
/// Anything returned as `Err` is an infrastructure fault and is passed on
/// unchanged.
pub trait Connection: Send + Sync {
    fn insert(&self, table: &str, values: &Row) -> Result<usize>;
    /// `criteria` columns are combined with `AND`, each compared for equality.
    fn update(&self, table: &str, values: &Row, criteria: &Row) -> Result<usize>;
    fn delete(&self, table: &str, criteria: &Row) -> Result<usize>;
    /// Key assigned by the most recent successful `insert` made from the
    /// calling thread.
    fn last_insert_id(&self, table: &str, key_column: &str) -> Result<i64>;
    fn select(&self, query: &Query) -> Result<Vec<Row>>;
    /// Escapes a string literal for inclusion in a statement.
    fn quote(&self, literal: &str) -> String;
}
