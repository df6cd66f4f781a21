// used for persistence
use rusqlite::{Connection as RawConnection, params_from_iter};
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread::{self, ThreadId};
use tracing::debug;

use crate::connection::Connection;
use crate::datatype::{Row, Value};
use crate::error::{Result, RowkeeperError};
use crate::query::{Direction, Operator, Predicate, Query};

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

// ------------- Persistence -------------
/// [`Connection`] over a single SQLite database.
///
/// Identifiers are double-quoted and every value is bound as a statement
/// parameter, so string literals never get spliced into SQL text.
///
/// The rowid of an insert is captured under the same lock as the statement
/// and kept per calling thread, so `last_insert_id` answers for the caller's
/// own insert even when other threads write in between.
pub struct SqliteConnection {
    db: Mutex<RawConnection>,
    inserted: Mutex<HashMap<ThreadId, i64>>,
}

impl SqliteConnection {
    pub fn open(mode: &PersistenceMode) -> Result<Self> {
        let connection = match mode {
            PersistenceMode::InMemory => RawConnection::open_in_memory()?,
            PersistenceMode::File(path) => RawConnection::open(path)?,
        };
        debug!(?mode, "opened sqlite connection");
        Ok(Self::from_connection(connection))
    }
    pub fn from_connection(connection: RawConnection) -> Self {
        Self {
            db: Mutex::new(connection),
            inserted: Mutex::new(HashMap::new()),
        }
    }
    /// Runs one or more statements that return no rows, e.g. schema setup.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.db.lock()?.execute_batch(sql)?;
        Ok(())
    }
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        debug!(%sql, params = params.len(), "execute");
        let affected = self.db.lock()?.execute(sql, params_from_iter(params.iter()))?;
        debug!(affected, "executed");
        Ok(affected)
    }
}

impl Connection for SqliteConnection {
    fn insert(&self, table: &str, values: &Row) -> Result<usize> {
        let (columns, params) = sorted(values);
        let sql = if columns.is_empty() {
            format!("insert into {} default values", quote_identifier(table))
        } else {
            format!(
                "insert into {} ({}) values ({})",
                quote_identifier(table),
                columns
                    .iter()
                    .map(|c| quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };
        debug!(%sql, params = params.len(), "insert");
        let (affected, rowid) = {
            let db = self.db.lock()?;
            let affected = db.execute(&sql, params_from_iter(params.iter()))?;
            (affected, db.last_insert_rowid())
        };
        if affected > 0 {
            self.inserted.lock()?.insert(thread::current().id(), rowid);
        }
        debug!(affected, rowid, "inserted");
        Ok(affected)
    }
    fn update(&self, table: &str, values: &Row, criteria: &Row) -> Result<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        let (columns, mut params) = sorted(values);
        let (where_sql, where_params) = render_criteria(criteria)?;
        params.extend(where_params);
        let sql = format!(
            "update {} set {} where {}",
            quote_identifier(table),
            columns
                .iter()
                .map(|c| format!("{} = ?", quote_identifier(c)))
                .collect::<Vec<_>>()
                .join(", "),
            where_sql
        );
        self.execute(&sql, &params)
    }
    fn delete(&self, table: &str, criteria: &Row) -> Result<usize> {
        let (where_sql, params) = render_criteria(criteria)?;
        let sql = format!("delete from {} where {}", quote_identifier(table), where_sql);
        self.execute(&sql, &params)
    }
    fn last_insert_id(&self, _table: &str, _key_column: &str) -> Result<i64> {
        let inserted = self.inserted.lock()?;
        Ok(inserted.get(&thread::current().id()).copied().unwrap_or(0))
    }
    fn select(&self, query: &Query) -> Result<Vec<Row>> {
        let (sql, params) = render_select(query)?;
        debug!(%sql, params = params.len(), "select");
        let db = self.db.lock()?;
        let mut statement = db.prepare(&sql)?;
        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut rows = statement.query(params_from_iter(params.iter()))?;
        let mut result = Vec::new();
        while let Some(r) = rows.next()? {
            let mut row = Row::default();
            for (i, column) in columns.iter().enumerate() {
                row.insert(column.clone(), Value::from(r.get_ref(i)?));
            }
            result.push(row);
        }
        debug!(rows = result.len(), "selected");
        Ok(result)
    }
    fn quote(&self, literal: &str) -> String {
        format!("'{}'", literal.replace('\'', "''"))
    }
}

// ------------- SQL rendering -------------
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// sorted so that the same row always renders to the same statement
fn sorted(values: &Row) -> (Vec<&String>, Vec<Value>) {
    let mut pairs: Vec<(&String, &Value)> = values.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs.into_iter().map(|(c, v)| (c, v.clone())).unzip()
}

fn render_criteria(criteria: &Row) -> Result<(String, Vec<Value>)> {
    if criteria.is_empty() {
        return Err(RowkeeperError::Invariant(
            "keyed statement issued without criteria".to_owned(),
        ));
    }
    let (columns, params) = sorted(criteria);
    let sql = columns
        .iter()
        .map(|c| format!("{} = ?", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(" and ");
    Ok((sql, params))
}

fn render_predicate(
    predicate: &Predicate,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> Result<()> {
    match predicate {
        Predicate::And(left, right) | Predicate::Or(left, right) => {
            let joiner = if matches!(predicate, Predicate::And(..)) {
                " and "
            } else {
                " or "
            };
            sql.push('(');
            render_predicate(left, sql, params)?;
            sql.push_str(joiner);
            render_predicate(right, sql, params)?;
            sql.push(')');
        }
        Predicate::Comparison {
            column,
            operator,
            value,
        } => {
            let column = quote_identifier(column);
            let symbol = match operator {
                Operator::Eq => "=",
                Operator::Neq => "<>",
                Operator::Lt => "<",
                Operator::Lte => "<=",
                Operator::Gt => ">",
                Operator::Gte => ">=",
                Operator::Like => "like",
                Operator::NotLike => "not like",
                Operator::IsNull => {
                    sql.push_str(&format!("{} is null", column));
                    return Ok(());
                }
                Operator::IsNotNull => {
                    sql.push_str(&format!("{} is not null", column));
                    return Ok(());
                }
                Operator::In | Operator::NotIn => {
                    let items = match value {
                        Value::List(items) => items.clone(),
                        single => vec![single.clone()],
                    };
                    if items.is_empty() {
                        // nothing is in an empty list
                        sql.push_str(if *operator == Operator::In { "1 = 0" } else { "1 = 1" });
                        return Ok(());
                    }
                    let keyword = if *operator == Operator::In { "in" } else { "not in" };
                    sql.push_str(&format!(
                        "{} {} ({})",
                        column,
                        keyword,
                        vec!["?"; items.len()].join(", ")
                    ));
                    params.extend(items);
                    return Ok(());
                }
                Operator::Other(token) => {
                    return Err(RowkeeperError::Connection(format!(
                        "unsupported operator '{}' on column {}",
                        token, column
                    )));
                }
            };
            sql.push_str(&format!("{} {} ?", column, symbol));
            params.push(value.clone());
        }
    }
    Ok(())
}

/// Renders a [`Query`] into SQLite SQL plus its bound parameters.
pub fn render_select(query: &Query) -> Result<(String, Vec<Value>)> {
    let mut params = Vec::new();
    let columns = if query.columns.is_empty() {
        "*".to_owned()
    } else {
        query
            .columns
            .iter()
            .map(|c| if c == "*" { c.clone() } else { quote_identifier(c) })
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut sql = format!("select {} from {}", columns, quote_identifier(&query.table));
    if let Some(predicate) = &query.predicate {
        sql.push_str(" where ");
        render_predicate(predicate, &mut sql, &mut params)?;
    }
    if !query.order_by.is_empty() {
        let order = query
            .order_by
            .iter()
            .map(|(c, d)| {
                let direction = match d {
                    Direction::Asc => "asc",
                    Direction::Desc => "desc",
                };
                format!("{} {}", quote_identifier(c), direction)
            })
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" order by ");
        sql.push_str(&order);
    }
    match (query.max_results, query.first_result) {
        (Some(limit), Some(offset)) => {
            sql.push_str(&format!(" limit {} offset {}", limit, offset))
        }
        (Some(limit), None) => sql.push_str(&format!(" limit {}", limit)),
        // SQLite only accepts an offset together with a limit
        (None, Some(offset)) => sql.push_str(&format!(" limit -1 offset {}", offset)),
        (None, None) => {}
    }
    Ok((sql, params))
}
