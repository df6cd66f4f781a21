//! Query building.
//!
//! Two layers live here. [`QueryBuilder`] and [`Expr`] form the fluent,
//! connection-level interface (`select`, `from`, `where`, ordering and
//! paging). [`Criteria`] and [`build_query`] sit on top of it and turn a
//! column-to-condition mapping into a filtered, ordered, paginated read of an
//! entity table.

use lazy_static::lazy_static;
use regex::Regex;

use crate::connection::Connection;
use crate::datatype::{Row, Value};
use crate::entity::TableMeta;
use crate::error::Result;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

fn normalize(token: &str) -> String {
    WHITESPACE.replace_all(token.trim(), " ").to_ascii_uppercase()
}

// ------------- Operators -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Like,
    NotLike,
    IsNull,
    IsNotNull,
    /// Not recognized here; left for the connection to accept or reject.
    Other(String),
}

impl Operator {
    pub fn parse(token: &str) -> Self {
        let normalized = normalize(token);
        match normalized.as_str() {
            "=" | "==" | "EQ" => Operator::Eq,
            "!=" | "<>" | "NEQ" => Operator::Neq,
            "<" | "LT" => Operator::Lt,
            "<=" | "LTE" => Operator::Lte,
            ">" | "GT" => Operator::Gt,
            ">=" | "GTE" => Operator::Gte,
            "IN" => Operator::In,
            "NOT IN" | "NOTIN" => Operator::NotIn,
            "LIKE" => Operator::Like,
            "NOT LIKE" | "NOTLIKE" => Operator::NotLike,
            "IS NULL" | "ISNULL" => Operator::IsNull,
            "IS NOT NULL" | "ISNOTNULL" => Operator::IsNotNull,
            _ => Operator::Other(normalized),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    /// Anything but `OR` (in any case, with any surrounding space) is `AND`.
    pub fn parse(token: &str) -> Self {
        if normalize(token) == "OR" {
            Conjunction::Or
        } else {
            Conjunction::And
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(token: &str) -> Self {
        if normalize(token) == "DESC" {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }
}

// ------------- Predicates -------------
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison {
        column: String,
        operator: Operator,
        value: Value,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }
    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }
    pub fn join(self, conjunction: Conjunction, other: Predicate) -> Predicate {
        match conjunction {
            Conjunction::And => self.and(other),
            Conjunction::Or => self.or(other),
        }
    }
}

/// Expression factory: one constructor per named binary operator.
pub struct Expr;

impl Expr {
    pub fn comparison(column: &str, operator: Operator, value: impl Into<Value>) -> Predicate {
        Predicate::Comparison {
            column: column.to_owned(),
            operator,
            value: value.into(),
        }
    }
    pub fn eq(column: &str, value: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::Eq, value)
    }
    pub fn neq(column: &str, value: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::Neq, value)
    }
    pub fn lt(column: &str, value: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::Lt, value)
    }
    pub fn lte(column: &str, value: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::Lte, value)
    }
    pub fn gt(column: &str, value: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::Gt, value)
    }
    pub fn gte(column: &str, value: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::Gte, value)
    }
    pub fn in_list(column: &str, values: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::In, values)
    }
    pub fn not_in(column: &str, values: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::NotIn, values)
    }
    pub fn like(column: &str, pattern: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::Like, pattern)
    }
    pub fn not_like(column: &str, pattern: impl Into<Value>) -> Predicate {
        Self::comparison(column, Operator::NotLike, pattern)
    }
    pub fn is_null(column: &str) -> Predicate {
        Self::comparison(column, Operator::IsNull, Value::Null)
    }
    pub fn is_not_null(column: &str) -> Predicate {
        Self::comparison(column, Operator::IsNotNull, Value::Null)
    }
}

// ------------- Query -------------
/// A single-table read, as handed to [`Connection::select`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub columns: Vec<String>,
    pub table: String,
    pub predicate: Option<Predicate>,
    pub order_by: Vec<(String, Direction)>,
    pub first_result: Option<u64>,
    pub max_results: Option<u64>,
}

pub struct QueryBuilder<'c> {
    connection: &'c dyn Connection,
    query: Query,
}

impl<'c> QueryBuilder<'c> {
    pub fn new(connection: &'c dyn Connection) -> Self {
        Self {
            connection,
            query: Query::default(),
        }
    }
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.query.columns = columns.iter().map(|c| (*c).to_owned()).collect();
        self
    }
    pub fn from(mut self, table: &str) -> Self {
        self.query.table = table.to_owned();
        self
    }
    /// Replaces any predicate set so far.
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.query.predicate = Some(predicate);
        self
    }
    pub fn and_where(self, predicate: Predicate) -> Self {
        self.extend(Conjunction::And, predicate)
    }
    pub fn or_where(self, predicate: Predicate) -> Self {
        self.extend(Conjunction::Or, predicate)
    }
    fn extend(mut self, conjunction: Conjunction, predicate: Predicate) -> Self {
        self.query.predicate = Some(match self.query.predicate.take() {
            Some(current) => current.join(conjunction, predicate),
            None => predicate,
        });
        self
    }
    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.query.order_by.push((column.to_owned(), direction));
        self
    }
    pub fn set_first_result(mut self, offset: u64) -> Self {
        self.query.first_result = Some(offset);
        self
    }
    pub fn set_max_results(mut self, limit: u64) -> Self {
        self.query.max_results = Some(limit);
        self
    }
    pub fn query(&self) -> &Query {
        &self.query
    }
    pub fn into_query(self) -> Query {
        self.query
    }
    pub fn quote(&self, literal: &str) -> String {
        self.connection.quote(literal)
    }
    pub fn execute(&self) -> Result<Vec<Row>> {
        self.connection.select(&self.query)
    }
}

// ------------- Criteria -------------
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Compared with `=`.
    Value(Value),
    /// An operator token and its operand, e.g. `("in", [1, 2])`.
    Operator(String, Value),
}

impl Condition {
    fn into_predicate(self, column: &str) -> Predicate {
        match self {
            Condition::Value(value) => Expr::eq(column, value),
            Condition::Operator(token, value) => {
                Expr::comparison(column, Operator::parse(&token), value)
            }
        }
    }
}

/// Column to condition mapping, kept in insertion order.
///
/// Columns are unique: adding one that is already present replaces its
/// condition but keeps its position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Criteria {
    clauses: Vec<(String, Condition)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.insert(column, Condition::Value(value.into()));
        self
    }
    pub fn with_operator(mut self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.insert(column, Condition::Operator(operator.to_owned(), value.into()));
        self
    }
    pub fn insert(&mut self, column: &str, condition: Condition) {
        match self.clauses.iter_mut().find(|(c, _)| c == column) {
            Some((_, existing)) => *existing = condition,
            None => self.clauses.push((column.to_owned(), condition)),
        }
    }
    pub fn len(&self) -> usize {
        self.clauses.len()
    }
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &(String, Condition)> {
        self.clauses.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(pairs: I) -> Self {
        let mut criteria = Criteria::new();
        for (column, value) in pairs {
            criteria.insert(&column.into(), Condition::Value(value.into()));
        }
        criteria
    }
}

/// Turns criteria into a read of the table described by `meta`.
///
/// The first clause is the base predicate and every following clause is
/// joined with `conjunction`. Ordering is applied only when the table
/// declares both a sort column and a sort order. `offset` and `limit` take
/// effect only when greater than zero.
pub fn build_query(
    meta: &TableMeta,
    criteria: Criteria,
    conjunction: Conjunction,
    offset: i64,
    limit: i64,
) -> Query {
    let mut predicate: Option<Predicate> = None;
    for (column, condition) in criteria.clauses {
        let clause = condition.into_predicate(&column);
        predicate = Some(match predicate {
            Some(current) => current.join(conjunction, clause),
            None => clause,
        });
    }
    let mut order_by = Vec::new();
    if !meta.sort_column.is_empty() && !meta.sort_order.is_empty() {
        order_by.push((meta.sort_column.to_owned(), Direction::parse(meta.sort_order)));
    }
    Query {
        columns: vec!["*".to_owned()],
        table: meta.table.to_owned(),
        predicate,
        order_by,
        first_result: u64::try_from(offset).ok().filter(|o| *o > 0),
        max_results: u64::try_from(limit).ok().filter(|l| *l > 0),
    }
}
