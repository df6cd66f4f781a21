//! Per-attribute type coercion.
//!
//! Every read and write of an entity attribute goes through [`Casts::apply`]:
//! an override function registered for the attribute wins outright, then a
//! declared [`CastKind`] is applied through the coercion table, and otherwise
//! the value passes through untouched. Attribute names are matched without
//! regard to case.
//!
//! Each scalar coercion is the identity on its own output, so applying the
//! same kind twice gives the same result as applying it once.

use lazy_static::lazy_static;
use regex::Regex;

use crate::datatype::Value;

lazy_static! {
    static ref LEADING_INTEGER: Regex = Regex::new(r"^\s*[+-]?\d+").unwrap();
    static ref LEADING_FLOAT: Regex =
        Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    Integer,
    Float,
    Boolean,
    String,
    List,
    /// First binary asset attached to the record through this attribute.
    Asset,
    /// All binary assets attached to the record through this attribute.
    Assets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastDirection {
    Read,
    Write,
}

pub type Coercion = fn(Value) -> Value;

/// Attribute-specific cast, replacing whatever kind is declared for it.
pub type CastOverride = fn(CastDirection, Value) -> Value;

const COERCIONS: [(CastKind, Coercion); 5] = [
    (CastKind::Integer, to_integer),
    (CastKind::Float, to_float),
    (CastKind::Boolean, to_boolean),
    (CastKind::String, to_text),
    (CastKind::List, to_list),
];

impl CastKind {
    /// Reads a kind name. Unknown names give `None`, meaning no cast at all.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(CastKind::Integer),
            "float" | "double" | "real" => Some(CastKind::Float),
            "bool" | "boolean" => Some(CastKind::Boolean),
            "string" | "str" | "text" => Some(CastKind::String),
            "array" | "list" => Some(CastKind::List),
            "asset" | "file" => Some(CastKind::Asset),
            "assets" | "files" => Some(CastKind::Assets),
            _ => None,
        }
    }
    /// The relation kinds resolve through the asset collaborator rather
    /// than through a coercion function.
    pub fn is_relation(self) -> bool {
        matches!(self, CastKind::Asset | CastKind::Assets)
    }
    pub fn coercion(self) -> Option<Coercion> {
        COERCIONS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, coercion)| *coercion)
    }
    pub fn coerce(self, value: Value) -> Value {
        match self.coercion() {
            Some(coercion) => coercion(value),
            None => value,
        }
    }
}

/// Outcome of running the pipeline for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Cast {
    Value(Value),
    /// The attribute is a relation kind and has to be resolved by the entity.
    Resolve(CastKind),
}

/// The cast declarations of one entity type.
#[derive(Debug, Clone, Copy)]
pub struct Casts {
    kinds: &'static [(&'static str, CastKind)],
    overrides: &'static [(&'static str, CastOverride)],
}

impl Casts {
    pub const NONE: Casts = Casts::new(&[], &[]);

    pub const fn new(
        kinds: &'static [(&'static str, CastKind)],
        overrides: &'static [(&'static str, CastOverride)],
    ) -> Self {
        Self { kinds, overrides }
    }
    pub fn kind_of(&self, attribute: &str) -> Option<CastKind> {
        self.kinds
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, kind)| *kind)
    }
    pub fn override_of(&self, attribute: &str) -> Option<CastOverride> {
        self.overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, cast)| *cast)
    }
    pub fn apply(&self, direction: CastDirection, attribute: &str, value: Value) -> Cast {
        if let Some(cast) = self.override_of(attribute) {
            return Cast::Value(cast(direction, value));
        }
        match self.kind_of(attribute) {
            Some(kind) if kind.is_relation() => match direction {
                CastDirection::Read => Cast::Resolve(kind),
                // the column itself only holds the reference count
                CastDirection::Write => Cast::Value(value),
            },
            Some(kind) => Cast::Value(kind.coerce(value)),
            None => Cast::Value(value),
        }
    }
}

// ------------- Coercions -------------
fn leading_integer(text: &str) -> i64 {
    match LEADING_INTEGER.find(text) {
        Some(m) => {
            let digits = m.as_str().trim();
            digits.parse::<i64>().unwrap_or_else(|_| {
                // too many digits for an i64, saturate the way float casts do
                digits.parse::<f64>().map_or(0, |x| x as i64)
            })
        }
        None => 0,
    }
}

fn leading_float(text: &str) -> f64 {
    LEADING_FLOAT
        .find(text)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

pub fn to_integer(value: Value) -> Value {
    Value::Integer(match value {
        Value::Null => 0,
        Value::Integer(i) => i,
        Value::Float(x) => x as i64,
        Value::Boolean(b) => i64::from(b),
        Value::Text(s) => leading_integer(&s),
        Value::List(items) => i64::from(!items.is_empty()),
        Value::Asset(a) => a.uid(),
    })
}

pub fn to_float(value: Value) -> Value {
    Value::Float(match value {
        Value::Null => 0.0,
        Value::Integer(i) => i as f64,
        Value::Float(x) => x,
        Value::Boolean(b) => f64::from(u8::from(b)),
        Value::Text(s) => leading_float(&s),
        Value::List(items) => f64::from(u8::from(!items.is_empty())),
        Value::Asset(a) => a.uid() as f64,
    })
}

pub fn to_boolean(value: Value) -> Value {
    Value::Boolean(match value {
        Value::Null => false,
        Value::Integer(i) => i != 0,
        Value::Float(x) => x != 0.0,
        Value::Boolean(b) => b,
        Value::Text(s) => !(s.is_empty() || s == "0"),
        Value::List(items) => !items.is_empty(),
        Value::Asset(_) => true,
    })
}

pub fn to_text(value: Value) -> Value {
    match value {
        Value::Text(s) => Value::Text(s),
        other => Value::Text(other.to_string()),
    }
}

pub fn to_list(value: Value) -> Value {
    match value {
        Value::Null => Value::List(Vec::new()),
        Value::List(items) => Value::List(items),
        Value::Text(s) if s.trim().is_empty() => Value::List(Vec::new()),
        Value::Text(s) => Value::List(
            s.split(',')
                .map(|item| Value::Text(item.trim().to_owned()))
                .collect(),
        ),
        other => Value::List(vec![other]),
    }
}
