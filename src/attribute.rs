use crate::datatype::{Row, Value};

// ------------- Attribute Store -------------
/// Keyed value container backing a single entity instance.
///
/// Values stored here are raw: casting happens one level up, in the entity.
/// A store starts out dirty and stays dirty until someone calls
/// [`AttributeStore::mark_clean`]; every [`AttributeStore::set`] dirties it again.
#[derive(Debug, Clone)]
pub struct AttributeStore {
    values: Row,
    dirty: bool,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self {
            values: Row::default(),
            dirty: true,
        }
    }
    /// A store holding `values`; pass `dirty = false` when they mirror a
    /// persisted row.
    pub fn with_values(values: Row, dirty: bool) -> Self {
        Self { values, dirty }
    }
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_owned(), value);
        self.dirty = true;
    }
    /// Writes a value that mirrors what storage already holds, so the dirty
    /// flag is left alone.
    pub fn restore(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_owned(), value);
    }
    pub fn to_map(&self) -> Row {
        self.values.clone()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for AttributeStore {
    fn default() -> Self {
        Self::new()
    }
}
