//! Ordered multimap of secondary image attributes.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttributeValue {
    /// Free text, whitespace and NUL padding trimmed
    Text(String),
    /// Fixed-width binary integers or ASCII integer strings
    Integers(Vec<i64>),
    /// Binary floats or ASCII decimal strings
    Floats(Vec<f64>),
    /// Opaque bytes
    Binary(Vec<u8>),
    /// Start of a nested sequence; its contents follow as their own entries
    Sequence,
    /// Value too large to materialize
    Skipped { length: u64 },
}

impl AttributeValue {
    /// First integer of a numeric value, parsing text when needed.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Integers(v) => v.first().copied(),
            AttributeValue::Floats(v) => v.first().map(|f| *f as i64),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Floats(v) => v.first().copied(),
            AttributeValue::Integers(v) => v.first().map(|i| *i as f64),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str("\\")?;
                }
                write!(f, "{}", v)?;
            }
            Ok(())
        }

        match self {
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Integers(v) => join(f, v),
            AttributeValue::Floats(v) => join(f, v),
            AttributeValue::Binary(b) => write!(f, "<{} bytes>", b.len()),
            AttributeValue::Sequence => f.write_str("<sequence>"),
            AttributeValue::Skipped { length } => write!(f, "<skipped {} bytes>", length),
        }
    }
}

/// One key with every value recorded for it, in stream order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub key: String,
    pub values: Vec<AttributeValue>,
}

/// Insertion-ordered multimap from attribute name to values.
///
/// Inserting an existing key appends to that key's value list instead of
/// replacing it; key order is the order of first insertion.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    entries: Vec<Attribute>,
    index: HashMap<String, usize>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].values.push(value),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(Attribute {
                    key,
                    values: vec![value],
                });
            }
        }
    }

    /// All values recorded for a key.
    pub fn get_all(&self, key: &str) -> &[AttributeValue] {
        self.index
            .get(key)
            .map(|&i| self.entries[i].values.as_slice())
            .unwrap_or(&[])
    }

    /// First value recorded for a key.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.get_all(key).first()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl PartialEq for AttributeMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Serialize for AttributeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}
