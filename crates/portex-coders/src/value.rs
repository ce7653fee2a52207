//! Decoded configuration values and the parameter map handed to builders.

use portex_core::{Error, Result};
use std::collections::BTreeMap;

/// A value decoded from (or about to be encoded into) a codec chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Kv(Box<Value>, Box<Value>),
}

impl Value {
    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(b.into())
    }

    /// UTF-8 bytes of `s`, the way callers ship strings through the bytes codec.
    pub fn utf8(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }

    pub fn kv(key: Value, value: Value) -> Self {
        Self::Kv(Box::new(key), Box::new(value))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Kv(..) => "kv",
        }
    }

    /// Text content of a string or UTF-8 bytes value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<Vec<String>> {
        self.as_list()?
            .iter()
            .map(|v| v.as_str().map(String::from))
            .collect()
    }

    /// A list of key/value pairs read as a map. Later duplicates win.
    pub fn as_string_map(&self) -> Option<BTreeMap<String, String>> {
        self.as_list()?
            .iter()
            .map(|item| match item {
                Self::Kv(k, v) => Some((k.as_str()?.to_string(), v.as_str()?.to_string())),
                _ => None,
            })
            .collect()
    }
}

/// Decoded parameters of one transform request, keyed by parameter name.
///
/// Accessors fail with `InvalidConfiguration` naming the offending key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigParams {
    values: BTreeMap<String, Value>,
}

impl ConfigParams {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn require(&self, key: &str) -> Result<&Value> {
        self.values.get(key).ok_or_else(|| Error::missing_param(key))
    }

    pub fn require_str(&self, key: &str) -> Result<String> {
        convert(key, self.require(key)?, "a UTF-8 string", |v| {
            v.as_str().map(String::from)
        })
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<String>> {
        self.optional(key, |p| p.require_str(key))
    }

    pub fn require_string_list(&self, key: &str) -> Result<Vec<String>> {
        convert(key, self.require(key)?, "a list of strings", Value::as_string_list)
    }

    pub fn optional_string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        self.optional(key, |p| p.require_string_list(key))
    }

    pub fn require_string_map(&self, key: &str) -> Result<BTreeMap<String, String>> {
        convert(key, self.require(key)?, "a list of string pairs", Value::as_string_map)
    }

    pub fn optional_string_map(&self, key: &str) -> Result<Option<BTreeMap<String, String>>> {
        self.optional(key, |p| p.require_string_map(key))
    }

    pub fn optional_int(&self, key: &str) -> Result<Option<i64>> {
        self.optional(key, |p| convert(key, p.require(key)?, "an integer", Value::as_int))
    }

    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        self.optional(key, |p| convert(key, p.require(key)?, "a boolean", Value::as_bool))
    }

    fn optional<T>(&self, key: &str, f: impl FnOnce(&Self) -> Result<T>) -> Result<Option<T>> {
        if self.contains(key) {
            f(self).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn convert<T>(
    key: &str,
    value: &Value,
    expected: &str,
    f: impl FnOnce(&Value) -> Option<T>,
) -> Result<T> {
    f(value).ok_or_else(|| {
        Error::invalid_config(
            key,
            format!("expected {}, found {}", expected, value.type_name()),
        )
    })
}

impl FromIterator<(String, Value)> for ConfigParams {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
