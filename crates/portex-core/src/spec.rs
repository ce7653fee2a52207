//! Generic serialized form of a connector's runtime configuration.
//!
//! A `RuntimeObjectSpec` is produced once at graph-construction time from a
//! freshly built runtime object and later turned back into an equivalent
//! object in whatever process executes the graph.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One typed configuration field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SpecField {
    String(String),
    StringList(Vec<String>),
    StringMap(BTreeMap<String, String>),
    /// A class/type reference, by its canonical name.
    TypeRef(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeObjectSpec {
    /// Object kind; selects the wire schema the fields follow.
    pub kind: String,
    pub fields: BTreeMap<String, SpecField>,
}

impl RuntimeObjectSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, field: SpecField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Fail unless this spec describes an object of `kind`.
    pub fn expect_kind(&self, kind: &str) -> Result<()> {
        if self.kind != kind {
            return Err(Error::malformed(format!(
                "expected a '{}' spec, found '{}'",
                kind, self.kind
            )));
        }
        Ok(())
    }

    fn field(&self, name: &str) -> Result<&SpecField> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::malformed(format!("{} spec is missing field '{}'", self.kind, name)))
    }

    fn type_mismatch(&self, name: &str, expected: &str) -> Error {
        Error::malformed(format!(
            "{} spec field '{}' is not a {}",
            self.kind, name, expected
        ))
    }

    pub fn string(&self, name: &str) -> Result<&str> {
        match self.field(name)? {
            SpecField::String(s) => Ok(s),
            _ => Err(self.type_mismatch(name, "string")),
        }
    }

    pub fn string_list(&self, name: &str) -> Result<&[String]> {
        match self.field(name)? {
            SpecField::StringList(v) => Ok(v),
            _ => Err(self.type_mismatch(name, "string list")),
        }
    }

    pub fn string_map(&self, name: &str) -> Result<&BTreeMap<String, String>> {
        match self.field(name)? {
            SpecField::StringMap(m) => Ok(m),
            _ => Err(self.type_mismatch(name, "string map")),
        }
    }

    pub fn type_ref(&self, name: &str) -> Result<&str> {
        match self.field(name)? {
            SpecField::TypeRef(s) => Ok(s),
            _ => Err(self.type_mismatch(name, "type reference")),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::malformed(format!("runtime object spec: {}", e)))
    }
}

/// A runtime object that can cross a process boundary as a `RuntimeObjectSpec`.
///
/// Implementations must satisfy `from_spec(&o.to_spec())?.to_spec() == o.to_spec()`.
pub trait RuntimeObject: Sized {
    /// The `kind` tag written into every spec of this object.
    const KIND: &'static str;

    fn to_spec(&self) -> RuntimeObjectSpec;

    /// Rebuild the object. Type references that cannot be mapped in this
    /// process fail with `Error::UnresolvableReference`.
    fn from_spec(spec: &RuntimeObjectSpec) -> Result<Self>;
}
