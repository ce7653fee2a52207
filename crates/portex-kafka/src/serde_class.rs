//! Kafka (de)serializer class references.
//!
//! Callers name a class either by its fully qualified name or by its simple
//! name. Only the classes bundled with the Kafka client are resolvable; the
//! reference remembers the name exactly as spelled so it serializes back
//! unchanged.

use portex_coders::CoderSpec;
use portex_core::{Error, Result};
use std::fmt;

pub const SERIALIZATION_PACKAGE: &str = "org.apache.kafka.common.serialization";

pub const DEFAULT_DESERIALIZER: &str =
    "org.apache.kafka.common.serialization.ByteArrayDeserializer";
pub const DEFAULT_SERIALIZER: &str = "org.apache.kafka.common.serialization.ByteArraySerializer";

/// The element type a bundled (de)serializer handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SerdeKind {
    ByteArray,
    Bytes,
    String,
    Long,
    Integer,
    Short,
    Double,
    Float,
    Uuid,
    Void,
}

impl SerdeKind {
    pub const ALL: [SerdeKind; 10] = [
        SerdeKind::ByteArray,
        SerdeKind::Bytes,
        SerdeKind::String,
        SerdeKind::Long,
        SerdeKind::Integer,
        SerdeKind::Short,
        SerdeKind::Double,
        SerdeKind::Float,
        SerdeKind::Uuid,
        SerdeKind::Void,
    ];

    /// Class name stem, e.g. `Long` for `LongDeserializer`.
    pub fn stem(&self) -> &'static str {
        match self {
            Self::ByteArray => "ByteArray",
            Self::Bytes => "Bytes",
            Self::String => "String",
            Self::Long => "Long",
            Self::Integer => "Integer",
            Self::Short => "Short",
            Self::Double => "Double",
            Self::Float => "Float",
            Self::Uuid => "UUID",
            Self::Void => "Void",
        }
    }

    /// Coder for elements of this kind on the wire between runtimes.
    pub fn coder(&self) -> CoderSpec {
        match self {
            Self::String | Self::Uuid => CoderSpec::StringUtf8,
            Self::Long | Self::Integer | Self::Short => CoderSpec::Varint,
            // floats travel as their big-endian IEEE bytes
            Self::ByteArray | Self::Bytes | Self::Void | Self::Double | Self::Float => {
                CoderSpec::Bytes
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Deserializer,
    Serializer,
}

impl Role {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Deserializer => "Deserializer",
            Self::Serializer => "Serializer",
        }
    }
}

/// A resolved reference to a bundled (de)serializer class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassRef {
    name: String,
    kind: SerdeKind,
    role: Role,
}

impl ClassRef {
    pub fn resolve(name: &str, role: Role) -> Result<Self> {
        let simple = match name.rsplit_once('.') {
            Some((package, simple)) if package == SERIALIZATION_PACKAGE => simple,
            Some(_) => return Err(unresolvable(name, role)),
            None => name,
        };
        let stem = simple
            .strip_suffix(role.suffix())
            .ok_or_else(|| unresolvable(name, role))?;
        let kind = SerdeKind::ALL
            .iter()
            .copied()
            .find(|k| k.stem() == stem)
            .ok_or_else(|| unresolvable(name, role))?;
        Ok(Self {
            name: name.to_string(),
            kind,
            role,
        })
    }

    pub fn deserializer(name: &str) -> Result<Self> {
        Self::resolve(name, Role::Deserializer)
    }

    pub fn serializer(name: &str) -> Result<Self> {
        Self::resolve(name, Role::Serializer)
    }

    /// The name as the caller spelled it.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SerdeKind {
        self.kind
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn canonical_name(&self) -> String {
        format!(
            "{}.{}{}",
            SERIALIZATION_PACKAGE,
            self.kind.stem(),
            self.role.suffix()
        )
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn unresolvable(name: &str, role: Role) -> Error {
    Error::UnresolvableReference(format!("no Kafka {} class named '{}'", role.suffix().to_lowercase(), name))
}
