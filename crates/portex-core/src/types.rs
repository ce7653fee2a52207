//! Core types for Portex

use std::sync::Arc;

/// Well-known URNs shared with every caller of the expansion service.
pub mod urns {
    pub const CODER_BYTES: &str = "beam:coder:bytes:v1";
    pub const CODER_ITERABLE: &str = "beam:coder:iterable:v1";
    pub const CODER_KV: &str = "beam:coder:kv:v1";
    pub const CODER_VARINT: &str = "beam:coder:varint:v1";
    pub const CODER_STRING_UTF8: &str = "beam:coder:string_utf8:v1";
    pub const CODER_BOOL: &str = "beam:coder:bool:v1";
    pub const CODER_GLOBAL_WINDOW: &str = "beam:coder:global_window:v1";

    pub const TRANSFORM_READ: &str = "beam:transform:read:v1";
    pub const TRANSFORM_PARDO: &str = "beam:transform:pardo:v1";
    pub const TRANSFORM_WRITE: &str = "beam:transform:write:v1";

    pub const WINDOWFN_GLOBAL: &str = "beam:window_fn:global_windows:v1";
    pub const ENV_EMBEDDED: &str = "beam:env:embedded:v1";
}

/// Fully qualified transform name - cheaply cloneable.
///
/// Root names are `namespace + unique_name`; children append `/<local>`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TransformName(Arc<str>);

impl TransformName {
    pub fn root(namespace: &str, unique_name: &str) -> Self {
        Self(Arc::from(format!("{}{}", namespace, unique_name)))
    }

    pub fn child(&self, local: &str) -> Self {
        Self(Arc::from(format!("{}/{}", self.0, local)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransformName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TransformName {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

/// Whether a collection is finite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundedness {
    Bounded,
    Unbounded,
}
