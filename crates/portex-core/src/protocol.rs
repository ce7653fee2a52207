//! Expansion protocol: portable graph format and request/response envelopes
//!
//! Wire format (JSON, byte fields as standard base64):
//!
//! Client → Server:
//!   { "namespace": "ns", "components": { ... },
//!     "transform": { "unique_name": "Read",
//!                    "spec": { "urn": "beam:external:java:kafka:read:v1", "payload": "<b64>" } } }
//!
//! Server → Client:
//!   { "transform": { ... root node ... }, "components": { ... } }
//!   { "error": { "kind": "UnknownTransform", "message": "unknown transform: ..." } }
//!
//! The RPC envelope used by `POST /rpc`:
//!   { "id": "req-1", "method": "expand", "params": { ...ExpansionRequest... } }
//!   { "id": "req-1", "result": { ... } }
//!   { "id": "req-1", "error": { "code": -32000, "message": "..." } }

use crate::error::{Error, ErrorKind, Result};
use crate::types::Boundedness;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serde adapter carrying raw bytes as standard base64 text.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Specs and configuration payloads
// ---------------------------------------------------------------------------

/// A URN plus an opaque payload interpreted by whoever owns the URN.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub urn: String,
    #[serde(with = "b64", default)]
    pub payload: Vec<u8>,
}

impl FunctionSpec {
    pub fn new(urn: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            urn: urn.into(),
            payload,
        }
    }
}

/// One configuration parameter: the codec chain that produced `payload`,
/// outermost codec first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub coder_urn: Vec<String>,
    #[serde(with = "b64")]
    pub payload: Vec<u8>,
}

/// The payload of an external transform's spec: parameter name → value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalConfigurationPayload {
    #[serde(default)]
    pub configuration: BTreeMap<String, ConfigValue>,
}

impl ExternalConfigurationPayload {
    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) -> &mut Self {
        self.configuration.insert(key.into(), value);
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidRequest(format!("unparseable configuration payload: {}", e)))
    }
}

// ---------------------------------------------------------------------------
// Component table entries
// ---------------------------------------------------------------------------

/// A node in the transform tree. Composite nodes list subtransforms;
/// primitive nodes carry a leaf spec.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PTransformNode {
    pub unique_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<FunctionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtransforms: Vec<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
}

impl PTransformNode {
    pub fn is_composite(&self) -> bool {
        !self.subtransforms.is_empty()
    }

    pub fn is_primitive(&self) -> bool {
        self.spec.is_some() && self.subtransforms.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PCollectionNode {
    pub unique_name: String,
    pub coder_id: String,
    pub is_bounded: Boundedness,
    pub windowing_strategy_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoderNode {
    pub urn: String,
    #[serde(default)]
    pub component_coder_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowingStrategyNode {
    pub window_fn_urn: String,
    pub window_coder_id: String,
    #[serde(default)]
    pub allowed_lateness_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentNode {
    pub urn: String,
}

/// Every entity of a (partial) pipeline graph, keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Components {
    pub transforms: BTreeMap<String, PTransformNode>,
    pub pcollections: BTreeMap<String, PCollectionNode>,
    pub coders: BTreeMap<String, CoderNode>,
    pub windowing_strategies: BTreeMap<String, WindowingStrategyNode>,
    pub environments: BTreeMap<String, EnvironmentNode>,
}

impl Components {
    /// True if `id` is used by any entity kind.
    pub fn contains_id(&self, id: &str) -> bool {
        self.transforms.contains_key(id)
            || self.pcollections.contains_key(id)
            || self.coders.contains_key(id)
            || self.windowing_strategies.contains_key(id)
            || self.environments.contains_key(id)
    }

    /// All ids across entity kinds, in table order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.transforms
            .keys()
            .chain(self.pcollections.keys())
            .chain(self.coders.keys())
            .chain(self.windowing_strategies.keys())
            .chain(self.environments.keys())
            .map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
            + self.pcollections.len()
            + self.coders.len()
            + self.windowing_strategies.len()
            + self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Expansion request / response
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExpansionRequest {
    #[serde(default)]
    pub components: Components,
    pub transform: PTransformNode,
    #[serde(default)]
    pub namespace: String,
}

impl ExpansionRequest {
    /// Request for a transform with no input bindings and an empty context.
    pub fn new(
        namespace: impl Into<String>,
        unique_name: impl Into<String>,
        urn: impl Into<String>,
        payload: &ExternalConfigurationPayload,
    ) -> Result<Self> {
        Ok(Self {
            components: Components::default(),
            transform: PTransformNode {
                unique_name: unique_name.into(),
                spec: Some(FunctionSpec::new(urn, payload.to_bytes()?)),
                ..Default::default()
            },
            namespace: namespace.into(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for ErrorDetail {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<PTransformNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ExpansionResponse {
    pub fn ok(transform: PTransformNode, components: Components) -> Self {
        Self {
            components: Some(components),
            transform: Some(transform),
            error: None,
        }
    }

    pub fn err(error: &Error) -> Self {
        Self {
            components: None,
            transform: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// ---------------------------------------------------------------------------
// RPC envelope
// ---------------------------------------------------------------------------

/// RPC request from client.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// RPC response to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn method_not_found(id: impl Into<String>, method: &str) -> Self {
        Self::err(id, RPC_METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

pub const RPC_METHOD_NOT_FOUND: i32 = -32601;
pub const RPC_INVALID_PARAMS: i32 = -32602;
pub const RPC_EXPANSION_FAILED: i32 = -32000;
