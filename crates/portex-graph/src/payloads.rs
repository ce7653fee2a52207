//! Leaf payloads for the primitive URNs connectors emit.
//!
//! Each payload is JSON inside the leaf's `FunctionSpec`, so an executing
//! process can recover the runtime object spec without this crate's types.

use portex_core::urns;
use portex_core::{Boundedness, Error, FunctionSpec, Result, RuntimeObjectSpec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

fn to_spec<T: Serialize>(urn: &str, payload: &T) -> Result<FunctionSpec> {
    Ok(FunctionSpec::new(urn, serde_json::to_vec(payload)?))
}

fn from_spec<T: DeserializeOwned>(urn: &str, spec: &FunctionSpec) -> Result<T> {
    if spec.urn != urn {
        return Err(Error::malformed(format!(
            "expected a {} spec, found {}",
            urn, spec.urn
        )));
    }
    serde_json::from_slice(&spec.payload)
        .map_err(|e| Error::malformed(format!("{} payload: {}", urn, e)))
}

/// Payload of `beam:transform:read:v1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPayload {
    pub source: RuntimeObjectSpec,
    pub is_bounded: Boundedness,
}

impl ReadPayload {
    pub fn to_function_spec(&self) -> Result<FunctionSpec> {
        to_spec(urns::TRANSFORM_READ, self)
    }

    pub fn from_function_spec(spec: &FunctionSpec) -> Result<Self> {
        from_spec(urns::TRANSFORM_READ, spec)
    }
}

/// Payload of `beam:transform:write:v1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePayload {
    pub sink: RuntimeObjectSpec,
}

impl WritePayload {
    pub fn to_function_spec(&self) -> Result<FunctionSpec> {
        to_spec(urns::TRANSFORM_WRITE, self)
    }

    pub fn from_function_spec(spec: &FunctionSpec) -> Result<Self> {
        from_spec(urns::TRANSFORM_WRITE, spec)
    }
}

/// Payload of `beam:transform:pardo:v1`: a named element function plus its
/// own serialized configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParDoPayload {
    pub do_fn: RuntimeObjectSpec,
}

impl ParDoPayload {
    pub fn to_function_spec(&self) -> Result<FunctionSpec> {
        to_spec(urns::TRANSFORM_PARDO, self)
    }

    pub fn from_function_spec(spec: &FunctionSpec) -> Result<Self> {
        from_spec(urns::TRANSFORM_PARDO, spec)
    }
}
