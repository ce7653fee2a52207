//! Configuration value model: typed values ⇄ `ConfigValue` envelopes.
//!
//! The codec-URN list written next to each payload fully describes its
//! nesting, so a reader needs no schema beyond the fixed codec registry.

use crate::coder::CoderSpec;
use crate::value::{ConfigParams, Value};
use portex_core::{ConfigValue, Error, ExternalConfigurationPayload, Result};
use tracing::debug;

/// Decode one envelope, applying its codec chain outermost first.
pub fn decode(config: &ConfigValue) -> Result<Value> {
    let coder = CoderSpec::from_urns(&config.coder_urn)?;
    coder.decode_all(&config.payload)
}

pub fn encode(coder: &CoderSpec, value: &Value) -> Result<ConfigValue> {
    Ok(ConfigValue {
        coder_urn: coder.to_urns(),
        payload: coder.encode_to_vec(value)?,
    })
}

/// A string shipped as UTF-8 through the bytes codec.
pub fn encode_str(s: &str) -> Result<ConfigValue> {
    encode(&CoderSpec::Bytes, &Value::utf8(s))
}

/// `iterable<bytes>` of UTF-8 strings.
pub fn encode_string_list<S: AsRef<str>>(items: &[S]) -> Result<ConfigValue> {
    let list = items.iter().map(|s| Value::utf8(s.as_ref())).collect();
    encode(&CoderSpec::string_list(), &Value::List(list))
}

/// `iterable<kv<bytes, bytes>>` of UTF-8 pairs, in iteration order.
pub fn encode_string_map<K, V, I>(pairs: I) -> Result<ConfigValue>
where
    K: AsRef<str>,
    V: AsRef<str>,
    I: IntoIterator<Item = (K, V)>,
{
    let list = pairs
        .into_iter()
        .map(|(k, v)| Value::kv(Value::utf8(k.as_ref()), Value::utf8(v.as_ref())))
        .collect();
    encode(&CoderSpec::string_map(), &Value::List(list))
}

pub fn encode_int(i: i64) -> Result<ConfigValue> {
    encode(&CoderSpec::Varint, &Value::Int(i))
}

pub fn encode_bool(b: bool) -> Result<ConfigValue> {
    encode(&CoderSpec::Bool, &Value::Bool(b))
}

/// Decode every parameter of a transform payload. The first failure aborts
/// and names the parameter it came from.
pub fn decode_payload(payload: &ExternalConfigurationPayload) -> Result<ConfigParams> {
    let mut params = ConfigParams::default();
    for (key, config) in &payload.configuration {
        let value = decode(config).map_err(|e| match e {
            Error::MalformedPayload(msg) => {
                Error::malformed(format!("parameter '{}': {}", key, msg))
            }
            Error::UnknownCodec(urn) => {
                Error::UnknownCodec(format!("{} (parameter '{}')", urn, key))
            }
            other => other,
        })?;
        debug!("decoded parameter '{}' as {}", key, value.type_name());
        params.insert(key.clone(), value);
    }
    Ok(params)
}
