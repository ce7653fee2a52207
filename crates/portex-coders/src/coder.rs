//! Primitive codec set and composition over it.
//!
//! A `CoderSpec` is a tree: `iterable` wraps one element codec, `kv` wraps a
//! key and a value codec, everything else is a leaf. Its wire description is
//! the pre-order list of URNs, e.g. `[iterable, kv, bytes, bytes]`.

use crate::value::Value;
use crate::varint;
use bytes::{Buf, BufMut};
use portex_core::urns;
use portex_core::{Error, Result};

/// Iterable count meaning "elements follow until the stream ends".
pub const UNKNOWN_LENGTH: i32 = -1;

/// Deepest codec nesting accepted from a chain or a component table.
pub const MAX_CODER_DEPTH: usize = 32;

/// The fixed codec registry: URN and number of component codecs.
pub const KNOWN_CODERS: &[(&str, usize)] = &[
    (urns::CODER_BYTES, 0),
    (urns::CODER_STRING_UTF8, 0),
    (urns::CODER_VARINT, 0),
    (urns::CODER_BOOL, 0),
    (urns::CODER_ITERABLE, 1),
    (urns::CODER_KV, 2),
];

/// Number of component codecs the codec `urn` takes.
pub fn arity(urn: &str) -> Result<usize> {
    KNOWN_CODERS
        .iter()
        .find(|(known, _)| *known == urn)
        .map(|(_, n)| *n)
        .ok_or_else(|| Error::UnknownCodec(urn.to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CoderSpec {
    /// Varint length prefix followed by raw bytes.
    Bytes,
    /// Like `Bytes`, but the content must be UTF-8.
    StringUtf8,
    Varint,
    Bool,
    Iterable(Box<CoderSpec>),
    Kv(Box<CoderSpec>, Box<CoderSpec>),
}

impl CoderSpec {
    pub fn iterable(element: CoderSpec) -> Self {
        Self::Iterable(Box::new(element))
    }

    pub fn kv(key: CoderSpec, value: CoderSpec) -> Self {
        Self::Kv(Box::new(key), Box::new(value))
    }

    /// `iterable<bytes>`
    pub fn string_list() -> Self {
        Self::iterable(Self::Bytes)
    }

    /// `iterable<kv<bytes, bytes>>`
    pub fn string_map() -> Self {
        Self::iterable(Self::kv(Self::Bytes, Self::Bytes))
    }

    pub fn urn(&self) -> &'static str {
        match self {
            Self::Bytes => urns::CODER_BYTES,
            Self::StringUtf8 => urns::CODER_STRING_UTF8,
            Self::Varint => urns::CODER_VARINT,
            Self::Bool => urns::CODER_BOOL,
            Self::Iterable(_) => urns::CODER_ITERABLE,
            Self::Kv(..) => urns::CODER_KV,
        }
    }

    pub fn components(&self) -> Vec<&CoderSpec> {
        match self {
            Self::Iterable(e) => vec![e],
            Self::Kv(k, v) => vec![k, v],
            _ => Vec::new(),
        }
    }

    /// Build a codec from one URN and already-built components.
    pub fn from_parts(urn: &str, mut components: Vec<CoderSpec>) -> Result<Self> {
        let expected = arity(urn)?;
        if components.len() != expected {
            return Err(Error::malformed(format!(
                "codec {} takes {} component(s), got {}",
                urn,
                expected,
                components.len()
            )));
        }
        Ok(match urn {
            urns::CODER_BYTES => Self::Bytes,
            urns::CODER_STRING_UTF8 => Self::StringUtf8,
            urns::CODER_VARINT => Self::Varint,
            urns::CODER_BOOL => Self::Bool,
            urns::CODER_ITERABLE => Self::iterable(components.remove(0)),
            urns::CODER_KV => {
                let value = components.remove(1);
                let key = components.remove(0);
                Self::kv(key, value)
            }
            other => return Err(Error::UnknownCodec(other.to_string())),
        })
    }

    /// Parse a pre-order URN chain. Every URN must be consumed.
    pub fn from_urns<S: AsRef<str>>(chain: &[S]) -> Result<Self> {
        if chain.is_empty() {
            return Err(Error::malformed("empty codec chain"));
        }
        let mut pos = 0;
        let coder = Self::parse_chain(chain, &mut pos, 0)?;
        if pos != chain.len() {
            return Err(Error::malformed(format!(
                "codec chain has {} unused trailing URN(s) after {}",
                chain.len() - pos,
                coder.urn()
            )));
        }
        Ok(coder)
    }

    fn parse_chain<S: AsRef<str>>(chain: &[S], pos: &mut usize, depth: usize) -> Result<Self> {
        if depth > MAX_CODER_DEPTH {
            return Err(Error::malformed(format!(
                "codec chain nests deeper than {}",
                MAX_CODER_DEPTH
            )));
        }
        let urn = chain
            .get(*pos)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::malformed("codec chain ends before all components are given"))?;
        *pos += 1;
        let components = (0..arity(urn)?)
            .map(|_| Self::parse_chain(chain, pos, depth + 1))
            .collect::<Result<Vec<_>>>()?;
        Self::from_parts(urn, components)
    }

    /// Pre-order URN chain; `from_urns(c.to_urns()) == c`.
    pub fn to_urns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_urns(&mut out);
        out
    }

    fn collect_urns(&self, out: &mut Vec<String>) {
        out.push(self.urn().to_string());
        for c in self.components() {
            c.collect_urns(out);
        }
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    pub fn encode(&self, value: &Value, buf: &mut impl BufMut) -> Result<()> {
        match (self, value) {
            (Self::Bytes, Value::Bytes(b)) => {
                varint::encode(b.len() as u64, buf);
                buf.put_slice(b);
            }
            (Self::StringUtf8, Value::Str(s)) => {
                varint::encode(s.len() as u64, buf);
                buf.put_slice(s.as_bytes());
            }
            (Self::Varint, Value::Int(i)) => varint::encode_i64(*i, buf),
            (Self::Bool, Value::Bool(b)) => buf.put_u8(u8::from(*b)),
            (Self::Iterable(element), Value::List(items)) => {
                let count = i32::try_from(items.len())
                    .map_err(|_| Error::malformed("iterable too long to encode"))?;
                buf.put_i32(count);
                for item in items {
                    element.encode(item, buf)?;
                }
            }
            (Self::Kv(kc, vc), Value::Kv(k, v)) => {
                kc.encode(k, buf)?;
                vc.encode(v, buf)?;
            }
            (coder, value) => {
                return Err(Error::malformed(format!(
                    "cannot encode a {} value with {}",
                    value.type_name(),
                    coder.urn()
                )))
            }
        }
        Ok(())
    }

    pub fn encode_to_vec(&self, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(value, &mut out)?;
        Ok(out)
    }

    /// Encode an iterable without knowing its length up front.
    ///
    /// Only valid as the outermost codec: the reader stops at end of input.
    pub fn encode_unknown_length<'a>(
        &self,
        items: impl IntoIterator<Item = &'a Value>,
        buf: &mut impl BufMut,
    ) -> Result<()> {
        let Self::Iterable(element) = self else {
            return Err(Error::malformed(format!(
                "{} cannot stream elements",
                self.urn()
            )));
        };
        buf.put_i32(UNKNOWN_LENGTH);
        for item in items {
            element.encode(item, buf)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    pub fn decode(&self, buf: &mut &[u8]) -> Result<Value> {
        match self {
            Self::Bytes => Ok(Value::Bytes(read_prefixed(buf)?.to_vec())),
            Self::StringUtf8 => {
                let raw = read_prefixed(buf)?;
                let s = std::str::from_utf8(raw)
                    .map_err(|e| Error::malformed(format!("string_utf8: {}", e)))?;
                Ok(Value::Str(s.to_string()))
            }
            Self::Varint => Ok(Value::Int(varint::decode_i64(buf)?)),
            Self::Bool => {
                if !buf.has_remaining() {
                    return Err(Error::malformed("bool: unexpected end of buffer"));
                }
                match buf.get_u8() {
                    0 => Ok(Value::Bool(false)),
                    1 => Ok(Value::Bool(true)),
                    other => Err(Error::malformed(format!("bool: invalid byte {:#04x}", other))),
                }
            }
            Self::Iterable(element) => {
                if buf.remaining() < 4 {
                    return Err(Error::malformed("iterable: truncated element count"));
                }
                let count = buf.get_i32();
                let mut items = Vec::new();
                if count == UNKNOWN_LENGTH {
                    while buf.has_remaining() {
                        items.push(element.decode(buf)?);
                    }
                } else if count < 0 {
                    return Err(Error::malformed(format!("iterable: invalid count {}", count)));
                } else {
                    let count = count as usize;
                    // Every element takes at least one byte.
                    if count > buf.remaining() {
                        return Err(Error::malformed(format!(
                            "iterable: declared {} elements but only {} bytes remain",
                            count,
                            buf.remaining()
                        )));
                    }
                    items.reserve(count);
                    for _ in 0..count {
                        items.push(element.decode(buf)?);
                    }
                }
                Ok(Value::List(items))
            }
            Self::Kv(kc, vc) => {
                let k = kc.decode(buf)?;
                let v = vc.decode(buf)?;
                Ok(Value::kv(k, v))
            }
        }
    }

    /// Decode a whole buffer; trailing bytes are an error.
    pub fn decode_all(&self, bytes: &[u8]) -> Result<Value> {
        let mut buf = bytes;
        let value = self.decode(&mut buf)?;
        if !buf.is_empty() {
            return Err(Error::malformed(format!(
                "{} trailing byte(s) after {} value",
                buf.len(),
                self.urn()
            )));
        }
        Ok(value)
    }
}

fn read_prefixed<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8]> {
    let declared = varint::decode(buf)?;
    let remaining = buf.len();
    let len = usize::try_from(declared)
        .ok()
        .filter(|len| *len <= remaining)
        .ok_or_else(|| {
            Error::malformed(format!(
                "declared length {} exceeds remaining {} byte(s)",
                declared, remaining
            ))
        })?;
    let whole: &'a [u8] = *buf;
    let (head, tail) = whole.split_at(len);
    *buf = tail;
    Ok(head)
}
