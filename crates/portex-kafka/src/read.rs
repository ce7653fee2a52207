//! ReadFromKafka: an unbounded source over one or more topics.
//!
//! Expands to
//!
//! ```text
//! <root>
//!   Read            composite
//!     Unbounded     beam:transform:read:v1, payload = the source spec
//!   PostProcess     beam:transform:pardo:v1, drops record metadata
//! ```
//!
//! The leaf emits records as `kv<metadata bytes, kv<key, value>>`; the root
//! output is the bare `kv<key, value>`.

use crate::serde_class::{ClassRef, DEFAULT_DESERIALIZER};
use portex_coders::{CoderSpec, ConfigParams};
use portex_core::{Boundedness, Error, Result, RuntimeObject, RuntimeObjectSpec, SpecField};
use portex_graph::{
    input, no_inputs, Composite, Expansion, ParDoPayload, PCollection, PCollections, PTransform,
    Primitive, ReadPayload, TransformBuilder, MAIN_OUTPUT,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub const READ_URN: &str = "beam:external:java:kafka:read:v1";

pub const SOURCE_KIND: &str = "kafka:unbounded_source:v1";
pub const DROP_METADATA_KIND: &str = "kafka:drop_metadata:v1";

pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";

/// Request parameters.
pub mod params {
    pub const TOPICS: &str = "topics";
    pub const CONSUMER_CONFIG: &str = "consumer_config";
    pub const BOOTSTRAP_SERVERS: &str = "bootstrap_servers";
    pub const KEY_DESERIALIZER: &str = "key_deserializer";
    pub const VALUE_DESERIALIZER: &str = "value_deserializer";
}

/// Spec field names.
mod fields {
    pub const TOPICS: &str = "topics";
    pub const CONSUMER_CONFIG: &str = "consumer_config";
    pub const KEY_DESERIALIZER: &str = "key_deserializer";
    pub const VALUE_DESERIALIZER: &str = "value_deserializer";
}

// ---------------------------------------------------------------------------
// Runtime object
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KafkaUnboundedSource {
    topics: Vec<String>,
    consumer_config: BTreeMap<String, String>,
    key_deserializer: ClassRef,
    value_deserializer: ClassRef,
}

impl KafkaUnboundedSource {
    pub fn new(
        topics: Vec<String>,
        consumer_config: BTreeMap<String, String>,
        key_deserializer: ClassRef,
        value_deserializer: ClassRef,
    ) -> Result<Self> {
        if topics.is_empty() {
            return Err(Error::invalid_config(params::TOPICS, "at least one topic is required"));
        }
        if let Some(t) = topics.iter().find(|t| t.is_empty()) {
            return Err(Error::invalid_config(params::TOPICS, format!("empty topic name {:?}", t)));
        }
        Ok(Self {
            topics,
            consumer_config,
            key_deserializer,
            value_deserializer,
        })
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn consumer_config(&self) -> &BTreeMap<String, String> {
        &self.consumer_config
    }

    pub fn bootstrap_servers(&self) -> Option<&str> {
        self.consumer_config.get(BOOTSTRAP_SERVERS).map(|s| s.as_str())
    }

    pub fn key_deserializer(&self) -> &ClassRef {
        &self.key_deserializer
    }

    pub fn value_deserializer(&self) -> &ClassRef {
        &self.value_deserializer
    }

    /// `kv<key, value>` as chosen by the deserializers.
    pub fn output_coder(&self) -> CoderSpec {
        CoderSpec::kv(
            self.key_deserializer.kind().coder(),
            self.value_deserializer.kind().coder(),
        )
    }

    /// Record coder of the raw read: metadata alongside the key/value pair.
    pub fn record_coder(&self) -> CoderSpec {
        CoderSpec::kv(CoderSpec::Bytes, self.output_coder())
    }
}

impl RuntimeObject for KafkaUnboundedSource {
    const KIND: &'static str = SOURCE_KIND;

    fn to_spec(&self) -> RuntimeObjectSpec {
        RuntimeObjectSpec::new(Self::KIND)
            .with(fields::TOPICS, SpecField::StringList(self.topics.clone()))
            .with(
                fields::CONSUMER_CONFIG,
                SpecField::StringMap(self.consumer_config.clone()),
            )
            .with(
                fields::KEY_DESERIALIZER,
                SpecField::TypeRef(self.key_deserializer.name().to_string()),
            )
            .with(
                fields::VALUE_DESERIALIZER,
                SpecField::TypeRef(self.value_deserializer.name().to_string()),
            )
    }

    fn from_spec(spec: &RuntimeObjectSpec) -> Result<Self> {
        spec.expect_kind(Self::KIND)?;
        Self::new(
            spec.string_list(fields::TOPICS)?.to_vec(),
            spec.string_map(fields::CONSUMER_CONFIG)?.clone(),
            ClassRef::deserializer(spec.type_ref(fields::KEY_DESERIALIZER)?)?,
            ClassRef::deserializer(spec.type_ref(fields::VALUE_DESERIALIZER)?)?,
        )
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ReadFromKafka {
    source: KafkaUnboundedSource,
}

impl ReadFromKafka {
    pub fn new(source: KafkaUnboundedSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &KafkaUnboundedSource {
        &self.source
    }
}

impl PTransform for ReadFromKafka {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        let mut c = Composite::new();
        let read = c.apply("Read", UnboundedRead::new(self.source.clone()), no_inputs());
        let post = c.apply("PostProcess", DropMetadata, input("in", read.main()));
        c.output(MAIN_OUTPUT, post.main());
        Ok(c.into())
    }
}

/// Wraps the source leaf so runners that translate `Read` can replace it whole.
#[derive(Debug)]
struct UnboundedRead {
    source: KafkaUnboundedSource,
}

impl UnboundedRead {
    fn new(source: KafkaUnboundedSource) -> Self {
        Self { source }
    }
}

impl PTransform for UnboundedRead {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        let mut c = Composite::new();
        let leaf = c.apply("Unbounded", SourceLeaf(self.source.clone()), no_inputs());
        c.output(MAIN_OUTPUT, leaf.main());
        Ok(c.into())
    }
}

#[derive(Debug)]
struct SourceLeaf(KafkaUnboundedSource);

impl PTransform for SourceLeaf {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        let payload = ReadPayload {
            source: self.0.to_spec(),
            is_bounded: Boundedness::Unbounded,
        };
        Ok(Primitive::new(payload.to_function_spec()?)
            .with_output(MAIN_OUTPUT, PCollection::unbounded(self.0.record_coder()))
            .into())
    }
}

/// `kv<metadata, kv<k, v>>` to `kv<k, v>`.
#[derive(Debug)]
struct DropMetadata;

impl PTransform for DropMetadata {
    fn expand(&self, inputs: &PCollections) -> Result<Expansion> {
        let record = inputs
            .get("in")
            .ok_or_else(|| Error::invalid_config("in", "PostProcess needs an input"))?;
        let element = match &record.coder {
            CoderSpec::Kv(_, value) => value.as_ref().clone(),
            other => {
                return Err(Error::invalid_config(
                    "in",
                    format!("expected a record coder, found {}", other.urn()),
                ))
            }
        };
        let payload = ParDoPayload {
            do_fn: RuntimeObjectSpec::new(DROP_METADATA_KIND),
        };
        Ok(Primitive::new(payload.to_function_spec()?)
            .with_output(
                MAIN_OUTPUT,
                PCollection {
                    coder: element,
                    boundedness: record.boundedness,
                },
            )
            .into())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct ReadBuilder;

impl ReadBuilder {
    /// Validate request parameters into a source.
    pub fn source(config: &ConfigParams) -> Result<KafkaUnboundedSource> {
        let topics = config.require_string_list(params::TOPICS)?;
        let mut consumer_config = config
            .optional_string_map(params::CONSUMER_CONFIG)?
            .unwrap_or_default();
        if let Some(servers) = config.optional_str(params::BOOTSTRAP_SERVERS)? {
            consumer_config.insert(BOOTSTRAP_SERVERS.to_string(), servers);
        }
        match consumer_config.get(BOOTSTRAP_SERVERS) {
            Some(s) if !s.is_empty() => {}
            _ => {
                return Err(Error::invalid_config(
                    params::BOOTSTRAP_SERVERS,
                    format!(
                        "required unless {} carries {}",
                        params::CONSUMER_CONFIG,
                        BOOTSTRAP_SERVERS
                    ),
                ))
            }
        }

        let key = deserializer(config, params::KEY_DESERIALIZER)?;
        let value = deserializer(config, params::VALUE_DESERIALIZER)?;
        debug!(
            "kafka read of {} topic(s), key {} value {}",
            topics.len(),
            key,
            value
        );
        KafkaUnboundedSource::new(topics, consumer_config, key, value)
    }
}

fn deserializer(config: &ConfigParams, key: &str) -> Result<ClassRef> {
    let name = config
        .optional_str(key)?
        .unwrap_or_else(|| DEFAULT_DESERIALIZER.to_string());
    ClassRef::deserializer(&name).map_err(|e| match e {
        Error::UnresolvableReference(msg) => {
            Error::UnresolvableReference(format!("{} (parameter '{}')", msg, key))
        }
        other => other,
    })
}

impl TransformBuilder for ReadBuilder {
    fn urn(&self) -> &str {
        READ_URN
    }

    fn description(&self) -> &str {
        "Read key/value records from Kafka topics"
    }

    fn build(&self, params: &ConfigParams) -> Result<Arc<dyn PTransform>> {
        Ok(Arc::new(ReadFromKafka::new(Self::source(params)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> KafkaUnboundedSource {
        KafkaUnboundedSource::new(
            vec!["t".into()],
            BTreeMap::from([(BOOTSTRAP_SERVERS.to_string(), "h:1".to_string())]),
            ClassRef::deserializer("StringDeserializer").unwrap(),
            ClassRef::deserializer("LongDeserializer").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn output_coder_follows_deserializers() {
        assert_eq!(
            source().output_coder(),
            CoderSpec::kv(CoderSpec::StringUtf8, CoderSpec::Varint)
        );
    }

    #[test]
    fn spec_roundtrip() {
        let s = source();
        let spec = s.to_spec();
        let back = KafkaUnboundedSource::from_spec(&spec).unwrap();
        assert_eq!(back.to_spec(), spec);
        assert_eq!(back, s);
    }

    #[test]
    fn empty_topics_rejected() {
        let s = source();
        let err = KafkaUnboundedSource::new(
            vec![],
            s.consumer_config().clone(),
            s.key_deserializer().clone(),
            s.value_deserializer().clone(),
        )
        .unwrap_err();
        match err {
            Error::InvalidConfiguration { key, .. } => assert_eq!(key, "topics"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
