//! WriteToKafka: publishes a `kv<key, value>` collection to one topic.

use crate::read::BOOTSTRAP_SERVERS;
use crate::serde_class::{ClassRef, DEFAULT_SERIALIZER};
use portex_coders::{CoderSpec, ConfigParams};
use portex_core::{Error, Result, RuntimeObject, RuntimeObjectSpec, SpecField};
use portex_graph::{
    input, Composite, Expansion, PCollections, PTransform, Port, Primitive, TransformBuilder,
    WritePayload,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub const WRITE_URN: &str = "beam:external:java:kafka:write:v1";

pub const SINK_KIND: &str = "kafka:sink:v1";

pub mod params {
    pub const TOPIC: &str = "topic";
    pub const PRODUCER_CONFIG: &str = "producer_config";
    pub const KEY_SERIALIZER: &str = "key_serializer";
    pub const VALUE_SERIALIZER: &str = "value_serializer";
}

/// Input tag of the write.
pub const INPUT: &str = "in";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KafkaSink {
    topic: String,
    producer_config: BTreeMap<String, String>,
    key_serializer: ClassRef,
    value_serializer: ClassRef,
}

impl KafkaSink {
    pub fn new(
        topic: String,
        producer_config: BTreeMap<String, String>,
        key_serializer: ClassRef,
        value_serializer: ClassRef,
    ) -> Result<Self> {
        if topic.is_empty() {
            return Err(Error::invalid_config(params::TOPIC, "topic must not be empty"));
        }
        if producer_config.get(BOOTSTRAP_SERVERS).map_or(true, |s| s.is_empty()) {
            return Err(Error::invalid_config(
                params::PRODUCER_CONFIG,
                format!("missing {}", BOOTSTRAP_SERVERS),
            ));
        }
        Ok(Self {
            topic,
            producer_config,
            key_serializer,
            value_serializer,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn producer_config(&self) -> &BTreeMap<String, String> {
        &self.producer_config
    }

    pub fn key_serializer(&self) -> &ClassRef {
        &self.key_serializer
    }

    pub fn value_serializer(&self) -> &ClassRef {
        &self.value_serializer
    }
}

impl RuntimeObject for KafkaSink {
    const KIND: &'static str = SINK_KIND;

    fn to_spec(&self) -> RuntimeObjectSpec {
        RuntimeObjectSpec::new(Self::KIND)
            .with("topic", SpecField::String(self.topic.clone()))
            .with("producer_config", SpecField::StringMap(self.producer_config.clone()))
            .with("key_serializer", SpecField::TypeRef(self.key_serializer.name().to_string()))
            .with("value_serializer", SpecField::TypeRef(self.value_serializer.name().to_string()))
    }

    fn from_spec(spec: &RuntimeObjectSpec) -> Result<Self> {
        spec.expect_kind(Self::KIND)?;
        Self::new(
            spec.string("topic")?.to_string(),
            spec.string_map("producer_config")?.clone(),
            ClassRef::serializer(spec.type_ref("key_serializer")?)?,
            ClassRef::serializer(spec.type_ref("value_serializer")?)?,
        )
    }
}

#[derive(Debug)]
pub struct WriteToKafka {
    sink: KafkaSink,
}

impl WriteToKafka {
    pub fn new(sink: KafkaSink) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &KafkaSink {
        &self.sink
    }
}

impl PTransform for WriteToKafka {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        let mut c = Composite::new();
        c.apply("Write", SinkLeaf(self.sink.clone()), input(INPUT, Port::Input(INPUT.into())));
        Ok(c.into())
    }
}

#[derive(Debug)]
struct SinkLeaf(KafkaSink);

impl PTransform for SinkLeaf {
    fn expand(&self, inputs: &PCollections) -> Result<Expansion> {
        let pc = inputs
            .get(INPUT)
            .ok_or_else(|| Error::invalid_config(INPUT, "write needs an input"))?;
        if !matches!(pc.coder, CoderSpec::Kv(..)) {
            return Err(Error::invalid_config(
                INPUT,
                format!("expected kv elements, found {}", pc.coder.urn()),
            ));
        }
        let payload = WritePayload {
            sink: self.0.to_spec(),
        };
        Ok(Primitive::new(payload.to_function_spec()?).into())
    }
}

pub struct WriteBuilder;

impl WriteBuilder {
    pub fn sink(config: &ConfigParams) -> Result<KafkaSink> {
        let topic = config.require_str(params::TOPIC)?;
        let producer_config = config.require_string_map(params::PRODUCER_CONFIG)?;
        let key = serializer(config, params::KEY_SERIALIZER)?;
        let value = serializer(config, params::VALUE_SERIALIZER)?;
        debug!("kafka write to {}, key {} value {}", topic, key, value);
        KafkaSink::new(topic, producer_config, key, value)
    }
}

fn serializer(config: &ConfigParams, key: &str) -> Result<ClassRef> {
    let name = config
        .optional_str(key)?
        .unwrap_or_else(|| DEFAULT_SERIALIZER.to_string());
    ClassRef::serializer(&name).map_err(|e| match e {
        Error::UnresolvableReference(msg) => {
            Error::UnresolvableReference(format!("{} (parameter '{}')", msg, key))
        }
        other => other,
    })
}

impl TransformBuilder for WriteBuilder {
    fn urn(&self) -> &str {
        WRITE_URN
    }

    fn description(&self) -> &str {
        "Write key/value records to a Kafka topic"
    }

    fn build(&self, params: &ConfigParams) -> Result<Arc<dyn PTransform>> {
        Ok(Arc::new(WriteToKafka::new(Self::sink(params)?)))
    }
}
