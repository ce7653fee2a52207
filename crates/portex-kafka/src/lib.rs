//! Portex Kafka - expandable Kafka read/write transforms
//!
//! Both transforms leave a runtime object spec in their leaf payload; an
//! executing process rebuilds the source or sink from that spec alone.

pub mod read;
pub mod serde_class;
pub mod write;

pub use read::{KafkaUnboundedSource, ReadBuilder, ReadFromKafka, READ_URN};
pub use serde_class::{ClassRef, Role, SerdeKind, DEFAULT_DESERIALIZER, DEFAULT_SERIALIZER};
pub use write::{KafkaSink, WriteBuilder, WriteToKafka, WRITE_URN};

use portex_core::Result;
use portex_graph::TransformRegistry;

/// Register the Kafka builders.
pub fn register(registry: &mut TransformRegistry) -> Result<()> {
    registry.register(ReadBuilder)?;
    registry.register(WriteBuilder)?;
    Ok(())
}
