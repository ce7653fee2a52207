//! Portex Graph - transform model, builder registry, and graph assembly

pub mod assembler;
pub mod components;
pub mod payloads;
pub mod registry;
pub mod transform;

pub use assembler::{Assembler, Assembly, MAX_DEPTH};
pub use components::{validate, ComponentTable};
pub use payloads::{ParDoPayload, ReadPayload, WritePayload};
pub use registry::{FnBuilder, TransformBuilder, TransformRegistry};
pub use transform::{
    input, no_inputs, Composite, Expansion, PCollection, PCollections, PTransform, Port,
    Primitive, Step, StepRef, MAIN_OUTPUT,
};
