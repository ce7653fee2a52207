//! Runtime transform model.
//!
//! A built transform expands into either a primitive (a leaf spec plus the
//! shapes of its outputs) or a composite (an ordered list of named steps).
//! Steps refer to their inputs by index, never by pointer:
//! `Port::Input(tag)` is the enclosing transform's input, `Port::Step` is the
//! output of an earlier sibling.

use portex_coders::CoderSpec;
use portex_core::{Boundedness, FunctionSpec, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Shape of a collection flowing between transforms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PCollection {
    pub coder: CoderSpec,
    pub boundedness: Boundedness,
}

impl PCollection {
    pub fn bounded(coder: CoderSpec) -> Self {
        Self {
            coder,
            boundedness: Boundedness::Bounded,
        }
    }

    pub fn unbounded(coder: CoderSpec) -> Self {
        Self {
            coder,
            boundedness: Boundedness::Unbounded,
        }
    }
}

/// Named collections, keyed by local tag.
pub type PCollections = BTreeMap<String, PCollection>;

/// The conventional tag of a transform's only output.
pub const MAIN_OUTPUT: &str = "out";

/// A runtime transform, as produced by a builder.
pub trait PTransform: Send + Sync + fmt::Debug {
    /// Expand against the shapes of the bound inputs.
    fn expand(&self, inputs: &PCollections) -> Result<Expansion>;
}

#[derive(Debug)]
pub enum Expansion {
    Primitive(Primitive),
    Composite(Composite),
}

/// A leaf: executes `spec` and produces `outputs`.
#[derive(Debug)]
pub struct Primitive {
    pub spec: FunctionSpec,
    pub outputs: PCollections,
}

impl Primitive {
    pub fn new(spec: FunctionSpec) -> Self {
        Self {
            spec,
            outputs: PCollections::new(),
        }
    }

    pub fn with_output(mut self, tag: impl Into<String>, pc: PCollection) -> Self {
        self.outputs.insert(tag.into(), pc);
        self
    }
}

impl From<Primitive> for Expansion {
    fn from(p: Primitive) -> Self {
        Expansion::Primitive(p)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Port {
    /// An input of the enclosing transform.
    Input(String),
    /// Output `tag` of the sibling step at index `step`.
    Step { step: usize, tag: String },
}

/// Handle to a step inside a composite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepRef(usize);

impl StepRef {
    pub fn index(&self) -> usize {
        self.0
    }

    pub fn port(&self, tag: impl Into<String>) -> Port {
        Port::Step {
            step: self.0,
            tag: tag.into(),
        }
    }

    pub fn main(&self) -> Port {
        self.port(MAIN_OUTPUT)
    }
}

#[derive(Debug)]
pub struct Step {
    pub name: String,
    pub transform: Arc<dyn PTransform>,
    pub inputs: BTreeMap<String, Port>,
}

#[derive(Debug, Default)]
pub struct Composite {
    steps: Vec<Step>,
    outputs: BTreeMap<String, Port>,
}

impl Composite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step named `name` (local to this composite).
    pub fn apply<I, K>(&mut self, name: impl Into<String>, transform: impl PTransform + 'static, inputs: I) -> StepRef
    where
        I: IntoIterator<Item = (K, Port)>,
        K: Into<String>,
    {
        self.apply_arc(name, Arc::new(transform), inputs)
    }

    pub fn apply_arc<I, K>(&mut self, name: impl Into<String>, transform: Arc<dyn PTransform>, inputs: I) -> StepRef
    where
        I: IntoIterator<Item = (K, Port)>,
        K: Into<String>,
    {
        self.steps.push(Step {
            name: name.into(),
            transform,
            inputs: inputs.into_iter().map(|(k, p)| (k.into(), p)).collect(),
        });
        StepRef(self.steps.len() - 1)
    }

    /// Expose `port` as this composite's output `tag`.
    pub fn output(&mut self, tag: impl Into<String>, port: Port) -> &mut Self {
        self.outputs.insert(tag.into(), port);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn outputs(&self) -> &BTreeMap<String, Port> {
        &self.outputs
    }
}

impl From<Composite> for Expansion {
    fn from(c: Composite) -> Self {
        Expansion::Composite(c)
    }
}

/// No inputs, for source steps.
pub fn no_inputs() -> Vec<(String, Port)> {
    Vec::new()
}

/// The single input `tag` bound to `port`.
pub fn input(tag: &str, port: Port) -> Vec<(String, Port)> {
    vec![(tag.to_string(), port)]
}
