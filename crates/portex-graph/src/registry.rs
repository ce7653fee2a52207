//! Transform builder registry and trait definitions
//!
//! Each connector contributes one builder per URN. The registry is filled
//! once at startup and only read afterwards; share it behind an `Arc`.

use crate::transform::PTransform;
use portex_coders::ConfigParams;
use portex_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Implement this to make a URN expandable.
pub trait TransformBuilder: Send + Sync {
    /// The URN requests use to select this builder.
    fn urn(&self) -> &str;

    /// Human-readable description, listed by the service.
    fn description(&self) -> &str {
        ""
    }

    /// Build the runtime transform. Must validate every required parameter
    /// and fail with `Error::InvalidConfiguration` naming the key otherwise.
    /// Identical params must produce identical transforms.
    fn build(&self, params: &ConfigParams) -> Result<Arc<dyn PTransform>>;
}

/// A builder backed by a plain function.
pub struct FnBuilder<F> {
    urn: String,
    build: F,
}

impl<F> FnBuilder<F>
where
    F: Fn(&ConfigParams) -> Result<Arc<dyn PTransform>> + Send + Sync,
{
    pub fn new(urn: impl Into<String>, build: F) -> Self {
        Self {
            urn: urn.into(),
            build,
        }
    }
}

impl<F> TransformBuilder for FnBuilder<F>
where
    F: Fn(&ConfigParams) -> Result<Arc<dyn PTransform>> + Send + Sync,
{
    fn urn(&self) -> &str {
        &self.urn
    }

    fn build(&self, params: &ConfigParams) -> Result<Arc<dyn PTransform>> {
        (self.build)(params)
    }
}

#[derive(Default)]
pub struct TransformRegistry {
    builders: HashMap<String, Arc<dyn TransformBuilder>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder. A second builder for the same URN is a startup
    /// configuration error.
    pub fn register(&mut self, builder: impl TransformBuilder + 'static) -> Result<()> {
        let urn = builder.urn().to_string();
        if urn.is_empty() {
            return Err(Error::Registration("builder with empty URN".into()));
        }
        if self.builders.contains_key(&urn) {
            return Err(Error::Registration(format!(
                "duplicate builder for URN {}",
                urn
            )));
        }
        debug!("registered transform builder {}", urn);
        self.builders.insert(urn, Arc::new(builder));
        Ok(())
    }

    pub fn resolve(&self, urn: &str) -> Result<Arc<dyn TransformBuilder>> {
        self.builders
            .get(urn)
            .cloned()
            .ok_or_else(|| Error::UnknownTransform(urn.to_string()))
    }

    pub fn contains(&self, urn: &str) -> bool {
        self.builders.contains_key(urn)
    }

    /// Registered URNs, sorted.
    pub fn urns(&self) -> Vec<&str> {
        let mut urns: Vec<&str> = self.builders.keys().map(|s| s.as_str()).collect();
        urns.sort_unstable();
        urns
    }

    /// (URN, description) pairs, sorted by URN.
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        self.urns()
            .into_iter()
            .filter_map(|urn| self.builders.get(urn).map(|b| (urn, b.description())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Expansion, PCollections, Primitive};
    use portex_core::FunctionSpec;

    #[derive(Debug)]
    struct Noop;

    impl PTransform for Noop {
        fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
            Ok(Primitive::new(FunctionSpec::new("test:noop", Vec::new())).into())
        }
    }

    fn noop_builder(urn: &str) -> FnBuilder<impl Fn(&ConfigParams) -> Result<Arc<dyn PTransform>> + Send + Sync> {
        FnBuilder::new(urn, |_: &ConfigParams| Ok(Arc::new(Noop) as Arc<dyn PTransform>))
    }

    #[test]
    fn resolve_registered() {
        let mut reg = TransformRegistry::new();
        reg.register(noop_builder("test:a")).unwrap();
        assert!(reg.resolve("test:a").is_ok());
        assert_eq!(reg.urns(), vec!["test:a"]);
    }

    #[test]
    fn unknown_urn() {
        let reg = TransformRegistry::new();
        match reg.resolve("test:missing") {
            Err(Error::UnknownTransform(urn)) => assert_eq!(urn, "test:missing"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("resolved an unregistered URN"),
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut reg = TransformRegistry::new();
        reg.register(noop_builder("test:a")).unwrap();
        let err = reg.register(noop_builder("test:a")).unwrap_err();
        assert!(matches!(err, Error::Registration(_)));
        assert_eq!(reg.len(), 1);
    }
}
