//! Expansion service façade.
//!
//! `expand` is total: every failure, including a panicking builder, comes
//! back as a response-level error and no partial graph ever leaves.

use portex_core::{Error, ExpansionRequest, ExpansionResponse, Result, ServiceConfig};
use portex_graph::{Assembler, TransformRegistry};
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Registry holding every bundled connector.
pub fn default_registry() -> Result<TransformRegistry> {
    let mut registry = TransformRegistry::new();
    portex_kafka::register(&mut registry)?;
    info!("Registered transforms: {:?}", registry.urns());
    Ok(registry)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransformInfo {
    pub urn: String,
    pub description: String,
}

#[derive(Clone)]
pub struct ExpansionService {
    assembler: Assembler,
}

impl ExpansionService {
    pub fn new(registry: TransformRegistry) -> Self {
        Self::with_registry(Arc::new(registry))
    }

    pub fn with_registry(registry: Arc<TransformRegistry>) -> Self {
        Self {
            assembler: Assembler::new(registry),
        }
    }

    /// Bundled connectors, stamping `config.environment` on every leaf.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let service = Self::new(default_registry()?);
        Ok(Self {
            assembler: service.assembler.with_environment(config.environment.clone()),
        })
    }

    pub fn environment_urn(&self) -> &str {
        self.assembler.environment_urn()
    }

    pub fn transforms(&self) -> Vec<TransformInfo> {
        self.assembler
            .registry()
            .descriptions()
            .into_iter()
            .map(|(urn, description)| TransformInfo {
                urn: urn.to_string(),
                description: description.to_string(),
            })
            .collect()
    }

    pub fn expand(&self, request: &ExpansionRequest) -> ExpansionResponse {
        let name = format!("{}{}", request.namespace, request.transform.unique_name);
        let outcome = catch_unwind(AssertUnwindSafe(|| self.assembler.expand(request)));
        match outcome {
            Ok(Ok(assembly)) => ExpansionResponse::ok(assembly.root, assembly.components),
            Ok(Err(e)) => {
                warn!("expansion of {} failed: {}", name, e);
                ExpansionResponse::err(&e)
            }
            Err(payload) => {
                let e = Error::Internal(format!(
                    "expansion of {} panicked: {}",
                    name,
                    panic_message(payload.as_ref())
                ));
                error!("{}", e);
                ExpansionResponse::err(&e)
            }
        }
    }

    /// Parse a JSON request body and expand it.
    pub fn expand_json(&self, body: &[u8]) -> ExpansionResponse {
        match serde_json::from_slice::<ExpansionRequest>(body) {
            Ok(request) => self.expand(&request),
            Err(e) => {
                let e = Error::InvalidRequest(format!("unparseable expansion request: {}", e));
                warn!("{}", e);
                ExpansionResponse::err(&e)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
