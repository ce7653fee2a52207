//! Graph assembler: turns one transform application into a linked subgraph.
//!
//! The root application is resolved through the registry, its configuration
//! decoded, and the built transform expanded recursively. Every node and
//! collection lands in a request-scoped [`ComponentTable`]; the first error at
//! any depth aborts the whole expansion and the table is dropped.

use crate::components::{self, ComponentTable};
use crate::registry::TransformRegistry;
use crate::transform::{Expansion, PCollection, PCollections, PTransform, Port};
use portex_coders::decode_payload;
use portex_core::urns;
use portex_core::{
    Components, Error, ExpansionRequest, ExternalConfigurationPayload, PTransformNode, Result,
    TransformName,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Deepest composite nesting an expansion may reach.
pub const MAX_DEPTH: usize = 64;

/// A collection bound to a port: its table id plus its shape.
#[derive(Clone, Debug)]
struct Bound {
    id: String,
    pc: PCollection,
}

type Bindings = BTreeMap<String, Bound>;

/// Result of a successful expansion.
#[derive(Clone, Debug)]
pub struct Assembly {
    /// The expanded root. Not itself part of `components.transforms`.
    pub root: PTransformNode,
    /// The request context plus every entity the expansion produced.
    pub components: Components,
}

#[derive(Clone)]
pub struct Assembler {
    registry: Arc<TransformRegistry>,
    environment_urn: String,
}

impl Assembler {
    pub fn new(registry: Arc<TransformRegistry>) -> Self {
        Self {
            registry,
            environment_urn: urns::ENV_EMBEDDED.to_string(),
        }
    }

    /// Environment URN stamped on every primitive leaf.
    pub fn with_environment(mut self, urn: impl Into<String>) -> Self {
        self.environment_urn = urn.into();
        self
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    pub fn environment_urn(&self) -> &str {
        &self.environment_urn
    }

    pub fn expand(&self, request: &ExpansionRequest) -> Result<Assembly> {
        let application = &request.transform;
        let spec = application.spec.as_ref().ok_or_else(|| {
            Error::InvalidRequest(format!("transform '{}' has no spec", application.unique_name))
        })?;
        if spec.urn.is_empty() {
            return Err(Error::InvalidRequest("transform URN is empty".into()));
        }
        if application.unique_name.is_empty() {
            return Err(Error::InvalidRequest("transform unique name is empty".into()));
        }

        let builder = self.registry.resolve(&spec.urn)?;
        let payload = ExternalConfigurationPayload::from_bytes(&spec.payload)?;
        let params = decode_payload(&payload)?;

        let root_name = TransformName::root(&request.namespace, &application.unique_name);
        let mut table = ComponentTable::new(&request.namespace, &request.components);
        table.reserve(root_name.as_str())?;

        let inputs = self.bind_root_inputs(&table, request)?;

        info!(
            "expanding {} as {} ({} parameter(s), {} input(s))",
            spec.urn,
            root_name,
            params.len(),
            inputs.len()
        );

        let transform = builder.build(&params).map_err(|e| {
            warn!("builder for {} rejected its configuration: {}", spec.urn, e);
            e
        })?;

        let (root, _) = self.expand_node(&mut table, &root_name, transform.as_ref(), &inputs, 0)?;
        components::validate(&root, table.components())?;

        let components = table.into_components();
        info!(
            "expanded {} into {} subtransform(s), {} component(s) total",
            root_name,
            root.subtransforms.len(),
            components.len()
        );
        Ok(Assembly { root, components })
    }

    fn bind_root_inputs(&self, table: &ComponentTable, request: &ExpansionRequest) -> Result<Bindings> {
        let mut inputs = Bindings::new();
        for (tag, id) in &request.transform.inputs {
            let node = request.components.pcollections.get(id).ok_or_else(|| {
                Error::InvalidRequest(format!(
                    "input '{}' refers to unknown pcollection {}",
                    tag, id
                ))
            })?;
            let coder = table.coder_spec(&node.coder_id)?;
            inputs.insert(
                tag.clone(),
                Bound {
                    id: id.clone(),
                    pc: PCollection {
                        coder,
                        boundedness: node.is_bounded,
                    },
                },
            );
        }
        Ok(inputs)
    }

    /// Expand `transform` under `name`. Descendants are inserted into the
    /// table; the node for `name` itself is returned to the caller.
    fn expand_node(
        &self,
        table: &mut ComponentTable,
        name: &TransformName,
        transform: &dyn PTransform,
        inputs: &Bindings,
        depth: usize,
    ) -> Result<(PTransformNode, Bindings)> {
        if depth > MAX_DEPTH {
            return Err(Error::invalid_config(
                name.as_str(),
                format!("composite nesting exceeds {} levels", MAX_DEPTH),
            ));
        }

        let shapes: PCollections = inputs
            .iter()
            .map(|(tag, b)| (tag.clone(), b.pc.clone()))
            .collect();
        let input_ids = ids(inputs);

        match transform.expand(&shapes)? {
            Expansion::Primitive(primitive) => {
                let environment_id = table.environment(&self.environment_urn);
                let mut outputs = Bindings::new();
                for (tag, pc) in primitive.outputs {
                    let id = table.add_pcollection(name, &tag, &pc);
                    outputs.insert(tag, Bound { id, pc });
                }
                debug!("{}: primitive {}", name, primitive.spec.urn);
                let node = PTransformNode {
                    unique_name: name.to_string(),
                    spec: Some(primitive.spec),
                    subtransforms: Vec::new(),
                    inputs: input_ids,
                    outputs: ids(&outputs),
                    environment_id: Some(environment_id),
                };
                Ok((node, outputs))
            }
            Expansion::Composite(composite) => {
                if composite.steps().is_empty() {
                    return Err(Error::invalid_config(
                        name.as_str(),
                        "composite expanded to no steps",
                    ));
                }

                let mut seen = HashSet::new();
                let mut produced: Vec<Bindings> = Vec::with_capacity(composite.steps().len());
                let mut subtransforms = Vec::with_capacity(composite.steps().len());

                for (index, step) in composite.steps().iter().enumerate() {
                    if step.name.is_empty() || step.name.contains('/') {
                        return Err(Error::invalid_config(
                            name.as_str(),
                            format!("invalid step name '{}'", step.name),
                        ));
                    }
                    let child = name.child(&step.name);
                    if !seen.insert(step.name.as_str()) {
                        return Err(Error::NameCollision(child.to_string()));
                    }

                    let mut bound = Bindings::new();
                    for (tag, port) in &step.inputs {
                        bound.insert(tag.clone(), resolve_port(name, inputs, &produced, index, port)?);
                    }

                    let (node, outs) =
                        self.expand_node(table, &child, step.transform.as_ref(), &bound, depth + 1)?;
                    table.insert_transform(node)?;
                    subtransforms.push(child.to_string());
                    produced.push(outs);
                }

                let mut outputs = Bindings::new();
                for (tag, port) in composite.outputs() {
                    let bound = resolve_port(name, inputs, &produced, produced.len(), port)?;
                    outputs.insert(tag.clone(), bound);
                }

                debug!("{}: composite of {} step(s)", name, subtransforms.len());
                let node = PTransformNode {
                    unique_name: name.to_string(),
                    spec: None,
                    subtransforms,
                    inputs: input_ids,
                    outputs: ids(&outputs),
                    environment_id: None,
                };
                Ok((node, outputs))
            }
        }
    }
}

/// Resolve `port` for the step at `limit`; only earlier siblings are visible.
fn resolve_port(
    owner: &TransformName,
    inputs: &Bindings,
    produced: &[Bindings],
    limit: usize,
    port: &Port,
) -> Result<Bound> {
    match port {
        Port::Input(tag) => inputs.get(tag).cloned().ok_or_else(|| {
            Error::invalid_config(owner.as_str(), format!("no input named '{}'", tag))
        }),
        Port::Step { step, tag } => {
            if *step >= limit {
                return Err(Error::invalid_config(
                    owner.as_str(),
                    format!("step {} is not an earlier sibling", step),
                ));
            }
            produced[*step].get(tag).cloned().ok_or_else(|| {
                Error::invalid_config(
                    owner.as_str(),
                    format!("step {} has no output '{}'", step, tag),
                )
            })
        }
    }
}

fn ids(bindings: &Bindings) -> BTreeMap<String, String> {
    bindings
        .iter()
        .map(|(tag, b)| (tag.clone(), b.id.clone()))
        .collect()
}
