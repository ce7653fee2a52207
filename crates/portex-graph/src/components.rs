//! Request-scoped component table.
//!
//! Starts from the caller's component context and accumulates every entity
//! produced by one expansion. Ids are allocated fresh and never reuse an id
//! already present in the table; coders are shared by structural equality.

use crate::transform::PCollection;
use portex_coders::{CoderSpec, MAX_CODER_DEPTH};
use portex_core::urns;
use portex_core::{
    CoderNode, Components, EnvironmentNode, Error, PCollectionNode, PTransformNode, Result,
    TransformName, WindowingStrategyNode,
};
use std::collections::{HashMap, HashSet};

pub struct ComponentTable {
    namespace: String,
    components: Components,
    reserved: HashSet<String>,
    coder_ids: HashMap<CoderNode, String>,
    windowing_strategy_id: Option<String>,
    environment_id: Option<String>,
    next_id: u64,
}

impl ComponentTable {
    pub fn new(namespace: &str, context: &Components) -> Self {
        let mut coder_ids = HashMap::new();
        for (id, coder) in &context.coders {
            coder_ids.entry(coder.clone()).or_insert_with(|| id.clone());
        }
        Self {
            namespace: namespace.to_string(),
            components: context.clone(),
            reserved: HashSet::new(),
            coder_ids,
            windowing_strategy_id: None,
            environment_id: None,
            next_id: 0,
        }
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn into_components(self) -> Components {
        self.components
    }

    pub fn is_taken(&self, id: &str) -> bool {
        self.components.contains_id(id) || self.reserved.contains(id)
    }

    /// Claim an id that lives outside the table (the root transform).
    pub fn reserve(&mut self, id: &str) -> Result<()> {
        if self.is_taken(id) {
            return Err(Error::NameCollision(id.to_string()));
        }
        self.reserved.insert(id.to_string());
        Ok(())
    }

    fn allocate(&mut self, kind: &str) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{}{}_{}", self.namespace, kind, self.next_id);
            if !self.is_taken(&id) {
                return id;
            }
        }
    }

    fn unique(&self, base: String) -> String {
        if !self.is_taken(&base) {
            return base;
        }
        let mut n = 1u64;
        loop {
            let id = format!("{}_{}", base, n);
            if !self.is_taken(&id) {
                return id;
            }
            n += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Coders
    // -----------------------------------------------------------------------

    /// Id of `coder`, adding it (and its components) if no equal coder exists.
    pub fn add_coder(&mut self, coder: &CoderSpec) -> String {
        let component_coder_ids = coder
            .components()
            .into_iter()
            .map(|c| self.add_coder(c))
            .collect();
        self.add_coder_node(CoderNode {
            urn: coder.urn().to_string(),
            component_coder_ids,
        })
    }

    fn add_coder_node(&mut self, node: CoderNode) -> String {
        if let Some(id) = self.coder_ids.get(&node) {
            return id.clone();
        }
        let id = self.allocate("coder");
        self.coder_ids.insert(node.clone(), id.clone());
        self.components.coders.insert(id.clone(), node);
        id
    }

    /// Rebuild the codec behind a coder id of the table.
    pub fn coder_spec(&self, id: &str) -> Result<CoderSpec> {
        self.coder_spec_at(id, 0)
    }

    fn coder_spec_at(&self, id: &str, depth: usize) -> Result<CoderSpec> {
        if depth > MAX_CODER_DEPTH {
            return Err(Error::InvalidRequest(format!(
                "coder {} nests deeper than {}",
                id, MAX_CODER_DEPTH
            )));
        }
        let node = self
            .components
            .coders
            .get(id)
            .ok_or_else(|| Error::InvalidRequest(format!("dangling coder reference {}", id)))?;
        let components = node
            .component_coder_ids
            .iter()
            .map(|c| self.coder_spec_at(c, depth + 1))
            .collect::<Result<Vec<_>>>()?;
        CoderSpec::from_parts(&node.urn, components)
    }

    // -----------------------------------------------------------------------
    // Shared strategies
    // -----------------------------------------------------------------------

    /// The global windowing strategy, created on first use.
    pub fn windowing_strategy(&mut self) -> String {
        if let Some(id) = &self.windowing_strategy_id {
            return id.clone();
        }
        let window_coder_id = self.add_coder_node(CoderNode {
            urn: urns::CODER_GLOBAL_WINDOW.to_string(),
            component_coder_ids: Vec::new(),
        });
        let id = self.allocate("windowing");
        self.components.windowing_strategies.insert(
            id.clone(),
            WindowingStrategyNode {
                window_fn_urn: urns::WINDOWFN_GLOBAL.to_string(),
                window_coder_id,
                allowed_lateness_ms: 0,
            },
        );
        self.windowing_strategy_id = Some(id.clone());
        id
    }

    /// The environment every primitive of this expansion runs in.
    pub fn environment(&mut self, urn: &str) -> String {
        if let Some(id) = &self.environment_id {
            return id.clone();
        }
        let id = self.allocate("env");
        self.components.environments.insert(
            id.clone(),
            EnvironmentNode {
                urn: urn.to_string(),
            },
        );
        self.environment_id = Some(id.clone());
        id
    }

    // -----------------------------------------------------------------------
    // Collections and transforms
    // -----------------------------------------------------------------------

    /// Record output `tag` of `producer`; returns the collection id.
    pub fn add_pcollection(&mut self, producer: &TransformName, tag: &str, pc: &PCollection) -> String {
        let coder_id = self.add_coder(&pc.coder);
        let windowing_strategy_id = self.windowing_strategy();
        let id = self.unique(format!("{}.{}", producer, tag));
        self.components.pcollections.insert(
            id.clone(),
            PCollectionNode {
                unique_name: id.clone(),
                coder_id,
                is_bounded: pc.boundedness,
                windowing_strategy_id,
            },
        );
        id
    }

    pub fn insert_transform(&mut self, node: PTransformNode) -> Result<()> {
        if self.is_taken(&node.unique_name) {
            return Err(Error::NameCollision(node.unique_name));
        }
        self.components
            .transforms
            .insert(node.unique_name.clone(), node);
        Ok(())
    }
}

/// Check that every reference made by `root` and by the table's entries
/// resolves inside the table, and that each transform is exactly one of
/// composite or primitive.
pub fn validate(root: &PTransformNode, components: &Components) -> Result<()> {
    let dangling = |what: &str, owner: &str, id: &str| {
        Error::Internal(format!("{} references missing {} {}", owner, what, id))
    };

    for node in components.transforms.values().chain(std::iter::once(root)) {
        let owner = node.unique_name.as_str();
        if node.is_composite() == node.spec.is_some() {
            return Err(Error::Internal(format!(
                "{} must be either composite or primitive",
                owner
            )));
        }
        for sub in &node.subtransforms {
            if !components.transforms.contains_key(sub) {
                return Err(dangling("transform", owner, sub));
            }
        }
        for pc in node.inputs.values().chain(node.outputs.values()) {
            if !components.pcollections.contains_key(pc) {
                return Err(dangling("pcollection", owner, pc));
            }
        }
        if let Some(env) = &node.environment_id {
            if !components.environments.contains_key(env) {
                return Err(dangling("environment", owner, env));
            }
        }
    }

    for (id, pc) in &components.pcollections {
        if !components.coders.contains_key(&pc.coder_id) {
            return Err(dangling("coder", id, &pc.coder_id));
        }
        if !components
            .windowing_strategies
            .contains_key(&pc.windowing_strategy_id)
        {
            return Err(dangling("windowing strategy", id, &pc.windowing_strategy_id));
        }
    }

    for (id, coder) in &components.coders {
        for c in &coder.component_coder_ids {
            if !components.coders.contains_key(c) {
                return Err(dangling("coder", id, c));
            }
        }
    }

    for (id, ws) in &components.windowing_strategies {
        if !components.coders.contains_key(&ws.window_coder_id) {
            return Err(dangling("coder", id, &ws.window_coder_id));
        }
    }

    Ok(())
}
