//! Tests for portex-graph: registry lookup, recursive assembly, id allocation, and failure handling

use portex_coders::{encode_str, CoderSpec, ConfigParams};
use portex_core::urns;
use portex_core::*;
use portex_graph::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ===========================================================================
// Test transforms
// ===========================================================================

#[derive(Debug)]
struct Source;

impl PTransform for Source {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        Ok(Primitive::new(FunctionSpec::new("test:source", Vec::new()))
            .with_output(MAIN_OUTPUT, PCollection::unbounded(CoderSpec::Bytes))
            .into())
    }
}

#[derive(Debug)]
struct Map;

impl PTransform for Map {
    fn expand(&self, inputs: &PCollections) -> Result<Expansion> {
        let input = inputs
            .get("in")
            .ok_or_else(|| Error::invalid_config("in", "missing input"))?;
        Ok(Primitive::new(FunctionSpec::new("test:map", Vec::new()))
            .with_output(MAIN_OUTPUT, input.clone())
            .into())
    }
}

/// Gen -> Map, exposing Map's output.
#[derive(Debug)]
struct Pipeline;

impl PTransform for Pipeline {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        let mut c = Composite::new();
        let gen = c.apply("Gen", Source, no_inputs());
        let map = c.apply("Map", Map, input("in", gen.main()));
        c.output(MAIN_OUTPUT, map.main());
        Ok(c.into())
    }
}

/// Consumes its input and produces nothing.
#[derive(Debug)]
struct Sink;

impl PTransform for Sink {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        let mut c = Composite::new();
        c.apply("Map", Map, input("in", Port::Input("in".into())));
        Ok(c.into())
    }
}

#[derive(Debug)]
struct Duplicate;

impl PTransform for Duplicate {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        let mut c = Composite::new();
        c.apply("Step", Source, no_inputs());
        c.apply("Step", Source, no_inputs());
        Ok(c.into())
    }
}

#[derive(Debug)]
struct Forward;

impl PTransform for Forward {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        let mut c = Composite::new();
        c.apply("Map", Map, input("in", Port::Step { step: 1, tag: MAIN_OUTPUT.into() }));
        c.apply("Gen", Source, no_inputs());
        Ok(c.into())
    }
}

#[derive(Debug)]
struct Empty;

impl PTransform for Empty {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        Ok(Composite::new().into())
    }
}

#[derive(Debug)]
struct Nest;

impl PTransform for Nest {
    fn expand(&self, _inputs: &PCollections) -> Result<Expansion> {
        let mut c = Composite::new();
        c.apply("Inner", Nest, no_inputs());
        Ok(c.into())
    }
}

static FLAGGED_BUILT: AtomicBool = AtomicBool::new(false);

fn registry() -> Arc<TransformRegistry> {
    let mut reg = TransformRegistry::new();
    reg.register(FnBuilder::new("test:pipeline", |params: &ConfigParams| {
        params.require_str("label")?;
        Ok(Arc::new(Pipeline) as Arc<dyn PTransform>)
    }))
    .unwrap();
    reg.register(FnBuilder::new("test:sink", |_: &ConfigParams| {
        Ok(Arc::new(Sink) as Arc<dyn PTransform>)
    }))
    .unwrap();
    reg.register(FnBuilder::new("test:duplicate", |_: &ConfigParams| {
        Ok(Arc::new(Duplicate) as Arc<dyn PTransform>)
    }))
    .unwrap();
    reg.register(FnBuilder::new("test:forward", |_: &ConfigParams| {
        Ok(Arc::new(Forward) as Arc<dyn PTransform>)
    }))
    .unwrap();
    reg.register(FnBuilder::new("test:empty", |_: &ConfigParams| {
        Ok(Arc::new(Empty) as Arc<dyn PTransform>)
    }))
    .unwrap();
    reg.register(FnBuilder::new("test:nest", |_: &ConfigParams| {
        Ok(Arc::new(Nest) as Arc<dyn PTransform>)
    }))
    .unwrap();
    reg.register(FnBuilder::new("test:flagged", |_: &ConfigParams| {
        FLAGGED_BUILT.store(true, Ordering::SeqCst);
        Ok(Arc::new(Source) as Arc<dyn PTransform>)
    }))
    .unwrap();
    Arc::new(reg)
}

fn labelled() -> ExternalConfigurationPayload {
    let mut payload = ExternalConfigurationPayload::default();
    payload.insert("label", encode_str("demo").unwrap());
    payload
}

fn request(urn: &str) -> ExpansionRequest {
    ExpansionRequest::new("ns", "App", urn, &labelled()).unwrap()
}

fn expand(req: &ExpansionRequest) -> Result<Assembly> {
    Assembler::new(registry()).expand(req)
}

/// A self-consistent context holding one bounded bytes collection.
fn upstream_context() -> Components {
    let mut c = Components::default();
    c.coders.insert(
        "c1".into(),
        CoderNode {
            urn: urns::CODER_BYTES.into(),
            component_coder_ids: vec![],
        },
    );
    c.coders.insert(
        "gw".into(),
        CoderNode {
            urn: urns::CODER_GLOBAL_WINDOW.into(),
            component_coder_ids: vec![],
        },
    );
    c.windowing_strategies.insert(
        "w1".into(),
        WindowingStrategyNode {
            window_fn_urn: urns::WINDOWFN_GLOBAL.into(),
            window_coder_id: "gw".into(),
            allowed_lateness_ms: 0,
        },
    );
    c.pcollections.insert(
        "upstream".into(),
        PCollectionNode {
            unique_name: "upstream".into(),
            coder_id: "c1".into(),
            is_bounded: Boundedness::Bounded,
            windowing_strategy_id: "w1".into(),
        },
    );
    c
}

// ===========================================================================
// Graph shape
// ===========================================================================

#[test]
fn composite_root_lists_children_in_order() {
    let a = expand(&request("test:pipeline")).unwrap();
    assert_eq!(a.root.unique_name, "nsApp");
    assert_eq!(a.root.subtransforms, vec!["nsApp/Gen", "nsApp/Map"]);
    assert!(a.root.spec.is_none());
    assert!(a.root.inputs.is_empty());
    assert_eq!(a.root.outputs.len(), 1);
    assert_eq!(a.root.outputs[MAIN_OUTPUT], "nsApp/Map.out");
}

#[test]
fn primitive_children_carry_spec_and_environment() {
    let a = expand(&request("test:pipeline")).unwrap();
    let gen = &a.components.transforms["nsApp/Gen"];
    assert!(gen.is_primitive());
    assert_eq!(gen.spec.as_ref().unwrap().urn, "test:source");
    let env = gen.environment_id.as_ref().unwrap();
    assert_eq!(a.components.environments[env].urn, urns::ENV_EMBEDDED);

    let map = &a.components.transforms["nsApp/Map"];
    assert_eq!(map.inputs["in"], "nsApp/Gen.out");
    assert_eq!(map.environment_id.as_ref(), Some(env));
}

#[test]
fn custom_environment_is_stamped() {
    let assembler = Assembler::new(registry()).with_environment("beam:env:process:v1");
    let a = assembler.expand(&request("test:pipeline")).unwrap();
    assert_eq!(a.components.environments.len(), 1);
    assert!(a
        .components
        .environments
        .values()
        .all(|e| e.urn == "beam:env:process:v1"));
}

#[test]
fn root_is_not_in_components() {
    let a = expand(&request("test:pipeline")).unwrap();
    assert!(!a.components.transforms.contains_key("nsApp"));
    validate(&a.root, &a.components).unwrap();
}

#[test]
fn sink_binds_context_input() {
    let mut req = request("test:sink");
    req.components = upstream_context();
    req.transform.inputs.insert("in".into(), "upstream".into());
    let a = expand(&req).unwrap();
    assert_eq!(a.root.inputs, BTreeMap::from([("in".to_string(), "upstream".to_string())]));
    assert!(a.root.outputs.is_empty());
    let map = &a.components.transforms["nsApp/Map"];
    assert_eq!(map.inputs["in"], "upstream");
    // the map output keeps the upstream coder, which is reused
    let out = &a.components.pcollections[&map.outputs[MAIN_OUTPUT]];
    assert_eq!(out.coder_id, "c1");
}

// ===========================================================================
// Identifiers
// ===========================================================================

#[test]
fn every_identifier_is_distinct() {
    let a = expand(&request("test:pipeline")).unwrap();
    let ids: HashSet<&str> = a.components.ids().collect();
    assert_eq!(ids.len(), a.components.len());
}

#[test]
fn identical_coders_are_shared() {
    let a = expand(&request("test:pipeline")).unwrap();
    // bytes for both collections plus the global window coder
    assert_eq!(a.components.coders.len(), 2);
    assert_eq!(a.components.windowing_strategies.len(), 1);
    let coder_ids: HashSet<&str> = a
        .components
        .pcollections
        .values()
        .map(|p| p.coder_id.as_str())
        .collect();
    assert_eq!(coder_ids.len(), 1);
}

#[test]
fn context_entries_survive_and_are_not_reused() {
    let mut req = request("test:pipeline");
    req.components.environments.insert(
        "nsenv_1".into(),
        EnvironmentNode {
            urn: "beam:env:docker:v1".into(),
        },
    );
    req.components.coders.insert(
        "nscoder_1".into(),
        CoderNode {
            urn: urns::CODER_VARINT.into(),
            component_coder_ids: vec![],
        },
    );
    let a = expand(&req).unwrap();
    assert_eq!(a.components.environments["nsenv_1"].urn, "beam:env:docker:v1");
    assert_eq!(a.components.coders["nscoder_1"].urn, urns::CODER_VARINT);
    let gen = &a.components.transforms["nsApp/Gen"];
    assert_ne!(gen.environment_id.as_deref(), Some("nsenv_1"));
}

// ===========================================================================
// Failures
// ===========================================================================

#[test]
fn unknown_urn_names_the_urn() {
    match expand(&request("test:missing")).unwrap_err() {
        Error::UnknownTransform(urn) => assert_eq!(urn, "test:missing"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn empty_urn_is_invalid_request() {
    let err = expand(&request("")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn missing_parameter_is_named() {
    let req = ExpansionRequest::new(
        "ns",
        "App",
        "test:pipeline",
        &ExternalConfigurationPayload::default(),
    )
    .unwrap();
    match expand(&req).unwrap_err() {
        Error::InvalidConfiguration { key, .. } => assert_eq!(key, "label"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn truncated_payload_fails_before_build() {
    let mut payload = ExternalConfigurationPayload::default();
    payload.insert(
        "label",
        ConfigValue {
            coder_urn: vec![urns::CODER_BYTES.into()],
            payload: vec![10, b'a'],
        },
    );
    let req = ExpansionRequest::new("ns", "App", "test:flagged", &payload).unwrap();
    let err = expand(&req).unwrap_err();
    assert!(matches!(err, Error::MalformedPayload(_)));
    assert!(!FLAGGED_BUILT.load(Ordering::SeqCst));
}

#[test]
fn sibling_name_collision() {
    match expand(&request("test:duplicate")).unwrap_err() {
        Error::NameCollision(name) => assert_eq!(name, "nsApp/Step"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn root_name_collides_with_context() {
    let mut req = request("test:pipeline");
    req.components.transforms.insert(
        "nsApp".into(),
        PTransformNode {
            unique_name: "nsApp".into(),
            spec: Some(FunctionSpec::new("test:other", vec![])),
            ..Default::default()
        },
    );
    let err = expand(&req).unwrap_err();
    assert!(matches!(err, Error::NameCollision(_)));
}

#[test]
fn forward_port_is_rejected() {
    match expand(&request("test:forward")).unwrap_err() {
        Error::InvalidConfiguration { key, .. } => assert_eq!(key, "nsApp"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn empty_composite_is_rejected() {
    let err = expand(&request("test:empty")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
}

#[test]
fn runaway_nesting_is_bounded() {
    let err = expand(&request("test:nest")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    assert!(err.to_string().contains("nesting"));
}

#[test]
fn unknown_input_pcollection() {
    let mut req = request("test:sink");
    req.transform.inputs.insert("in".into(), "nowhere".into());
    let err = expand(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn unparseable_payload_is_invalid_request() {
    let mut req = request("test:pipeline");
    req.transform.spec = Some(FunctionSpec::new("test:pipeline", b"not json".to_vec()));
    let err = expand(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}
