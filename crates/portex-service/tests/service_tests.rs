//! Tests for portex-service: façade error conversion, RPC routing, HTTP binding, and concurrent use

use axum::body::Body;
use axum::http::{Request, StatusCode};
use portex_coders::{encode_str, encode_string_list};
use portex_core::*;
use portex_graph::{FnBuilder, PTransform, TransformRegistry};
use portex_kafka::READ_URN;
use portex_service::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn service() -> ExpansionService {
    ExpansionService::new(default_registry().unwrap())
}

fn read_payload() -> ExternalConfigurationPayload {
    let mut payload = ExternalConfigurationPayload::default();
    payload
        .insert("topics", encode_string_list(&["topic1", "topic2"]).unwrap())
        .insert("bootstrap_servers", encode_str("server1:port,server2:port").unwrap())
        .insert("key_deserializer", encode_str("ByteArrayDeserializer").unwrap())
        .insert("value_deserializer", encode_str("LongDeserializer").unwrap());
    payload
}

fn read_request() -> ExpansionRequest {
    ExpansionRequest::new("ns", "Read", READ_URN, &read_payload()).unwrap()
}

// ===========================================================================
// Façade
// ===========================================================================

#[test]
fn kafka_read_expands() {
    let response = service().expand(&read_request());
    assert!(!response.is_error());
    let root = response.transform.unwrap();
    assert_eq!(root.subtransforms, vec!["nsRead/Read", "nsRead/PostProcess"]);
    assert!(root.inputs.is_empty());
    assert_eq!(root.outputs.len(), 1);
    let components = response.components.unwrap();
    assert!(components.transforms.contains_key("nsRead/Read/Unbounded"));
}

#[test]
fn unknown_urn_is_reported() {
    let req = ExpansionRequest::new("ns", "Read", "beam:external:unknown:v1", &read_payload()).unwrap();
    let response = service().expand(&req);
    let err = response.error.unwrap();
    assert_eq!(err.kind, ErrorKind::UnknownTransform);
    assert!(err.message.contains("beam:external:unknown:v1"));
    assert!(response.components.is_none());
    assert!(response.transform.is_none());
}

#[test]
fn overlong_declared_length_is_malformed() {
    let mut payload = read_payload();
    payload.insert(
        "topics",
        ConfigValue {
            coder_urn: vec![urns::CODER_ITERABLE.into(), urns::CODER_BYTES.into()],
            // one element declaring 200 bytes, five present
            payload: vec![0, 0, 0, 1, 200, 1, b'a', b'b', b'c', b'd', b'e'],
        },
    );
    let req = ExpansionRequest::new("ns", "Read", READ_URN, &payload).unwrap();
    let response = service().expand(&req);
    let err = response.error.unwrap();
    assert_eq!(err.kind, ErrorKind::MalformedPayload);
    assert!(err.message.contains("topics"));
    assert!(response.components.is_none());
}

#[test]
fn unknown_codec_is_reported() {
    let mut payload = read_payload();
    payload.insert(
        "topics",
        ConfigValue {
            coder_urn: vec!["beam:coder:avro:v1".into()],
            payload: vec![],
        },
    );
    let req = ExpansionRequest::new("ns", "Read", READ_URN, &payload).unwrap();
    let err = service().expand(&req).error.unwrap();
    assert_eq!(err.kind, ErrorKind::UnknownCodec);
    assert!(err.message.contains("beam:coder:avro:v1"));
}

#[test]
fn missing_spec_is_invalid_request() {
    let mut req = read_request();
    req.transform.spec = None;
    let err = service().expand(&req).error.unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
}

#[test]
fn panicking_builder_becomes_internal_error() {
    let mut registry = TransformRegistry::new();
    registry
        .register(FnBuilder::new(
            "test:panics",
            |_: &portex_coders::ConfigParams| -> Result<Arc<dyn PTransform>> {
                panic!("builder exploded")
            },
        ))
        .unwrap();
    let svc = ExpansionService::new(registry);
    let req = ExpansionRequest::new("", "X", "test:panics", &ExternalConfigurationPayload::default()).unwrap();
    let err = svc.expand(&req).error.unwrap();
    assert_eq!(err.kind, ErrorKind::Internal);
    assert!(err.message.contains("builder exploded"));
}

#[test]
fn deeply_nested_codec_chain_is_reported() {
    let mut coder_urn = vec![urns::CODER_ITERABLE.to_string(); 20_000];
    coder_urn.push(urns::CODER_BYTES.to_string());
    let mut payload = read_payload();
    payload.insert(
        "topics",
        ConfigValue {
            coder_urn,
            payload: vec![0, 0, 0, 0],
        },
    );
    let req = ExpansionRequest::new("ns", "Read", READ_URN, &payload).unwrap();
    let body = serde_json::to_vec(&req).unwrap();
    let response = service().expand_json(&body);
    let err = response.error.unwrap();
    assert_eq!(err.kind, ErrorKind::MalformedPayload);
    assert!(err.message.contains("topics"));
    assert!(response.transform.is_none());
}

#[test]
fn unparseable_body_is_invalid_request() {
    let err = service().expand_json(b"{not json").error.unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);
}

#[test]
fn context_is_returned_with_new_entities() {
    let mut req = read_request();
    req.components.environments.insert(
        "existing".into(),
        EnvironmentNode {
            urn: "beam:env:docker:v1".into(),
        },
    );
    let components = service().expand(&req).components.unwrap();
    assert_eq!(components.environments["existing"].urn, "beam:env:docker:v1");
    assert_eq!(components.environments.len(), 2);
}

#[test]
fn from_config_stamps_environment() {
    let config = ServiceConfig {
        environment: "beam:env:process:v1".into(),
        ..Default::default()
    };
    let svc = ExpansionService::from_config(&config).unwrap();
    let components = svc.expand(&read_request()).components.unwrap();
    assert!(components
        .environments
        .values()
        .all(|e| e.urn == "beam:env:process:v1"));
}

#[test]
fn lists_bundled_transforms() {
    let urns: Vec<String> = service().transforms().into_iter().map(|t| t.urn).collect();
    assert_eq!(urns, vec![READ_URN.to_string(), portex_kafka::WRITE_URN.to_string()]);
}

// ===========================================================================
// RPC router
// ===========================================================================

#[test]
fn rpc_expand_returns_response() {
    let params = serde_json::to_value(read_request()).unwrap();
    let value = route_rpc("expand", params, &service()).unwrap();
    assert_eq!(value["transform"]["unique_name"], "nsRead");
    assert_eq!(value["transform"]["subtransforms"][1], "nsRead/PostProcess");
}

#[test]
fn rpc_expand_failure_code() {
    let req = ExpansionRequest::new("ns", "Read", "nope", &read_payload()).unwrap();
    let params = serde_json::to_value(req).unwrap();
    let (code, message) = route_rpc("expand", params, &service()).unwrap_err();
    assert_eq!(code, RPC_EXPANSION_FAILED);
    assert!(message.starts_with("UnknownTransform: "));
}

#[test]
fn rpc_invalid_params() {
    let (code, _) = route_rpc("expand", json!({"transform": 5}), &service()).unwrap_err();
    assert_eq!(code, RPC_INVALID_PARAMS);
}

#[test]
fn rpc_unknown_method() {
    let resp = to_response("r1", route_rpc("chat.send", Value::Null, &service()));
    let err = resp.error.unwrap();
    assert_eq!(err.code, RPC_METHOD_NOT_FOUND);
    assert_eq!(resp.id, "r1");
}

#[test]
fn rpc_transforms_list_and_health() {
    let svc = service();
    let list = route_rpc("transforms.list", Value::Null, &svc).unwrap();
    assert_eq!(list["transforms"].as_array().unwrap().len(), 2);
    let health = route_rpc("health", Value::Null, &svc).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["environment"], urns::ENV_EMBEDDED);
}

// ===========================================================================
// HTTP binding
// ===========================================================================

async fn post_json(app: axum::Router, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn http_expand_ok() {
    let app = router(service(), 1 << 20);
    let body = serde_json::to_vec(&read_request()).unwrap();
    let (status, value) = post_json(app, "/expand", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["transform"]["unique_name"], "nsRead");
    assert!(value.get("error").is_none());
}

#[tokio::test]
async fn http_expand_error_is_bad_request() {
    let app = router(service(), 1 << 20);
    let (status, value) = post_json(app, "/expand", b"not json".to_vec()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"]["kind"], "InvalidRequest");
    assert!(value.get("transform").is_none());
}

#[tokio::test]
async fn http_rpc_envelope() {
    let app = router(service(), 1 << 20);
    let body = serde_json::to_vec(&json!({"id": "7", "method": "health"})).unwrap();
    let (status, value) = post_json(app, "/rpc", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["id"], "7");
    assert_eq!(value["result"]["status"], "healthy");
}

#[tokio::test]
async fn http_rpc_malformed_body_keeps_envelope() {
    let app = router(service(), 1 << 20);
    let (status, value) = post_json(app, "/rpc", b"{\"method\": 5".to_vec()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["error"]["code"], RPC_INVALID_PARAMS);
    assert!(value.get("result").is_none());
}

#[tokio::test]
async fn http_health() {
    let app = router(service(), 1 << 20);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_expansions_are_independent() {
    let svc = service();
    let expected = svc.expand(&read_request());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let svc = svc.clone();
        handles.push(tokio::task::spawn_blocking(move || svc.expand(&read_request())));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), expected);
    }
}
