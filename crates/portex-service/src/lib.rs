//! Portex Service - expansion façade, RPC router, and HTTP binding

pub mod rpc;
pub mod server;
pub mod service;

pub use rpc::{route_rpc, to_response, RpcResult};
pub use server::{router, start_server};
pub use service::{default_registry, ExpansionService, TransformInfo};
