//! Portex Core - Types, wire protocol, and error handling

pub mod config;
pub mod error;
pub mod protocol;
pub mod spec;
pub mod types;

pub use config::{BindMode, ServiceConfig};
pub use error::{Error, ErrorKind, Result};
pub use protocol::*;
pub use spec::{RuntimeObject, RuntimeObjectSpec, SpecField};
pub use types::*;
