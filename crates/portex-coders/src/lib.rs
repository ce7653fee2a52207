//! Portex Coders: self-describing codecs for expansion configuration
//!
//! Primitive codecs live in coder.rs; config_value.rs pairs them with the
//! codec-URN chains that travel next to every payload.

pub mod coder;
pub mod config_value;
pub mod value;
pub mod varint;

pub use coder::{CoderSpec, KNOWN_CODERS, MAX_CODER_DEPTH, UNKNOWN_LENGTH};
pub use config_value::{
    decode, decode_payload, encode, encode_bool, encode_int, encode_str, encode_string_list,
    encode_string_map,
};
pub use value::{ConfigParams, Value};
