//! Request envelope carried in request frame payloads.
//!
//! Responses need no envelope: their payload is the bare result
//! [`Value`], matched to the request by the header's request ID.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A remote procedure call: method name plus positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}
