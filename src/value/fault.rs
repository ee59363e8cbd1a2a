//! Fault codes and constructors for the error values the client produces.

use super::Value;

/// Method name not present in the registry.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// Unclassified failure inside a handler or while resolving a response.
pub const UNKNOWN_APPLICATION_ERROR: i32 = -32500;

/// Not connected, connection lost, write failure or timeout.
pub const TRANSPORT_ERROR: i32 = -32300;

/// Inbound request payload could not be decoded.
pub const PARSE_ERROR: i32 = -32700;

/// Parameter arity/type validation failed inside a handler.
///
/// Handlers return this themselves; the registry never checks parameters.
pub const INVALID_PARAMETERS: i32 = -1;

pub fn method_not_found(method: &str) -> Value {
    Value::error(METHOD_NOT_FOUND, format!("Requested method not found: {method}"))
}

pub fn unknown_application_error() -> Value {
    Value::error(UNKNOWN_APPLICATION_ERROR, "Unknown application error.")
}

pub fn transport(message: impl Into<String>) -> Value {
    Value::error(TRANSPORT_ERROR, message)
}

pub fn not_connected() -> Value {
    transport("Not connected.")
}

pub fn parse_error(message: impl Into<String>) -> Value {
    Value::error(PARSE_ERROR, message)
}

pub fn invalid_parameters(message: impl Into<String>) -> Value {
    Value::error(INVALID_PARAMETERS, message)
}
