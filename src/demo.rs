//! Example methods served by the `sockrpc-example` binary.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::client::ClientBuilder;
use crate::handshake::MethodSignature;
use crate::value::{fault, Value, ValueType};

/// `exampleTest1() -> String`: "Test1 " followed by the current Unix time in
/// seconds. Parameters are ignored.
pub fn example_test1(_params: &[Value]) -> Value {
    tracing::info!("Test1 called");

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Value::from(format!("Test1 {secs}"))
}

/// `exampleTest2(String) -> Integer`: byte length of the string.
pub fn example_test2(params: &[Value]) -> Value {
    if params.len() != 1 {
        return fault::invalid_parameters(format!(
            "Method expects exactly one parameter. {} given.",
            params.len()
        ));
    }
    let Ok(text) = params[0].as_str() else {
        return fault::invalid_parameters("Parameter is not of type string.");
    };

    tracing::info!("Test2 called");
    Value::from(text.len() as i64)
}

/// Register both example methods with their signatures.
pub fn register_examples(builder: ClientBuilder) -> ClientBuilder {
    builder
        .method_with_signature("exampleTest1", MethodSignature::void(), example_test1)
        .method_with_signature(
            "exampleTest2",
            MethodSignature::new(ValueType::Integer, vec![ValueType::String]),
            example_test2,
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test1_returns_timestamp_string() {
        let result = example_test1(&[Value::Integer(99)]);
        let text = result.as_str().unwrap();

        let secs = text.strip_prefix("Test1 ").unwrap();
        assert!(secs.parse::<u64>().unwrap() > 0);
    }

    #[test]
    fn test2_returns_length() {
        assert_eq!(example_test2(&[Value::from("hello")]), Value::Integer(5));
        assert_eq!(example_test2(&[Value::from("")]), Value::Integer(0));
    }

    #[test]
    fn test2_rejects_wrong_arity() {
        let result = example_test2(&[]);
        assert_eq!(result.fault_code().unwrap(), fault::INVALID_PARAMETERS);
        assert_eq!(
            result.fault_string().unwrap(),
            "Method expects exactly one parameter. 0 given."
        );

        let result = example_test2(&[Value::from("a"), Value::from("b")]);
        assert!(result.fault_string().unwrap().contains("2 given"));
    }

    #[test]
    fn test2_rejects_non_string() {
        let result = example_test2(&[Value::Integer(3)]);
        assert_eq!(result.fault_code().unwrap(), fault::INVALID_PARAMETERS);
        assert_eq!(result.fault_string().unwrap(), "Parameter is not of type string.");
    }
}
