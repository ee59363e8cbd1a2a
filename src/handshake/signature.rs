//! Method signatures as announced to the peer.
//!
//! On the wire a signature is an Array of empty values: the first element's
//! tag is the return type, the remaining tags are the parameter types. An
//! empty Array means "no parameters, Void return".

use crate::value::{Value, ValueError, ValueType};

/// Return type plus ordered parameter types of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    return_type: ValueType,
    params: Vec<ValueType>,
}

impl MethodSignature {
    /// # Panics
    ///
    /// If any tag is [`ValueType::Error`]; see [`try_new`](Self::try_new).
    pub fn new(return_type: ValueType, params: Vec<ValueType>) -> Self {
        match Self::try_new(return_type, params) {
            Ok(signature) => signature,
            Err(e) => panic!("invalid method signature: {e}"),
        }
    }

    /// Build a signature, rejecting [`ValueType::Error`] in any position.
    pub fn try_new(return_type: ValueType, params: Vec<ValueType>) -> Result<Self, ValueError> {
        if let Some(&bad) = std::iter::once(&return_type)
            .chain(&params)
            .find(|&&t| t == ValueType::Error)
        {
            return Err(ValueError::NotASignatureType(bad));
        }
        Ok(Self {
            return_type,
            params,
        })
    }

    /// No parameters, Void return.
    pub fn void() -> Self {
        Self::new(ValueType::Void, Vec::new())
    }

    #[inline]
    pub fn return_type(&self) -> ValueType {
        self.return_type
    }

    #[inline]
    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    /// Encode as the Array sent with `registerRpcMethod`.
    pub fn to_value(&self) -> Value {
        if self.return_type == ValueType::Void && self.params.is_empty() {
            return Value::Array(Vec::new());
        }

        let mut encoded = Vec::with_capacity(self.params.len() + 1);
        encoded.push(Value::empty(self.return_type));
        encoded.extend(self.params.iter().copied().map(Value::empty));
        Value::Array(encoded)
    }

    /// Decode from the Array form.
    pub fn from_value(value: &Value) -> Result<Self, ValueError> {
        let items = value.as_array()?;
        let Some((ret, params)) = items.split_first() else {
            return Ok(Self::void());
        };

        Self::try_new(
            ret.value_type(),
            params.iter().map(Value::value_type).collect(),
        )
    }
}

impl Default for MethodSignature {
    fn default() -> Self {
        Self::void()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_signature_is_empty_array() {
        let value = MethodSignature::void().to_value();
        assert_eq!(value, Value::Array(Vec::new()));

        let decoded = MethodSignature::from_value(&value).unwrap();
        assert_eq!(decoded.return_type(), ValueType::Void);
        assert!(decoded.params().is_empty());
    }

    #[test]
    fn test_integer_from_string_signature() {
        let signature = MethodSignature::new(ValueType::Integer, vec![ValueType::String]);
        let value = signature.to_value();

        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value_type(), ValueType::Integer);
        assert_eq!(items[1].value_type(), ValueType::String);

        assert_eq!(MethodSignature::from_value(&value).unwrap(), signature);
    }

    #[test]
    fn test_void_return_with_params_keeps_return_slot() {
        let signature = MethodSignature::new(ValueType::Void, vec![ValueType::Boolean]);
        let value = signature.to_value();

        assert_eq!(value.len().unwrap(), 2);
        assert_eq!(MethodSignature::from_value(&value).unwrap(), signature);
    }

    #[test]
    fn test_from_non_array_fails() {
        let result = MethodSignature::from_value(&Value::from("nope"));
        assert!(matches!(result, Err(ValueError::TypeMismatch { .. })));
    }

    #[test]
    fn test_error_tag_rejected() {
        let result = MethodSignature::try_new(ValueType::Integer, vec![ValueType::Error]);
        assert_eq!(result, Err(ValueError::NotASignatureType(ValueType::Error)));

        let announced = Value::Array(vec![Value::error(0, ""), Value::Integer(0)]);
        assert!(matches!(
            MethodSignature::from_value(&announced),
            Err(ValueError::NotASignatureType(_))
        ));
    }

    #[test]
    #[should_panic(expected = "cannot appear in a method signature")]
    fn test_new_panics_on_error_return() {
        MethodSignature::new(ValueType::Error, vec![]);
    }
}
