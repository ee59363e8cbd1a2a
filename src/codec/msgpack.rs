//! MsgPack codec using `rmp-serde`.
//!
//! **Always use `to_vec_named`, never `to_vec`.** The request envelope and
//! the `Error` variant's `faultCode`/`faultString` fields must go over the
//! wire as maps with field names; `to_vec` would emit positional arrays.
//!
//! # Example
//!
//! ```
//! use sockrpc_client::codec::MsgPackCodec;
//! use sockrpc_client::value::Value;
//!
//! let value = Value::error(-32601, "Requested method not found: x");
//! let encoded = MsgPackCodec::encode(&value).unwrap();
//! let decoded: Value = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, value);
//! ```

use crate::error::Result;

pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Structs and enum variants with fields are written as maps.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
