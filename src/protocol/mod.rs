//! Reply values and client-side framing.
//!
//! The router produces a [`RespValue`] for every inbound command; the
//! connection server owns turning it into bytes on the wire via
//! [`RespCodec`].

mod codec;

pub use codec::RespCodec;

use bytes::Bytes;

/// A reply destined for a client connection.
///
/// This is a closed set: every producer in the proxy maps its result into one
/// of these variants and the codec matches on them exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    Null,
    SimpleString(String),
    BulkString(Bytes),
    Integer(i64),
    Boolean(bool),
    Array(Vec<RespValue>),
    Error(String),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn error(msg: impl Into<String>) -> Self {
        RespValue::Error(msg.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }
}

impl From<redis::Value> for RespValue {
    fn from(value: redis::Value) -> Self {
        match value {
            redis::Value::Nil => RespValue::Null,
            redis::Value::Int(n) => RespValue::Integer(n),
            redis::Value::Data(data) => RespValue::BulkString(Bytes::from(data)),
            redis::Value::Bulk(items) => {
                RespValue::Array(items.into_iter().map(RespValue::from).collect())
            }
            redis::Value::Status(status) => RespValue::SimpleString(status),
            redis::Value::Okay => RespValue::ok(),
        }
    }
}
