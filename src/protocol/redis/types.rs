use std::fmt;

use bytes::Bytes;

/// Parsed RESP frame. The byte-level codec that produces and consumes these
/// trees lives with the listener; the splitter only rewrites them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(Bytes),
    Error(Bytes),
    Integer(i64),
    BulkString(Bytes),
    NullBulk,
    NullArray,
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple<T: AsRef<[u8]>>(value: T) -> Self {
        RespValue::SimpleString(Bytes::copy_from_slice(value.as_ref()))
    }

    pub fn error<T: AsRef<[u8]>>(value: T) -> Self {
        RespValue::Error(Bytes::copy_from_slice(value.as_ref()))
    }

    pub fn bulk<T: AsRef<[u8]>>(value: T) -> Self {
        RespValue::BulkString(Bytes::copy_from_slice(value.as_ref()))
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(values) => Some(values.as_slice()),
            _ => None,
        }
    }
}

/// Lossy UTF-8 rendering for debug logs: array elements are space-joined,
/// nested arrays are bracketed.
impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(data)
            | RespValue::Error(data)
            | RespValue::BulkString(data) => {
                write!(f, "{}", String::from_utf8_lossy(data))
            }
            RespValue::Integer(value) => write!(f, "{}", value),
            RespValue::NullBulk | RespValue::NullArray => f.write_str("null"),
            RespValue::Array(values) => {
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    match value {
                        RespValue::Array(_) => write!(f, "[{}]", value)?,
                        _ => write!(f, "{}", value)?,
                    }
                }
                Ok(())
            }
        }
    }
}
