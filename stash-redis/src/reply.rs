//! Replies decoded from the Redis wire protocol.

use crate::error::{RedisError, RedisResult};

/// One server reply. Covers the RESP2 types plus the RESP3 additions a
/// server may send without negotiation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Missing key or explicit null.
    Null,
    /// Status line, e.g. `OK` or `PONG`.
    Simple(String),
    /// Binary-safe payload.
    Bulk(Vec<u8>),
    Int(i64),
    Bool(bool),
    Double(f64),
    Array(Vec<Reply>),
    Map(Vec<(Reply, Reply)>),
    /// Error line from the server.
    Error(String),
}

impl Reply {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The payload of a bulk or status reply.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bulk(b) => Some(b),
            Self::Simple(s) => Some(s.into_bytes()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Treat the reply as a plain acknowledgement, surfacing server errors.
    pub fn ack(self) -> RedisResult<()> {
        match self {
            Self::Error(msg) => Err(RedisError::Server(msg)),
            _ => Ok(()),
        }
    }

    /// Expect an array reply, e.g. from SMEMBERS.
    pub fn into_array(self) -> RedisResult<Vec<Reply>> {
        match self {
            Self::Array(items) => Ok(items),
            Self::Null => Ok(Vec::new()),
            Self::Error(msg) => Err(RedisError::Server(msg)),
            other => Err(RedisError::UnexpectedReply(format!("{other:?}"))),
        }
    }
}
