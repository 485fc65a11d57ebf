//! Reply Types
//!
//! Every reply is one or more newline-terminated text lines:
//!
//! ```text
//! OK\n                      Ok
//! QUEUED\n                  Queued
//! PONG\n                    Pong
//! 42\n  1.5\n  hello\n      Value
//! nil\n                     Nil
//! 1\n  0\n                  Flag
//! -2\n                      Integer
//! Error: MULTI not set\n    Error
//! Invalid command\n         Invalid
//! OK\n6\n                   Batch (one line per element)
//! ```

use crate::storage::Value;
use std::fmt;

/// Line terminator for every reply
pub const NEWLINE: u8 = b'\n';

/// Marker written for an absent value
pub const NIL: &str = "nil";

/// A reply produced by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok,
    Queued,
    Pong,
    /// A stored value, formatted per [`Value`]'s `Display`
    Value(Value),
    /// Absent value
    Nil,
    /// Boolean outcome written as `1` / `0`
    Flag(bool),
    Integer(i64),
    /// Written as `Error: <message>`
    Error(String),
    /// Malformed or unknown command
    Invalid,
    /// Several replies written back to back, used by EXEC
    Batch(Vec<Reply>),
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    /// Maps an optional value onto `Value` / `Nil`.
    pub fn from_option(value: Option<Value>) -> Self {
        match value {
            Some(v) => Reply::Value(v),
            None => Reply::Nil,
        }
    }

    /// Serializes the reply to its wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Batch(replies) => {
                for reply in replies {
                    reply.serialize_into(buf);
                }
            }
            single => {
                buf.extend_from_slice(single.to_string().as_bytes());
                buf.push(NEWLINE);
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => f.write_str("OK"),
            Reply::Queued => f.write_str("QUEUED"),
            Reply::Pong => f.write_str("PONG"),
            Reply::Value(v) => write!(f, "{}", v),
            Reply::Nil => f.write_str(NIL),
            Reply::Flag(true) => f.write_str("1"),
            Reply::Flag(false) => f.write_str("0"),
            Reply::Integer(n) => write!(f, "{}", n),
            Reply::Error(msg) => write!(f, "Error: {}", msg),
            Reply::Invalid => f.write_str("Invalid command"),
            Reply::Batch(replies) => {
                for (i, reply) in replies.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{}", reply)?;
                }
                Ok(())
            }
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}
