//! Protocol error
use std::fmt;

use super::OpCode;
use crate::bson::DecodeError;

/// An error when translating bytes from the wire.
pub enum ProtocolError {
    /// Header length is out of range.
    InvalidLength(i32),
    /// Header length does not match the received frame.
    LengthMismatch {
        declared: i32,
        actual: i32,
    },
    UnknownOpCode(i32),
    /// Known operation code which body is not supported.
    UnsupportedOpCode(OpCode),
    InvalidSectionKind(u8),
    InvalidSectionLength(i32),
    /// `OP_MSG` must contain exactly one body section.
    BodySectionCount(usize),
    /// Document sequence identifier collide with a body field.
    DuplicateField(String),
    /// Bytes left after the last expected field.
    TrailingBytes(usize),
    /// `OP_REPLY` document count does not match the documents received.
    DocumentCount {
        declared: i32,
        found: usize,
    },
    /// Embedded document is malformed.
    Document(DecodeError),
}

impl From<DecodeError> for ProtocolError {
    fn from(value: DecodeError) -> Self {
        Self::Document(value)
    }
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength(len) => write!(f, "invalid message length {len}"),
            Self::LengthMismatch { declared, actual } => {
                write!(f, "message length declared {declared} but {actual} bytes received")
            },
            Self::UnknownOpCode(code) => write!(f, "unknown operation code {code}"),
            Self::UnsupportedOpCode(code) => write!(f, "operation `{}` is not supported", code.name()),
            Self::InvalidSectionKind(kind) => write!(f, "invalid section kind {kind}"),
            Self::InvalidSectionLength(len) => write!(f, "invalid section length {len}"),
            Self::BodySectionCount(n) => write!(f, "expected exactly one body section, found {n}"),
            Self::DuplicateField(field) => write!(f, "duplicate field `{field}` in document sequence"),
            Self::TrailingBytes(n) => write!(f, "{n} unexpected trailing bytes"),
            Self::DocumentCount { declared, found } => {
                write!(f, "reply declared {declared} documents but {found} received")
            },
            Self::Document(e) => write!(f, "malformed document: {e}"),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
