//! Binary document model.
//!
//! Every value carries a one byte type tag followed by its fixed layout.
//! Numerics are little endian, strings and binaries are length prefixed,
//! documents and arrays are recursively encoded with their own length prefix.
//!
//! ```text
//! ┏━━━━━━━━━━━━━━━━━━━┳━━━━━┳━━━━━━━━━━━━━┳━━━━━━━┳━━━━━┳━━━━┓
//! ┃       Length      ┃ Tag ┃  Key + nul  ┃ Value ┃ ... ┃ 00 ┃
//! ┣━━━━━━━━━━━━━━━━━━━╋━━━━━╋━━━━━━━━━━━━━╋━━━━━━━╋━━━━━╋━━━━┫
//! ┃     i32 (le)      ┃ u8  ┃    cstring  ┃  ..   ┃     ┃ u8 ┃
//! ┗━━━━━━━━━━━━━━━━━━━┻━━━━━┻━━━━━━━━━━━━━┻━━━━━━━┻━━━━━┻━━━━┛
//! ```
//!
//! The tag set is closed, decoding an unknown tag is an error.
mod value;
mod document;
mod codec;
mod display;
mod json;

pub use value::{Binary, BinarySubtype, DateTime, ObjectId, Value};
pub use document::{Array, Document};
pub use codec::MAX_DEPTH;

use std::fmt;

/// Document value type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    ObjectId = 0x07,
    Bool = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Int32 = 0x10,
    Int64 = 0x12,
}

impl Tag {
    /// Returns the tag name as it appear in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Tag::Double => "double",
            Tag::String => "string",
            Tag::Document => "object",
            Tag::Array => "array",
            Tag::Binary => "binData",
            Tag::ObjectId => "objectId",
            Tag::Bool => "bool",
            Tag::DateTime => "date",
            Tag::Null => "null",
            Tag::Int32 => "int",
            Tag::Int64 => "long",
        }
    }
}

impl TryFrom<u8> for Tag {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let tag = match value {
            0x01 => Tag::Double,
            0x02 => Tag::String,
            0x03 => Tag::Document,
            0x04 => Tag::Array,
            0x05 => Tag::Binary,
            0x07 => Tag::ObjectId,
            0x08 => Tag::Bool,
            0x09 => Tag::DateTime,
            0x0A => Tag::Null,
            0x10 => Tag::Int32,
            0x12 => Tag::Int64,
            tag => return Err(DecodeError::UnknownTag(tag)),
        };
        Ok(tag)
    }
}

/// An error when decoding document bytes.
#[derive(Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnexpectedEof {
        needed: usize,
        available: usize,
    },
    UnknownTag(u8),
    InvalidBool(u8),
    InvalidBinarySubtype(u8),
    InvalidLength(i32),
    MissingNul,
    MissingTerminator,
    InvalidArrayKey {
        expected: usize,
        found: String,
    },
    TooDeep,
    Utf8(std::str::Utf8Error),
}

impl std::error::Error for DecodeError { }

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof { needed, available } => {
                write!(f, "unexpected EOF, needed {needed} bytes, {available} available")
            },
            Self::UnknownTag(tag) => write!(f, "unknown document type tag 0x{tag:02x}"),
            Self::InvalidBool(b) => write!(f, "invalid bool byte 0x{b:02x}"),
            Self::InvalidBinarySubtype(b) => write!(f, "invalid binary subtype 0x{b:02x}"),
            Self::InvalidLength(len) => write!(f, "invalid length {len}"),
            Self::MissingNul => f.write_str("string is not nul terminated"),
            Self::MissingTerminator => f.write_str("document is not terminated"),
            Self::InvalidArrayKey { expected, found } => {
                write!(f, "invalid array key, expected `{expected}` found `{found}`")
            },
            Self::TooDeep => write!(f, "document nesting exceeds {MAX_DEPTH} levels"),
            Self::Utf8(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
