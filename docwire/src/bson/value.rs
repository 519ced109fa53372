use std::fmt;

use super::{Array, DecodeError, Document, Tag};

/// A document value.
#[derive(Debug, Clone)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    Array(Array),
    Binary(Binary),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
    Null,
    Int32(i32),
    Int64(i64),
}

impl Value {
    /// Returns the value type tag.
    pub const fn tag(&self) -> Tag {
        match self {
            Value::Double(_) => Tag::Double,
            Value::String(_) => Tag::String,
            Value::Document(_) => Tag::Document,
            Value::Array(_) => Tag::Array,
            Value::Binary(_) => Tag::Binary,
            Value::ObjectId(_) => Tag::ObjectId,
            Value::Bool(_) => Tag::Bool,
            Value::DateTime(_) => Tag::DateTime,
            Value::Null => Tag::Null,
            Value::Int32(_) => Tag::Int32,
            Value::Int64(_) => Tag::Int64,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integer, or a double without fractional part.
    pub fn as_whole_number(&self) -> Option<i64> {
        match *self {
            Value::Int32(i) => Some(i.into()),
            Value::Int64(i) => Some(i),
            Value::Double(d) if d.fract() == 0.0 && d.is_finite() => {
                // truncation is exact after the fract check, out of range is saturated
                Some(d as i64)
            },
            _ => None,
        }
    }

    /// Returns `true` for numbers and bools.
    pub const fn is_numeric_like(&self) -> bool {
        matches!(self, Value::Double(_) | Value::Int32(_) | Value::Int64(_) | Value::Bool(_))
    }
}

/// Bit exact equality, `NaN` is equal to itself and `0.0` is not equal to `-0.0`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Document(a), Document(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Binary(a), Binary(b)) => a == b,
            (ObjectId(a), ObjectId(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Null, Null) => true,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value.into())
            }
        }
    )*};
}

from! {
    f64 => Double,
    String => String,
    &str => String,
    Document => Document,
    Array => Array,
    Binary => Binary,
    ObjectId => ObjectId,
    bool => Bool,
    DateTime => DateTime,
    i32 => Int32,
    i64 => Int64,
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// 12 bytes object identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectId(pub [u8; 12]);

impl ObjectId {
    /// Parse 24 hex digits.
    pub fn parse_hex(hex: &str) -> Option<ObjectId> {
        let hex = hex.as_bytes();
        if hex.len() != 24 {
            return None;
        }
        let mut id = [0u8; 12];
        for (i, pair) in hex.chunks_exact(2).enumerate() {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            id[i] = (hi << 4 | lo) as u8;
        }
        Some(ObjectId(id))
    }

    /// Returns lowercase hex representation.
    pub fn to_hex(&self) -> String {
        const DIGITS: &[u8; 16] = b"0123456789abcdef";
        let mut s = String::with_capacity(24);
        for b in self.0 {
            s.push(DIGITS[(b >> 4) as usize] as char);
            s.push(DIGITS[(b & 0xf) as usize] as char);
        }
        s
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId(\"{self}\")")
    }
}

/// Milliseconds since unix epoch, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(pub i64);

impl DateTime {
    pub fn now() -> DateTime {
        let now = time::OffsetDateTime::now_utc();
        DateTime((now.unix_timestamp_nanos() / 1_000_000) as i64)
    }

    pub const fn millis(&self) -> i64 {
        self.0
    }

    /// Convert to [`time::OffsetDateTime`], `None` when out of the representable range.
    pub fn to_offset(&self) -> Option<time::OffsetDateTime> {
        time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000_000).ok()
    }
}

/// Binary data with its subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

/// Binary subtype byte.
///
/// `0x00..=0x08` are predefined, `0x80..=0xFF` are user defined,
/// everything in between is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarySubtype {
    Generic,
    Function,
    BinaryOld,
    UuidOld,
    Uuid,
    Md5,
    Encrypted,
    Column,
    Sensitive,
    User(u8),
}

impl BinarySubtype {
    pub const fn to_u8(self) -> u8 {
        match self {
            BinarySubtype::Generic => 0x00,
            BinarySubtype::Function => 0x01,
            BinarySubtype::BinaryOld => 0x02,
            BinarySubtype::UuidOld => 0x03,
            BinarySubtype::Uuid => 0x04,
            BinarySubtype::Md5 => 0x05,
            BinarySubtype::Encrypted => 0x06,
            BinarySubtype::Column => 0x07,
            BinarySubtype::Sensitive => 0x08,
            BinarySubtype::User(b) => b,
        }
    }
}

impl TryFrom<u8> for BinarySubtype {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let subtype = match value {
            0x00 => BinarySubtype::Generic,
            0x01 => BinarySubtype::Function,
            0x02 => BinarySubtype::BinaryOld,
            0x03 => BinarySubtype::UuidOld,
            0x04 => BinarySubtype::Uuid,
            0x05 => BinarySubtype::Md5,
            0x06 => BinarySubtype::Encrypted,
            0x07 => BinarySubtype::Column,
            0x08 => BinarySubtype::Sensitive,
            0x80..=0xFF => BinarySubtype::User(value),
            _ => return Err(DecodeError::InvalidBinarySubtype(value)),
        };
        Ok(subtype)
    }
}
