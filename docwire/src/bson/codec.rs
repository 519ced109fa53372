//! Binary encoding and decoding.
use bytes::{BufMut, Bytes, BytesMut};

use super::{Array, Binary, BinarySubtype, DateTime, DecodeError, Document, ObjectId, Tag, Value};
use crate::ext::{BufMutExt, BytesExt, StrExt, UsizeExt};

/// Maximum nesting of documents and arrays accepted by the decoder.
pub const MAX_DEPTH: usize = 100;

/// Length prefix plus terminator.
const MIN_DOCUMENT_LEN: i32 = 5;

impl Document {
    /// Decode one document from the front of `buf`.
    ///
    /// Only the bytes declared by the document length prefix are consumed.
    pub fn decode(buf: &mut Bytes) -> Result<Document, DecodeError> {
        decode_document(buf, 0)
    }

    /// Decode a document that must span the whole `bytes`.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Document, DecodeError> {
        let mut bytes = bytes.into();
        let doc = decode_document(&mut bytes, 0)?;
        match bytes.is_empty() {
            true => Ok(doc),
            false => Err(DecodeError::InvalidLength(bytes.len().to_i32())),
        }
    }

    /// Append the encoded document to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_entries(self.iter(), buf);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

fn encode_entries<'a>(entries: impl Iterator<Item = (&'a str, &'a Value)>, buf: &mut BytesMut) {
    let offset = buf.len();
    buf.put_i32_le(0);

    for (key, value) in entries {
        buf.put_u8(value.tag() as u8);
        buf.put_nul_string(key);
        encode_value(value, buf);
    }

    buf.put_u8(0);

    let len = (buf.len() - offset).to_i32();
    buf[offset..offset + 4].copy_from_slice(&len.to_le_bytes());
}

fn encode_array(array: &Array, buf: &mut BytesMut) {
    let mut keys = Vec::with_capacity(array.len());
    let mut fmt = itoa::Buffer::new();
    for i in 0..array.len() {
        keys.push(fmt.format(i).to_owned());
    }
    encode_entries(keys.iter().map(String::as_str).zip(array.iter()), buf);
}

/// Encode value layout, without tag and key.
pub(crate) fn encode_value(value: &Value, buf: &mut BytesMut) {
    match value {
        Value::Double(d) => buf.put_f64_le(*d),
        Value::String(s) => {
            buf.put_i32_le(s.nul_string_len().to_i32());
            buf.put_nul_string(s);
        },
        Value::Document(doc) => doc.encode(buf),
        Value::Array(array) => encode_array(array, buf),
        Value::Binary(bin) => {
            buf.put_i32_le(bin.bytes.len().to_i32());
            buf.put_u8(bin.subtype.to_u8());
            buf.put_slice(&bin.bytes);
        },
        Value::ObjectId(id) => buf.put_slice(&id.0),
        Value::Bool(b) => buf.put_u8(*b as u8),
        Value::DateTime(dt) => buf.put_i64_le(dt.0),
        Value::Null => {},
        Value::Int32(i) => buf.put_i32_le(*i),
        Value::Int64(i) => buf.put_i64_le(*i),
    }
}

fn decode_document(buf: &mut Bytes, depth: usize) -> Result<Document, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::TooDeep);
    }

    let len = buf.try_i32_le()?;
    if len < MIN_DOCUMENT_LEN {
        return Err(DecodeError::InvalidLength(len));
    }

    let mut body = buf.try_split(len as usize - 4)?;
    if body.last() != Some(&0) {
        return Err(DecodeError::MissingTerminator);
    }
    body.truncate(body.len() - 1);

    let mut doc = Document::new();
    while !body.is_empty() {
        let tag = Tag::try_from(body.try_u8()?)?;
        let key = body.try_nul_string()?;
        let value = decode_value(tag, &mut body, depth)?;
        doc.insert(key, value);
    }

    Ok(doc)
}

fn decode_array(buf: &mut Bytes, depth: usize) -> Result<Array, DecodeError> {
    let doc = decode_document(buf, depth)?;
    let mut array = Vec::with_capacity(doc.len());
    let mut fmt = itoa::Buffer::new();

    for (i, (key, value)) in doc.into_iter().enumerate() {
        if key != fmt.format(i) {
            return Err(DecodeError::InvalidArrayKey { expected: i, found: key });
        }
        array.push(value);
    }

    Ok(array)
}

fn decode_value(tag: Tag, buf: &mut Bytes, depth: usize) -> Result<Value, DecodeError> {
    let value = match tag {
        Tag::Double => Value::Double(buf.try_f64_le()?),
        Tag::String => {
            let len = buf.try_i32_le()?;
            if len < 1 {
                return Err(DecodeError::InvalidLength(len));
            }
            let mut s = buf.try_split(len as usize)?;
            if s.last() != Some(&0) {
                return Err(DecodeError::MissingNul);
            }
            s.truncate(s.len() - 1);
            let s = String::from_utf8(s.into()).map_err(|e| DecodeError::Utf8(e.utf8_error()))?;
            Value::String(s)
        },
        Tag::Document => Value::Document(decode_document(buf, depth + 1)?),
        Tag::Array => Value::Array(decode_array(buf, depth + 1)?),
        Tag::Binary => {
            let len = buf.try_i32_le()?;
            if len < 0 {
                return Err(DecodeError::InvalidLength(len));
            }
            let subtype = BinarySubtype::try_from(buf.try_u8()?)?;
            let bytes = buf.try_split(len as usize)?;
            Value::Binary(Binary { subtype, bytes: bytes.into() })
        },
        Tag::ObjectId => {
            let bytes = buf.try_split(12)?;
            let mut id = [0u8; 12];
            id.copy_from_slice(&bytes);
            Value::ObjectId(ObjectId(id))
        },
        Tag::Bool => match buf.try_u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            b => return Err(DecodeError::InvalidBool(b)),
        },
        Tag::DateTime => Value::DateTime(DateTime(buf.try_i64_le()?)),
        Tag::Null => Value::Null,
        Tag::Int32 => Value::Int32(buf.try_i32_le()?),
        Tag::Int64 => Value::Int64(buf.try_i64_le()?),
    };
    Ok(value)
}
