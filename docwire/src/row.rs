//! Backend row operation.
//!
//! - [`Rows`]
//! - [`Row`]
//! - [`Column`]
//! - [`FromColumn`]
//! - [`ColumnError`]
//!
//! Values are always in text format.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{borrow::Cow, collections::VecDeque, fmt, str::Utf8Error, string::FromUtf8Error};

use crate::{
    bson::{DecodeError, Document, Value},
    ext::{BufMutExt, BytesExt, FmtExt},
    postgres,
};

// <https://www.postgresql.org/docs/current/protocol-message-formats.html#PROTOCOL-MESSAGE-FORMATS-ROWDESCRIPTION>
// table_oid
// attribute_len
// oid
// data_type_size
// type_modifier
// format_code
const SUFFIX: usize = size_of::<u32>()
    + size_of::<u16>()
    + size_of::<u32>()
    + size_of::<i16>()
    + size_of::<i32>()
    + size_of::<u16>();

/// Result rows of one query, consumed sequentially.
#[derive(Debug, Default)]
pub struct Rows {
    field_len: u16,
    desc: Bytes,
    rows: VecDeque<Row>,
    rows_affected: u64,
    closed: bool,
}

impl Rows {
    /// `RowDescription` fields, shared by the following data rows.
    pub(crate) fn describe(&mut self, fields: u16, body: Bytes) {
        self.field_len = fields;
        self.desc = body;
    }

    /// A `DataRow` with its column count and values.
    pub(crate) fn push(&mut self, columns: u16, values: Bytes) -> Result<(), ColumnError> {
        if columns != self.field_len {
            return Err(ColumnError::LenMismatch {
                description: self.field_len,
                row: columns,
            });
        }
        self.rows.push_back(Row {
            field_len: self.field_len,
            body: self.desc.clone(),
            values,
        });
        Ok(())
    }

    pub(crate) fn complete(&mut self, tag: &str) {
        self.rows_affected += postgres::rows_affected(tag);
    }

    /// In memory rows with text values, `None` is `NULL`.
    pub fn from_text<'a>(
        columns: &[&str],
        rows: impl IntoIterator<Item = Vec<Option<&'a str>>>,
    ) -> Rows {
        let mut desc = BytesMut::new();
        for name in columns {
            desc.put_nul_string(name);
            desc.put_bytes(0, SUFFIX);
        }

        let mut me = Rows {
            field_len: columns.len() as u16,
            desc: desc.freeze(),
            ..Default::default()
        };

        for row in rows {
            let mut values = BytesMut::new();
            for value in row {
                match value {
                    Some(value) => {
                        values.put_i32(value.len() as i32);
                        values.put_slice(value.as_bytes());
                    },
                    None => values.put_i32(-1),
                }
            }
            me.rows.push_back(Row {
                field_len: me.field_len,
                body: me.desc.clone(),
                values: values.freeze(),
            });
            me.rows_affected += 1;
        }

        me
    }

    /// Advance to the next row, `None` when exhausted or closed.
    pub fn next_row(&mut self) -> Option<Row> {
        match self.closed {
            true => None,
            false => self.rows.pop_front(),
        }
    }

    /// Release remaining rows.
    pub fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
    }

    /// Number of rows reported by the command tag.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Number of remaining rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

/// Backend row.
pub struct Row {
    field_len: u16,
    body: Bytes,
    values: Bytes,
}

impl Row {
    /// Returns `true` if row contains no columns.
    pub const fn is_empty(&self) -> bool {
        self.field_len == 0
    }

    /// Returns the number of fields/column.
    pub const fn len(&self) -> u16 {
        self.field_len
    }

    /// Try get and decode column.
    pub fn try_get<I: Index, R: FromColumn>(&self, idx: I) -> Result<R, ColumnError> {
        let nth = idx.position(&self.body, self.field_len)?;
        let column = self.clone_iter().nth(nth as usize);
        match column {
            Some(column) => R::from_column(column?),
            None => Err(ColumnError::IndexOutOfBounds(nth as usize)),
        }
    }

    fn clone_iter(&self) -> IntoIter {
        IntoIter {
            field_len: self.field_len,
            body: self.body.clone(),
            values: self.values.clone(),
            iter_n: 0,
        }
    }
}

impl IntoIterator for Row {
    type Item = Result<Column, ColumnError>;

    type IntoIter = IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            field_len: self.field_len,
            body: self.body,
            values: self.values,
            iter_n: 0,
        }
    }
}

/// [`IntoIterator`] implementation from [`Row`].
#[derive(Debug)]
pub struct IntoIter {
    field_len: u16,
    body: Bytes,
    values: Bytes,

    iter_n: u16,
}

impl IntoIter {
    fn try_next(&mut self) -> Result<Column, ColumnError> {
        let name = self.body.try_nul_string()?;
        self.body.try_split(SUFFIX)?;
        let len = self.values.try_i32()?;
        let value = match len {
            -1 => None,
            len if len < 0 => return Err(DecodeError::InvalidLength(len).into()),
            len => Some(self.values.try_split(len as usize)?),
        };
        Ok(Column { name, value })
    }
}

impl Iterator for IntoIter {
    type Item = Result<Column, ColumnError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter_n == self.field_len {
            return None
        }

        self.iter_n += 1;
        let column = self.try_next();
        if column.is_err() {
            self.iter_n = self.field_len;
        }
        Some(column)
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_map();
        for column in self.clone_iter() {
            let Ok(column) = column else { break };
            dbg.key(&column.name);
            match &column.value {
                None => dbg.value(&format_args!("NULL")),
                Some(v) => dbg.value(&v.lossy()),
            };
        }
        dbg.finish()
    }
}

/// Backend column in text format.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    value: Option<Bytes>,
}

impl Column {
    /// Returns column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return `true` if value is NULL.
    pub const fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Extract the inner bytes as slice.
    ///
    /// Returns [`None`] if value is `NULL`.
    pub fn as_slice(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Try consume self into the inner [`Bytes`].
    ///
    /// Return [`ColumnError::Null`] if value is `NULL`.
    pub fn try_into_value(self) -> Result<Bytes, ColumnError> {
        self.value.ok_or(ColumnError::Null)
    }

    /// Try decode type using [`FromColumn`] implementation.
    pub fn decode<D: FromColumn>(self) -> Result<D, ColumnError> {
        D::from_column(self)
    }

    fn into_text(self) -> Result<String, ColumnError> {
        Ok(String::from_utf8(self.try_into_value()?.into())?)
    }
}

// ===== Traits =====

/// A type that can be constructed from [`Column`].
pub trait FromColumn: Sized {
    /// Try decode self from column.
    fn from_column(column: Column) -> Result<Self, ColumnError>;
}

impl FromColumn for Column {
    fn from_column(column: Column) -> Result<Self, ColumnError> {
        Ok(column)
    }
}

impl<T: FromColumn> FromColumn for Option<T> {
    fn from_column(column: Column) -> Result<Self, ColumnError> {
        match column.is_null() {
            true => Ok(None),
            false => column.decode().map(Some),
        }
    }
}

impl FromColumn for String {
    fn from_column(col: Column) -> Result<Self, ColumnError> {
        col.into_text()
    }
}

macro_rules! from_column_parse {
    ($($ty:ty),*) => {$(
        impl FromColumn for $ty {
            fn from_column(col: Column) -> Result<Self, ColumnError> {
                let text = col.into_text()?;
                text.parse().map_err(|_|ColumnError::Parse {
                    text,
                    target: stringify!($ty),
                })
            }
        }
    )*};
}

from_column_parse!(i32, i64, f64);

impl FromColumn for bool {
    fn from_column(col: Column) -> Result<Self, ColumnError> {
        match col.try_into_value()?.as_ref() {
            b"t" | b"true" => Ok(true),
            b"f" | b"false" => Ok(false),
            other => Err(ColumnError::Parse {
                text: String::from_utf8_lossy(other).into_owned(),
                target: "bool",
            }),
        }
    }
}

/// Document store rows and nested values are json text.
impl FromColumn for Document {
    fn from_column(col: Column) -> Result<Self, ColumnError> {
        Ok(Document::from_json(&col.into_text()?)?)
    }
}

impl FromColumn for Value {
    fn from_column(col: Column) -> Result<Self, ColumnError> {
        match col.is_null() {
            true => Ok(Value::Null),
            false => Ok(Value::from_json(&col.into_text()?)?),
        }
    }
}

/// Type that can be used for indexing column.
pub trait Index: Sized + sealed::Sealed {
    /// Returns the nth column.
    fn position(self, body: &[u8], len: u16) -> Result<u16, ColumnError>;
}

impl Index for usize {
    fn position(self, _: &[u8], len: u16) -> Result<u16, ColumnError> {
        match self < len as usize {
            true => Ok(self as u16),
            false => Err(ColumnError::IndexOutOfBounds(self)),
        }
    }
}

impl Index for &str {
    fn position(self, mut body: &[u8], len: u16) -> Result<u16, ColumnError> {
        for nth in 0..len {
            let Some(nul) = body.iter().position(|e| matches!(e, b'\0')) else {
                break;
            };
            if self.as_bytes() == &body[..nul] {
                return Ok(nth);
            }
            if body.len() < nul + 1 + SUFFIX {
                break;
            }
            body.advance(nul + 1 + SUFFIX);
        }

        Err(ColumnError::ColumnNotFound(String::from(self).into()))
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for usize { }
    impl Sealed for &str { }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for ColumnError {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

/// An error when decoding row value.
pub enum ColumnError {
    /// Backend return non utf8 string.
    Utf8(Utf8Error),
    /// Column requested not found.
    ColumnNotFound(Cow<'static,str>),
    /// Index requested is out of bounds.
    IndexOutOfBounds(usize),
    /// Row is null.
    Null,
    /// Text value cannot be parsed as the target type.
    Parse {
        text: String,
        target: &'static str,
    },
    /// `DataRow` column count differ from `RowDescription`.
    LenMismatch {
        description: u16,
        row: u16,
    },
    /// Row message is shorter than its columns.
    Malformed(DecodeError),
    /// Failed to deserialize using `serde_json`.
    Json(serde_json::Error),
}

impl fmt::Display for ColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::Utf8(e) => write!(f, "{e}"),
            Self::ColumnNotFound(name) => write!(f, "column not found: {name:?}"),
            Self::IndexOutOfBounds(u) => write!(f, "index out of bounds: {u:?}"),
            Self::Null => write!(f, "unexpected NULL value"),
            Self::Parse { text, target } => write!(f, "cannot parse {text:?} as {target}"),
            Self::LenMismatch { description, row } => {
                write!(f, "row has {row} columns, description has {description}")
            },
            Self::Malformed(e) => write!(f, "{e}"),
            Self::Json(e) => write!(f, "{e}"),
        }
    }
}

from!(<Utf8Error>e => Self::Utf8(e));
from!(<FromUtf8Error>e => Self::Utf8(e.utf8_error()));
from!(<DecodeError>e => Self::Malformed(e));
from!(<serde_json::Error>e => Self::Json(e));

impl std::error::Error for ColumnError { }

impl fmt::Debug for ColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::doc;

    #[test]
    fn text_rows() {
        let mut rows = Rows::from_text(
            &["n", "name", "flag", "doc"],
            [
                vec![Some("14"), Some("alice"), Some("t"), Some(r#"{"b": 1, "a": {"oid": "64b7f0c2a1d3e4f5a6b7c8d9"}}"#)],
                vec![Some("-1"), None, Some("f"), None],
            ],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows_affected(), 2);

        let row = rows.next_row().unwrap();
        assert_eq!(row.try_get::<_, i64>(0).unwrap(), 14);
        assert_eq!(row.try_get::<_, String>("name").unwrap(), "alice");
        assert!(row.try_get::<_, bool>("flag").unwrap());
        let doc = row.try_get::<_, Document>("doc").unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["b", "a"]);
        assert!(matches!(doc.get("a"), Some(Value::ObjectId(_))));

        let row = rows.next_row().unwrap();
        assert_eq!(row.try_get::<_, i32>("n").unwrap(), -1);
        assert_eq!(row.try_get::<_, Option<String>>(1).unwrap(), None);
        assert!(matches!(row.try_get::<_, String>(1), Err(ColumnError::Null)));
        assert_eq!(row.try_get::<_, Value>(3).unwrap(), Value::Null);

        assert!(rows.next_row().is_none());
    }

    #[test]
    fn column_errors() {
        let mut rows = Rows::from_text(&["n"], [vec![Some("x")]]);
        let row = rows.next_row().unwrap();
        assert!(matches!(row.try_get::<_, i32>(0), Err(ColumnError::Parse { target: "i32", .. })));
        assert!(matches!(row.try_get::<_, i32>(1), Err(ColumnError::IndexOutOfBounds(1))));
        assert!(matches!(row.try_get::<_, i32>("m"), Err(ColumnError::ColumnNotFound(_))));
    }

    #[test]
    fn close_discards_rows() {
        let mut rows = Rows::from_text(&["v"], [vec![Some("{}")], vec![Some("{}")]]);
        assert_eq!(rows.next_row().unwrap().try_get::<_, Document>(0).unwrap(), doc! {});
        rows.close();
        assert!(rows.next_row().is_none());
    }
}
