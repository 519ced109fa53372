//! Shell like textual representation, used in frame dumps and diffs.
//!
//! `{}` is single line, `{:#}` is indented with one field per line.
use std::fmt::{self, Write};

use time::format_description::well_known::Rfc3339;

use super::{Binary, DateTime, Document, Value};

const INDENT: &str = "  ";

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = f.alternate().then_some(0);
        write_document(f, self, level)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = f.alternate().then_some(0);
        write_value(f, self, level)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_offset().and_then(|dt| dt.format(&Rfc3339).ok()) {
            Some(iso) => write!(f, "ISODate(\"{iso}\")"),
            None => write!(f, "new Date({})", self.0),
        }
    }
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinData({}, \"", self.subtype.to_u8())?;
        for b in &self.bytes {
            write!(f, "{b:02x}")?;
        }
        f.write_str("\")")
    }
}

fn newline(f: &mut impl Write, level: Option<usize>) -> fmt::Result {
    match level {
        Some(level) => {
            f.write_char('\n')?;
            for _ in 0..level {
                f.write_str(INDENT)?;
            }
            Ok(())
        },
        None => f.write_char(' '),
    }
}

fn write_key(f: &mut impl Write, key: &str) -> fmt::Result {
    let plain = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    match plain {
        true => f.write_str(key),
        false => write!(f, "{key:?}"),
    }
}

fn write_document(f: &mut impl Write, doc: &Document, level: Option<usize>) -> fmt::Result {
    if doc.is_empty() {
        return f.write_str("{}");
    }
    let inner = level.map(|l| l + 1);
    f.write_char('{')?;
    for (i, (key, value)) in doc.iter().enumerate() {
        if i != 0 {
            f.write_char(',')?;
        }
        newline(f, inner)?;
        write_key(f, key)?;
        f.write_str(": ")?;
        write_value(f, value, inner)?;
    }
    newline(f, level)?;
    f.write_char('}')
}

fn write_value(f: &mut impl Write, value: &Value, level: Option<usize>) -> fmt::Result {
    match value {
        Value::Double(d) if d.is_nan() => f.write_str("NaN"),
        Value::Double(d) if d.is_infinite() => {
            f.write_str(if d.is_sign_negative() { "-Infinity" } else { "Infinity" })
        },
        Value::Double(d) => write!(f, "{d:?}"),
        Value::String(s) => write!(f, "{s:?}"),
        Value::Document(doc) => write_document(f, doc, level),
        Value::Array(array) if array.is_empty() => f.write_str("[]"),
        Value::Array(array) => {
            let inner = level.map(|l| l + 1);
            f.write_char('[')?;
            for (i, value) in array.iter().enumerate() {
                if i != 0 {
                    f.write_char(',')?;
                }
                newline(f, inner)?;
                write_value(f, value, inner)?;
            }
            newline(f, level)?;
            f.write_char(']')
        },
        Value::Binary(bin) => write!(f, "{bin}"),
        Value::ObjectId(id) => write!(f, "{id:?}"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::DateTime(dt) => write!(f, "{dt}"),
        Value::Null => f.write_str("null"),
        Value::Int32(i) => write!(f, "{i}"),
        Value::Int64(i) => write!(f, "Long({i})"),
    }
}
