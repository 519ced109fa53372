//! SQL text encoding of identifiers, paths and values.
//!
//! The document store dialect addresses nested fields as `"a"."b"`, and has
//! document literals `{"k": 'v', "n": 1}`. Object ids are written with the
//! store wrapper `{"oid": '<hex>'}`.
use std::fmt::Write;

use super::TranslateError;
use crate::bson::{Document, Tag, Value};

/// Write a double quoted identifier, `"` is doubled.
pub fn identifier(name: &str, out: &mut String) {
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

/// Write a dotted field path as nested accessor, `a.b` is `"a"."b"`.
pub fn path(path: &str, out: &mut String) -> Result<(), TranslateError> {
    if path.split('.').any(str::is_empty) {
        return Err(TranslateError::InvalidPath(path.to_owned()));
    }
    for (i, segment) in path.split('.').enumerate() {
        if i != 0 {
            out.push('.');
        }
        identifier(segment, out);
    }
    Ok(())
}

/// Write a single quoted string, `'` is doubled.
pub fn string(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
}

/// Write a comparable value.
///
/// Returns the offending type tag for values without a literal form.
pub fn value(value: &Value, out: &mut String) -> Result<(), Tag> {
    scalar(value, out, false)
}

/// Ensure the value has a literal form.
pub fn check(value: &Value) -> Result<(), Tag> {
    self::value(value, &mut String::new())
}

fn scalar(value: &Value, out: &mut String, nested: bool) -> Result<(), Tag> {
    match value {
        Value::String(s) => string(s, out),
        Value::Int32(i) => out.push_str(itoa::Buffer::new().format(*i)),
        Value::Int64(i) => out.push_str(itoa::Buffer::new().format(*i)),
        Value::Double(d) if d.is_finite() => {
            let _ = write!(out, "{d:?}");
        },
        Value::Bool(b) => out.push_str(match (nested, b) {
            (false, true) => "TRUE",
            (false, false) => "FALSE",
            (true, true) => "true",
            (true, false) => "false",
        }),
        Value::ObjectId(id) => {
            out.push_str("{\"oid\": ");
            string(&id.to_hex(), out);
            out.push('}');
        },
        Value::Document(doc) => document(doc, out)?,
        other => return Err(other.tag()),
    }
    Ok(())
}

fn document(doc: &Document, out: &mut String) -> Result<(), Tag> {
    out.push('{');
    for (i, (key, value)) in doc.iter().enumerate() {
        if i != 0 {
            out.push_str(", ");
        }
        identifier(key, out);
        out.push_str(": ");
        scalar(value, out, true)?;
    }
    out.push('}');
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{bson::ObjectId, doc};

    fn lit(v: impl Into<Value>) -> Result<String, Tag> {
        let mut out = String::new();
        value(&v.into(), &mut out).map(|_| out)
    }

    #[test]
    fn quoting() {
        let mut out = String::new();
        identifier("we\"ird", &mut out);
        assert_eq!(out, r#""we""ird""#);
        assert_eq!(lit("it's").unwrap(), "'it''s'");
    }

    #[test]
    fn paths() {
        let mut out = String::new();
        path("a.b.c", &mut out).unwrap();
        assert_eq!(out, r#""a"."b"."c""#);
        assert!(matches!(path("a..b", &mut String::new()), Err(TranslateError::InvalidPath(_))));
        assert!(path("", &mut String::new()).is_err());
    }

    #[test]
    fn scalars() {
        assert_eq!(lit(42).unwrap(), "42");
        assert_eq!(lit(i64::MIN).unwrap(), "-9223372036854775808");
        assert_eq!(lit(1.5).unwrap(), "1.5");
        assert_eq!(lit(true).unwrap(), "TRUE");
        assert_eq!(lit(f64::NAN), Err(Tag::Double));
        assert_eq!(lit(Value::Null), Err(Tag::Null));
        assert_eq!(lit(crate::array![1]), Err(Tag::Array));
    }

    #[test]
    fn documents() {
        let id = ObjectId::parse_hex("62e2bd54510683f9c0bb0d6b").unwrap();
        assert_eq!(lit(id).unwrap(), r#"{"oid": '62e2bd54510683f9c0bb0d6b'}"#);
        assert_eq!(
            lit(doc! { "name" => "x", "n" => 1, "ok" => false, "sub" => doc! {} }).unwrap(),
            r#"{"name": 'x', "n": 1, "ok": false, "sub": {}}"#,
        );
        assert_eq!(lit(doc! { "d" => crate::bson::DateTime(0) }), Err(Tag::DateTime));
    }
}
