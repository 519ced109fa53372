//! Documents from the relational store JSON text.
//!
//! The store returns rows as JSON with two conventions for values that JSON
//! cannot represent: `{"oid": "<24 hex>"}` is an object id and
//! `{"$da": <millis>}` is a datetime.
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

use super::{DateTime, Document, ObjectId, Value};

impl Document {
    /// Parse JSON object text, preserving key order.
    pub fn from_json(json: &str) -> serde_json::Result<Document> {
        serde_json::from_str(json)
    }
}

impl Value {
    /// Parse any JSON value text.
    pub fn from_json(json: &str) -> serde_json::Result<Value> {
        serde_json::from_str(json)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Document(doc) => Ok(doc),
            other => Err(de::Error::invalid_type(
                de::Unexpected::Other(other.tag().name()),
                &"a JSON object",
            )),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(match i32::try_from(v) {
            Ok(v) => Value::Int32(v),
            Err(_) => Value::Int64(v),
        })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        match i64::try_from(v) {
            Ok(v) => self.visit_i64(v),
            Err(_) => Ok(Value::Double(v as f64)),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut array = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element::<Value>()? {
            array.push(value);
        }
        Ok(Value::Array(array))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut doc = Document::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            doc.insert(key, value);
        }
        Ok(extended(doc))
    }
}

/// Recognize the store wrappers of single key objects.
fn extended(doc: Document) -> Value {
    if doc.len() == 1 {
        match doc.iter().next() {
            Some(("oid", Value::String(hex))) => {
                if let Some(id) = ObjectId::parse_hex(hex) {
                    return Value::ObjectId(id);
                }
            },
            Some(("$da", value)) => {
                if let Some(millis) = value.as_whole_number() {
                    return Value::DateTime(DateTime(millis));
                }
            },
            _ => {},
        }
    }
    Value::Document(doc)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{array, doc};

    #[test]
    fn key_order_and_numbers() {
        let doc = Document::from_json(r#"{"z": 1, "a": 3000000000, "m": 1.5, "n": null, "l": [true, "x"]}"#).unwrap();
        assert_eq!(
            doc,
            doc! {
                "z" => 1,
                "a" => 3000000000i64,
                "m" => 1.5,
                "n" => (),
                "l" => array![true, "x"],
            }
        );
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["z", "a", "m", "n", "l"]);
    }

    #[test]
    fn store_wrappers() {
        let doc = Document::from_json(
            r#"{"_id": {"oid": "62e2bd54510683f9c0bb0d6b"}, "at": {"$da": 1000}, "o": {"oid": "short"}}"#,
        )
        .unwrap();
        assert_eq!(
            doc.get("_id"),
            Some(&Value::ObjectId(ObjectId::parse_hex("62e2bd54510683f9c0bb0d6b").unwrap()))
        );
        assert_eq!(doc.get("at"), Some(&Value::DateTime(DateTime(1000))));
        assert_eq!(doc.get("o"), Some(&Value::Document(doc! { "oid" => "short" })));
    }

    #[test]
    fn document_requires_object() {
        assert!(Document::from_json("[1, 2]").is_err());
        assert_eq!(Value::from_json("\"x\"").unwrap(), Value::from("x"));
    }
}
