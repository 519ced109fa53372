//! `WHERE` clause.
//!
//! Every top level key is one predicate, predicates are joined with `AND`.
use super::{ArgKind, Builder, TranslateError, literal};
use crate::bson::{Document, Value};

/// Comparison operators mapped to their SQL form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Operator {
    fn parse(op: &str) -> Option<Operator> {
        let op = match op {
            "$eq" => Operator::Eq,
            "$ne" => Operator::Ne,
            "$gt" => Operator::Gt,
            "$gte" => Operator::Gte,
            "$lt" => Operator::Lt,
            "$lte" => Operator::Lte,
            "$in" => Operator::In,
            "$nin" => Operator::Nin,
            _ => return None,
        };
        Some(op)
    }

    const fn sql(self) -> &'static str {
        match self {
            Operator::Eq => " = ",
            Operator::Ne => " <> ",
            Operator::Gt => " > ",
            Operator::Gte => " >= ",
            Operator::Lt => " < ",
            Operator::Lte => " <= ",
            Operator::In => " IN (",
            Operator::Nin => " NOT IN (",
        }
    }
}

pub(super) fn filter(filter: &Document, b: &mut Builder) -> Result<(), TranslateError> {
    let mut first = true;
    for (key, value) in filter.iter() {
        if key.starts_with('$') {
            // `$and`, `$or`, `$nor`, `$expr`, ...
            return Err(TranslateError::UnsupportedOperator(key.to_owned()));
        }

        let mut path = String::new();
        literal::path(key, &mut path)?;

        match operators(key, value)? {
            Some(ops) => {
                for (op, operand) in ops {
                    b.text(if first { " WHERE " } else { " AND " });
                    first = false;
                    predicate(key, &path, op, operand, b)?;
                }
            },
            None => {
                b.text(if first { " WHERE " } else { " AND " });
                first = false;
                predicate(key, &path, Operator::Eq, value, b)?;
            },
        }
    }
    Ok(())
}

/// Returns the operators of an operator document, `None` for implicit equality.
fn operators<'a>(
    field: &str,
    value: &'a Value,
) -> Result<Option<Vec<(Operator, &'a Value)>>, TranslateError> {
    let Value::Document(doc) = value else {
        return Ok(None);
    };

    let dollars = doc.keys().filter(|k| k.starts_with('$')).count();
    if dollars == 0 {
        return Ok(None);
    }
    if dollars != doc.len() {
        return Err(TranslateError::MixedOperator(field.to_owned()));
    }

    doc.iter()
        .map(|(op, operand)| match Operator::parse(op) {
            Some(op) => Ok((op, operand)),
            None => Err(TranslateError::UnsupportedOperator(op.to_owned())),
        })
        .collect::<Result<_, _>>()
        .map(Some)
}

fn predicate(
    field: &str,
    path: &str,
    op: Operator,
    operand: &Value,
    b: &mut Builder,
) -> Result<(), TranslateError> {
    if !matches!(op, Operator::In | Operator::Nin) {
        check(field, operand)?;
        b.text(path);
        b.text(op.sql());
        b.arg(operand.clone(), ArgKind::Literal);
        return Ok(());
    }

    let Value::Array(values) = operand else {
        return Err(TranslateError::InvalidOperand {
            op: if op == Operator::In { "$in" } else { "$nin" }.to_owned(),
            field: field.to_owned(),
            tag: operand.tag(),
        });
    };

    if values.is_empty() {
        // nothing is in the empty set
        b.text(if op == Operator::In { "FALSE" } else { "TRUE" });
        return Ok(());
    }

    b.text(path);
    b.text(op.sql());
    for (i, value) in values.iter().enumerate() {
        check(field, value)?;
        if i != 0 {
            b.text(", ");
        }
        b.arg(value.clone(), ArgKind::Literal);
    }
    b.text(")");
    Ok(())
}

fn check(field: &str, value: &Value) -> Result<(), TranslateError> {
    literal::check(value).map_err(|tag| TranslateError::UnsupportedType { field: field.to_owned(), tag })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{array, bson::{ObjectId, Tag}, doc};

    fn translate(filter: Document) -> Result<(String, String), TranslateError> {
        let mut b = Builder::default();
        super::filter(&filter, &mut b)?;
        let t = b.finish(crate::translate::Shape::Count { limit: None });
        Ok((t.sql(), t.render()?))
    }

    #[test]
    fn empty() {
        assert_eq!(translate(doc! {}).unwrap(), (String::new(), String::new()));
    }

    #[test]
    fn dotted_path() {
        let (sql, rendered) = translate(doc! { "a.b" => "x" }).unwrap();
        assert_eq!(sql, r#" WHERE "a"."b" = $1"#);
        assert_eq!(rendered, r#" WHERE "a"."b" = 'x'"#);
    }

    #[test]
    fn conjunction() {
        let id = ObjectId::parse_hex("62e2bd54510683f9c0bb0d6b").unwrap();
        let (_, rendered) = translate(doc! {
            "_id" => id,
            "n" => doc! { "$gte" => 1, "$lt" => 5i64 },
            "tags" => doc! { "$in" => array!["a", "b"] },
        })
        .unwrap();
        assert_eq!(
            rendered,
            r#" WHERE "_id" = {"oid": '62e2bd54510683f9c0bb0d6b'} AND "n" >= 1 AND "n" < 5 AND "tags" IN ('a', 'b')"#,
        );
    }

    #[test]
    fn document_equality() {
        let (_, rendered) = translate(doc! { "sub" => doc! { "x" => 1 } }).unwrap();
        assert_eq!(rendered, r#" WHERE "sub" = {"x": 1}"#);
    }

    #[test]
    fn empty_sets() {
        let (sql, _) = translate(doc! { "a" => doc! { "$in" => array![] } }).unwrap();
        assert_eq!(sql, " WHERE FALSE");
        let (sql, _) = translate(doc! { "a" => doc! { "$nin" => array![] }, "b" => 1 }).unwrap();
        assert_eq!(sql, r#" WHERE TRUE AND "b" = $1"#);
    }

    #[test]
    fn rejected() {
        assert!(matches!(
            translate(doc! { "$or" => array![] }),
            Err(TranslateError::UnsupportedOperator(op)) if op == "$or"
        ));
        assert!(matches!(
            translate(doc! { "a" => doc! { "$regex" => "x" } }),
            Err(TranslateError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            translate(doc! { "a" => doc! { "$gt" => 1, "b" => 2 } }),
            Err(TranslateError::MixedOperator(_))
        ));
        assert!(matches!(
            translate(doc! { "a" => doc! { "$in" => 1 } }),
            Err(TranslateError::InvalidOperand { tag: Tag::Int32, .. })
        ));
        assert!(matches!(
            translate(doc! { "a" => array![1] }),
            Err(TranslateError::UnsupportedType { tag: Tag::Array, .. })
        ));
        assert!(matches!(
            translate(doc! { "a" => Value::Null }),
            Err(TranslateError::UnsupportedType { tag: Tag::Null, .. })
        ));
        assert!(matches!(
            translate(doc! { "a" => f64::INFINITY }),
            Err(TranslateError::UnsupportedType { tag: Tag::Double, .. })
        ));
        assert!(matches!(translate(doc! { "a." => 1 }), Err(TranslateError::InvalidPath(_))));
    }
}
