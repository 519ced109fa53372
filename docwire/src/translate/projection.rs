use super::{TranslateError, literal};
use crate::{
    bson::{Document, Value},
    row::{ColumnError, Row},
};

const ID: &str = "_id";

/// Field selection of a `find`.
///
/// Inclusion is applied by the backend through the column list, exclusion
/// selects whole documents and removes fields from each returned document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// Whole documents.
    #[default]
    All,
    /// Selected paths, in column order.
    Include(Vec<String>),
    /// Paths removed after retrieval.
    Exclude(Vec<String>),
}

impl Projection {
    /// Classify a projection document.
    ///
    /// `_id` is included unless explicitly excluded, and may be excluded in
    /// an inclusion projection. Any other field decides the mode, mixing is an
    /// error naming the first conflicting field.
    pub fn parse(projection: &Document) -> Result<Projection, TranslateError> {
        let mut id = None;
        let mut include = None::<bool>;
        let mut fields = Vec::new();

        for (field, value) in projection.iter() {
            let flag = match value {
                Value::Bool(b) => *b,
                Value::Int32(n) => *n != 0,
                Value::Int64(n) => *n != 0,
                Value::Double(n) => *n != 0.0,
                other => {
                    return Err(TranslateError::InvalidProjection { field: field.to_owned(), tag: other.tag() });
                },
            };
            literal::path(field, &mut String::new())?;

            if field == ID {
                id = Some(flag);
                continue;
            }

            match include {
                None => include = Some(flag),
                Some(true) if !flag => return Err(TranslateError::InclusionConflict(field.to_owned())),
                Some(false) if flag => return Err(TranslateError::ExclusionConflict(field.to_owned())),
                Some(_) => { },
            }
            fields.push(field.to_owned());
        }

        let projection = match (include, id) {
            (None, None | Some(true)) => Projection::All,
            (None, Some(false)) => Projection::Exclude(vec![ID.to_owned()]),
            (Some(true), id) => {
                if id != Some(false) {
                    fields.insert(0, ID.to_owned());
                }
                Projection::Include(fields)
            },
            (Some(false), id) => {
                if id == Some(false) {
                    fields.insert(0, ID.to_owned());
                }
                Projection::Exclude(fields)
            },
        };

        Ok(projection)
    }

    /// `SELECT` column list.
    pub fn columns(&self) -> Result<String, TranslateError> {
        let Projection::Include(fields) = self else {
            return Ok("*".to_owned());
        };
        let mut columns = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i != 0 {
                columns.push_str(", ");
            }
            literal::path(field, &mut columns)?;
        }
        Ok(columns)
    }

    /// Build the response document of one row.
    pub fn shape(&self, row: &Row) -> Result<Document, ColumnError> {
        match self {
            Projection::All => row.try_get(0),
            Projection::Exclude(fields) => {
                let mut doc: Document = row.try_get(0)?;
                for field in fields {
                    doc.remove_path(field);
                }
                Ok(doc)
            },
            Projection::Include(fields) => {
                let mut doc = Document::with_capacity(fields.len());
                for (i, field) in fields.iter().enumerate() {
                    match row.try_get(i)? {
                        // absent in the stored document
                        Value::Null => { },
                        value => doc.set_path(field, value),
                    }
                }
                Ok(doc)
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{doc, row::Rows};

    #[test]
    fn classify() {
        assert_eq!(Projection::parse(&doc! {}).unwrap(), Projection::All);
        assert_eq!(Projection::parse(&doc! { "_id" => 1 }).unwrap(), Projection::All);
        assert_eq!(
            Projection::parse(&doc! { "_id" => 0 }).unwrap(),
            Projection::Exclude(vec!["_id".into()]),
        );
        assert_eq!(
            Projection::parse(&doc! { "b" => 1, "a.c" => true }).unwrap(),
            Projection::Include(vec!["_id".into(), "b".into(), "a.c".into()]),
        );
        assert_eq!(
            Projection::parse(&doc! { "b" => 1, "_id" => false }).unwrap(),
            Projection::Include(vec!["b".into()]),
        );
        assert_eq!(
            Projection::parse(&doc! { "b" => 0, "_id" => 0 }).unwrap(),
            Projection::Exclude(vec!["_id".into(), "b".into()]),
        );
    }

    #[test]
    fn mixed_modes_are_rejected() {
        assert_eq!(
            Projection::parse(&doc! { "a" => 1, "b" => 0 }),
            Err(TranslateError::InclusionConflict("b".into())),
        );
        assert_eq!(
            Projection::parse(&doc! { "a" => false, "b" => 1 }),
            Err(TranslateError::ExclusionConflict("b".into())),
        );
        assert!(matches!(
            Projection::parse(&doc! { "a" => "yes" }),
            Err(TranslateError::InvalidProjection { .. })
        ));
    }

    #[test]
    fn column_list() {
        let p = Projection::parse(&doc! { "name" => 1, "a.b" => 1 }).unwrap();
        assert_eq!(p.columns().unwrap(), r#""_id", "name", "a"."b""#);
        assert_eq!(Projection::Exclude(vec!["x".into()]).columns().unwrap(), "*");
    }

    #[test]
    fn shape_rows() {
        let mut rows = Rows::from_text(&["_id", "name", "b"], [
            vec![Some("1"), Some("\"x\""), None],
            vec![Some("2"), None, Some("{\"c\": true}")],
        ]);
        let include = Projection::Include(vec!["_id".into(), "name".into(), "a.b".into()]);

        let first = include.shape(&rows.next_row().unwrap()).unwrap();
        assert_eq!(first, doc! { "_id" => 1, "name" => "x" });
        let second = include.shape(&rows.next_row().unwrap()).unwrap();
        assert_eq!(second, doc! { "_id" => 2, "a" => doc! { "b" => doc! { "c" => true } } });

        let mut rows = Rows::from_text(&["doc"], [vec![Some(r#"{"_id": 1, "a": {"b": 1, "c": 2}, "d": 3}"#)]]);
        let exclude = Projection::Exclude(vec!["a.b".into(), "d".into()]);
        let doc = exclude.shape(&rows.next_row().unwrap()).unwrap();
        assert_eq!(doc, doc! { "_id" => 1, "a" => doc! { "c" => 2 } });
    }
}
