//! Query translation to SQL.
//!
//! A find or count description, filter, projection, sort and limit, is
//! translated into SQL fragments with positional arguments. The
//! [`Translation`] is produced fresh per request and holds no state
//! beyond its inputs.
//!
//! ```text
//! SELECT <columns> FROM "collection" [WHERE <filter>] [ORDER BY <sort>] [LIMIT <n>]
//! ```
//!
//! Arguments are appended in fragment order, filter values first, then sort
//! keys, then the limit. [`Translation::render`] substitutes them in that
//! same order.
use std::fmt;

use crate::bson::{Document, Value};

mod error;
mod filter;
pub mod literal;
mod projection;

pub use error::TranslateError;
pub use projection::Projection;

/// How an argument is written into the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Value literal, quoted and escaped by type.
    Literal,
    /// Field path, as nested quoted identifiers.
    Identifier,
    /// Bare integer.
    Number,
}

/// A piece of SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    /// The `index` argument of [`Translation::args`].
    Placeholder {
        index: usize,
        kind: ArgKind,
    },
}

/// How the rows of a translation are turned into the response.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// One document per row.
    Find {
        projection: Projection,
    },
    /// A single `COUNT(*)` row, capped by the requested limit.
    Count {
        limit: Option<i64>,
    },
}

impl Shape {
    /// The backend does not cap `COUNT(*)` by `LIMIT`, the cap is applied here.
    pub fn count(&self, count: i64) -> i64 {
        match *self {
            Shape::Count { limit: Some(limit) } => count.min(limit),
            _ => count,
        }
    }
}

/// Parameterized SQL produced from a query description.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    fragments: Vec<Fragment>,
    args: Vec<Value>,
    shape: Shape,
}

impl Translation {
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// SQL text with `$n` placeholders.
    pub fn sql(&self) -> String {
        let mut sql = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => sql.push_str(text),
                Fragment::Placeholder { index, .. } => {
                    sql.push('$');
                    sql.push_str(itoa::Buffer::new().format(index + 1));
                },
            }
        }
        sql
    }

    /// SQL text with every argument substituted in order.
    pub fn render(&self) -> Result<String, TranslateError> {
        let mut sql = String::new();
        let mut args = self.args.iter();
        for fragment in &self.fragments {
            let (kind, value) = match fragment {
                Fragment::Text(text) => {
                    sql.push_str(text);
                    continue;
                },
                Fragment::Placeholder { kind, .. } => (kind, args.next()),
            };
            let Some(value) = value else {
                return Err(TranslateError::ArgumentCount(self.args.len()));
            };
            match (kind, value) {
                (ArgKind::Literal, value) => literal::value(value, &mut sql)
                    .map_err(|tag| TranslateError::UnsupportedType { field: String::new(), tag })?,
                (ArgKind::Identifier, Value::String(path)) => literal::path(path, &mut sql)?,
                (ArgKind::Number, value) => match value.as_whole_number() {
                    Some(n) => sql.push_str(itoa::Buffer::new().format(n)),
                    None => return Err(TranslateError::ArgumentKind(value.tag())),
                },
                (ArgKind::Identifier, value) => return Err(TranslateError::ArgumentKind(value.tag())),
            }
        }
        Ok(sql)
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())?;
        if !self.args.is_empty() {
            f.write_str(" -- ")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i != 0 {
                    f.write_str(", ")?;
                }
                write!(f, "${}: {arg}", i + 1)?;
            }
        }
        Ok(())
    }
}

/// Accumulates fragments and their arguments in order.
#[derive(Default)]
struct Builder {
    fragments: Vec<Fragment>,
    args: Vec<Value>,
}

impl Builder {
    fn text(&mut self, text: &str) {
        match self.fragments.last_mut() {
            Some(Fragment::Text(last)) => last.push_str(text),
            _ => self.fragments.push(Fragment::Text(text.to_owned())),
        }
    }

    fn arg(&mut self, value: impl Into<Value>, kind: ArgKind) {
        self.fragments.push(Fragment::Placeholder { index: self.args.len(), kind });
        self.args.push(value.into());
    }

    fn finish(self, shape: Shape) -> Translation {
        Translation { fragments: self.fragments, args: self.args, shape }
    }
}

/// Translate a `find`.
pub fn find(
    collection: &str,
    filter: &Document,
    projection: &Document,
    sort: &Document,
    limit: i64,
) -> Result<Translation, TranslateError> {
    let projection = Projection::parse(projection)?;
    let limit = self::limit(limit)?;

    let mut b = Builder::default();
    b.text("SELECT ");
    b.text(&projection.columns()?);
    b.text(" FROM ");
    from(collection, &mut b);
    filter::filter(filter, &mut b)?;
    self::sort(sort, &mut b)?;
    if let Some(limit) = limit {
        b.text(" LIMIT ");
        b.arg(limit, ArgKind::Number);
    }

    Ok(b.finish(Shape::Find { projection }))
}

/// Translate a `count`.
///
/// The limit is kept in the SQL but the backend ignores it for `COUNT(*)`,
/// see [`Shape::count`].
pub fn count(collection: &str, filter: &Document, limit: i64) -> Result<Translation, TranslateError> {
    let limit = self::limit(limit)?;

    let mut b = Builder::default();
    b.text("SELECT COUNT(*) FROM ");
    from(collection, &mut b);
    filter::filter(filter, &mut b)?;
    if let Some(limit) = limit {
        b.text(" LIMIT ");
        b.arg(limit, ArgKind::Number);
    }

    Ok(b.finish(Shape::Count { limit }))
}

fn from(collection: &str, b: &mut Builder) {
    let mut table = String::new();
    literal::identifier(collection, &mut table);
    b.text(&table);
}

/// `0` is no limit, negative is not supported.
fn limit(limit: i64) -> Result<Option<i64>, TranslateError> {
    match limit {
        0 => Ok(None),
        1.. => Ok(Some(limit)),
        _ => Err(TranslateError::NegativeLimit(limit)),
    }
}

/// `ORDER BY` in document order, ascending for positive order values.
fn sort(sort: &Document, b: &mut Builder) -> Result<(), TranslateError> {
    for (i, (key, order)) in sort.iter().enumerate() {
        let ascending = match order {
            Value::Int32(n) => *n > 0,
            Value::Int64(n) => *n > 0,
            Value::Double(n) => *n > 0.0,
            other => {
                return Err(TranslateError::InvalidSortOrder { field: key.to_owned(), tag: other.tag() });
            },
        };
        // validated now so render cannot fail on it
        literal::path(key, &mut String::new())?;

        b.text(if i == 0 { " ORDER BY " } else { ", " });
        b.arg(key, ArgKind::Identifier);
        b.text(if ascending { " ASC" } else { " DESC" });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{bson::Tag, doc};

    #[test]
    fn empty_filter_has_no_where() {
        let t = find("users", &doc! {}, &doc! {}, &doc! {}, 0).unwrap();
        assert_eq!(t.sql(), r#"SELECT * FROM "users""#);
        assert!(t.args().is_empty());
    }

    #[test]
    fn single_equality() {
        let t = find("users", &doc! { "a" => 1 }, &doc! {}, &doc! {}, 0).unwrap();
        assert_eq!(t.sql(), r#"SELECT * FROM "users" WHERE "a" = $1"#);
        assert_eq!(t.args(), [Value::Int32(1)]);
        assert_eq!(t.render().unwrap(), r#"SELECT * FROM "users" WHERE "a" = 1"#);
    }

    #[test]
    fn argument_order() {
        let t = find(
            "c",
            &doc! { "a.b" => "x", "n" => 2i64 },
            &doc! {},
            &doc! { "age" => -1, "name.first" => 1 },
            10,
        )
        .unwrap();
        assert_eq!(
            t.sql(),
            r#"SELECT * FROM "c" WHERE "a"."b" = $1 AND "n" = $2 ORDER BY $3 DESC, $4 ASC LIMIT $5"#,
        );
        assert_eq!(
            t.args(),
            [
                Value::from("x"),
                Value::Int64(2),
                Value::from("age"),
                Value::from("name.first"),
                Value::Int64(10),
            ]
        );
        assert_eq!(
            t.render().unwrap(),
            r#"SELECT * FROM "c" WHERE "a"."b" = 'x' AND "n" = 2 ORDER BY "age" DESC, "name"."first" ASC LIMIT 10"#,
        );
    }

    #[test]
    fn limit_semantics() {
        let t = find("c", &doc! {}, &doc! {}, &doc! {}, 0).unwrap();
        assert!(!t.sql().contains("LIMIT"));

        let err = find("c", &doc! {}, &doc! {}, &doc! {}, -1).unwrap_err();
        assert!(matches!(err, TranslateError::NegativeLimit(-1)));
        let err = count("c", &doc! {}, -1).unwrap_err();
        assert!(matches!(err, TranslateError::NegativeLimit(-1)));
    }

    #[test]
    fn count_capping() {
        let t = count("c", &doc! { "a" => "b" }, 10).unwrap();
        assert_eq!(t.render().unwrap(), r#"SELECT COUNT(*) FROM "c" WHERE "a" = 'b' LIMIT 10"#);
        assert_eq!(t.shape().count(50), 10);
        assert_eq!(t.shape().count(5), 5);

        let t = count("c", &doc! {}, 0).unwrap();
        assert_eq!(t.shape().count(50), 50);
    }

    #[test]
    fn sort_order_type() {
        let err = find("c", &doc! {}, &doc! {}, &doc! { "a" => "asc" }, 0).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidSortOrder { tag: Tag::String, .. }));
        let t = find("c", &doc! {}, &doc! {}, &doc! { "a" => 0 }, 0).unwrap();
        assert!(t.render().unwrap().ends_with(r#"ORDER BY "a" DESC"#));
    }

    #[test]
    fn translation_is_pure() {
        let filter = doc! { "a" => 1 };
        let first = find("c", &filter, &doc! {}, &doc! {}, 3).unwrap();
        let second = find("c", &filter, &doc! {}, &doc! {}, 3).unwrap();
        assert_eq!(first, second);
    }
}
