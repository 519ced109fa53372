use indexmap::IndexMap;

use super::Value;

/// Ordered sequence of values.
pub type Array = Vec<Value>;

/// Ordered mapping from key to [`Value`].
///
/// Keys are unique, [`Document::insert`] on an existing key replace the value
/// in place, so the first occurrence position is kept.
#[derive(Debug, Clone, Default)]
pub struct Document {
    entries: IndexMap<String, Value>,
}

/// Key order is significant.
impl PartialEq for Document {
    fn eq(&self, other: &Document) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl Document {
    pub fn new() -> Document {
        Document { entries: IndexMap::new() }
    }

    pub fn with_capacity(capacity: usize) -> Document {
        Document { entries: IndexMap::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a value, returning the previous one if `key` was present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a key, preserving the order of remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the first key, the command name by convention.
    pub fn command(&self) -> Option<&str> {
        self.entries.first().map(|(k, _)| k.as_str())
    }

    /// Lookup a dotted path, descending into sub documents.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        match path.split_once('.') {
            None => self.get(path),
            Some((head, rest)) => self.get(head)?.as_document()?.get_path(rest),
        }
    }

    /// Set a dotted path, creating intermediate documents as needed.
    ///
    /// An intermediate value that is not a document is replaced.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) {
        match path.split_once('.') {
            None => {
                self.insert(path, value);
            },
            Some((head, rest)) => {
                if !matches!(self.get(head), Some(Value::Document(_))) {
                    self.insert(head, Document::new());
                }
                if let Some(Value::Document(sub)) = self.get_mut(head) {
                    sub.set_path(rest, value);
                }
            },
        }
    }

    /// Remove a dotted path, returns the removed value.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        match path.split_once('.') {
            None => self.remove(path),
            Some((head, rest)) => match self.get_mut(head)? {
                Value::Document(sub) => sub.remove_path(rest),
                _ => None,
            },
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

/// Construct a [`Document`].
///
/// ```
/// let doc = docwire::doc! { "find" => "users", "limit" => 10 };
/// assert_eq!(doc.command(), Some("find"));
/// ```
#[macro_export]
macro_rules! doc {
    () => { $crate::bson::Document::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut doc = $crate::bson::Document::new();
        $(doc.insert($key, $value);)+
        doc
    }};
}

/// Construct an [`Array`].
#[macro_export]
macro_rules! array {
    ($($value:expr),* $(,)?) => {
        <$crate::bson::Array>::from([$($crate::bson::Value::from($value)),*])
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{array, doc};

    #[test]
    fn insert_keeps_first_position() {
        let mut d = doc! { "b" => 1, "a" => 2 };
        assert_eq!(d.insert("b", 3), Some(Value::Int32(1)));
        assert_eq!(d.keys().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(d.get("b"), Some(&Value::Int32(3)));
    }

    #[test]
    fn dotted_paths() {
        let mut d = doc! { "a" => doc! { "b" => doc! { "c" => "x" } }, "z" => 1 };
        assert_eq!(d.get_path("a.b.c"), Some(&Value::from("x")));
        assert_eq!(d.get_path("z.c"), None);

        assert_eq!(d.remove_path("a.b.c"), Some(Value::from("x")));
        assert_eq!(d.get_path("a.b"), Some(&Value::Document(Document::new())));
        assert_eq!(d.remove_path("a.missing"), None);

        d.set_path("z.y", true);
        assert_eq!(d, doc! { "a" => doc! { "b" => doc! {} }, "z" => doc! { "y" => true } });
    }

    #[test]
    fn remove_keeps_order() {
        let mut d = doc! { "a" => 1, "b" => 2, "c" => 3 };
        d.remove("b");
        assert_eq!(d.keys().collect::<Vec<_>>(), ["a", "c"]);
    }

    #[test]
    fn key_order_is_significant() {
        assert_ne!(doc! { "a" => 1, "b" => 2 }, doc! { "b" => 2, "a" => 1 });
        assert_eq!(doc! { "a" => 1, "b" => 2 }, doc! { "a" => 1, "b" => 2 });
    }

    #[test]
    fn array_macro() {
        let a = array![1, "two", 3.0];
        assert_eq!(a, vec![Value::Int32(1), Value::from("two"), Value::Double(3.0)]);
    }
}
