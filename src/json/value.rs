use indexmap::IndexMap;

/// A string owned by the value or borrowed from static/external storage.
///
/// `Borrowed` exists for literals the encoder/decoder never has to copy
/// (method names, fixed keys); it must never be mutated in place the way
/// `Owned` can be, since the backing text isn't owned to release.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonStr {
    Owned(String),
    Borrowed(&'static str),
}

impl JsonStr {
    pub fn as_str(&self) -> &str {
        match self {
            JsonStr::Owned(s) => s.as_str(),
            JsonStr::Borrowed(s) => s,
        }
    }
}

impl From<String> for JsonStr {
    fn from(s: String) -> Self {
        JsonStr::Owned(s)
    }
}

impl From<&'static str> for JsonStr {
    fn from(s: &'static str) -> Self {
        JsonStr::Borrowed(s)
    }
}

/// Insertion-ordered JSON object.
pub type Object = IndexMap<String, Value>;

/// Tagged JSON value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(JsonStr),
    Object(Object),
    Array(Vec<Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn object() -> Self {
        Value::Object(Object::new())
    }

    pub fn array() -> Self {
        Value::Array(Vec::new())
    }

    pub fn string(s: impl Into<JsonStr>) -> Self {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns `Value::Null` (not an `Option`) when `key` is absent or
    /// `self` isn't an object, so callers can chain `.get(...).get(...)`
    /// without checking at each step.
    pub fn get(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        match self {
            Value::Object(o) => o.get(key).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Sets `key` on an object value, replacing (and dropping) any
    /// previous value. Panics if `self` is not an object — callers are
    /// expected to have constructed one with [`Value::object`].
    pub fn object_set(&mut self, key: impl Into<String>, value: Value) {
        match self {
            Value::Object(o) => {
                o.insert(key.into(), value);
            }
            _ => panic!("object_set called on a non-object Value"),
        }
    }

    /// Pushes onto an array value. Panics if `self` is not an array.
    pub fn array_push(&mut self, value: Value) {
        match self {
            Value::Array(a) => a.push(value),
            _ => panic!("array_push called on a non-array Value"),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(JsonStr::Owned(s))
    }
}

impl From<&'static str> for Value {
    fn from(s: &'static str) -> Self {
        Value::Str(JsonStr::Borrowed(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_get_missing_key_is_null_not_panic() {
        let v = Value::object();
        assert_eq!(v.get("missing"), &Value::Null);
    }

    #[test]
    fn object_set_replaces_existing_value() {
        let mut v = Value::object();
        v.object_set("k", Value::from(1i64));
        v.object_set("k", Value::from(2i64));
        assert_eq!(v.get("k"), &Value::from(2i64));
        assert_eq!(v.as_object().unwrap().len(), 1);
    }

    #[test]
    fn object_preserves_insertion_order() {
        let mut v = Value::object();
        v.object_set("b", Value::from(1i64));
        v.object_set("a", Value::from(2i64));
        let keys: Vec<_> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
