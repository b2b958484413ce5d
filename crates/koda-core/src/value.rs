//! KODA value model.
//!
//! A document is a finite tree of [`Value`] nodes. Objects keep their pairs in
//! insertion order; the canonical binary encoding sorts keys independently, so
//! structural equality treats object pairs as an unordered map.

/// One KODA value. Integers and floats are distinct kinds: `Int(1)` and
/// `Float(1.0)` never compare equal and encode with different tags.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// IEEE-754 binary64.
    Float(f64),
    String(String),
    Array(Vec<Value>),
    /// Key-value pairs in insertion order. Keys are unique within one object.
    Object(Vec<(String, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Look up a key on an object. Linear scan; objects are small in practice.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Nesting depth of the tree: 1 for scalars, 1 + deepest child for
    /// containers. An empty container has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Value::Array(items) => 1 + items.iter().map(Value::depth).max().unwrap_or(0),
            Value::Object(pairs) => {
                1 + pairs.iter().map(|(_, v)| v.depth()).max().unwrap_or(0)
            }
            _ => 1,
        }
    }
}

/// Structural equality. Numbers compare kind-and-bits: `Int` and `Float`
/// never match, and floats compare by bit pattern except that every NaN
/// equals every other NaN (the encoder collapses NaN payloads anyway).
/// Objects compare as unordered maps because canonical encoding reorders
/// keys and round-tripping must preserve equality.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, v)| {
                        b.iter()
                            .find(|(other_key, _)| other_key == key)
                            .map_or(false, |(_, w)| v == w)
                    })
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::Array(items)
    }
}

impl From<Vec<(String, Value)>> for Value {
    fn from(pairs: Vec<(String, Value)>) -> Value {
        Value::Object(pairs)
    }
}
