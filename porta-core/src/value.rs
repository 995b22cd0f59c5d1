//! Driver-neutral value model.
//!
//! Bind parameters and result columns travel through the layer as
//! [`Value`]s; each driver maps them to its native types at the seam.

use std::fmt;

use rustc_hash::FxHashMap;

/// A caller-supplied name→value bind parameter map.
pub type Params = FxHashMap<String, Value>;

/// A single database value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
    /// An enumerated-constant marker (entity types, authentication codes
    /// and the like). No backend understands these; converters flatten
    /// them to plain integers before values reach a driver.
    Code(i64),
}

impl Value {
    /// Strip internal marker types: `Code(n)` becomes `Int(n)`, everything
    /// else passes through unchanged.
    pub fn normalized(self) -> Value {
        match self {
            Value::Code(n) => Value::Int(n),
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) | Value::Code(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(n) | Value::Code(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Code(n) => write!(f, "code({n})"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Build a [`Params`] map: `params! { "id" => 42, "name" => "foo" }`.
#[macro_export]
macro_rules! params {
    () => { $crate::value::Params::default() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::value::Params::default();
        $(map.insert($name.to_string(), $crate::value::Value::from($value));)+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_normalizes_to_int() {
        assert_eq!(Value::Code(7).normalized(), Value::Int(7));
        assert_eq!(Value::Text("x".into()).normalized(), Value::Text("x".into()));
    }

    #[test]
    fn params_macro_builds_map() {
        let p = params! { "id" => 42, "name" => "foo", "missing" => Option::<i64>::None };
        assert_eq!(p.get("id"), Some(&Value::Int(42)));
        assert_eq!(p.get("name"), Some(&Value::Text("foo".into())));
        assert_eq!(p.get("missing"), Some(&Value::Null));
    }
}
