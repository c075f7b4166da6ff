//! Interpreter-neutral script values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value crossing the boundary between Rust and a strategy script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ScriptValue>),
    Dict(IndexMap<String, ScriptValue>),
}

impl ScriptValue {
    pub fn empty_dict() -> Self {
        ScriptValue::Dict(IndexMap::new())
    }

    /// A float list; undefined positions stay NaN.
    pub fn series(values: &[f64]) -> Self {
        ScriptValue::List(values.iter().map(|v| ScriptValue::Float(*v)).collect())
    }

    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        ScriptValue::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::None => "NoneType",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Int(_) => "int",
            ScriptValue::Float(_) => "float",
            ScriptValue::Str(_) => "string",
            ScriptValue::List(_) => "list",
            ScriptValue::Dict(_) => "dict",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ScriptValue::None)
    }

    /// Numeric view of ints and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Int(v) => Some(*v as f64),
            ScriptValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ScriptValue]> {
        match self {
            ScriptValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<String, ScriptValue>> {
        match self {
            ScriptValue::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Dict lookup; `None` for missing keys and non-dicts.
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        self.as_dict().and_then(|map| map.get(key))
    }

    /// Inserts every entry of `defaults` whose key is not already set.
    /// Non-dict values are replaced by a copy of `defaults`.
    pub fn merge_defaults(&mut self, defaults: &IndexMap<String, ScriptValue>) {
        match self {
            ScriptValue::Dict(map) => {
                for (key, value) in defaults {
                    map.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            other => *other = ScriptValue::Dict(defaults.clone()),
        }
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Float(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Int(value)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Bool(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::Str(value.to_owned())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::Str(value)
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => ScriptValue::None,
            Json::Bool(b) => ScriptValue::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => ScriptValue::Int(i),
                None => ScriptValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => ScriptValue::Str(s),
            Json::Array(items) => ScriptValue::List(items.into_iter().map(Into::into).collect()),
            Json::Object(map) => {
                ScriptValue::Dict(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::None => write!(f, "None"),
            ScriptValue::Bool(true) => write!(f, "True"),
            ScriptValue::Bool(false) => write!(f, "False"),
            ScriptValue::Int(v) => write!(f, "{v}"),
            ScriptValue::Float(v) => write!(f, "{v}"),
            ScriptValue::Str(s) => write!(f, "{s}"),
            ScriptValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ScriptValue::Dict(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
