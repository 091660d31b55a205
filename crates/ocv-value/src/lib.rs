//! Typed protocol values and conversions to and from native JSON

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for value conversions
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("cannot represent JSON {kind} as a typed value")]
    Unsupported { kind: &'static str },

    #[error("malformed JSON payload: {0}")]
    BadJson(#[from] serde_json::Error),

    #[error("non-finite float cannot be rendered as JSON")]
    NonFiniteFloat,
}

/// A typed value as carried by the management protocol.
///
/// Exactly one variant is populated. `Json` holds raw JSON-IETF document
/// text; `LeafList` holds an ordered scalar array. Serialized form uses the
/// protocol field names (`int_val`, `json_ietf_val`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    #[serde(rename = "int_val")]
    Int(i64),
    #[serde(rename = "uint_val")]
    Uint(u64),
    #[serde(rename = "float_val")]
    Float(f64),
    #[serde(rename = "bool_val")]
    Bool(bool),
    #[serde(rename = "string_val")]
    String(String),
    #[serde(rename = "json_ietf_val")]
    Json(String),
    #[serde(rename = "leaflist_val")]
    LeafList(Vec<TypedValue>),
}

impl TypedValue {
    /// Build a typed value from a native JSON value.
    ///
    /// Booleans, integers, floats and strings map to their scalar variants;
    /// objects are serialized into a `Json` payload. Null and arrays have no
    /// typed representation and are rejected.
    pub fn from_native(value: &serde_json::Value) -> Result<Self, ValueError> {
        match value {
            serde_json::Value::Null => Err(ValueError::Unsupported { kind: "null" }),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self::Uint(u))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(ValueError::Unsupported { kind: "number" })
                }
            }
            serde_json::Value::String(s) => Ok(Self::String(s.clone())),
            serde_json::Value::Array(_) => Err(ValueError::Unsupported { kind: "array" }),
            serde_json::Value::Object(_) => Ok(Self::Json(value.to_string())),
        }
    }

    /// Convert a typed value back into a native JSON value.
    ///
    /// `Json` payloads are parsed; a malformed payload is an error. Leaf
    /// lists become ordered JSON arrays.
    pub fn to_native(&self) -> Result<serde_json::Value, ValueError> {
        match self {
            Self::Int(i) => Ok(serde_json::Value::from(*i)),
            Self::Uint(u) => Ok(serde_json::Value::from(*u)),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or(ValueError::NonFiniteFloat),
            Self::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Self::String(s) => Ok(serde_json::Value::String(s.clone())),
            Self::Json(text) => Ok(serde_json::from_str(text)?),
            Self::LeafList(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(item.to_native()?);
                }
                Ok(serde_json::Value::Array(values))
            }
        }
    }

    /// Short name of the populated variant, for logs and type checks.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Json(_) => "json_ietf",
            Self::LeafList(_) => "leaflist",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Uint(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw JSON-IETF text, when this value carries a JSON payload.
    pub fn as_json_text(&self) -> Option<&str> {
        match self {
            Self::Json(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Uint(u) => write!(f, "{}", u),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::String(s) => write!(f, "\"{}\"", s),
            Self::Json(text) => write!(f, "{}", text),
            Self::LeafList(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Strip model-name prefixes (e.g. `openconfig-aaa:`) from JSON-IETF text.
///
/// Responses encoded as JSON-IETF prepend the model name to type references
/// and container keys. Those prefixes are not part of the schema tree and
/// must be removed before structural interpretation.
pub fn strip_model_prefixes(json_text: &str) -> String {
    match Regex::new(r"(openconfig(-[a-z]+)+:)") {
        Ok(re) => re.replace_all(json_text, "").into_owned(),
        Err(_) => json_text.to_string(),
    }
}
