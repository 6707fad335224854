//! Parameter values and their polarity.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bindings passed to [`crate::TwoWayParser::parse`], keyed by parameter name.
///
/// A name that is absent from the map is treated exactly like a binding to
/// [`ParamValue::Null`].
pub type Params = HashMap<String, ParamValue>;

/// A value bound to a template parameter.
///
/// The untagged representation maps directly onto JSON, so bindings can be
/// deserialized from a plain JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ParamValue {
    /// SQL NULL.
    Null,
    /// Boolean. `false` is a *negative* value.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
    /// A list, used for IN-clause and LIKE expansion.
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Returns true when the value is *negative*: null, `false`, an empty
    /// list, or a list whose every element is negative.
    pub fn is_negative(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::List(items) => items.is_empty() || items.iter().all(Self::is_negative),
            _ => false,
        }
    }

    /// Returns the list elements when the value is a list.
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Renders the value as plain text for `%concat`/`%STR` splicing.
    ///
    /// Null renders as the empty string; lists join their elements.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => items.iter().map(Self::to_text).collect(),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Self::Null,
        }
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}
