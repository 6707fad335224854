//! The result of rendering a template.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::common::Diagnostic;
use super::value::ParamValue;

/// A rendered two-way SQL statement.
///
/// For the `?` and `%s` placeholder styles, `params` carries the bind values
/// in placeholder order and `named_params` echoes the caller's bindings. For
/// the `:name` style, `params` is empty and `named_params` holds exactly the
/// keys that appear as `:key` in `sql`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSql {
    /// The final SQL text.
    pub sql: String,

    /// Positional bind values, in placeholder order.
    pub params: Vec<ParamValue>,

    /// Named bind values. Ordered so serialization is deterministic.
    pub named_params: BTreeMap<String, ParamValue>,

    /// Non-fatal notices produced while rendering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}
