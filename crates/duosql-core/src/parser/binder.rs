//! Dialect binder: projects placeholder sentinels onto concrete syntax.
//!
//! The rewriter never emits dialect text. It leaves one [`SENTINEL`] char
//! per placeholder and records the matching [`Bind`]s in order; this module
//! substitutes `?`, `%s`, or `:name` as a final pure projection.

use std::collections::BTreeMap;

use crate::types::{ParamValue, Params, PlaceholderStyle};

/// Internal placeholder marker. A private-use codepoint so that cleanup
/// regexes and template text can never collide with it.
pub(crate) const SENTINEL: char = '\u{e000}';

/// One recorded placeholder, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Bind {
    /// Originating parameter name.
    pub name: String,
    /// The value to bind.
    pub value: ParamValue,
    /// True for list-expansion placeholders, which take `:name_0`,
    /// `:name_1`, ... in the named style; scalars stay `:name`.
    pub indexed: bool,
}

/// Substitutes every sentinel according to the placeholder style.
///
/// For positional styles the named map echoes the caller's bindings; for
/// the named style the positional vector is empty and the map carries
/// exactly the emitted keys.
pub(crate) fn bind_placeholders(
    sql: &str,
    binds: Vec<Bind>,
    style: PlaceholderStyle,
    input_params: &Params,
) -> (String, Vec<ParamValue>, BTreeMap<String, ParamValue>) {
    debug_assert_eq!(
        sql.chars().filter(|&c| c == SENTINEL).count(),
        binds.len(),
        "every sentinel needs exactly one recorded bind"
    );

    let mut out = String::with_capacity(sql.len());
    let mut positional = Vec::new();
    let mut named: BTreeMap<String, ParamValue> = BTreeMap::new();
    let mut counters: BTreeMap<String, usize> = BTreeMap::new();
    let mut next = binds.into_iter();

    for ch in sql.chars() {
        if ch != SENTINEL {
            out.push(ch);
            continue;
        }
        let Some(bind) = next.next() else {
            break;
        };
        match style {
            PlaceholderStyle::Question => {
                out.push('?');
                positional.push(bind.value);
            }
            PlaceholderStyle::Format => {
                out.push_str("%s");
                positional.push(bind.value);
            }
            PlaceholderStyle::Named => {
                let key = if bind.indexed {
                    let counter = counters.entry(bind.name.clone()).or_insert(0);
                    let key = format!("{}_{}", bind.name, *counter);
                    *counter += 1;
                    key
                } else {
                    bind.name.clone()
                };
                out.push(':');
                out.push_str(&key);
                named.insert(key, bind.value);
            }
        }
    }

    if style != PlaceholderStyle::Named {
        for (key, value) in input_params {
            named.insert(key.clone(), value.clone());
        }
    }

    (out, positional, named)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(name: &str, value: ParamValue, indexed: bool) -> Bind {
        Bind {
            name: name.to_string(),
            value,
            indexed,
        }
    }

    #[test]
    fn test_question_style() {
        let sql = format!("WHERE a = {SENTINEL} AND b = {SENTINEL}");
        let (out, positional, _) = bind_placeholders(
            &sql,
            vec![
                bind("a", ParamValue::Int(1), false),
                bind("b", ParamValue::Int(2), false),
            ],
            PlaceholderStyle::Question,
            &Params::new(),
        );
        assert_eq!(out, "WHERE a = ? AND b = ?");
        assert_eq!(positional, vec![ParamValue::Int(1), ParamValue::Int(2)]);
    }

    #[test]
    fn test_format_style() {
        let sql = format!("WHERE a = {SENTINEL}");
        let (out, positional, _) = bind_placeholders(
            &sql,
            vec![bind("a", ParamValue::Int(1), false)],
            PlaceholderStyle::Format,
            &Params::new(),
        );
        assert_eq!(out, "WHERE a = %s");
        assert_eq!(positional.len(), 1);
    }

    #[test]
    fn test_named_scalar_and_indexed() {
        let sql = format!("WHERE a = {SENTINEL} AND id IN ({SENTINEL}, {SENTINEL})");
        let (out, positional, named) = bind_placeholders(
            &sql,
            vec![
                bind("a", ParamValue::from("x"), false),
                bind("ids", ParamValue::Int(10), true),
                bind("ids", ParamValue::Int(20), true),
            ],
            PlaceholderStyle::Named,
            &Params::new(),
        );
        assert_eq!(out, "WHERE a = :a AND id IN (:ids_0, :ids_1)");
        assert!(positional.is_empty());
        assert_eq!(named.get("a"), Some(&ParamValue::from("x")));
        assert_eq!(named.get("ids_0"), Some(&ParamValue::Int(10)));
        assert_eq!(named.get("ids_1"), Some(&ParamValue::Int(20)));
    }

    #[test]
    fn test_positional_named_map_echoes_input() {
        let sql = format!("WHERE a = {SENTINEL}");
        let mut input = Params::new();
        input.insert("a".to_string(), ParamValue::Int(1));
        input.insert("extra".to_string(), ParamValue::Int(9));
        let (_, _, named) = bind_placeholders(
            &sql,
            vec![bind("a", ParamValue::Int(1), false)],
            PlaceholderStyle::Question,
            &input,
        );
        assert_eq!(named.len(), 2);
        assert_eq!(named.get("extra"), Some(&ParamValue::Int(9)));
    }
}
