//! Auxiliary template functions: `%concat`/`%C`, `%L`, `%STR`/`%SQL`.

use duosql_core::{
    diagnostic_codes, parse, parse_with_dialect, Dialect, ParamValue, Params, Severity,
};

fn params(pairs: &[(&str, ParamValue)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn concat_basic() {
    let sql = "SELECT * FROM users WHERE name LIKE /* %concat('%', part, '%') */'%test%'";
    let result = parse(sql, &params(&[("part", "John".into())])).unwrap();
    assert!(result.sql.contains("LIKE ?"));
    assert_eq!(result.params, vec![ParamValue::from("%John%")]);
}

#[test]
fn concat_short_form() {
    let sql = "SELECT * FROM users WHERE name LIKE /*%C '%' part '%' */'%test%'";
    let result = parse(sql, &params(&[("part", "Jane".into())])).unwrap();
    assert!(result.sql.contains("LIKE ?"));
    assert_eq!(result.params, vec![ParamValue::from("%Jane%")]);
}

#[test]
fn concat_multiple_params() {
    let sql = "SELECT * FROM t WHERE col LIKE /* %concat(prefix, middle, suffix) */'test'";
    let result = parse(
        sql,
        &params(&[
            ("prefix", "A".into()),
            ("middle", "B".into()),
            ("suffix", "C".into()),
        ]),
    )
    .unwrap();
    assert_eq!(result.params, vec![ParamValue::from("ABC")]);
}

#[test]
fn concat_skips_null_params() {
    let sql = "SELECT * FROM t WHERE col LIKE /* %concat('%', part, '%') */'test'";
    let result = parse(sql, &params(&[("part", ParamValue::Null)])).unwrap();
    assert_eq!(result.params, vec![ParamValue::from("%%")]);
}

#[test]
fn concat_quoted_literal_with_doubling() {
    let sql = "SELECT * FROM t WHERE col = /* %concat('it''s ', word) */'x'";
    let result = parse(sql, &params(&[("word", "fine".into())])).unwrap();
    assert_eq!(result.params, vec![ParamValue::from("it's fine")]);
}

#[test]
fn like_escape_basic() {
    let sql = "SELECT * FROM logs WHERE msg LIKE /*%L '%' keyword '%' */'%test%'";
    let result = parse(sql, &params(&[("keyword", "100%".into())])).unwrap();
    assert!(result.sql.contains("LIKE ? ESCAPE '#'"));
    assert_eq!(result.params, vec![ParamValue::from("%100#%%")]);
}

#[test]
fn like_escape_underscore() {
    let sql = "SELECT * FROM t WHERE name LIKE /*%L keyword */'test'";
    let result = parse(sql, &params(&[("keyword", "file_name".into())])).unwrap();
    assert_eq!(result.params, vec![ParamValue::from("file#_name")]);
}

#[test]
fn like_escape_both_wildcards() {
    let sql = "SELECT * FROM t WHERE val LIKE /*%L '%' search '%' */'%x%'";
    let result = parse(sql, &params(&[("search", "10%_done".into())])).unwrap();
    assert_eq!(result.params, vec![ParamValue::from("%10#%#_done%")]);
}

#[test]
fn like_escape_multibyte_keyword() {
    let sql = "SELECT * FROM t WHERE val LIKE /*%L '%' k '%' */'%x%'";
    let result = parse(sql, &params(&[("k", "10%病気".into())])).unwrap();
    assert!(result.sql.contains("ESCAPE '#'"));
    assert_eq!(result.params, vec![ParamValue::from("%10#%病気%")]);
}

#[test]
fn like_escape_oracle_full_width() {
    let sql = "SELECT * FROM t WHERE val LIKE /*%L k */'x'";
    let result =
        parse_with_dialect(sql, &params(&[("k", "100％達成".into())]), Dialect::Oracle).unwrap();
    assert_eq!(
        result.named_params.get("k"),
        Some(&ParamValue::from("100#％達成"))
    );
}

#[test]
fn like_escape_keeps_existing_escape_clause() {
    let sql = "SELECT * FROM t WHERE val LIKE /*%L k */'x' ESCAPE '#'";
    let result = parse(sql, &params(&[("k", "a%b".into())])).unwrap();
    assert_eq!(result.sql.matches("ESCAPE").count(), 1);
    assert_eq!(result.params, vec![ParamValue::from("a#%b")]);
}

#[test]
fn str_splices_value() {
    let sql = "SELECT * FROM users ORDER BY /* %STR(order_col) */id";
    let result = parse(sql, &params(&[("order_col", "name".into())])).unwrap();
    assert!(result.sql.contains("ORDER BY name"));
    assert!(result.params.is_empty());
}

#[test]
fn sql_splices_value() {
    let sql = "SELECT * FROM /* %SQL(table_name) */users";
    let result = parse(sql, &params(&[("table_name", "employees".into())])).unwrap();
    assert!(result.sql.contains("FROM employees"));
}

#[test]
fn str_null_uses_default() {
    let sql = "SELECT * FROM users ORDER BY /* %STR(order_col) */id";
    let result = parse(sql, &params(&[("order_col", ParamValue::Null)])).unwrap();
    assert!(result.sql.contains("ORDER BY id"));
}

#[test]
fn str_missing_uses_default() {
    let sql = "SELECT * FROM users ORDER BY /* %STR(order_col) */id";
    let result = parse(sql, &Params::new()).unwrap();
    assert!(result.sql.contains("ORDER BY id"));
}

#[test]
fn raw_splice_reports_diagnostic() {
    let sql = "SELECT * FROM users ORDER BY /* %STR(order_col) */id";
    let result = parse(sql, &params(&[("order_col", "name".into())])).unwrap();
    assert_eq!(result.diagnostics.len(), 1);
    let d = &result.diagnostics[0];
    assert_eq!(d.code, diagnostic_codes::RAW_EMBED);
    assert_eq!(d.severity, Severity::Warning);
    assert!(d.message.contains("order_col"));
    assert_eq!(d.line, Some(1));
}

#[test]
fn sql_splice_reports_diagnostic() {
    let sql = "SELECT * FROM /* %SQL(tbl) */users";
    let result = parse(sql, &params(&[("tbl", "employees".into())])).unwrap();
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, diagnostic_codes::RAW_EMBED);
}
