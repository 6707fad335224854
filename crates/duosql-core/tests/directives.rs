//! Block (`-- %IF`) and inline (`/*%if*/`) conditional directives.

use duosql_core::{parse, ParamValue, Params, ParseErrorKind};

fn params(pairs: &[(&str, ParamValue)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn block_if_true_branch() {
    let sql = "SELECT *\nFROM users\n-- %IF active\nWHERE active = 1\n-- %ELSE\nWHERE deleted = 0\n-- %END";
    let result = parse(sql, &params(&[("active", true.into())])).unwrap();
    assert!(result.sql.contains("WHERE active = 1"));
    assert!(!result.sql.contains("WHERE deleted"));
    assert!(!result.sql.contains("%IF"));
}

#[test]
fn block_if_false_selects_else() {
    let sql = "SELECT *\nFROM users\n-- %IF active\nWHERE active = 1\n-- %ELSE\nWHERE deleted = 0\n-- %END";
    let result = parse(sql, &params(&[("active", ParamValue::Null)])).unwrap();
    assert!(result.sql.contains("WHERE deleted = 0"));
    assert!(!result.sql.contains("WHERE active"));
}

#[test]
fn block_if_without_else() {
    let sql = "SELECT *\nFROM users\n-- %IF include_name\nWHERE name = /* name */'default'\n-- %END";
    let result = parse(
        sql,
        &params(&[("include_name", true.into()), ("name", "John".into())]),
    )
    .unwrap();
    assert!(result.sql.contains("WHERE name = ?"));

    let result = parse(
        sql,
        &params(&[("include_name", false.into()), ("name", "John".into())]),
    )
    .unwrap();
    assert!(!result.sql.contains("WHERE"));
}

#[test]
fn block_params_inside_branch_bound() {
    let sql = "SELECT *\nFROM users\n-- %IF filter\nWHERE id = /* id */1\n-- %END";
    let result = parse(sql, &params(&[("filter", true.into()), ("id", 42.into())])).unwrap();
    assert!(result.sql.contains("WHERE id = ?"));
    assert_eq!(result.params, vec![ParamValue::Int(42)]);
}

#[test]
fn block_params_in_dead_branch_not_bound() {
    let sql = "SELECT *\nFROM users\n-- %IF filter\nWHERE id = /* id */1\n-- %END";
    let result = parse(sql, &params(&[("filter", false.into()), ("id", 42.into())])).unwrap();
    assert!(result.params.is_empty());
}

#[test]
fn block_elseif_chain() {
    let sql = "SELECT *\n-- %IF type_a\nFROM table_a\n-- %ELSEIF type_b\nFROM table_b\n-- %ELSE\nFROM table_c\n-- %END";

    let result = parse(
        sql,
        &params(&[("type_a", true.into()), ("type_b", false.into())]),
    )
    .unwrap();
    assert!(result.sql.contains("FROM table_a"));
    assert!(!result.sql.contains("table_b"));
    assert!(!result.sql.contains("table_c"));

    let result = parse(
        sql,
        &params(&[("type_a", false.into()), ("type_b", true.into())]),
    )
    .unwrap();
    assert!(result.sql.contains("FROM table_b"));

    let result = parse(
        sql,
        &params(&[("type_a", false.into()), ("type_b", false.into())]),
    )
    .unwrap();
    assert!(result.sql.contains("FROM table_c"));
}

#[test]
fn block_not_condition() {
    let sql = "SELECT *\n-- %IF NOT active\nFROM inactive_users\n-- %ELSE\nFROM active_users\n-- %END";
    let result = parse(sql, &params(&[("active", false.into())])).unwrap();
    assert!(result.sql.contains("FROM inactive_users"));

    let result = parse(sql, &params(&[("active", true.into())])).unwrap();
    assert!(result.sql.contains("FROM active_users"));
}

#[test]
fn block_and_or_conditions() {
    let sql = "SELECT *\n-- %IF a AND b\nFROM both_true\n-- %ELSE\nFROM not_both\n-- %END";
    let result = parse(sql, &params(&[("a", true.into()), ("b", true.into())])).unwrap();
    assert!(result.sql.contains("FROM both_true"));
    let result = parse(sql, &params(&[("a", true.into()), ("b", false.into())])).unwrap();
    assert!(result.sql.contains("FROM not_both"));

    let sql = "SELECT *\n-- %IF a OR b\nFROM either_true\n-- %ELSE\nFROM neither\n-- %END";
    let result = parse(sql, &params(&[("a", true.into()), ("b", false.into())])).unwrap();
    assert!(result.sql.contains("FROM either_true"));
    let result = parse(sql, &params(&[("a", false.into()), ("b", false.into())])).unwrap();
    assert!(result.sql.contains("FROM neither"));
}

#[test]
fn block_complex_condition() {
    let sql = "SELECT *\n-- %IF a AND b OR c\nFROM selected\n-- %ELSE\nFROM fallback\n-- %END";
    let result = parse(
        sql,
        &params(&[("a", true.into()), ("b", true.into()), ("c", false.into())]),
    )
    .unwrap();
    assert!(result.sql.contains("FROM selected"));

    let result = parse(
        sql,
        &params(&[("a", false.into()), ("b", false.into()), ("c", true.into())]),
    )
    .unwrap();
    assert!(result.sql.contains("FROM selected"));

    let result = parse(
        sql,
        &params(&[("a", false.into()), ("b", false.into()), ("c", false.into())]),
    )
    .unwrap();
    assert!(result.sql.contains("FROM fallback"));
}

#[test]
fn block_nested_if() {
    let sql = "SELECT *\n-- %IF outer\nFROM outer_table\n-- %IF inner\nWHERE inner_cond = 1\n-- %END\n-- %END";
    let result = parse(sql, &params(&[("outer", true.into()), ("inner", true.into())])).unwrap();
    assert!(result.sql.contains("FROM outer_table"));
    assert!(result.sql.contains("WHERE inner_cond = 1"));
}

#[test]
fn block_nested_if_outer_false() {
    let sql = "SELECT *\n-- %IF outer\nFROM outer_table\n-- %IF inner\nWHERE inner_cond = 1\n-- %END\n-- %ELSE\nFROM default_table\n-- %END";
    let result = parse(sql, &params(&[("outer", false.into()), ("inner", true.into())])).unwrap();
    assert!(result.sql.contains("FROM default_table"));
    assert!(!result.sql.contains("FROM outer_table"));
}

#[test]
fn block_single_branch_may_omit_end_at_eof() {
    let sql = "SELECT *\nFROM users\n-- %IF filtered\nWHERE active = 1";
    let result = parse(sql, &params(&[("filtered", true.into())])).unwrap();
    assert!(result.sql.contains("WHERE active = 1"));

    let result = parse(sql, &params(&[("filtered", false.into())])).unwrap();
    assert!(!result.sql.contains("WHERE"));
}

#[test]
fn block_with_else_requires_end() {
    let sql = "SELECT *\n-- %IF a\nFROM x\n-- %ELSE\nFROM y";
    let err = parse(sql, &params(&[("a", true.into())])).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Directive);
}

#[test]
fn block_else_without_if_errors() {
    let sql = "SELECT *\n-- %ELSE\nFROM users";
    let err = parse(sql, &Params::new()).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Directive);
    assert_eq!(err.line, Some(2));
}

#[test]
fn block_end_without_if_errors() {
    let sql = "SELECT *\n-- %END";
    let err = parse(sql, &Params::new()).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Directive);
}

#[test]
fn block_unknown_directive_errors() {
    let sql = "SELECT *\n-- %WHENEVER x\nFROM users";
    let err = parse(sql, &Params::new()).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Directive);
}

#[test]
fn inline_if_true() {
    let sql = "SELECT /*%if active */ 'active' /*%else */ 'inactive' /*%end*/ as status FROM users";
    let result = parse(sql, &params(&[("active", true.into())])).unwrap();
    assert!(result.sql.contains("'active'"));
    assert!(!result.sql.contains("'inactive'"));
}

#[test]
fn inline_if_false() {
    let sql = "SELECT /*%if active */ 'active' /*%else */ 'inactive' /*%end*/ as status FROM users";
    let result = parse(sql, &params(&[("active", false.into())])).unwrap();
    assert!(result.sql.contains("'inactive'"));
    assert!(!result.sql.contains("'active'"));
}

#[test]
fn inline_if_without_else() {
    let sql = "SELECT id /*%if show_name */, name /*%end*/ FROM users";
    let result = parse(sql, &params(&[("show_name", true.into())])).unwrap();
    assert!(result.sql.contains(", name"));

    let result = parse(sql, &params(&[("show_name", false.into())])).unwrap();
    assert!(!result.sql.contains(", name"));
}

#[test]
fn inline_elseif_chain() {
    let sql = "SELECT /*%if a */ 'A' /*%elseif b */ 'B' /*%else */ 'C' /*%end*/ as val";

    let result = parse(sql, &params(&[("a", true.into()), ("b", false.into())])).unwrap();
    assert!(result.sql.contains("'A'"));

    let result = parse(sql, &params(&[("a", false.into()), ("b", true.into())])).unwrap();
    assert!(result.sql.contains("'B'"));
    assert!(!result.sql.contains("'A'"));

    let result = parse(sql, &params(&[("a", false.into()), ("b", false.into())])).unwrap();
    assert!(result.sql.contains("'C'"));
}

#[test]
fn inline_selected_branch_param_bound() {
    let sql = "SELECT /*%if a */ /* val1 */'x' /*%else */ /* val2 */'y' /*%end*/ as v";
    let result = parse(
        sql,
        &params(&[
            ("a", true.into()),
            ("val1", "V1".into()),
            ("val2", "V2".into()),
        ]),
    )
    .unwrap();
    assert_eq!(result.params, vec![ParamValue::from("V1")]);
}

#[test]
fn inline_dead_branch_sites_ignored() {
    // The unselected branch's removable parameter must not prune the line.
    let sql = "SELECT id, /*%if pick_a */ /* a */'x' /*%else */ 'const' /*%end*/ as v FROM t";
    let result = parse(
        sql,
        &params(&[("pick_a", false.into()), ("a", ParamValue::Null)]),
    )
    .unwrap();
    assert!(result.sql.contains("'const'"));
    assert!(result.params.is_empty());
}

#[test]
fn inline_compound_condition() {
    let sql = "SELECT /*%if a AND b */ 'both' /*%else */ 'not both' /*%end*/ as status";
    let result = parse(sql, &params(&[("a", true.into()), ("b", true.into())])).unwrap();
    assert!(result.sql.contains("'both'"));

    let result = parse(sql, &params(&[("a", true.into()), ("b", false.into())])).unwrap();
    assert!(result.sql.contains("'not both'"));
}

#[test]
fn inline_two_constructs_on_one_line() {
    let sql = "SELECT /*%if a */ x /*%else */ y /*%end*/ as col1, /*%if b */ m /*%else */ n /*%end*/ as col2";
    let result = parse(sql, &params(&[("a", true.into()), ("b", false.into())])).unwrap();
    assert!(result.sql.contains("x as col1"));
    assert!(result.sql.contains("n as col2"));
}

#[test]
fn inline_unbalanced_errors() {
    let sql = "SELECT /*%if a */ x FROM t";
    let err = parse(sql, &params(&[("a", true.into())])).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Directive);
    assert_eq!(err.line, Some(1));
}
