use super::*;
use crate::labels::METRIC_NAME_LABEL;

fn rule(
    match_labels: &[(&str, &str)],
    match_re: &[(&str, &str)],
    template: Option<&str>,
    continue_matching: bool,
) -> RuleConfig {
    RuleConfig {
        match_labels: match_labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        match_re: match_re
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        template: template.map(str::to_string),
        continue_matching,
    }
}

/// Four rules covering continue, terminal and suppressing behaviour
fn fixture_rules() -> RuleSet {
    let rules = vec![
        rule(
            &[("owner", "team-X")],
            &[("testlabel", "^test:.*$")],
            Some("tmpl_1.{{.shared | escape}}.{{.labels.owner}}"),
            true,
        ),
        rule(
            &[("owner", "team-X"), ("testlabel2", "test:value2")],
            &[],
            Some("tmpl_2.{{.labels.owner}}.{{.shared}}"),
            false,
        ),
        rule(&[("owner", "team-Y")], &[], Some("tmpl_3.{{.labels.owner}}"), false),
        rule(&[("owner", "team-Z")], &[], None, false),
    ];
    let data = BTreeMap::from([("shared".to_string(), Value::String("data.foo".into()))]);
    RuleSet::compile(&rules, &data).unwrap()
}

fn labels(pairs: &[(&str, &str)]) -> LabelSet {
    pairs.iter().copied().collect()
}

#[test]
fn test_continue_rule_is_not_terminal() {
    let outcome = fixture_rules()
        .evaluate(&labels(&[
            (METRIC_NAME_LABEL, "test"),
            ("owner", "team-X"),
            ("testlabel", "test:value"),
        ]))
        .unwrap();
    assert_eq!(outcome.paths, vec!["tmpl_1.data%2Efoo.team-X"]);
    assert!(!outcome.terminal);
}

#[test]
fn test_continue_then_terminal_rule() {
    let outcome = fixture_rules()
        .evaluate(&labels(&[
            (METRIC_NAME_LABEL, "test"),
            ("owner", "team-X"),
            ("testlabel", "test:value"),
            ("testlabel2", "test:value2"),
        ]))
        .unwrap();
    assert_eq!(
        outcome.paths,
        vec!["tmpl_1.data%2Efoo.team-X", "tmpl_2.team-X.data.foo"]
    );
    assert!(outcome.terminal);
}

#[test]
fn test_terminal_rule() {
    let outcome = fixture_rules()
        .evaluate(&labels(&[(METRIC_NAME_LABEL, "test"), ("owner", "team-Y")]))
        .unwrap();
    assert_eq!(outcome.paths, vec!["tmpl_3.team-Y"]);
    assert!(outcome.terminal);
}

#[test]
fn test_suppressing_rule() {
    let outcome = fixture_rules()
        .evaluate(&labels(&[(METRIC_NAME_LABEL, "test"), ("owner", "team-Z")]))
        .unwrap();
    assert!(outcome.paths.is_empty());
    assert!(outcome.terminal);
}

#[test]
fn test_no_match() {
    let outcome = fixture_rules()
        .evaluate(&labels(&[(METRIC_NAME_LABEL, "test"), ("owner", "team-W")]))
        .unwrap();
    assert_eq!(outcome, RuleOutcome::default());
}

#[test]
fn test_regex_is_anchored() {
    let set = RuleSet::compile(
        &[rule(&[], &[("service", "foo|bar")], Some("x"), false)],
        &BTreeMap::new(),
    )
    .unwrap();
    assert_eq!(set.evaluate(&labels(&[("service", "bar")])).unwrap().paths, vec!["x"]);
    assert!(set.evaluate(&labels(&[("service", "foobar")])).unwrap().paths.is_empty());
}

#[test]
fn test_absent_label_matches_empty_string() {
    let set = RuleSet::compile(
        &[
            rule(&[("env", "")], &[], Some("no-env"), false),
            rule(&[], &[("zone", ".*")], Some("any-zone"), false),
        ],
        &BTreeMap::new(),
    )
    .unwrap();
    assert_eq!(set.evaluate(&labels(&[("job", "a")])).unwrap().paths, vec!["no-env"]);
    assert_eq!(
        set.evaluate(&labels(&[("env", "prod")])).unwrap().paths,
        vec!["any-zone"]
    );
}

#[test]
fn test_render_error_aborts_without_output() {
    let set = RuleSet::compile(
        &[
            rule(&[], &[], Some("first"), true),
            rule(&[], &[], Some(r#"test.{{ replace .labels.doesnotexist " " "_" }}"#), true),
        ],
        &BTreeMap::new(),
    )
    .unwrap();
    let err = set.evaluate(&labels(&[(METRIC_NAME_LABEL, "test")])).unwrap_err();
    assert!(matches!(err, PathError::Render { rule: 1, .. }));
}

#[test]
fn test_suppress_after_continue_discards_paths() {
    let set = RuleSet::compile(
        &[
            rule(&[], &[], Some("first"), true),
            rule(&[("owner", "team-Z")], &[], None, false),
        ],
        &BTreeMap::new(),
    )
    .unwrap();
    let outcome = set.evaluate(&labels(&[("owner", "team-Z")])).unwrap();
    assert!(outcome.paths.is_empty());
    assert!(outcome.terminal);
}

#[test]
fn test_rule_without_template_but_continue_adds_nothing() {
    let set = RuleSet::compile(&[rule(&[], &[], None, true)], &BTreeMap::new()).unwrap();
    let outcome = set.evaluate(&labels(&[("a", "b")])).unwrap();
    assert_eq!(outcome, RuleOutcome::default());
}

#[test]
fn test_compile_errors() {
    let err = RuleSet::compile(&[rule(&[], &[("a", "(")], None, false)], &BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, PathError::InvalidRegex { rule: 0, .. }));

    let err = RuleSet::compile(
        &[
            rule(&[], &[], Some("ok"), false),
            rule(&[], &[], Some("{{ if }}"), false),
        ],
        &BTreeMap::new(),
    )
    .unwrap_err();
    assert!(matches!(err, PathError::InvalidTemplate { rule: 1, .. }));
}
