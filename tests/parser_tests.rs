//! Integration tests for genders database parsing

use genders_core::*;

const CLUSTER: &str = "\
# Example cluster
@common   os=rhel9,ntp=mgmt1
@compute  @common,compute,ib=%n-ib

mgmt1     mgmt,@common,pdsh_all_skip
login[1-2] login,@common
n1,n2,n3  @compute
n[4-6]    @compute,rack=2
n1        rack=1
";

fn parse(text: &str) -> Snapshot {
    Snapshot::parse(text, &GendersConfig::default()).unwrap()
}

#[test]
fn test_declaration_order_with_ranges() {
    let snap = parse("n1 a\nn2 a\nn3 a\nn[4-6] a\n");
    assert_eq!(
        snap.nodes_with(None, None).unwrap(),
        vec!["n1", "n2", "n3", "n4", "n5", "n6"]
    );
}

#[test]
fn test_cluster_file() {
    let snap = parse(CLUSTER);
    assert_eq!(
        snap.nodes_with(None, None).unwrap(),
        vec!["mgmt1", "login1", "login2", "n1", "n2", "n3", "n4", "n5", "n6"]
    );
    assert_eq!(
        snap.nodes_with(Some("compute"), None).unwrap(),
        vec!["n1", "n2", "n3", "n4", "n5", "n6"]
    );
    assert_eq!(snap.nodes_with(Some("rack"), Some("2")).unwrap(), vec!["n4", "n5", "n6"]);
    assert_eq!(snap.testattr("n5", "ib").unwrap(), Some(Some("n5-ib".to_string())));
    assert_eq!(snap.testattr("n1", "rack").unwrap(), Some(Some("1".to_string())));
    assert!(snap.is_attr_val("ntp", "mgmt1"));
}

#[test]
fn test_stats_are_informational() {
    let stats = parse(CLUSTER).stats();
    assert_eq!(stats.num_nodes, 9);
    // mgmt, os, ntp, pdsh_all_skip, login, compute, ib, rack
    assert_eq!(stats.num_attrs, 8);
    assert_eq!(stats.max_attrs_per_node, 5);
    assert_eq!(stats.max_node_len, 6);
    assert_eq!(stats.max_attr_len, "pdsh_all_skip".len());
    assert_eq!(stats.max_val_len, "mgmt1".len());
}

#[test]
fn test_value_distinction() {
    let snap = parse("n1 a\nn2 b=\n");
    assert!(snap.is_attr("a"));
    assert!(!snap.is_attr_val("a", ""));
    assert!(snap.is_attr_val("b", ""));
    assert_eq!(snap.testattr("n1", "a").unwrap(), Some(None));
    assert_eq!(snap.testattr("n2", "b").unwrap(), Some(Some(String::new())));
}

#[test]
fn test_parse_twice_is_identical() {
    let first = parse(CLUSTER);
    let second = parse(CLUSTER);
    assert_eq!(first.stats(), second.stats());
    assert_eq!(
        first.nodes_with(None, None).unwrap(),
        second.nodes_with(None, None).unwrap()
    );
    for node in first.nodes_with(None, None).unwrap() {
        assert_eq!(first.getattr(&node).unwrap(), second.getattr(&node).unwrap());
    }
}

#[test]
fn test_group_cycle_is_fatal() {
    let err = Snapshot::parse("@G1 a,@G2\n@G2 b,@G1\nn1 @G1\n", &GendersConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CycleDetected);
}

#[test]
fn test_errors_report_line() {
    let cases = [
        ("n1 a\nn2 a,@nope\n", 2, ErrorKind::ParseSyntax),
        ("n1 a\n\n# c\nn[3-1] a\n", 4, ErrorKind::ParseSyntax),
        ("n1 a b c\n", 1, ErrorKind::ParseSyntax),
        ("n1 a\nn1 a\n", 2, ErrorKind::ParseSyntax),
    ];

    for (text, line, kind) in cases {
        let err = Snapshot::parse(text, &GendersConfig::default()).unwrap_err();
        assert_eq!(err.kind(), kind, "{:?}", text);
        match err {
            GendersError::ParseSyntax { line: got, .. } => assert_eq!(got, line, "{:?}", text),
            other => panic!("unexpected error {:?}", other),
        }
    }
}

#[test]
fn test_value_overflow() {
    let long = "v".repeat(200);
    let err = Snapshot::parse(&format!("n1 a={}\n", long), &GendersConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overflow);
}

#[test]
fn test_check_without_install() {
    let stats = check("n[1-3] a\n", &GendersConfig::default()).unwrap();
    assert_eq!(stats.num_nodes, 3);
    assert!(check("n[1-3 a\n", &GendersConfig::default()).is_err());
}

#[test]
fn test_attribute_name_overflow() {
    let config = GendersConfig::default().with_max_attr_len(Some(4));
    let err = Snapshot::parse("n1 rack=1\nn2 rack=2,chassis\n", &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overflow);
    match err {
        GendersError::Overflow { line, what, name, len, max } => {
            assert_eq!((line, what, name.as_str(), len, max), (2, "attribute", "chassis", 7, 4));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_value_limit_applies_after_node_substitution() {
    let config = GendersConfig::default().with_max_val_len(Some(5));
    let snap = Snapshot::parse("n[1-9] ib=%n-ib\n", &config).unwrap();
    assert_eq!(snap.testattr("n9", "ib").unwrap(), Some(Some("n9-ib".to_string())));

    let err = Snapshot::parse("n[9-10] ib=%n-ib\n", &config).unwrap_err();
    match err {
        GendersError::Overflow { line, name, len, max, .. } => {
            assert_eq!((line, name.as_str(), len, max), (1, "ib=n10-ib", 6, 5));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_doubling_group_chain_fails_fast() {
    let mut text = String::from("@g0 a\n");
    for i in 1..=40 {
        text.push_str(&format!("@g{} @g{},@g{}\n", i, i - 1, i - 1));
    }
    let err = Snapshot::parse(&text, &GendersConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseSyntax);

    let last_wins = GendersConfig::default().with_duplicate_policy(DuplicatePolicy::LastWins);
    text.push_str("n1 @g40\n");
    let snap = Snapshot::parse(&text, &last_wins).unwrap();
    assert_eq!(snap.getattr("n1").unwrap(), vec![("a".to_string(), None)]);
}

#[test]
fn test_deep_group_chain_loads() {
    let mut text = String::new();
    for i in 0..100_000 {
        text.push_str(&format!("@g{} @g{}\n", i, i + 1));
    }
    text.push_str("@g100000 a\nn1 @g0\n");
    let snap = Snapshot::parse(&text, &GendersConfig::default()).unwrap();
    assert_eq!(snap.query("a").unwrap(), vec!["n1"]);
}

#[test]
fn test_range_overflow_reports_count() {
    let config = GendersConfig::default().with_max_range_size(10);
    let err = Snapshot::parse("n1 a\nn[1-12],n[20-21] a\n", &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overflow);
    assert!(matches!(
        err,
        GendersError::RangeOverflow { line: 2, count: 12, max: 10, .. }
    ));
}
