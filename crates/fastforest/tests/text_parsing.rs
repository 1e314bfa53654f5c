use fastforest::{parse_discovering_features, ErrorKind, ForestError};

fn parse(dump: &str) -> Result<fastforest::Forest, ForestError> {
    parse_discovering_features(dump.as_bytes(), 2).map(|(forest, _)| forest)
}

#[test]
fn single_leaf_round_folds_into_bias() {
    let dump = "\
booster[0]:
0:[f0<1] yes=1,no=2,missing=1
\t1:leaf=0.5
\t2:leaf=-0.5
booster[1]:
0:leaf=0.125
xgboost_version=1.5.0
";
    let forest = parse(dump).unwrap();
    assert_eq!(forest.n_trees(), 1);
    assert_eq!(forest.n_leaves(), 2);
    assert_eq!(forest.class_bias(), &[0.125]);
    assert_eq!(forest.evaluate(&[0.0]), 0.625);
}

#[test]
fn folded_leaf_and_modern_shift_add_up() {
    let dump = "booster[0]:\n0:leaf=0.25\nxgboost_version=2.0.0\n";
    let forest = parse(dump).unwrap();
    assert_eq!(forest.n_trees(), 0);
    assert_eq!(forest.n_nodes(), 0);
    assert_eq!(forest.class_bias(), &[0.25]);
    assert_eq!(forest.evaluate(&[]), 0.25);

    let modern = parse(&dump.replace("2.0.0", "3.0.0")).unwrap();
    assert_eq!(modern.class_bias(), &[0.75]);
}

#[test]
fn node_ids_are_relocated_per_tree() {
    // sparse ids, reused across trees
    let dump = "\
booster[0]:
0:[a<0] yes=3,no=4,missing=3
\t3:leaf=1
\t4:leaf=2
booster[1]:
0:[b<0] yes=1,no=2,missing=1
\t1:[a<5] yes=5,no=6,missing=5
\t\t5:leaf=10
\t\t6:leaf=20
\t2:leaf=30
xgboost_version=1.0.0
";
    let (forest, names) = parse_discovering_features(dump.as_bytes(), 2).unwrap();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(forest.n_nodes(), 3);
    assert_eq!(forest.n_leaves(), 5);
    assert_eq!(forest.tree_root(1), Some(1));

    assert_eq!(forest.evaluate(&[-1.0, -1.0]), 1.0 + 10.0);
    assert_eq!(forest.evaluate(&[6.0, -1.0]), 2.0 + 20.0);
    assert_eq!(forest.evaluate(&[0.0, 0.0]), 2.0 + 30.0);
}

#[test]
fn dangling_child_is_corrupt() {
    let dump = "booster[0]:\n0:[f0<1] yes=1,no=9,missing=1\n\t1:leaf=0\nxgboost_version=1\n";
    let err = parse(dump).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptModel);
    assert!(err.to_string().contains("inconsistent node structure"));
}

#[test]
fn round_without_leaves_is_corrupt() {
    let dump = "booster[0]:\n0:[f0<1] yes=1,no=2,missing=1\nbooster[1]:\n0:leaf=1\nxgboost_version=1\n";
    let err = parse(dump).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptModel);
}

#[test]
fn missing_version_is_input_error() {
    let dump = "booster[0]:\n0:[f0<1] yes=1,no=2,missing=1\n\t1:leaf=0\n\t2:leaf=1\n";
    let err = parse(dump).unwrap_err();
    assert!(matches!(err, ForestError::MissingVersion));
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn non_numeric_leaf_reports_line() {
    let dump = "booster[0]:\n0:[f0<1] yes=1,no=2,missing=1\n\t1:leaf=abc\n\t2:leaf=1\nxgboost_version=1\n";
    match parse(dump).unwrap_err() {
        ForestError::MalformedLine { line, .. } => assert_eq!(line, 3),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unsupported_condition_is_malformed() {
    let dump = "booster[0]:\n0:[f0] yes=1,no=2,missing=1\n\t1:leaf=0\n\t2:leaf=1\nxgboost_version=1\n";
    assert!(matches!(
        parse(dump),
        Err(ForestError::MalformedLine { line: 2, .. })
    ));
}

#[test]
fn single_class_is_rejected_up_front() {
    let dump = "booster[0]:\n0:leaf=1\nxgboost_version=1\n";
    assert!(matches!(
        parse_discovering_features(dump.as_bytes(), 1),
        Err(ForestError::InvalidClassCount(1))
    ));
}

#[test]
fn dump_without_rounds_is_corrupt() {
    let err = parse("xgboost_version=1.7.6\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptModel);
}
