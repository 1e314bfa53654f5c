//! XGBoost text dump parser
//!
//! Reads the line-oriented output of `Booster.dump_model(..., dump_format="text")`:
//!
//! ```text
//! booster[0]:
//! 0:[f0<0.5] yes=1,no=2,missing=1
//! 	1:leaf=-0.1
//! 	2:leaf=0.2
//! booster[1]:
//! 0:leaf=0.05
//! xgboost_version=2.0.3
//! ```
//!
//! The scanner is substring based, not a tokenizer. A bracketed integer starts
//! a new round, a bracketed `<name><<cut>` is a split node, a `leaf=` line is
//! a leaf and everything else is ignored. The `xgboost_version=` line is
//! mandatory because the bias convention depends on it.

use crate::builder::ForestBuilder;
use crate::compat::base_score_offset;
use crate::errors::{ForestError, Result};
use crate::forest::Forest;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const VERSION_KEY: &str = "xgboost_version=";

/// Parse a dump whose feature names must all appear in `features`.
///
/// Split nodes are bound to the position of their feature in the list. An
/// empty list means no schema: features are numbered in first-seen order, as
/// [`parse_discovering_features`] does.
pub fn parse_with_fixed_features<R: BufRead>(
    reader: R,
    features: &[String],
    n_classes: usize,
) -> Result<Forest> {
    let index = if features.is_empty() {
        FeatureIndex::discovering()
    } else {
        FeatureIndex::fixed(features)?
    };
    let (forest, _) = parse(reader, index, n_classes)?;
    Ok(forest)
}

/// Parse a dump, numbering features in the order they are first seen.
pub fn parse_discovering_features<R: BufRead>(
    reader: R,
    n_classes: usize,
) -> Result<(Forest, Vec<String>)> {
    let (forest, index) = parse(reader, FeatureIndex::discovering(), n_classes)?;
    Ok((forest, index.names))
}

/// [`parse_with_fixed_features`] on a file.
pub fn load_text<P: AsRef<Path>>(path: P, features: &[String], n_classes: usize) -> Result<Forest> {
    parse_with_fixed_features(open(path.as_ref())?, features, n_classes)
}

/// [`parse_discovering_features`] on a file.
pub fn load_text_discovering<P: AsRef<Path>>(
    path: P,
    n_classes: usize,
) -> Result<(Forest, Vec<String>)> {
    parse_discovering_features(open(path.as_ref())?, n_classes)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(ForestError::FileNotFound(path.to_path_buf()));
    }
    Ok(BufReader::new(File::open(path)?))
}

/// Feature name to column binding, either fixed up front or grown on demand.
struct FeatureIndex {
    names: Vec<String>,
    lookup: HashMap<String, u32>,
    fixed: bool,
}

impl FeatureIndex {
    fn fixed(features: &[String]) -> Result<Self> {
        let lookup = features
            .iter()
            .enumerate()
            .map(|(i, name)| Ok((name.clone(), feature_index(i)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self {
            names: features.to_vec(),
            lookup,
            fixed: true,
        })
    }

    fn discovering() -> Self {
        Self {
            names: Vec::new(),
            lookup: HashMap::new(),
            fixed: false,
        }
    }

    fn resolve(&mut self, name: &str, line: usize) -> Result<u32> {
        if let Some(&index) = self.lookup.get(name) {
            return Ok(index);
        }
        if self.fixed {
            return Err(ForestError::UnknownFeature {
                name: name.to_string(),
                line,
            });
        }
        let index = feature_index(self.names.len())?;
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), index);
        Ok(index)
    }
}

fn feature_index(position: usize) -> Result<u32> {
    u32::try_from(position).map_err(|_| {
        ForestError::CorruptModel(format!(
            "feature index {position} exceeds the 32-bit feature space"
        ))
    })
}

fn parse<R: BufRead>(
    reader: R,
    mut features: FeatureIndex,
    n_classes: usize,
) -> Result<(Forest, FeatureIndex)> {
    let mut builder = ForestBuilder::new(n_classes)?;
    let mut version: Option<String> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let number = i + 1;

        if let Some(pos) = line.find(VERSION_KEY) {
            version = Some(line[pos + VERSION_KEY.len()..].trim().to_string());
        } else if let Some(open) = line.find('[') {
            let close = line[open..]
                .find(']')
                .map(|offset| open + offset)
                .ok_or_else(|| ForestError::malformed(number, "unterminated `[`"))?;
            let payload = &line[open + 1..close];

            if is_integer(payload) {
                if builder.tree_has_leaves() {
                    builder.finish_tree()?;
                }
            } else {
                let split = parse_split(&line, payload, close, number)?;
                let feature = features.resolve(split.feature, number)?;
                builder.push_split(split.id, feature, split.threshold, split.yes, split.no)?;
            }
        } else if let Some(pos) = line.find("leaf=") {
            let id = leading_id(&line, number)?;
            let (value, _) = number_after::<f32>(&line[pos..], "leaf=")
                .ok_or_else(|| ForestError::malformed(number, "leaf value is not a number"))?;
            builder.push_leaf(id, value)?;
        }
    }

    let version = version
        .filter(|v| !v.is_empty())
        .ok_or(ForestError::MissingVersion)?;

    builder.finish_tree()?;
    let rounds = builder.rounds();
    let forest = builder.finish(base_score_offset(&version))?;

    info!(
        version = %version,
        rounds,
        trees = forest.n_trees(),
        nodes = forest.n_nodes(),
        leaves = forest.n_leaves(),
        classes = forest.n_classes(),
        features = features.names.len(),
        "compiled forest from text dump"
    );

    Ok((forest, features))
}

struct SplitLine<'a> {
    id: i32,
    feature: &'a str,
    threshold: f32,
    yes: i32,
    no: i32,
}

/// `<id>:[<feature><<cut>] yes=<id>,no=<id>[,...]`
fn parse_split<'a>(line: &str, payload: &'a str, close: usize, number: usize) -> Result<SplitLine<'a>> {
    let id = leading_id(line, number)?;
    let (feature, cut) = payload.split_once('<').ok_or_else(|| {
        ForestError::malformed(number, format!("unsupported split condition `{payload}`"))
    })?;
    let threshold = cut.trim().parse::<f32>().map_err(|_| {
        ForestError::malformed(number, format!("cut value `{cut}` is not a number"))
    })?;

    let attrs = &line[close + 1..];
    let (yes, after_yes) = number_after::<i32>(attrs, "yes=")
        .ok_or_else(|| ForestError::malformed(number, "split node without `yes=`"))?;
    let (no, _) = number_after::<i32>(&attrs[after_yes..], "no=")
        .ok_or_else(|| ForestError::malformed(number, "split node without `no=`"))?;

    Ok(SplitLine {
        id,
        feature,
        threshold,
        yes,
        no,
    })
}

/// Whole payload is an optionally signed decimal integer.
fn is_integer(s: &str) -> bool {
    s.parse::<i64>().is_ok()
}

/// Node id at the start of the line, after indentation.
fn leading_id(line: &str, number: usize) -> Result<i32> {
    let trimmed = line.trim_start();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed[..end]
        .parse()
        .map_err(|_| ForestError::malformed(number, "line does not start with a node id"))
}

/// Parse the value following `key`, up to the next `,` or whitespace.
///
/// Returns the value and the byte offset just past it.
fn number_after<T: FromStr>(s: &str, key: &str) -> Option<(T, usize)> {
    let start = s.find(key)? + key.len();
    let rest = &s[start..];
    let len = rest
        .find(|c: char| c == ',' || c.is_whitespace())
        .unwrap_or(rest.len());
    let value = rest[..len].parse().ok()?;
    Some((value, start + len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::Child;

    const STUMP: &str = "booster[0]:\n0:[f1<0.5] yes=1,no=2,missing=1\n\t1:leaf=-0.25\n\t2:leaf=0.75\nxgboost_version=1.7.6\n";

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_a_single_stump() {
        let (forest, features) = parse_discovering_features(STUMP.as_bytes(), 2).unwrap();
        assert_eq!(features, names(&["f1"]));
        assert_eq!(forest.n_trees(), 1);
        let root = forest.split(0).unwrap();
        assert_eq!(root.feature, 0);
        assert_eq!(root.threshold, 0.5);
        assert_eq!(root.left, Child::Leaf(0));
        assert_eq!(root.right, Child::Leaf(1));
        assert_eq!(forest.class_bias(), &[0.0]);
    }

    #[test]
    fn fixed_schema_binds_by_position() {
        let forest =
            parse_with_fixed_features(STUMP.as_bytes(), &names(&["f0", "f1"]), 2).unwrap();
        assert_eq!(forest.split(0).unwrap().feature, 1);
        assert_eq!(forest.n_features_required(), 2);
    }

    #[test]
    fn unknown_feature_in_fixed_schema_fails() {
        let err = parse_with_fixed_features(STUMP.as_bytes(), &names(&["f0"]), 2).unwrap_err();
        match err {
            ForestError::UnknownFeature { name, line } => {
                assert_eq!(name, "f1");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_schema_discovers() {
        let forest = parse_with_fixed_features(STUMP.as_bytes(), &[], 2).unwrap();
        assert_eq!(forest.split(0).unwrap().feature, 0);
        assert_eq!(forest.n_features_required(), 1);
    }

    #[test]
    fn missing_version_is_rejected() {
        let dump = "booster[0]:\n0:leaf=0.5\n";
        let err = parse_discovering_features(dump.as_bytes(), 2).unwrap_err();
        assert!(matches!(err, ForestError::MissingVersion));
    }

    #[test]
    fn empty_version_is_rejected() {
        let dump = "booster[0]:\n0:leaf=0.5\nxgboost_version=\n";
        let err = parse_discovering_features(dump.as_bytes(), 2).unwrap_err();
        assert!(matches!(err, ForestError::MissingVersion));
    }

    #[test]
    fn split_without_no_is_malformed() {
        let dump = "booster[0]:\n0:[f0<1] yes=1\n1:leaf=0\nxgboost_version=1\n";
        let err = parse_discovering_features(dump.as_bytes(), 2).unwrap_err();
        assert!(matches!(err, ForestError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn split_without_yes_is_malformed() {
        let dump = "booster[0]:\n0:[f0<1] no=1\n1:leaf=0\nxgboost_version=1\n";
        let err = parse_discovering_features(dump.as_bytes(), 2).unwrap_err();
        assert!(err.to_string().contains("yes="));
    }

    #[test]
    fn modern_version_shifts_bias() {
        let dump = STUMP.replace("1.7.6", "3.0.2");
        let (forest, _) = parse_discovering_features(dump.as_bytes(), 2).unwrap();
        assert_eq!(forest.class_bias(), &[0.5]);
    }

    #[test]
    fn stats_and_indentation_are_tolerated() {
        let dump = "booster[0]:\n0:[f0<-1.5e-3] yes=1,no=2,missing=2,gain=12.5,cover=100\n\t\t1:leaf=0.125,cover=40\n\t\t2:leaf=-0.125,cover=60\nxgboost_version=2.1.0\n";
        let (forest, _) = parse_discovering_features(dump.as_bytes(), 2).unwrap();
        assert_eq!(forest.split(0).unwrap().threshold, -1.5e-3);
        assert_eq!(forest.leaf_response(0), Some(0.125));
        assert_eq!(forest.leaf_response(1), Some(-0.125));
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let dump = format!("# exported model\n\n{STUMP}base_score=0.5\n");
        let (forest, _) = parse_discovering_features(dump.as_bytes(), 2).unwrap();
        assert_eq!(forest.n_trees(), 1);
    }

    #[test]
    fn helpers_scan_like_the_dump_format() {
        assert!(is_integer("12"));
        assert!(is_integer("-3"));
        assert!(!is_integer("f0<1"));
        assert!(!is_integer(""));
        assert_eq!(leading_id("\t\t17:leaf=1", 1).unwrap(), 17);
        assert!(leading_id("leaf=1", 1).is_err());
        assert_eq!(number_after::<i32>("yes=3,no=4", "no="), Some((4, 10)));
        assert_eq!(number_after::<f32>("x leaf=0.5 y", "leaf="), Some((0.5, 10)));
    }

    #[test]
    fn feature_positions_fit_the_cut_array() {
        assert_eq!(feature_index(7).unwrap(), 7);
        assert_eq!(feature_index(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_feature_position_is_corrupt() {
        let err = feature_index(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, ForestError::CorruptModel(_)));
        assert!(err.to_string().contains("32-bit feature space"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_text("/nonexistent/model.txt", &[], 2).unwrap_err();
        assert!(matches!(err, ForestError::FileNotFound(_)));
    }
}
