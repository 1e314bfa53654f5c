//! Flat-array forest representation
//!
//! All trees of the ensemble share one set of parallel node arrays and one
//! leaf array. Child references are stored sign-encoded for traversal speed:
//! a positive value is the index of another split node, a value `<= 0` is a
//! leaf whose index is the negation. Node 0 is always the root of the first
//! tree, so it can never appear as a child and `0` unambiguously means leaf 0.
//!
//! The encoding stays private. Callers inspect structure through [`Child`]
//! and [`SplitNode`].

use crate::errors::{ForestError, Result};
use serde::Serialize;

/// Decoded child reference of a split node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    /// Index into the split node arrays
    Node(usize),
    /// Index into the leaf responses
    Leaf(usize),
}

impl Child {
    #[inline]
    pub(crate) fn decode(raw: i32) -> Self {
        if raw > 0 {
            Child::Node(raw as usize)
        } else {
            Child::Leaf(raw.unsigned_abs() as usize)
        }
    }
}

/// One split node, decoded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitNode {
    /// Feature index compared at this node
    pub feature: u32,
    /// Values strictly below the threshold go left
    pub threshold: f32,
    pub left: Child,
    pub right: Child,
}

/// Compiled gradient-boosted forest
///
/// Immutable after construction; share it freely between threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    pub(crate) tree_roots: Vec<i32>,
    pub(crate) cut_features: Vec<u32>,
    pub(crate) thresholds: Vec<f32>,
    pub(crate) left: Vec<i32>,
    pub(crate) right: Vec<i32>,
    pub(crate) leaf_responses: Vec<f32>,
    pub(crate) tree_classes: Vec<i32>,
    pub(crate) class_bias: Vec<f32>,
    pub(crate) n_features_required: usize,
}

/// Serializable overview of a forest
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ForestSummary {
    pub trees: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub classes: usize,
    pub class_bias: Vec<f32>,
    pub features_required: usize,
}

/// Raw parallel arrays, as produced by the builder or the binary decoder.
pub(crate) struct RawForest {
    pub tree_roots: Vec<i32>,
    pub cut_features: Vec<u32>,
    pub thresholds: Vec<f32>,
    pub left: Vec<i32>,
    pub right: Vec<i32>,
    pub leaf_responses: Vec<f32>,
    pub tree_classes: Vec<i32>,
    pub class_bias: Vec<f32>,
}

impl Forest {
    /// Assemble and validate a forest from its raw arrays.
    pub(crate) fn from_raw(raw: RawForest) -> Result<Self> {
        let n_features_required = raw
            .cut_features
            .iter()
            .max()
            .map_or(0, |&max| max as usize + 1);

        let forest = Forest {
            tree_roots: raw.tree_roots,
            cut_features: raw.cut_features,
            thresholds: raw.thresholds,
            left: raw.left,
            right: raw.right,
            leaf_responses: raw.leaf_responses,
            tree_classes: raw.tree_classes,
            class_bias: raw.class_bias,
            n_features_required,
        };
        forest.validate()?;
        Ok(forest)
    }

    /// Number of trees that survived single-leaf folding
    pub fn n_trees(&self) -> usize {
        self.tree_roots.len()
    }

    pub fn n_nodes(&self) -> usize {
        self.cut_features.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.leaf_responses.len()
    }

    /// Number of output classes; binary forests report 2.
    pub fn n_classes(&self) -> usize {
        if self.class_bias.len() > 2 {
            self.class_bias.len()
        } else {
            2
        }
    }

    /// Minimum feature vector length accepted by checked evaluation
    pub fn n_features_required(&self) -> usize {
        self.n_features_required
    }

    /// Per-class baseline, one slot for binary forests.
    pub fn class_bias(&self) -> &[f32] {
        &self.class_bias
    }

    /// Root node index of tree `t`
    pub fn tree_root(&self, t: usize) -> Option<usize> {
        self.tree_roots.get(t).map(|&r| r as usize)
    }

    /// Boosting round that produced tree `t`; modulo `n_classes` it is the target class.
    pub fn tree_class(&self, t: usize) -> Option<usize> {
        self.tree_classes.get(t).map(|&c| c as usize)
    }

    pub fn split(&self, i: usize) -> Option<SplitNode> {
        Some(SplitNode {
            feature: *self.cut_features.get(i)?,
            threshold: self.thresholds[i],
            left: Child::decode(self.left[i]),
            right: Child::decode(self.right[i]),
        })
    }

    pub fn leaf_response(&self, j: usize) -> Option<f32> {
        self.leaf_responses.get(j).copied()
    }

    pub fn summary(&self) -> ForestSummary {
        ForestSummary {
            trees: self.n_trees(),
            nodes: self.n_nodes(),
            leaves: self.n_leaves(),
            classes: self.n_classes(),
            class_bias: self.class_bias.clone(),
            features_required: self.n_features_required,
        }
    }

    /// Check every structural invariant the evaluator relies on.
    ///
    /// Child node references must point strictly forward, which rules out
    /// cycles and guarantees that every traversal terminates.
    pub fn validate(&self) -> Result<()> {
        let n_nodes = self.n_nodes();
        let n_leaves = self.n_leaves();

        if self.thresholds.len() != n_nodes
            || self.left.len() != n_nodes
            || self.right.len() != n_nodes
        {
            return Err(corrupt("node arrays have different lengths"));
        }
        if self.tree_classes.len() != self.tree_roots.len() {
            return Err(corrupt("tree roots and tree classes have different lengths"));
        }
        if matches!(self.class_bias.len(), 0 | 2) {
            return Err(corrupt(format!(
                "{} class bias slots; expected 1 (binary) or at least 3",
                self.class_bias.len()
            )));
        }

        for (t, (&root, &class)) in self.tree_roots.iter().zip(&self.tree_classes).enumerate() {
            if root < 0 || root as usize >= n_nodes {
                return Err(corrupt(format!("tree {t} has root {root} outside {n_nodes} nodes")));
            }
            if class < 0 {
                return Err(corrupt(format!("tree {t} has negative class slot {class}")));
            }
        }

        for (i, (&l, &r)) in self.left.iter().zip(&self.right).enumerate() {
            for raw in [l, r] {
                match Child::decode(raw) {
                    Child::Node(c) if c >= n_nodes || c <= i => {
                        return Err(corrupt(format!("node {i} references node {c} out of order")));
                    }
                    Child::Leaf(j) if j >= n_leaves => {
                        return Err(corrupt(format!(
                            "node {i} references leaf {j} but the forest has {n_leaves} leaves"
                        )));
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

fn corrupt(message: impl Into<String>) -> ForestError {
    ForestError::CorruptModel(message.into())
}
