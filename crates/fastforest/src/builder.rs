//! Incremental forest construction, one boosting round at a time.
//!
//! Producers push the split nodes and leaves of a tree in any order, naming
//! them by their tree-local ids, then call [`ForestBuilder::finish_tree`].
//! That step resolves the staged child ids, registers the tree root and, for
//! rounds that consist of a single leaf, folds the leaf value into the class
//! bias instead of keeping a degenerate tree around.

use crate::errors::{ForestError, Result};
use crate::forest::{Forest, RawForest};
use crate::index_map::{correct_indices, IndexMap};
use tracing::debug;

/// What happened to a round when it was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOutcome {
    /// Kept as a tree rooted at this global node index
    Split { root: usize },
    /// Single leaf added to this class bias slot
    Folded { class_slot: usize },
}

/// Accumulates trees into the flat forest arrays
#[derive(Debug)]
pub struct ForestBuilder {
    n_classes: usize,
    tree_roots: Vec<i32>,
    cut_features: Vec<u32>,
    thresholds: Vec<f32>,
    left: Vec<i32>,
    right: Vec<i32>,
    leaf_responses: Vec<f32>,
    tree_classes: Vec<i32>,
    class_bias: Vec<f32>,
    index: IndexMap,
    /// First global node index of the tree being built
    tree_node_start: usize,
    /// First global leaf index of the tree being built
    tree_leaf_start: usize,
    rounds: usize,
}

impl ForestBuilder {
    /// Start an empty forest; `n_classes == 2` means a binary model with one bias slot.
    pub fn new(n_classes: usize) -> Result<Self> {
        if n_classes < 2 {
            return Err(ForestError::InvalidClassCount(n_classes));
        }
        let bias_slots = if n_classes == 2 { 1 } else { n_classes };
        Ok(Self {
            n_classes,
            tree_roots: Vec::new(),
            cut_features: Vec::new(),
            thresholds: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            leaf_responses: Vec::new(),
            tree_classes: Vec::new(),
            class_bias: vec![0.0; bias_slots],
            index: IndexMap::new(),
            tree_node_start: 0,
            tree_leaf_start: 0,
            rounds: 0,
        })
    }

    /// Append a split node. `yes`/`no` are tree-local ids, resolved when the tree ends.
    pub fn push_split(
        &mut self,
        id: i32,
        feature: u32,
        threshold: f32,
        yes: i32,
        no: i32,
    ) -> Result<usize> {
        let global = self.cut_features.len();
        self.index.insert_node(id, global)?;
        self.cut_features.push(feature);
        self.thresholds.push(threshold);
        self.left.push(yes);
        self.right.push(no);
        Ok(global)
    }

    /// Append a leaf with its response value.
    pub fn push_leaf(&mut self, id: i32, response: f32) -> Result<usize> {
        let global = self.leaf_responses.len();
        self.index.insert_leaf(id, global)?;
        self.leaf_responses.push(response);
        Ok(global)
    }

    /// Whether the current tree has recorded at least one leaf
    pub fn tree_has_leaves(&self) -> bool {
        self.leaf_responses.len() > self.tree_leaf_start
    }

    /// Number of boosting rounds finalized so far, folded ones included
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Finalize the current tree and prepare for the next round.
    pub fn finish_tree(&mut self) -> Result<TreeOutcome> {
        let round = self.rounds;
        let n_nodes = self.cut_features.len() - self.tree_node_start;
        let n_leaves = self.leaf_responses.len() - self.tree_leaf_start;
        if n_leaves == 0 {
            return Err(ForestError::CorruptModel(format!(
                "boosting round {round} has no leaves"
            )));
        }

        correct_indices(&mut self.left[self.tree_node_start..], &self.index)?;
        correct_indices(&mut self.right[self.tree_node_start..], &self.index)?;

        let outcome = if n_nodes > 0 {
            let root = self.tree_node_start;
            self.tree_roots.push(to_i32(root)?);
            self.tree_classes.push(to_i32(round)?);
            TreeOutcome::Split { root }
        } else {
            if n_leaves != 1 {
                return Err(ForestError::CorruptModel(format!(
                    "boosting round {round} has {n_leaves} leaves but no split node"
                )));
            }
            let class_slot = round % self.class_bias.len();
            if let Some(value) = self.leaf_responses.pop() {
                self.class_bias[class_slot] += value;
            }
            TreeOutcome::Folded { class_slot }
        };

        debug!(
            round,
            nodes = n_nodes,
            leaves = n_leaves,
            outcome = ?outcome,
            "finalized tree"
        );

        self.rounds += 1;
        self.index.clear();
        self.tree_node_start = self.cut_features.len();
        self.tree_leaf_start = self.leaf_responses.len();
        Ok(outcome)
    }

    /// Check the round count against the classes, add `bias_offset` to every
    /// class bias slot and produce the validated forest.
    pub fn finish(mut self, bias_offset: f32) -> Result<Forest> {
        if self.index.node_count() > 0 || self.index.leaf_count() > 0 {
            return Err(ForestError::CorruptModel(
                "last tree was never finalized".to_string(),
            ));
        }
        if self.n_classes > 2 && self.rounds % self.n_classes != 0 {
            return Err(ForestError::CorruptModel(format!(
                "forest round count {} incompatible with class count {}",
                self.rounds, self.n_classes
            )));
        }

        for bias in &mut self.class_bias {
            *bias += bias_offset;
        }

        Forest::from_raw(RawForest {
            tree_roots: self.tree_roots,
            cut_features: self.cut_features,
            thresholds: self.thresholds,
            left: self.left,
            right: self.right,
            leaf_responses: self.leaf_responses,
            tree_classes: self.tree_classes,
            class_bias: self.class_bias,
        })
    }
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        ForestError::CorruptModel(format!("{value} exceeds the 32-bit index space"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::Child;

    /// `f0 < 1.0 ? (f1 < 2.0 ? a : b) : c` with sparse, out-of-order ids.
    fn push_depth_two(builder: &mut ForestBuilder, a: f32, b: f32, c: f32) {
        builder.push_split(0, 0, 1.0, 1, 2).unwrap();
        builder.push_split(1, 1, 2.0, 3, 4).unwrap();
        builder.push_leaf(3, a).unwrap();
        builder.push_leaf(4, b).unwrap();
        builder.push_leaf(2, c).unwrap();
    }

    #[test]
    fn rejects_fewer_than_two_classes() {
        assert!(matches!(
            ForestBuilder::new(1),
            Err(ForestError::InvalidClassCount(1))
        ));
    }

    #[test]
    fn second_tree_is_offset_by_first() {
        let mut builder = ForestBuilder::new(2).unwrap();
        push_depth_two(&mut builder, 1.0, 2.0, 3.0);
        assert_eq!(builder.finish_tree().unwrap(), TreeOutcome::Split { root: 0 });
        push_depth_two(&mut builder, 4.0, 5.0, 6.0);
        assert_eq!(builder.finish_tree().unwrap(), TreeOutcome::Split { root: 2 });

        let forest = builder.finish(0.0).unwrap();
        assert_eq!(forest.n_trees(), 2);
        assert_eq!(forest.n_nodes(), 4);
        assert_eq!(forest.n_leaves(), 6);

        let root = forest.split(2).unwrap();
        assert_eq!(root.left, Child::Node(3));
        assert_eq!(root.right, Child::Leaf(5));
        let inner = forest.split(3).unwrap();
        assert_eq!(inner.left, Child::Leaf(3));
        assert_eq!(inner.right, Child::Leaf(4));
        assert_eq!(forest.tree_class(1), Some(1));
    }

    #[test]
    fn single_leaf_round_folds_into_bias() {
        let mut builder = ForestBuilder::new(2).unwrap();
        push_depth_two(&mut builder, 1.0, 2.0, 3.0);
        builder.finish_tree().unwrap();
        builder.push_leaf(0, 0.75).unwrap();
        assert_eq!(
            builder.finish_tree().unwrap(),
            TreeOutcome::Folded { class_slot: 0 }
        );
        assert_eq!(builder.rounds(), 2);

        let forest = builder.finish(0.0).unwrap();
        assert_eq!(forest.n_trees(), 1);
        assert_eq!(forest.n_leaves(), 3);
        assert_eq!(forest.class_bias(), &[0.75]);
    }

    #[test]
    fn folded_rounds_still_advance_class_slot() {
        let mut builder = ForestBuilder::new(3).unwrap();
        builder.push_leaf(0, 0.1).unwrap();
        assert_eq!(
            builder.finish_tree().unwrap(),
            TreeOutcome::Folded { class_slot: 0 }
        );
        push_depth_two(&mut builder, 1.0, 2.0, 3.0);
        builder.finish_tree().unwrap();
        builder.push_leaf(0, 0.3).unwrap();
        assert_eq!(
            builder.finish_tree().unwrap(),
            TreeOutcome::Folded { class_slot: 2 }
        );

        let forest = builder.finish(0.0).unwrap();
        assert_eq!(forest.n_trees(), 1);
        assert_eq!(forest.tree_class(0), Some(1));
        assert_eq!(forest.class_bias(), &[0.1, 0.0, 0.3]);
    }

    #[test]
    fn round_count_must_match_classes() {
        let mut builder = ForestBuilder::new(3).unwrap();
        push_depth_two(&mut builder, 1.0, 2.0, 3.0);
        builder.finish_tree().unwrap();
        push_depth_two(&mut builder, 1.0, 2.0, 3.0);
        builder.finish_tree().unwrap();
        let err = builder.finish(0.0).unwrap_err();
        assert!(err.to_string().contains("incompatible with class count 3"));
    }

    #[test]
    fn bias_offset_applies_to_every_slot() {
        let mut builder = ForestBuilder::new(3).unwrap();
        for _ in 0..3 {
            push_depth_two(&mut builder, 1.0, 2.0, 3.0);
            builder.finish_tree().unwrap();
        }
        let forest = builder.finish(0.5).unwrap();
        assert_eq!(forest.class_bias(), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn dangling_child_is_corrupt() {
        let mut builder = ForestBuilder::new(2).unwrap();
        builder.push_split(0, 0, 1.0, 1, 9).unwrap();
        builder.push_leaf(1, 1.0).unwrap();
        let err = builder.finish_tree().unwrap_err();
        assert!(matches!(err, ForestError::CorruptModel(_)));
    }

    #[test]
    fn unfinished_tree_is_rejected() {
        let mut builder = ForestBuilder::new(2).unwrap();
        builder.push_leaf(0, 1.0).unwrap();
        assert!(builder.finish(0.0).is_err());
    }

    #[test]
    fn leafless_round_is_rejected() {
        let mut builder = ForestBuilder::new(2).unwrap();
        assert!(builder.finish_tree().is_err());
    }
}
