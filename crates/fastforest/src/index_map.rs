//! Tree-local id to global index bookkeeping.
//!
//! Text dumps number nodes per tree, sparsely, and use one id space for split
//! nodes and leaves. While a tree is being read, every id is recorded here
//! with its position in the forest-wide arrays. When the tree ends its staged
//! child references are rewritten with [`correct_indices`]: split nodes become
//! their global node index, leaves become the negated global leaf index.

use crate::errors::{ForestError, Result};
use std::collections::HashMap;

/// Id maps for the tree currently under construction.
#[derive(Debug, Default, Clone)]
pub struct IndexMap {
    nodes: HashMap<i32, i32>,
    leaves: HashMap<i32, i32>,
}

impl IndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that textual id `id` is split node `global` in the forest arrays.
    pub fn insert_node(&mut self, id: i32, global: usize) -> Result<()> {
        let global = to_i32(global)?;
        if self.leaves.contains_key(&id) || self.nodes.insert(id, global).is_some() {
            return Err(duplicate(id));
        }
        Ok(())
    }

    /// Record that textual id `id` is leaf `global` in the forest arrays.
    pub fn insert_leaf(&mut self, id: i32, global: usize) -> Result<()> {
        let global = to_i32(global)?;
        if self.nodes.contains_key(&id) || self.leaves.insert(id, global).is_some() {
            return Err(duplicate(id));
        }
        Ok(())
    }

    /// Encoded global reference for a textual id; node lookups win over leaves.
    pub fn resolve(&self, id: i32) -> Result<i32> {
        if let Some(&node) = self.nodes.get(&id) {
            Ok(node)
        } else if let Some(&leaf) = self.leaves.get(&id) {
            Ok(-leaf)
        } else {
            Err(ForestError::CorruptModel(format!(
                "inconsistent node structure: id {id} is neither a node nor a leaf of its tree"
            )))
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leaves.clear();
    }
}

/// Rewrite raw textual child ids in place with their encoded global references.
///
/// Stops at the first unresolvable id; entries before it are already rewritten,
/// so callers must discard the slice on error.
pub fn correct_indices(refs: &mut [i32], map: &IndexMap) -> Result<()> {
    for slot in refs.iter_mut() {
        *slot = map.resolve(*slot)?;
    }
    Ok(())
}

fn to_i32(global: usize) -> Result<i32> {
    i32::try_from(global).map_err(|_| {
        ForestError::CorruptModel(format!("forest index {global} exceeds the 32-bit index space"))
    })
}

fn duplicate(id: i32) -> ForestError {
    ForestError::CorruptModel(format!("id {id} appears more than once in the same tree"))
}
