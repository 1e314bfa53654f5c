//! Binary forest format
//!
//! Fixed layout, all values 4 bytes little-endian:
//!
//! ```text
//! i32            n_trees
//! i32            n_nodes
//! i32            n_leaves
//! i32[n_trees]   tree roots
//! u32[n_nodes]   cut feature indices
//! f32[n_nodes]   cut thresholds
//! i32[n_nodes]   left children (sign-encoded)
//! i32[n_nodes]   right children (sign-encoded)
//! f32[n_leaves]  leaf responses
//! i32[n_trees]   tree classes (boosting round)
//! i32            n_class_bias
//! f32[n_class_bias] class bias
//! ```

use crate::errors::{ForestError, Result};
use crate::forest::{Forest, RawForest};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

const WORD: usize = 4;

/// Serialize a forest into its binary layout.
pub fn encode(forest: &Forest) -> Vec<u8> {
    let words = 4
        + 2 * forest.tree_roots.len()
        + 4 * forest.cut_features.len()
        + forest.leaf_responses.len()
        + forest.class_bias.len();
    let mut out = Vec::with_capacity(words * WORD);

    put_i32(&mut out, forest.tree_roots.len() as i32);
    put_i32(&mut out, forest.cut_features.len() as i32);
    put_i32(&mut out, forest.leaf_responses.len() as i32);

    forest.tree_roots.iter().for_each(|&v| put_i32(&mut out, v));
    forest
        .cut_features
        .iter()
        .for_each(|&v| out.extend_from_slice(&v.to_le_bytes()));
    forest.thresholds.iter().for_each(|&v| put_f32(&mut out, v));
    forest.left.iter().for_each(|&v| put_i32(&mut out, v));
    forest.right.iter().for_each(|&v| put_i32(&mut out, v));
    forest.leaf_responses.iter().for_each(|&v| put_f32(&mut out, v));
    forest.tree_classes.iter().for_each(|&v| put_i32(&mut out, v));

    put_i32(&mut out, forest.class_bias.len() as i32);
    forest.class_bias.iter().for_each(|&v| put_f32(&mut out, v));

    out
}

/// Deserialize a forest; the buffer must hold exactly one encoding.
pub fn decode(bytes: &[u8]) -> Result<Forest> {
    let mut reader = ByteReader::new(bytes);

    let n_trees = reader.count("tree")?;
    let n_nodes = reader.count("node")?;
    let n_leaves = reader.count("leaf")?;

    let body_words = n_trees
        .checked_mul(2)
        .and_then(|w| w.checked_add(n_nodes.checked_mul(4)?))
        .and_then(|w| w.checked_add(n_leaves))
        .and_then(|w| w.checked_add(1))
        .ok_or_else(|| ForestError::MalformedBinary("header counts overflow".to_string()))?;
    reader.require(body_words.saturating_mul(WORD))?;

    let tree_roots = reader.array(n_trees, i32::from_le_bytes)?;
    let cut_features = reader.array(n_nodes, u32::from_le_bytes)?;
    let thresholds = reader.array(n_nodes, f32::from_le_bytes)?;
    let left = reader.array(n_nodes, i32::from_le_bytes)?;
    let right = reader.array(n_nodes, i32::from_le_bytes)?;
    let leaf_responses = reader.array(n_leaves, f32::from_le_bytes)?;
    let tree_classes = reader.array(n_trees, i32::from_le_bytes)?;

    let n_bias = reader.count("class bias")?;
    let class_bias = reader.array(n_bias, f32::from_le_bytes)?;

    if reader.remaining() > 0 {
        return Err(ForestError::MalformedBinary(format!(
            "{} trailing bytes after forest",
            reader.remaining()
        )));
    }

    debug!(n_trees, n_nodes, n_leaves, n_bias, "decoded forest binary");

    Forest::from_raw(RawForest {
        tree_roots,
        cut_features,
        thresholds,
        left,
        right,
        leaf_responses,
        tree_classes,
        class_bias,
    })
}

/// Read a whole stream and decode it.
pub fn read_binary<R: Read>(mut reader: R) -> Result<Forest> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode(&bytes)
}

/// Load a forest written by [`Forest::write_binary`].
pub fn load_binary<P: AsRef<Path>>(path: P) -> Result<Forest> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ForestError::FileNotFound(path.to_path_buf()));
    }
    let forest = decode(&fs::read(path)?)?;
    info!(
        path = %path.display(),
        trees = forest.n_trees(),
        nodes = forest.n_nodes(),
        leaves = forest.n_leaves(),
        classes = forest.n_classes(),
        "loaded forest binary"
    );
    Ok(forest)
}

impl Forest {
    /// Binary encoding of this forest
    pub fn encode(&self) -> Vec<u8> {
        encode(self)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&encode(self))?;
        Ok(())
    }

    pub fn write_binary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, encode(self))?;
        Ok(())
    }
}

fn put_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_f32(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_le_bytes());
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn require(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(ForestError::Truncated {
                expected: self.pos.saturating_add(n),
                actual: self.buf.len(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.require(n)?;
        let buf = self.buf;
        let bytes = &buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Non-negative element count
    fn count(&mut self, what: &str) -> Result<usize> {
        let raw = self.array(1, i32::from_le_bytes)?[0];
        usize::try_from(raw)
            .map_err(|_| ForestError::MalformedBinary(format!("negative {what} count {raw}")))
    }

    fn array<T>(&mut self, n: usize, from_bytes: fn([u8; 4]) -> T) -> Result<Vec<T>> {
        let len = n
            .checked_mul(WORD)
            .ok_or_else(|| ForestError::MalformedBinary(format!("array of {n} words")))?;
        Ok(self
            .take(len)?
            .chunks_exact(WORD)
            .map(|c| from_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}
