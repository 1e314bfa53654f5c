//! Content hashing for compiled forests.

use crate::forest::Forest;

/// Size of a forest hash in bytes
pub const FOREST_HASH_SIZE: usize = 32;

impl Forest {
    /// BLAKE3 hash of the binary encoding.
    ///
    /// Two forests hash equal exactly when their binary files are identical,
    /// so the value identifies a persisted model independently of its path.
    pub fn hash(&self) -> [u8; FOREST_HASH_SIZE] {
        *blake3::hash(&self.encode()).as_bytes()
    }

    /// [`Forest::hash`] as a 64-character hex string
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}

#[cfg(test)]
mod tests {
    use crate::forest::tests::stump;
    use crate::ForestBuilder;

    #[test]
    fn hash_is_stable_and_hex_encoded() {
        let hash1 = stump().hash_hex();
        let hash2 = stump().hash_hex();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn hash_changes_with_leaf_values() {
        let mut builder = ForestBuilder::new(2).unwrap();
        builder.push_split(0, 0, 0.5, 1, 2).unwrap();
        builder.push_leaf(1, -1.0).unwrap();
        builder.push_leaf(2, 999.0).unwrap();
        builder.finish_tree().unwrap();
        let other = builder.finish(0.25).unwrap();
        assert_ne!(stump().hash_hex(), other.hash_hex());
    }
}
