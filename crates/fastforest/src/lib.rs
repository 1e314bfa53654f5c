//! Compiled gradient-boosted forests
//!
//! Turns an XGBoost text dump into a flat, array-indexed forest that is
//! evaluated with one branch per tree level and no allocation, and persists
//! that forest in a fixed little-endian binary layout.
//!
//! Modules:
//! - `index_map`: tree-local id to global index correction
//! - `forest`: the flat forest and its decoded accessors
//! - `builder`: per-round construction shared by every producer
//! - `compat`: producer-version bias policy
//! - `text`: text dump parser
//! - `binary`: binary codec
//! - `eval`: evaluation and softmax
//! - `config`: TOML load configuration
//! - `model_hash`: content hash of a compiled forest
//!
//! ```no_run
//! use fastforest::{load_text, load_binary};
//!
//! let features: Vec<String> = (0..5).map(|i| format!("f{i}")).collect();
//! let forest = load_text("model.txt", &features, 2)?;
//! forest.write_binary("forest.bin")?;
//!
//! let forest = load_binary("forest.bin")?;
//! let score = forest.evaluate(&[0.0, 0.2, 0.4, 0.6, 0.8]);
//! let probability = 1.0 / (1.0 + (-score).exp());
//! # let _ = probability;
//! # Ok::<(), fastforest::ForestError>(())
//! ```

pub mod binary;
pub mod builder;
pub mod compat;
pub mod config;
pub mod errors;
pub mod eval;
pub mod forest;
pub mod index_map;
pub mod model_hash;
pub mod text;

pub use binary::{decode, encode, load_binary, read_binary};
pub use builder::{ForestBuilder, TreeOutcome};
pub use config::{load_text_with_config, ForestConfig, LoggingConfig};
pub use errors::{ErrorKind, ForestError, Result};
pub use eval::softmax_in_place;
pub use forest::{Child, Forest, ForestSummary, SplitNode};
pub use model_hash::FOREST_HASH_SIZE;
pub use text::{
    load_text, load_text_discovering, parse_discovering_features, parse_with_fixed_features,
};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
