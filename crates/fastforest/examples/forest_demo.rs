//! FastForest Demo
//!
//! Compiles a small XGBoost text dump, scores a few feature vectors and
//! round-trips the forest through its binary format.

use fastforest::{load_binary, parse_with_fixed_features};
use tempfile::NamedTempFile;

const DUMP: &str = "\
booster[0]:
0:[age<50] yes=1,no=2,missing=1
\t1:leaf=-0.4
\t2:[income<30] yes=3,no=4,missing=3
\t\t3:leaf=0.1
\t\t4:leaf=0.6
booster[1]:
0:[income<20] yes=1,no=2,missing=1
\t1:leaf=-0.2
\t2:leaf=0.2
booster[2]:
0:leaf=0.05
xgboost_version=1.7.6
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== FastForest Demo ===\n");

    // 1. Compile the dump against a fixed feature schema
    println!("1. Compiling text dump...");
    let features = vec!["age".to_string(), "income".to_string()];
    let forest = parse_with_fixed_features(DUMP.as_bytes(), &features, 2)?;
    let summary = forest.summary();
    println!(
        "   {} trees, {} nodes, {} leaves, bias {:?}",
        summary.trees, summary.nodes, summary.leaves, summary.class_bias
    );

    // 2. Score
    println!("\n2. Scoring...");
    let cases = [
        ([30.0f32, 10.0], "[30, 10]"),
        ([60.0, 25.0], "[60, 25]"),
        ([50.0, 30.0], "[50, 30] (on both cuts)"),
    ];
    for (row, label) in &cases {
        let score = forest.try_evaluate(row)?;
        let probability = 1.0 / (1.0 + (-score).exp());
        println!("   {label} -> score {score:.3}, p {probability:.3}");
    }

    // 3. Persist and reload
    println!("\n3. Binary round trip...");
    let file = NamedTempFile::new()?;
    forest.write_binary(file.path())?;
    let reloaded = load_binary(file.path())?;
    println!("   hash {}", reloaded.hash_hex());
    println!("   identical: {}", reloaded == forest);

    println!("\n=== Demo Complete ===");
    Ok(())
}
