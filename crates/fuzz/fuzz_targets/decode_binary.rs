#![cfg_attr(fuzzing, no_main)]

// Workspace test builds also compile binaries; give them an entry point.
#[cfg(not(fuzzing))]
fn main() {}

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    if data.len() > 1_000_000 {
        return;
    }

    // Anything that decodes passed validation, so evaluation must not panic
    if let Ok(forest) = fastforest::decode(data) {
        let features = vec![0.5f32; forest.n_features_required()];
        let _ = forest.try_evaluate(&features);
        if forest.n_classes() > 2 {
            let _ = forest.try_evaluate_multiclass(&features);
        }

        // Re-encoding a decoded forest reproduces the input exactly
        assert_eq!(forest.encode(), data);
    }
});
