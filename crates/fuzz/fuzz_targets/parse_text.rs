#![cfg_attr(fuzzing, no_main)]

// Workspace test builds also compile binaries; give them an entry point.
#[cfg(not(fuzzing))]
fn main() {}

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    if data.len() > 100_000 {
        return;
    }

    for n_classes in [2, 3] {
        let Ok((forest, names)) = fastforest::parse_discovering_features(data, n_classes) else {
            continue;
        };
        assert!(forest.n_features_required() <= names.len());

        let features = vec![0.0f32; names.len()];
        let _ = forest.try_evaluate(&features);

        // NaN cuts are legal, so compare encodings rather than forests
        let bytes = forest.encode();
        let decoded = fastforest::decode(&bytes).expect("encoded forest decodes");
        assert_eq!(decoded.encode(), bytes);
    }
});
