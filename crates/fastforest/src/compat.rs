//! Producer-version compatibility policy.
//!
//! Dumps written by XGBoost 3 and later store leaf values relative to a base
//! score of 0.5 that is no longer folded into the trees. Older producers
//! (major versions 0, 1 and 2) need no correction. The cut is keyed on the
//! first character of the version string and is kept literal.

use tracing::warn;

/// Base score shift applied to every class bias for newer producers.
pub const MODERN_BASE_SCORE_SHIFT: f32 = 0.5;

/// Bias offset implied by an `xgboost_version=` value.
pub fn base_score_offset(version: &str) -> f32 {
    match version.trim().chars().next() {
        Some('0' | '1' | '2') => 0.0,
        _ => {
            warn!(
                version,
                shift = MODERN_BASE_SCORE_SHIFT,
                "shifting class bias for producer version"
            );
            MODERN_BASE_SCORE_SHIFT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_versions_are_unshifted() {
        assert_eq!(base_score_offset("0.90"), 0.0);
        assert_eq!(base_score_offset("1.7.6"), 0.0);
        assert_eq!(base_score_offset("2.1.4"), 0.0);
        assert_eq!(base_score_offset(" 2.0.3"), 0.0);
    }

    #[test]
    fn modern_versions_are_shifted() {
        assert_eq!(base_score_offset("3.0.0"), 0.5);
        assert_eq!(base_score_offset("3.1.1"), 0.5);
    }

    #[test]
    fn only_the_first_character_counts() {
        assert_eq!(base_score_offset("10.1"), 0.0);
        assert_eq!(base_score_offset("v2"), 0.5);
    }
}
