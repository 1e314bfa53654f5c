//! Forest evaluation
//!
//! Every tree is walked from its root: at node `i` the walk goes left when
//! `features[cut[i]] < threshold[i]` and right otherwise, so a value equal to
//! the threshold goes right. The walk stops at the first child that encodes a
//! leaf. Trees are summed in storage order in single precision.

use crate::errors::{ForestError, Result};
use crate::forest::Forest;
use rayon::prelude::*;

impl Forest {
    #[inline]
    fn leaf_value(&self, root: i32, features: &[f32]) -> f32 {
        let mut index = root as usize;
        loop {
            let next = if features[self.cut_features[index] as usize] < self.thresholds[index] {
                self.left[index]
            } else {
                self.right[index]
            };
            if next <= 0 {
                return self.leaf_responses[next.unsigned_abs() as usize];
            }
            index = next as usize;
        }
    }

    /// # Safety
    /// `features.len()` must be at least [`Forest::n_features_required`].
    #[inline]
    unsafe fn leaf_value_unchecked(&self, root: i32, features: &[f32]) -> f32 {
        // Node and leaf indices were checked by `validate` at construction.
        debug_assert!(features.len() >= self.n_features_required);
        let mut index = root as usize;
        loop {
            let feature = *self.cut_features.get_unchecked(index) as usize;
            let next = if *features.get_unchecked(feature) < *self.thresholds.get_unchecked(index) {
                *self.left.get_unchecked(index)
            } else {
                *self.right.get_unchecked(index)
            };
            if next <= 0 {
                return *self.leaf_responses.get_unchecked(next.unsigned_abs() as usize);
            }
            index = next as usize;
        }
    }

    /// Raw binary score: class bias plus every tree's leaf.
    ///
    /// Panics if `features` is shorter than [`Forest::n_features_required`];
    /// use [`Forest::try_evaluate`] to get an error instead.
    pub fn evaluate(&self, features: &[f32]) -> f32 {
        self.evaluate_with_base(features, 0.0)
    }

    /// [`Forest::evaluate`] with an extra additive base response.
    pub fn evaluate_with_base(&self, features: &[f32], base_response: f32) -> f32 {
        let mut score = base_response + self.class_bias[0];
        for &root in &self.tree_roots {
            score += self.leaf_value(root, features);
        }
        score
    }

    /// Checked binary evaluation
    pub fn try_evaluate(&self, features: &[f32]) -> Result<f32> {
        self.check_features(features)?;
        Ok(self.evaluate(features))
    }

    /// Binary evaluation without feature bounds checks.
    ///
    /// # Safety
    /// `features.len()` must be at least [`Forest::n_features_required`].
    pub unsafe fn evaluate_unchecked(&self, features: &[f32]) -> f32 {
        debug_assert!(
            features.len() >= self.n_features_required,
            "feature vector has {} values, forest needs {}",
            features.len(),
            self.n_features_required
        );
        let mut score = self.class_bias[0];
        for &root in &self.tree_roots {
            score += self.leaf_value_unchecked(root, features);
        }
        score
    }

    /// Raw per-class scores written into `out`, which must hold `n_classes` slots.
    pub fn evaluate_multiclass_into(
        &self,
        features: &[f32],
        out: &mut [f32],
        base_response: f32,
    ) -> Result<()> {
        let n_classes = self.require_multiclass()?;
        if out.len() != n_classes {
            return Err(ForestError::Usage(format!(
                "output buffer has {} slots, forest has {n_classes} classes",
                out.len()
            )));
        }

        for (slot, &bias) in out.iter_mut().zip(&self.class_bias) {
            *slot = base_response + bias;
        }
        for (&root, &class) in self.tree_roots.iter().zip(&self.tree_classes) {
            out[class as usize % n_classes] += self.leaf_value(root, features);
        }
        Ok(())
    }

    /// Raw per-class scores
    pub fn evaluate_multiclass(&self, features: &[f32]) -> Result<Vec<f32>> {
        let mut out = vec![0.0; self.require_multiclass()?];
        self.evaluate_multiclass_into(features, &mut out, 0.0)?;
        Ok(out)
    }

    /// Checked multi-class evaluation
    pub fn try_evaluate_multiclass(&self, features: &[f32]) -> Result<Vec<f32>> {
        self.require_multiclass()?;
        self.check_features(features)?;
        self.evaluate_multiclass(features)
    }

    /// Class probabilities written into `out`.
    pub fn softmax_into(&self, features: &[f32], out: &mut [f32], base_response: f32) -> Result<()> {
        self.evaluate_multiclass_into(features, out, base_response)?;
        softmax_in_place(out);
        Ok(())
    }

    /// Class probabilities
    pub fn softmax(&self, features: &[f32]) -> Result<Vec<f32>> {
        let mut out = self.evaluate_multiclass(features)?;
        softmax_in_place(&mut out);
        Ok(out)
    }

    /// Binary scores of a row-major matrix, rows evaluated in parallel.
    pub fn evaluate_rows(&self, rows: &[f32], n_features: usize) -> Result<Vec<f32>> {
        self.evaluate_rows_with_base(rows, n_features, 0.0)
    }

    pub fn evaluate_rows_with_base(
        &self,
        rows: &[f32],
        n_features: usize,
        base_response: f32,
    ) -> Result<Vec<f32>> {
        self.check_matrix(rows, n_features)?;
        Ok(rows
            .par_chunks(n_features)
            .map(|row| self.evaluate_with_base(row, base_response))
            .collect())
    }

    /// Class probabilities of a row-major matrix, `n_classes` values per row.
    pub fn softmax_rows(&self, rows: &[f32], n_features: usize) -> Result<Vec<f32>> {
        self.softmax_rows_with_base(rows, n_features, 0.0)
    }

    pub fn softmax_rows_with_base(
        &self,
        rows: &[f32],
        n_features: usize,
        base_response: f32,
    ) -> Result<Vec<f32>> {
        let n_classes = self.require_multiclass()?;
        self.check_matrix(rows, n_features)?;
        let mut out = vec![0.0; rows.len() / n_features * n_classes];
        out.par_chunks_mut(n_classes)
            .zip(rows.par_chunks(n_features))
            .try_for_each(|(probs, row)| self.softmax_into(row, probs, base_response))?;
        Ok(out)
    }

    fn require_multiclass(&self) -> Result<usize> {
        let n_classes = self.n_classes();
        if n_classes <= 2 {
            return Err(ForestError::Usage(
                "binary forests have no per-class evaluation; build the forest with n_classes >= 3"
                    .to_string(),
            ));
        }
        Ok(n_classes)
    }

    fn check_features(&self, features: &[f32]) -> Result<()> {
        if features.len() < self.n_features_required {
            return Err(ForestError::FeatureVectorTooShort {
                required: self.n_features_required,
                actual: features.len(),
            });
        }
        Ok(())
    }

    fn check_matrix(&self, rows: &[f32], n_features: usize) -> Result<()> {
        if n_features < self.n_features_required || n_features == 0 {
            return Err(ForestError::FeatureVectorTooShort {
                required: self.n_features_required.max(1),
                actual: n_features,
            });
        }
        if rows.len() % n_features != 0 {
            return Err(ForestError::Usage(format!(
                "{} values do not form rows of {n_features} features",
                rows.len()
            )));
        }
        Ok(())
    }
}

/// Numerically stable softmax in single precision.
///
/// Subtracts the maximum before exponentiating and accumulates the
/// normalisation in double precision, matching XGBoost's own transform.
pub fn softmax_in_place(values: &mut [f32]) {
    let Some(&first) = values.first() else {
        return;
    };
    let wmax = values[1..]
        .iter()
        .fold(first, |wmax, &v| if v < wmax { wmax } else { v });

    let mut norm = 0.0f64;
    for x in values.iter_mut() {
        *x = (*x - wmax).exp();
        norm += f64::from(*x);
    }
    let norm = norm as f32;
    for x in values.iter_mut() {
        *x /= norm;
    }
}
