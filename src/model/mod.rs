//! Trained SVM model and prediction
//!
//! A [`Model`] is produced by [`svm_train`](crate::optimizer::svm_train) or
//! loaded with [`load_model`](crate::persistence::load_model) and is
//! read-only afterwards.
//!
//! Classification models hold one decision function per pair of classes
//! (one-vs-one). Support vectors are grouped by class, and the coefficients
//! of the `k(k-1)/2` functions are packed into `k-1` rows: for the pair
//! `(i, j)` the coefficients of class `i` live in row `j-1` and those of
//! class `j` in row `i`.

use crate::core::{Parameter, Result, SVMError, SparseVector, SvmType};
use crate::kernel::{Kernel, KernelFunction};
use crate::optimizer::probability::{multiclass_probability, sigmoid_predict};
use serde::Serialize;

/// Lower clamp of pairwise probabilities
const MIN_PROBABILITY: f64 = 1e-7;

/// Trained SVM model
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub(crate) param: Parameter,
    pub(crate) nr_class: usize,
    pub(crate) sv: Vec<SparseVector>,
    pub(crate) sv_coef: Vec<Vec<f64>>,
    pub(crate) rho: Vec<f64>,
    pub(crate) prob_a: Option<Vec<f64>>,
    pub(crate) prob_b: Option<Vec<f64>>,
    pub(crate) sv_indices: Vec<usize>,
    pub(crate) label: Option<Vec<i32>>,
    pub(crate) n_sv: Option<Vec<usize>>,
}

/// Compact description of a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub svm_type: SvmType,
    pub parameter: Parameter,
    pub nr_class: usize,
    pub total_sv: usize,
    pub labels: Option<Vec<i32>>,
    pub n_sv: Option<Vec<usize>>,
    pub rho: Vec<f64>,
    pub has_probability: bool,
}

impl Model {
    pub fn param(&self) -> &Parameter {
        &self.param
    }

    pub fn svm_type(&self) -> SvmType {
        self.param.svm_type
    }

    /// Number of classes; 2 for regression and one-class models
    pub fn nr_class(&self) -> usize {
        self.nr_class
    }

    /// Class labels in internal order (classification only)
    pub fn labels(&self) -> Option<&[i32]> {
        self.label.as_deref()
    }

    /// Number of support vectors per class (classification only)
    pub fn n_sv(&self) -> Option<&[usize]> {
        self.n_sv.as_deref()
    }

    pub fn total_sv(&self) -> usize {
        self.sv.len()
    }

    pub fn support_vectors(&self) -> &[SparseVector] {
        &self.sv
    }

    pub fn sv_coef(&self) -> &[Vec<f64>] {
        &self.sv_coef
    }

    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    pub fn prob_a(&self) -> Option<&[f64]> {
        self.prob_a.as_deref()
    }

    pub fn prob_b(&self) -> Option<&[f64]> {
        self.prob_b.as_deref()
    }

    /// 1-based positions of the support vectors in the training set.
    ///
    /// Empty for models read from a file.
    pub fn sv_indices(&self) -> &[usize] {
        &self.sv_indices
    }

    /// Whether [`Model::predict_probability`] can be used
    pub fn has_probability_model(&self) -> bool {
        self.param.svm_type.is_classification()
            && self.prob_a.is_some()
            && self.prob_b.is_some()
    }

    /// Laplace scale of the regression residuals, if trained with probability
    pub fn svr_probability(&self) -> Option<f64> {
        if self.param.svm_type.is_regression() {
            self.prob_a.as_ref().and_then(|a| a.first().copied())
        } else {
            None
        }
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            svm_type: self.param.svm_type,
            parameter: self.param.clone(),
            nr_class: self.nr_class,
            total_sv: self.sv.len(),
            labels: self.label.clone(),
            n_sv: self.n_sv.clone(),
            rho: self.rho.clone(),
            has_probability: self.prob_a.is_some(),
        }
    }

    /// Predict the class label or regression value of `x`
    pub fn predict(&self, x: &SparseVector) -> f64 {
        self.predict_values(x).0
    }

    /// Predict `x` and return the decision values it was derived from.
    ///
    /// Classification yields one value per class pair in `(0,1), (0,2), ...,
    /// (1,2), ...` order and the label with most votes, ties going to the
    /// class listed first. One-class returns `+1`/`-1` by the sign of the
    /// single decision value and regression returns the value itself.
    pub fn predict_values(&self, x: &SparseVector) -> (f64, Vec<f64>) {
        let kernel = KernelFunction::from_parameter(&self.param);

        if !self.param.svm_type.is_classification() {
            let coef = self.sv_coef.first().map(Vec::as_slice).unwrap_or(&[]);
            let sum: f64 = coef
                .iter()
                .zip(&self.sv)
                .map(|(c, sv)| c * kernel.compute(x, sv))
                .sum::<f64>()
                - self.rho.first().copied().unwrap_or(0.0);

            let value = if self.param.svm_type == SvmType::OneClass {
                if sum > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            } else {
                sum
            };
            return (value, vec![sum]);
        }

        let nr_class = self.nr_class;
        let labels = self.label.as_deref().unwrap_or(&[]);
        let n_sv = self.n_sv.as_deref().unwrap_or(&[]);

        let kvalue: Vec<f64> = self.sv.iter().map(|sv| kernel.compute(x, sv)).collect();

        let mut start = vec![0usize; nr_class];
        for i in 1..nr_class {
            start[i] = start[i - 1] + n_sv.get(i - 1).copied().unwrap_or(0);
        }

        let mut votes = vec![0usize; nr_class];
        let mut dec_values = Vec::with_capacity(nr_class * nr_class.saturating_sub(1) / 2);
        let mut p = 0;
        for i in 0..nr_class {
            for j in i + 1..nr_class {
                let coef1 = &self.sv_coef[j - 1];
                let coef2 = &self.sv_coef[i];
                let (si, sj) = (start[i], start[j]);

                let mut sum = 0.0;
                for k in si..si + n_sv[i] {
                    sum += coef1[k] * kvalue[k];
                }
                for k in sj..sj + n_sv[j] {
                    sum += coef2[k] * kvalue[k];
                }
                sum -= self.rho[p];
                dec_values.push(sum);

                if sum > 0.0 {
                    votes[i] += 1;
                } else {
                    votes[j] += 1;
                }
                p += 1;
            }
        }

        let best = argmax_first(votes.iter().map(|&v| v as f64));
        let label = labels.get(best).copied().unwrap_or(0) as f64;
        (label, dec_values)
    }

    /// Predict `x` with calibrated class probabilities.
    ///
    /// Returns the most probable label and one probability per class in the
    /// order of [`Model::labels`]. Fails unless the model is a classifier
    /// trained with probability estimates.
    pub fn predict_probability(&self, x: &SparseVector) -> Result<(f64, Vec<f64>)> {
        if !self.param.svm_type.is_classification() {
            return Err(SVMError::ProbabilityUnavailable(format!(
                "{} models do not provide class probabilities",
                self.param.svm_type
            )));
        }
        let (prob_a, prob_b) = match (&self.prob_a, &self.prob_b) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(SVMError::ProbabilityUnavailable(
                    "model was trained without probability estimates".to_string(),
                ))
            }
        };

        let nr_class = self.nr_class;
        let (_, dec_values) = self.predict_values(x);

        let mut pairwise = vec![vec![0.0; nr_class]; nr_class];
        let mut k = 0;
        for i in 0..nr_class {
            for j in i + 1..nr_class {
                let p = sigmoid_predict(dec_values[k], prob_a[k], prob_b[k])
                    .clamp(MIN_PROBABILITY, 1.0 - MIN_PROBABILITY);
                pairwise[i][j] = p;
                pairwise[j][i] = 1.0 - p;
                k += 1;
            }
        }

        let estimates = if nr_class == 2 {
            vec![pairwise[0][1], pairwise[1][0]]
        } else {
            multiclass_probability(&pairwise)
        };

        let best = argmax_first(estimates.iter().copied());
        let labels = self.label.as_deref().unwrap_or(&[]);
        let label = labels.get(best).copied().unwrap_or(0) as f64;
        Ok((label, estimates))
    }
}

/// Index of the first maximum
fn argmax_first(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KernelType;
    use approx::assert_relative_eq;

    fn linear_param(svm_type: SvmType) -> Parameter {
        Parameter {
            svm_type,
            kernel_type: KernelType::Linear,
            ..Parameter::default()
        }
    }

    /// Three classes on a line, one support vector each
    fn three_class_model() -> Model {
        Model {
            param: linear_param(SvmType::CSvc),
            nr_class: 3,
            sv: vec![
                SparseVector::new(vec![1], vec![-1.0]),
                SparseVector::new(vec![1], vec![0.0]),
                SparseVector::new(vec![1], vec![1.0]),
            ],
            // pairs (0,1), (0,2), (1,2)
            sv_coef: vec![vec![1.0, -1.0, -1.0], vec![1.0, -1.0, -1.0]],
            rho: vec![0.5, 0.0, -0.5],
            prob_a: None,
            prob_b: None,
            sv_indices: vec![1, 2, 3],
            label: Some(vec![10, 20, 30]),
            n_sv: Some(vec![1, 1, 1]),
        }
    }

    #[test]
    fn test_one_vs_one_voting() {
        let model = three_class_model();

        let (label, dec) = model.predict_values(&SparseVector::new(vec![1], vec![-2.0]));
        assert_eq!(dec.len(), 3);
        assert_eq!(label, 10.0);

        let (label, _) = model.predict_values(&SparseVector::new(vec![1], vec![2.0]));
        assert_eq!(label, 30.0);
    }

    #[test]
    fn test_vote_tie_goes_to_lowest_index() {
        let mut model = three_class_model();
        // Cycle: 0 beats 1, 2 beats 0, 1 beats 2
        model.sv_coef = vec![vec![0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]];
        model.rho = vec![-1.0, 1.0, -1.0];

        let (label, _) = model.predict_values(&SparseVector::empty());
        assert_eq!(label, 10.0);
    }

    #[test]
    fn test_one_class_sign() {
        let model = Model {
            param: linear_param(SvmType::OneClass),
            nr_class: 2,
            sv: vec![SparseVector::new(vec![1], vec![1.0])],
            sv_coef: vec![vec![1.0]],
            rho: vec![0.5],
            prob_a: None,
            prob_b: None,
            sv_indices: vec![1],
            label: None,
            n_sv: None,
        };

        assert_eq!(model.predict(&SparseVector::new(vec![1], vec![1.0])), 1.0);
        assert_eq!(model.predict(&SparseVector::new(vec![1], vec![0.5])), -1.0);
        assert_eq!(model.predict(&SparseVector::new(vec![1], vec![0.2])), -1.0);
    }

    #[test]
    fn test_regression_value() {
        let model = Model {
            param: linear_param(SvmType::EpsilonSvr),
            nr_class: 2,
            sv: vec![SparseVector::new(vec![1], vec![1.0])],
            sv_coef: vec![vec![2.0]],
            rho: vec![-0.5],
            prob_a: Some(vec![0.25]),
            prob_b: None,
            sv_indices: vec![1],
            label: None,
            n_sv: None,
        };

        assert_relative_eq!(model.predict(&SparseVector::new(vec![1], vec![3.0])), 6.5);
        assert_eq!(model.svr_probability(), Some(0.25));
        assert!(matches!(
            model.predict_probability(&SparseVector::empty()),
            Err(SVMError::ProbabilityUnavailable(_))
        ));
    }

    #[test]
    fn test_probability_requires_calibration() {
        let model = three_class_model();
        assert!(!model.has_probability_model());
        assert!(matches!(
            model.predict_probability(&SparseVector::empty()),
            Err(SVMError::ProbabilityUnavailable(_))
        ));
    }

    #[test]
    fn test_probability_distribution() {
        let mut model = three_class_model();
        model.prob_a = Some(vec![-2.0, -2.0, -2.0]);
        model.prob_b = Some(vec![0.0, 0.0, 0.0]);

        let (label, probs) = model
            .predict_probability(&SparseVector::new(vec![1], vec![-2.0]))
            .expect("calibrated model");
        assert_eq!(label, 10.0);
        assert_eq!(probs.len(), 3);
        assert_relative_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(probs[0] > probs[1] && probs[0] > probs[2]);
    }

    #[test]
    fn test_binary_probability_uses_pairwise_values() {
        let model = Model {
            param: linear_param(SvmType::CSvc),
            nr_class: 2,
            sv: vec![
                SparseVector::new(vec![1], vec![1.0]),
                SparseVector::new(vec![1], vec![-1.0]),
            ],
            sv_coef: vec![vec![0.5, -0.5]],
            rho: vec![0.0],
            prob_a: Some(vec![-3.0]),
            prob_b: Some(vec![0.0]),
            sv_indices: vec![1, 2],
            label: Some(vec![1, -1]),
            n_sv: Some(vec![1, 1]),
        };

        let x = SparseVector::new(vec![1], vec![1.0]);
        let (_, dec) = model.predict_values(&x);
        let (label, probs) = model.predict_probability(&x).expect("calibrated model");

        assert_eq!(label, 1.0);
        assert_relative_eq!(probs[0], sigmoid_predict(dec[0], -3.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(probs[0] + probs[1], 1.0, epsilon = 1e-12);
    }
}
