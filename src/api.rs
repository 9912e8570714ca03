//! High-level API for Support Vector Machine operations
//!
//! This module provides a builder over [`Parameter`] plus training,
//! cross-validation and evaluation helpers.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use smosvm::api::{evaluate, SVM};
//! use smosvm::core::KernelType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let svm = SVM::new().with_kernel(KernelType::Rbf).with_c(10.0);
//! let model = svm.train_from_file("data.libsvm")?;
//!
//! let test = smosvm::data::load_problem("test.libsvm")?;
//! println!("Accuracy: {:.2}%", evaluate(&model, &test).accuracy() * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{Dataset, KernelType, Parameter, Problem, Result, SvmType};
use crate::data::load_problem;
use crate::model::Model;
use crate::optimizer::{cross_validation_with_seed, svm_train_with_seed, DEFAULT_SEED};
use std::path::Path;

/// High-level SVM interface with builder pattern
#[derive(Debug, Clone, Default)]
pub struct SVM {
    param: Parameter,
    seed: Option<u64>,
}

impl SVM {
    /// Create a C-SVC with RBF kernel and default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing parameter set
    pub fn from_parameter(param: Parameter) -> Self {
        Self { param, seed: None }
    }

    pub fn with_svm_type(mut self, svm_type: SvmType) -> Self {
        self.param.svm_type = svm_type;
        self
    }

    pub fn with_kernel(mut self, kernel_type: KernelType) -> Self {
        self.param.kernel_type = kernel_type;
        self
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.param.c = c;
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.param.nu = nu;
        self
    }

    /// Set the epsilon-SVR tube width
    pub fn with_p(mut self, p: f64) -> Self {
        self.param.p = p;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.param.gamma = gamma;
        self
    }

    pub fn with_degree(mut self, degree: i32) -> Self {
        self.param.degree = degree;
        self
    }

    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.param.coef0 = coef0;
        self
    }

    /// Set convergence tolerance
    pub fn with_epsilon(mut self, eps: f64) -> Self {
        self.param.eps = eps;
        self
    }

    /// Set kernel cache size in MB
    pub fn with_cache_size(mut self, megabytes: f64) -> Self {
        self.param.cache_size = megabytes;
        self
    }

    pub fn with_shrinking(mut self, shrinking: bool) -> Self {
        self.param.shrinking = shrinking;
        self
    }

    pub fn with_probability(mut self, probability: bool) -> Self {
        self.param.probability = probability;
        self
    }

    /// Multiply C by `weight` for the class `label`
    pub fn with_weight(mut self, label: i32, weight: f64) -> Self {
        self.param.weights.push((label, weight));
        self
    }

    /// Seed of the cross-validation and probability calibration folds
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn param(&self) -> &Parameter {
        &self.param
    }

    fn seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    /// Train on a problem
    pub fn train(&self, problem: &Problem) -> Result<Model> {
        svm_train_with_seed(problem, &self.param, self.seed())
    }

    /// Train on any dataset
    pub fn train_dataset<D: Dataset>(&self, dataset: &D) -> Result<Model> {
        let problem =
            Problem::from_samples((0..dataset.len()).map(|i| dataset.get_sample(i).clone()).collect());
        self.train(&problem)
    }

    /// Train from a libsvm or CSV file, chosen by extension
    pub fn train_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Model> {
        let problem = load_problem(path)?;
        self.train(&problem)
    }

    /// Cross-validated predictions, one per sample
    pub fn cross_validation(&self, problem: &Problem, nr_fold: usize) -> Result<Vec<f64>> {
        cross_validation_with_seed(
            problem,
            &self.param,
            nr_fold,
            self.seed(),
        )
    }

    /// Metrics of a k-fold cross validation
    pub fn cross_validate(&self, problem: &Problem, nr_fold: usize) -> Result<EvaluationMetrics> {
        let targets = self.cross_validation(problem, nr_fold)?;
        Ok(EvaluationMetrics::compute(&targets, &problem.labels()))
    }
}

/// Accuracy and regression metrics of a set of predictions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationMetrics {
    pub total: usize,
    pub correct: usize,
    pub mean_squared_error: f64,
    pub squared_correlation: f64,
}

impl EvaluationMetrics {
    /// Compare predictions with the true labels
    pub fn compute(predictions: &[f64], labels: &[f64]) -> Self {
        let mut correct = 0;
        let mut error = 0.0;
        let (mut sumv, mut sumy, mut sumvv, mut sumyy, mut sumvy) = (0.0, 0.0, 0.0, 0.0, 0.0);

        for (&v, &y) in predictions.iter().zip(labels) {
            if v == y {
                correct += 1;
            }
            error += (v - y) * (v - y);
            sumv += v;
            sumy += y;
            sumvv += v * v;
            sumyy += y * y;
            sumvy += v * y;
        }

        let total = predictions.len().min(labels.len());
        let l = total as f64;
        let denominator = (l * sumvv - sumv * sumv) * (l * sumyy - sumy * sumy);
        let squared_correlation = if denominator == 0.0 {
            0.0
        } else {
            (l * sumvy - sumv * sumy).powi(2) / denominator
        };

        Self {
            total,
            correct,
            mean_squared_error: if total == 0 { 0.0 } else { error / l },
            squared_correlation,
        }
    }

    /// Fraction of exact label matches
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Predict every sample of `problem` and compare with its labels
pub fn evaluate(model: &Model, problem: &Problem) -> EvaluationMetrics {
    let predictions: Vec<f64> = problem
        .samples()
        .iter()
        .map(|s| model.predict(&s.features))
        .collect();
    EvaluationMetrics::compute(&predictions, &problem.labels())
}

/// Convenience functions for quick operations
pub mod quick {
    use super::*;

    /// Train a C-SVC with default parameters on a data file
    pub fn train_file<P: AsRef<Path>>(path: P) -> Result<Model> {
        SVM::new().train_from_file(path)
    }

    /// Train on one file and evaluate on another
    pub fn evaluate_split<P1: AsRef<Path>, P2: AsRef<Path>>(
        svm: &SVM,
        train_path: P1,
        test_path: P2,
    ) -> Result<EvaluationMetrics> {
        let model = svm.train_from_file(train_path)?;
        let test = load_problem(test_path)?;
        Ok(evaluate(&model, &test))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Sample, SparseVector};
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::Builder;

    fn line_problem() -> Problem {
        Problem::from_samples(vec![
            Sample::new(SparseVector::new(vec![1], vec![2.0]), 1.0),
            Sample::new(SparseVector::new(vec![1], vec![-2.0]), -1.0),
            Sample::new(SparseVector::new(vec![1], vec![1.5]), 1.0),
            Sample::new(SparseVector::new(vec![1], vec![-1.5]), -1.0),
            Sample::new(SparseVector::new(vec![1], vec![1.8]), 1.0),
            Sample::new(SparseVector::new(vec![1], vec![-1.8]), -1.0),
        ])
    }

    #[test]
    fn test_svm_builder_pattern() {
        let svm = SVM::new()
            .with_svm_type(SvmType::NuSvc)
            .with_kernel(KernelType::Polynomial)
            .with_c(2.0)
            .with_nu(0.2)
            .with_degree(2)
            .with_gamma(0.5)
            .with_coef0(1.0)
            .with_epsilon(0.01)
            .with_cache_size(8.0)
            .with_shrinking(false)
            .with_probability(true)
            .with_weight(1, 3.0);

        let param = svm.param();
        assert_eq!(param.svm_type, SvmType::NuSvc);
        assert_eq!(param.kernel_type, KernelType::Polynomial);
        assert_eq!(param.c, 2.0);
        assert_eq!(param.nu, 0.2);
        assert_eq!(param.degree, 2);
        assert_eq!(param.gamma, 0.5);
        assert_eq!(param.coef0, 1.0);
        assert_eq!(param.eps, 0.01);
        assert_eq!(param.cache_size, 8.0);
        assert!(!param.shrinking);
        assert!(param.probability);
        assert_eq!(param.weights, vec![(1, 3.0)]);
    }

    #[test]
    fn test_train_and_evaluate() {
        let problem = line_problem();
        let model = SVM::new()
            .with_kernel(KernelType::Linear)
            .train(&problem)
            .expect("Training should succeed");

        assert_eq!(model.predict(&SparseVector::new(vec![1], vec![1.0])), 1.0);
        assert_eq!(model.predict(&SparseVector::new(vec![1], vec![-1.0])), -1.0);

        let metrics = evaluate(&model, &problem);
        assert_eq!(metrics.total, 6);
        assert_eq!(metrics.accuracy(), 1.0);
    }

    #[test]
    fn test_seed_reaches_probability_calibration() {
        use crate::optimizer::{svm_train, svm_train_with_seed};

        let problem = line_problem();
        let svm = SVM::new().with_kernel(KernelType::Linear).with_probability(true);

        let seeded = svm.clone().with_seed(42).train(&problem).expect("training succeeds");
        let expected = svm_train_with_seed(&problem, svm.param(), 42).expect("training succeeds");
        assert_eq!(seeded, expected);
        assert!(seeded.prob_a().is_some());

        let unseeded = svm.train(&problem).expect("training succeeds");
        assert_eq!(unseeded, svm_train(&problem, svm.param()).expect("training succeeds"));
    }

    #[test]
    fn test_cross_validate_reports_accuracy() {
        let metrics = SVM::new()
            .with_kernel(KernelType::Linear)
            .with_seed(7)
            .cross_validate(&line_problem(), 3)
            .expect("cv succeeds");
        assert_eq!(metrics.total, 6);
        assert_eq!(metrics.accuracy(), 1.0);
    }

    #[test]
    fn test_regression_metrics() {
        let metrics = EvaluationMetrics::compute(&[1.0, 2.0, 3.0], &[1.0, 2.5, 2.5]);
        assert_eq!(metrics.correct, 1);
        assert_relative_eq!(metrics.mean_squared_error, 0.5 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.squared_correlation, 0.75, epsilon = 1e-12);

        let perfect = EvaluationMetrics::compute(&[1.0, 2.0, 4.0], &[2.0, 4.0, 8.0]);
        assert_relative_eq!(perfect.squared_correlation, 1.0, epsilon = 1e-12);

        let flat = EvaluationMetrics::compute(&[1.0, 1.0], &[0.0, 2.0]);
        assert_eq!(flat.squared_correlation, 0.0);
        assert_eq!(EvaluationMetrics::compute(&[], &[]).accuracy(), 0.0);
    }

    #[test]
    fn test_file_operations() {
        let mut temp_file = Builder::new().suffix(".libsvm").tempfile().unwrap();
        writeln!(temp_file, "+1 1:2.0").expect("Failed to write");
        writeln!(temp_file, "-1 1:-2.0").expect("Failed to write");
        writeln!(temp_file, "+1 1:1.5").expect("Failed to write");
        writeln!(temp_file, "-1 1:-1.5").expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let model = quick::train_file(temp_file.path()).expect("Training should succeed");
        assert!(model.total_sv() > 0);

        let metrics = quick::evaluate_split(&SVM::new(), temp_file.path(), temp_file.path())
            .expect("Evaluation should succeed");
        assert_eq!(metrics.accuracy(), 1.0);
    }

    #[test]
    fn test_train_dataset() {
        let problem = line_problem();
        let model = SVM::new()
            .with_kernel(KernelType::Linear)
            .train_dataset(&problem)
            .expect("Training should succeed");
        assert_eq!(model.labels(), Some(&[1, -1][..]));
    }
}
