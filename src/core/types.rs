//! Core type definitions for SVM

use crate::core::{Result, SVMError};

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    /// Strictly increasing indices of stored elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    ///
    /// # Panics
    /// Panics if the lengths differ or an index appears twice. Use
    /// [`SparseVector::from_pairs`] for untrusted input.
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);
        assert!(
            pairs.windows(2).all(|w| w[0].0 < w[1].0),
            "Indices must not repeat"
        );

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Build a vector from `(index, value)` pairs that must already be
    /// strictly increasing by index.
    pub fn from_pairs(pairs: &[(usize, f64)]) -> Result<Self> {
        for window in pairs.windows(2) {
            if window[1].0 <= window[0].0 {
                return Err(SVMError::InvalidDataset(format!(
                    "feature indices must be strictly increasing, found {} after {}",
                    window[1].0, window[0].0
                )));
            }
        }
        Ok(Self {
            indices: pairs.iter().map(|&(i, _)| i).collect(),
            values: pairs.iter().map(|&(_, v)| v).collect(),
        })
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Largest stored index, 0 for an empty vector
    pub fn max_index(&self) -> usize {
        self.indices.last().copied().unwrap_or(0)
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate over `(index, value)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

/// Training sample with features and label
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Feature vector (sparse representation)
    pub features: SparseVector,
    /// Class label for classification, target value for regression
    pub label: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(features: SparseVector, label: f64) -> Self {
        Self { features, label }
    }
}

/// A training problem: labelled samples plus the largest feature index seen.
///
/// Samples are only ever appended; training borrows them through a
/// [`ProblemView`] and never modifies them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Problem {
    samples: Vec<Sample>,
    max_index: usize,
}

impl Problem {
    /// Create an empty problem
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a problem from a list of samples
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let mut problem = Self::new();
        for sample in samples {
            problem.push(sample);
        }
        problem
    }

    /// Append a sample
    pub fn push(&mut self, sample: Sample) {
        self.max_index = self.max_index.max(sample.features.max_index());
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Largest feature index over all samples
    pub fn max_index(&self) -> usize {
        self.max_index
    }

    pub fn labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Borrow the problem as parallel feature/label arrays
    pub fn view(&self) -> ProblemView<'_> {
        ProblemView {
            x: self.samples.iter().map(|s| &s.features).collect(),
            y: self.labels(),
        }
    }
}

/// Borrowed training set used internally by the trainer.
///
/// Sub-problems (class pairs, cross-validation folds) are views onto the
/// caller's samples, so no feature vector is copied while training.
#[derive(Clone, Debug)]
pub struct ProblemView<'a> {
    pub x: Vec<&'a SparseVector>,
    pub y: Vec<f64>,
}

impl<'a> ProblemView<'a> {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// View restricted to the given positions, in order
    pub fn subset(&self, positions: &[usize]) -> ProblemView<'a> {
        ProblemView {
            x: positions.iter().map(|&i| self.x[i]).collect(),
            y: positions.iter().map(|&i| self.y[i]).collect(),
        }
    }
}

/// Configuration of a single SMO solve
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Upper bound for alphas of positive examples
    pub cp: f64,
    /// Upper bound for alphas of negative examples
    pub cn: f64,
    /// Tolerance of the KKT violation used as stopping criterion
    pub eps: f64,
    /// Enable shrinking heuristic
    pub shrinking: bool,
    /// Iteration cap; `None` means `max(10_000_000, 100 * l)`
    pub max_iterations: Option<usize>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cp: 1.0,
            cn: 1.0,
            eps: 0.001,
            shrinking: true,
            max_iterations: None,
        }
    }
}

/// Result of one solver run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionInfo {
    /// Final objective value
    pub obj: f64,
    /// Negative bias of the decision function
    pub rho: f64,
    /// Upper bound applied to positive examples
    pub upper_bound_p: f64,
    /// Upper bound applied to negative examples
    pub upper_bound_n: f64,
    /// Second bias term of the nu variant, 0 otherwise
    pub r: f64,
    /// Number of iterations performed
    pub iterations: usize,
}

/// A trained binary decision function: `f(x) = sum alpha_i K(x_i, x) - rho`
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionFunction {
    pub alpha: Vec<f64>,
    pub rho: f64,
}
