//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is a hyperparameter that controls the kernel width.

use crate::core::SparseVector;
use crate::kernel::linear::dot_product_sparse;
use crate::kernel::Kernel;

/// RBF (Radial Basis Function) kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// The gamma parameter controls the "reach" of each training example:
/// - High gamma: close points have high influence (potential overfitting)
/// - Low gamma: distant points have influence (potential underfitting)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with specified gamma parameter
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        let squared_distance = squared_euclidean_distance(x, y);
        (-self.gamma * squared_distance).exp()
    }

    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        // ||x - y||² = ||x||² + ||y||² - 2*x^T*y
        let dot_product = dot_product_sparse(x, y);
        (-self.gamma * (x_norm_sq + y_norm_sq - 2.0 * dot_product)).exp()
    }

    fn uses_norms(&self) -> bool {
        true
    }
}

/// Compute squared Euclidean distance between two sparse vectors
///
/// ||x - y||² = Σᵢ (xᵢ - yᵢ)², accumulated by merging the index lists:
/// - Indices present in both vectors: (xᵢ - yᵢ)²
/// - Indices present in only one vector: the squared value
pub fn squared_euclidean_distance(x: &SparseVector, y: &SparseVector) -> f64 {
    let mut distance_sq = 0.0;
    let mut i = 0;
    let mut j = 0;

    while i < x.indices.len() && j < y.indices.len() {
        let x_idx = x.indices[i];
        let y_idx = y.indices[j];

        if x_idx == y_idx {
            let diff = x.values[i] - y.values[j];
            distance_sq += diff * diff;
            i += 1;
            j += 1;
        } else if x_idx < y_idx {
            distance_sq += x.values[i] * x.values[i];
            i += 1;
        } else {
            distance_sq += y.values[j] * y.values[j];
            j += 1;
        }
    }

    while i < x.indices.len() {
        distance_sq += x.values[i] * x.values[i];
        i += 1;
    }

    while j < y.indices.len() {
        distance_sq += y.values[j] * y.values[j];
        j += 1;
    }

    distance_sq
}
