//! Kernel trait definition

use crate::core::SparseVector;

/// Kernel function trait
///
/// A kernel function K(x, y) computes the similarity between two sparse
/// vectors. Implementations are stateless; per-run tables (such as the RBF
/// self dot products) are owned by [`KernelMatrix`](crate::kernel::KernelMatrix).
pub trait Kernel {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64;

    /// Compute kernel value using precomputed squared norms
    ///
    /// Kernels that can exploit `x·x` and `y·y` (RBF) override this.
    fn compute_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }

    /// Whether [`Kernel::compute_with_norms`] benefits from a norm table
    fn uses_norms(&self) -> bool {
        false
    }
}
