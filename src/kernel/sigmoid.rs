//! Sigmoid (Tanh) Kernel Implementation
//!
//! K(x, y) = tanh(γ * <x, y> + r)
//!
//! The sigmoid kernel is not positive semi-definite for every choice of
//! γ and r; the solver copes with the resulting non-positive curvature.

use crate::core::SparseVector;
use crate::kernel::linear::dot_product_sparse;
use crate::kernel::traits::Kernel;

/// Sigmoid (hyperbolic tangent) kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidKernel {
    /// Scaling parameter for the dot product
    pub gamma: f64,
    /// Bias/offset parameter
    pub coef0: f64,
}

impl SigmoidKernel {
    pub fn new(gamma: f64, coef0: f64) -> Self {
        Self { gamma, coef0 }
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        (self.gamma * dot_product_sparse(x, y) + self.coef0).tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid_kernel_basic() {
        let kernel = SigmoidKernel::new(0.5, -1.0);
        let x = SparseVector::new(vec![1, 2], vec![1.0, 2.0]);
        let y = SparseVector::new(vec![1, 2], vec![3.0, 1.0]);

        // tanh(0.5 * 5 - 1) = tanh(1.5)
        assert_relative_eq!(kernel.compute(&x, &y), 1.5_f64.tanh(), epsilon = 1e-12);
    }

    #[test]
    fn test_sigmoid_kernel_bounded() {
        let kernel = SigmoidKernel::new(10.0, 0.0);
        let x = SparseVector::new(vec![1], vec![100.0]);
        let y = SparseVector::new(vec![1], vec![-100.0]);

        let value = kernel.compute(&x, &y);
        assert!((-1.0..=1.0).contains(&value));
        assert_relative_eq!(value, -1.0, epsilon = 1e-12);
    }
}
