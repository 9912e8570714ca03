//! Kernel functions for SVM

pub mod linear;
pub mod matrix;
pub mod polynomial;
pub mod precomputed;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::linear::*;
pub use self::matrix::*;
pub use self::polynomial::*;
pub use self::precomputed::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;

use crate::core::{KernelType, Parameter};

/// The closed set of built-in kernels, selected from a [`Parameter`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelFunction {
    Linear(LinearKernel),
    Polynomial(PolynomialKernel),
    Rbf(RBFKernel),
    Sigmoid(SigmoidKernel),
    Precomputed(PrecomputedKernel),
}

impl KernelFunction {
    pub fn from_parameter(param: &Parameter) -> Self {
        match param.kernel_type {
            KernelType::Linear => KernelFunction::Linear(LinearKernel::new()),
            KernelType::Polynomial => KernelFunction::Polynomial(PolynomialKernel::new(
                param.degree,
                param.gamma,
                param.coef0,
            )),
            KernelType::Rbf => KernelFunction::Rbf(RBFKernel::new(param.gamma)),
            KernelType::Sigmoid => {
                KernelFunction::Sigmoid(SigmoidKernel::new(param.gamma, param.coef0))
            }
            KernelType::Precomputed => KernelFunction::Precomputed(PrecomputedKernel::new()),
        }
    }

    pub fn kernel_type(&self) -> KernelType {
        match self {
            KernelFunction::Linear(_) => KernelType::Linear,
            KernelFunction::Polynomial(_) => KernelType::Polynomial,
            KernelFunction::Rbf(_) => KernelType::Rbf,
            KernelFunction::Sigmoid(_) => KernelType::Sigmoid,
            KernelFunction::Precomputed(_) => KernelType::Precomputed,
        }
    }
}

impl Kernel for KernelFunction {
    fn compute(&self, x: &crate::core::SparseVector, y: &crate::core::SparseVector) -> f64 {
        match self {
            KernelFunction::Linear(k) => k.compute(x, y),
            KernelFunction::Polynomial(k) => k.compute(x, y),
            KernelFunction::Rbf(k) => k.compute(x, y),
            KernelFunction::Sigmoid(k) => k.compute(x, y),
            KernelFunction::Precomputed(k) => k.compute(x, y),
        }
    }

    fn compute_with_norms(
        &self,
        x: &crate::core::SparseVector,
        y: &crate::core::SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        match self {
            KernelFunction::Rbf(k) => k.compute_with_norms(x, y, x_norm_sq, y_norm_sq),
            other => other.compute(x, y),
        }
    }

    fn uses_norms(&self) -> bool {
        matches!(self, KernelFunction::Rbf(_))
    }
}
