//! Training-time kernel evaluation over a fixed set of samples

use crate::core::SparseVector;
use crate::kernel::{Kernel, KernelFunction};

/// Kernel evaluated by position over the samples of one solve.
///
/// The solver permutes examples while shrinking; `swap_index` keeps the
/// sample order and the squared-norm table in step with it.
#[derive(Debug, Clone)]
pub struct KernelMatrix<'a> {
    function: KernelFunction,
    x: Vec<&'a SparseVector>,
    x_square: Option<Vec<f64>>,
}

impl<'a> KernelMatrix<'a> {
    pub fn new(function: KernelFunction, x: &[&'a SparseVector]) -> Self {
        let x: Vec<&'a SparseVector> = x.to_vec();
        let x_square = if function.uses_norms() {
            Some(x.iter().map(|v| v.norm_squared()).collect())
        } else {
            None
        };
        Self {
            function,
            x,
            x_square,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn function(&self) -> &KernelFunction {
        &self.function
    }

    /// K(x_i, x_j) for the current positions i and j
    pub fn evaluate(&self, i: usize, j: usize) -> f64 {
        match &self.x_square {
            Some(sq) => self
                .function
                .compute_with_norms(self.x[i], self.x[j], sq[i], sq[j]),
            None => self.function.compute(self.x[i], self.x[j]),
        }
    }

    pub fn swap_index(&mut self, i: usize, j: usize) {
        self.x.swap(i, j);
        if let Some(sq) = self.x_square.as_mut() {
            sq.swap(i, j);
        }
    }
}
