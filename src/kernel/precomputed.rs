//! Precomputed kernel values
//!
//! Each sample carries its row of the kernel matrix: entry `0:k` holds the
//! 1-based serial number of the sample, and entry at position `j` holds
//! K(x_k, x_j). Evaluating K(u, v) is therefore a positional lookup of
//! `v`'s serial number inside `u`.

use crate::core::SparseVector;
use crate::kernel::traits::Kernel;

/// Kernel reading values from a user-supplied kernel matrix
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrecomputedKernel;

impl PrecomputedKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for PrecomputedKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        let serial = match y.values.first() {
            Some(&value) if value >= 0.0 => value as usize,
            _ => return 0.0,
        };
        x.values.get(serial).copied().unwrap_or(0.0)
    }
}

/// Serial number stored in entry `0:k` of a precomputed-kernel sample
pub fn serial_number(x: &SparseVector) -> Option<usize> {
    match (x.indices.first(), x.values.first()) {
        (Some(0), Some(&value)) if value >= 1.0 && value.fract() == 0.0 => Some(value as usize),
        _ => None,
    }
}
