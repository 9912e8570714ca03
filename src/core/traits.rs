//! Core traits for SVM implementation

use crate::core::{Problem, Sample};

/// Dataset abstraction for efficient data access
pub trait Dataset {
    /// Number of samples in the dataset
    fn len(&self) -> usize;

    /// Largest feature index (dimensionality for 1-based indices)
    fn dim(&self) -> usize;

    /// Get a single sample by index
    ///
    /// # Panics
    /// Panics if index >= len()
    fn get_sample(&self, i: usize) -> &Sample;

    /// Get all labels as a vector
    fn get_labels(&self) -> Vec<f64>;

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Dataset for Problem {
    fn len(&self) -> usize {
        Problem::len(self)
    }

    fn dim(&self) -> usize {
        self.max_index()
    }

    fn get_sample(&self, i: usize) -> &Sample {
        &self.samples()[i]
    }

    fn get_labels(&self) -> Vec<f64> {
        self.labels()
    }
}
