//! Support Vector Machine training and prediction
//!
//! C-SVC, nu-SVC, one-class SVM, epsilon-SVR and nu-SVR are all reduced to
//! one dual quadratic program and solved by Sequential Minimal Optimization
//! with second-order working set selection, shrinking and an LRU cache of
//! kernel rows. Models read and write the libsvm text format.
//!
//! ```rust
//! use smosvm::{Parameter, Problem, Sample, SparseVector};
//!
//! let problem = Problem::from_samples(vec![
//!     Sample::new(SparseVector::new(vec![1], vec![1.0]), 1.0),
//!     Sample::new(SparseVector::new(vec![1], vec![-1.0]), -1.0),
//! ]);
//! let model = smosvm::svm_train(&problem, &Parameter::default()).unwrap();
//! assert_eq!(model.predict(&SparseVector::new(vec![1], vec![0.8])), 1.0);
//! ```

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod model;
pub mod optimizer;
pub mod persistence;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::{EvaluationMetrics, SVM};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::{
    Dataset, KernelType, Parameter, Problem, Result, SVMError, Sample, SparseVector, SvmType,
};
pub use crate::data::{load_problem, CSVDataset, DataFormat, LibSVMDataset};
pub use crate::kernel::{Kernel, KernelFunction};
pub use crate::model::{Model, ModelSummary};
pub use crate::optimizer::{cross_validation, svm_train, svm_train_with_seed};
pub use crate::persistence::{load_model, save_model};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
