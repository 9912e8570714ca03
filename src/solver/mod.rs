//! SVM solver implementations
//!
//! The Sequential Minimal Optimization (SMO) solver with second-order
//! working set selection and shrinking, plus the Q matrices it consumes.

pub mod qmatrix;
pub mod shrinking;
pub mod smo;

pub use self::qmatrix::*;
pub use self::smo::{SMOSolver, SolverVariant};
