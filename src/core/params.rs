//! Training parameters, their defaults and validation

use crate::core::{Problem, Result, SVMError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SVM formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvmType {
    /// C-support vector classification
    CSvc,
    /// nu-support vector classification
    NuSvc,
    /// One-class SVM (novelty detection)
    OneClass,
    /// epsilon-support vector regression
    EpsilonSvr,
    /// nu-support vector regression
    NuSvr,
}

impl SvmType {
    /// Name used in the model text format
    pub fn as_str(&self) -> &'static str {
        match self {
            SvmType::CSvc => "c_svc",
            SvmType::NuSvc => "nu_svc",
            SvmType::OneClass => "one_class",
            SvmType::EpsilonSvr => "epsilon_svr",
            SvmType::NuSvr => "nu_svr",
        }
    }

    /// Numeric code as used by the `-s` command line option
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(SvmType::CSvc),
            1 => Ok(SvmType::NuSvc),
            2 => Ok(SvmType::OneClass),
            3 => Ok(SvmType::EpsilonSvr),
            4 => Ok(SvmType::NuSvr),
            _ => Err(SVMError::InvalidParameter(format!(
                "unknown svm type code {code}"
            ))),
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }

    pub fn is_regression(&self) -> bool {
        matches!(self, SvmType::EpsilonSvr | SvmType::NuSvr)
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SvmType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "c_svc" => Ok(SvmType::CSvc),
            "nu_svc" => Ok(SvmType::NuSvc),
            "one_class" => Ok(SvmType::OneClass),
            "epsilon_svr" => Ok(SvmType::EpsilonSvr),
            "nu_svr" => Ok(SvmType::NuSvr),
            _ => Err(SVMError::InvalidParameter(format!("unknown svm type: {s}"))),
        }
    }
}

/// Kernel family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
    /// Kernel values supplied by the caller; each sample starts with `0:serial`
    Precomputed,
}

impl KernelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial => "polynomial",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
            KernelType::Precomputed => "precomputed",
        }
    }

    /// Numeric code as used by the `-t` command line option
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(KernelType::Linear),
            1 => Ok(KernelType::Polynomial),
            2 => Ok(KernelType::Rbf),
            3 => Ok(KernelType::Sigmoid),
            4 => Ok(KernelType::Precomputed),
            _ => Err(SVMError::InvalidParameter(format!(
                "unknown kernel type code {code}"
            ))),
        }
    }

    /// Whether `gamma` takes part in the kernel formula
    pub fn uses_gamma(&self) -> bool {
        matches!(
            self,
            KernelType::Polynomial | KernelType::Rbf | KernelType::Sigmoid
        )
    }

    /// Whether `coef0` takes part in the kernel formula
    pub fn uses_coef0(&self) -> bool {
        matches!(self, KernelType::Polynomial | KernelType::Sigmoid)
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KernelType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(KernelType::Linear),
            "polynomial" => Ok(KernelType::Polynomial),
            "rbf" => Ok(KernelType::Rbf),
            "sigmoid" => Ok(KernelType::Sigmoid),
            "precomputed" => Ok(KernelType::Precomputed),
            _ => Err(SVMError::InvalidParameter(format!(
                "unknown kernel type: {s}"
            ))),
        }
    }
}

/// Configuration for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    /// Degree of the polynomial kernel
    pub degree: i32,
    /// Kernel width; 0 means `1 / max_index` at training time
    pub gamma: f64,
    /// Independent term of the polynomial and sigmoid kernels
    pub coef0: f64,
    /// Kernel cache budget in MB
    pub cache_size: f64,
    /// Stopping tolerance
    pub eps: f64,
    /// Cost for C-SVC, epsilon-SVR and nu-SVR
    pub c: f64,
    /// Per-class multipliers of `c`, as `(label, weight)` pairs
    pub weights: Vec<(i32, f64)>,
    /// nu for nu-SVC, one-class and nu-SVR
    pub nu: f64,
    /// Width of the epsilon-insensitive tube of epsilon-SVR
    pub p: f64,
    pub shrinking: bool,
    /// Train Platt/Laplace parameters for probability estimates
    pub probability: bool,
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            svm_type: SvmType::CSvc,
            kernel_type: KernelType::Rbf,
            degree: 3,
            gamma: 0.0,
            coef0: 0.0,
            cache_size: 100.0,
            eps: 0.001,
            c: 1.0,
            weights: Vec::new(),
            nu: 0.5,
            p: 0.1,
            shrinking: true,
            probability: false,
        }
    }
}

impl Parameter {
    /// Validate the parameters against a problem before training
    pub fn check(&self, problem: &Problem) -> Result<()> {
        self.check_labels(&problem.labels())
    }

    /// Validate the parameters against the labels of a training set.
    ///
    /// Besides the range checks this verifies that nu-SVC is feasible for
    /// every pair of classes.
    pub fn check_labels(&self, labels: &[f64]) -> Result<()> {
        let invalid = |msg: &str| Err(SVMError::InvalidParameter(msg.to_string()));

        if self.gamma < 0.0 {
            return invalid("gamma < 0");
        }
        if self.kernel_type == KernelType::Polynomial && self.degree < 0 {
            return invalid("degree of polynomial kernel < 0");
        }
        if self.cache_size <= 0.0 {
            return invalid("cache_size <= 0");
        }
        if self.eps <= 0.0 {
            return invalid("eps <= 0");
        }
        if matches!(
            self.svm_type,
            SvmType::CSvc | SvmType::EpsilonSvr | SvmType::NuSvr
        ) && self.c <= 0.0
        {
            return invalid("C <= 0");
        }
        if matches!(
            self.svm_type,
            SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr
        ) && (self.nu <= 0.0 || self.nu > 1.0)
        {
            return invalid("nu <= 0 or nu > 1");
        }
        if self.svm_type == SvmType::EpsilonSvr && self.p < 0.0 {
            return invalid("p < 0");
        }
        if self.probability && self.svm_type == SvmType::OneClass {
            return invalid("one-class SVM probability output not supported");
        }

        if self.svm_type == SvmType::NuSvc {
            let counts = class_counts(labels);
            for (i, &(_, n1)) in counts.iter().enumerate() {
                for &(_, n2) in &counts[i + 1..] {
                    if self.nu * (n1 + n2) as f64 / 2.0 > n1.min(n2) as f64 {
                        return invalid("specified nu is infeasible");
                    }
                }
            }
        }

        Ok(())
    }
}

/// Count samples per class label in first-seen order
fn class_counts(labels: &[f64]) -> Vec<(i32, usize)> {
    let mut counts: Vec<(i32, usize)> = Vec::new();
    for &y in labels {
        let label = y as i32;
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 += 1,
            None => counts.push((label, 1)),
        }
    }
    counts
}
