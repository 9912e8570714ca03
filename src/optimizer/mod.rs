//! Optimization algorithms for SVM
//!
//! Every SVM type is reduced to the dual problem solved by
//! [`SMOSolver`](crate::solver::SMOSolver). The functions here build the
//! linear term, signs, starting point and bounds for each type, run the
//! solver and map the dual variables back to decision function
//! coefficients.

pub mod cross_validation;
pub mod probability;
pub mod train;

pub use self::cross_validation::*;
pub use self::probability::*;
pub use self::train::*;

use crate::core::{
    DecisionFunction, OptimizerConfig, Parameter, ProblemView, SolutionInfo, SvmType,
};
use crate::kernel::KernelFunction;
use crate::solver::{OneClassQ, SMOSolver, SolverVariant, SvcQ, SvrQ};
use log::info;

/// Seed of the fold permutations used by cross validation and calibration
pub const DEFAULT_SEED: u64 = 1;

fn solver_config(param: &Parameter, cp: f64, cn: f64) -> OptimizerConfig {
    OptimizerConfig {
        cp,
        cn,
        eps: param.eps,
        shrinking: param.shrinking,
        max_iterations: None,
    }
}

fn signs(prob: &ProblemView<'_>) -> Vec<i8> {
    prob.y.iter().map(|&y| if y > 0.0 { 1 } else { -1 }).collect()
}

/// C-SVC: `min 0.5 a^T Q a - e^T a` with `0 <= a_i <= Cp/Cn`.
///
/// Returns the signed coefficients `y_i a_i`.
pub fn solve_c_svc(
    prob: &ProblemView<'_>,
    param: &Parameter,
    cp: f64,
    cn: f64,
) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let y = signs(prob);
    let minus_ones = vec![-1.0; l];
    let mut alpha = vec![0.0; l];

    let q = SvcQ::new(
        &prob.x,
        &y,
        KernelFunction::from_parameter(param),
        param.cache_size,
    );
    let mut solver = SMOSolver::new(q, SolverVariant::Standard, solver_config(param, cp, cn));
    let si = solver.solve(&minus_ones, &y, &mut alpha);

    if cp == cn {
        let sum_alpha: f64 = alpha.iter().sum();
        info!("nu = {}", sum_alpha / (cp * l as f64));
    }

    for (a, &yi) in alpha.iter_mut().zip(&y) {
        *a *= yi as f64;
    }
    (alpha, si)
}

/// nu-SVC, solved in the scaled form with bounds 1 and rescaled by `1/r`
pub fn solve_nu_svc(prob: &ProblemView<'_>, param: &Parameter) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let nu = param.nu;
    let y = signs(prob);

    let mut sum_pos = nu * l as f64 / 2.0;
    let mut sum_neg = nu * l as f64 / 2.0;
    let mut alpha = vec![0.0; l];
    for (a, &yi) in alpha.iter_mut().zip(&y) {
        if yi == 1 {
            *a = sum_pos.min(1.0);
            sum_pos -= *a;
        } else {
            *a = sum_neg.min(1.0);
            sum_neg -= *a;
        }
    }

    let zeros = vec![0.0; l];
    let q = SvcQ::new(
        &prob.x,
        &y,
        KernelFunction::from_parameter(param),
        param.cache_size,
    );
    let mut solver = SMOSolver::new(q, SolverVariant::Nu, solver_config(param, 1.0, 1.0));
    let mut si = solver.solve(&zeros, &y, &mut alpha);

    let r = si.r;
    info!("C = {}", 1.0 / r);

    for (a, &yi) in alpha.iter_mut().zip(&y) {
        *a *= yi as f64 / r;
    }
    si.rho /= r;
    si.obj /= r * r;
    si.upper_bound_p = 1.0 / r;
    si.upper_bound_n = 1.0 / r;
    (alpha, si)
}

/// One-class SVM: `sum a_i = nu * l`, `0 <= a_i <= 1`
pub fn solve_one_class(prob: &ProblemView<'_>, param: &Parameter) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let target = param.nu * l as f64;
    let n = (target as usize).min(l);

    let mut alpha = vec![0.0; l];
    for a in alpha.iter_mut().take(n) {
        *a = 1.0;
    }
    if n < l {
        alpha[n] = target - n as f64;
    }

    let zeros = vec![0.0; l];
    let ones = vec![1i8; l];
    let q = OneClassQ::new(&prob.x, KernelFunction::from_parameter(param), param.cache_size);
    let mut solver = SMOSolver::new(q, SolverVariant::Standard, solver_config(param, 1.0, 1.0));
    let si = solver.solve(&zeros, &ones, &mut alpha);
    (alpha, si)
}

/// epsilon-SVR over the mirrored variables `(a+, a-)`
pub fn solve_epsilon_svr(prob: &ProblemView<'_>, param: &Parameter) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let mut alpha2 = vec![0.0; 2 * l];
    let mut linear_term = vec![0.0; 2 * l];
    let mut y2 = vec![0i8; 2 * l];

    for i in 0..l {
        linear_term[i] = param.p - prob.y[i];
        y2[i] = 1;
        linear_term[i + l] = param.p + prob.y[i];
        y2[i + l] = -1;
    }

    let q = SvrQ::new(&prob.x, KernelFunction::from_parameter(param), param.cache_size);
    let mut solver =
        SMOSolver::new(q, SolverVariant::Standard, solver_config(param, param.c, param.c));
    let si = solver.solve(&linear_term, &y2, &mut alpha2);

    let alpha: Vec<f64> = (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect();
    let sum_alpha: f64 = alpha.iter().map(|a| a.abs()).sum();
    info!("nu = {}", sum_alpha / (param.c * l as f64));
    (alpha, si)
}

/// nu-SVR; the tube width comes out of the solve as `-r`
pub fn solve_nu_svr(prob: &ProblemView<'_>, param: &Parameter) -> (Vec<f64>, SolutionInfo) {
    let l = prob.len();
    let c = param.c;
    let mut alpha2 = vec![0.0; 2 * l];
    let mut linear_term = vec![0.0; 2 * l];
    let mut y2 = vec![0i8; 2 * l];

    let mut sum = c * param.nu * l as f64 / 2.0;
    for i in 0..l {
        let seed = sum.min(c);
        alpha2[i] = seed;
        alpha2[i + l] = seed;
        sum -= seed;

        linear_term[i] = -prob.y[i];
        y2[i] = 1;
        linear_term[i + l] = prob.y[i];
        y2[i + l] = -1;
    }

    let q = SvrQ::new(&prob.x, KernelFunction::from_parameter(param), param.cache_size);
    let mut solver = SMOSolver::new(q, SolverVariant::Nu, solver_config(param, c, c));
    let si = solver.solve(&linear_term, &y2, &mut alpha2);

    info!("epsilon = {}", -si.r);
    let alpha = (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect();
    (alpha, si)
}

/// Train a single decision function for the problem's SVM type.
///
/// `cp` and `cn` are the per-class costs of C-SVC; the other types take
/// their bounds from `param`.
pub fn train_one(
    prob: &ProblemView<'_>,
    param: &Parameter,
    cp: f64,
    cn: f64,
) -> DecisionFunction {
    let (alpha, si) = match param.svm_type {
        SvmType::CSvc => solve_c_svc(prob, param, cp, cn),
        SvmType::NuSvc => solve_nu_svc(prob, param),
        SvmType::OneClass => solve_one_class(prob, param),
        SvmType::EpsilonSvr => solve_epsilon_svr(prob, param),
        SvmType::NuSvr => solve_nu_svr(prob, param),
    };

    info!("obj = {}, rho = {}", si.obj, si.rho);

    let mut n_sv = 0;
    let mut n_bsv = 0;
    for (a, &y) in alpha.iter().zip(&prob.y) {
        if a.abs() > 0.0 {
            n_sv += 1;
            let bound = if y > 0.0 {
                si.upper_bound_p
            } else {
                si.upper_bound_n
            };
            if a.abs() >= bound {
                n_bsv += 1;
            }
        }
    }
    info!("nSV = {}, nBSV = {}", n_sv, n_bsv);

    DecisionFunction { alpha, rho: si.rho }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SparseVector};
    use approx::assert_relative_eq;

    fn points(values: &[(f64, f64)]) -> Vec<SparseVector> {
        values
            .iter()
            .map(|&(a, b)| SparseVector::new(vec![1, 2], vec![a, b]))
            .collect()
    }

    fn blobs() -> (Vec<SparseVector>, Vec<f64>) {
        let x = points(&[
            (1.0, 1.2),
            (1.5, 0.8),
            (0.7, 1.1),
            (1.2, 1.6),
            (-1.0, -0.9),
            (-1.4, -1.2),
            (-0.6, -1.3),
            (-1.1, -0.5),
        ]);
        let y = vec![1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0];
        (x, y)
    }

    fn view<'a>(x: &'a [SparseVector], y: &[f64]) -> ProblemView<'a> {
        ProblemView {
            x: x.iter().collect(),
            y: y.to_vec(),
        }
    }

    fn rbf(svm_type: SvmType) -> Parameter {
        Parameter {
            svm_type,
            kernel_type: KernelType::Rbf,
            gamma: 0.5,
            ..Parameter::default()
        }
    }

    #[test]
    fn test_c_svc_coefficients_balance() {
        let (x, y) = blobs();
        let prob = view(&x, &y);
        let (alpha, si) = solve_c_svc(&prob, &rbf(SvmType::CSvc), 1.0, 1.0);

        let sum: f64 = alpha.iter().sum();
        assert!(sum.abs() < 1e-8);
        for (a, yi) in alpha.iter().zip(&y) {
            assert!(a * yi >= 0.0);
            assert!(a.abs() <= 1.0 + 1e-12);
        }
        assert_eq!(si.upper_bound_p, 1.0);
    }

    #[test]
    fn test_c_svc_weighted_bounds() {
        let (x, y) = blobs();
        let prob = view(&x, &y);
        let (alpha, si) = solve_c_svc(&prob, &rbf(SvmType::CSvc), 0.2, 0.05);

        for (a, yi) in alpha.iter().zip(&y) {
            let bound = if *yi > 0.0 { 0.2 } else { 0.05 };
            assert!(a.abs() <= bound + 1e-12);
        }
        assert_eq!(si.upper_bound_p, 0.2);
        assert_eq!(si.upper_bound_n, 0.05);
    }

    #[test]
    fn test_nu_svc_rescaling() {
        let (x, y) = blobs();
        let prob = view(&x, &y);
        let mut param = rbf(SvmType::NuSvc);
        param.nu = 0.5;
        let (alpha, si) = solve_nu_svc(&prob, &param);

        assert!(si.r > 0.0);
        assert_relative_eq!(si.upper_bound_p, 1.0 / si.r);
        for a in &alpha {
            assert!(a.abs() <= si.upper_bound_p + 1e-9);
        }
        let sum: f64 = alpha.iter().sum();
        assert!(sum.abs() < 1e-8);
    }

    #[test]
    fn test_one_class_seeding_sums_to_nu_l() {
        let (x, _) = blobs();
        let y = vec![1.0; x.len()];
        let prob = view(&x, &y);
        let mut param = rbf(SvmType::OneClass);
        param.nu = 0.3;
        let (alpha, _) = solve_one_class(&prob, &param);

        let sum: f64 = alpha.iter().sum();
        assert_relative_eq!(sum, 0.3 * 8.0, epsilon = 1e-8);
        assert!(alpha.iter().all(|&a| (0.0..=1.0).contains(&a)));
    }

    #[test]
    fn test_epsilon_svr_coefficients() {
        let x: Vec<SparseVector> = (0..10)
            .map(|k| SparseVector::new(vec![1], vec![k as f64 / 10.0]))
            .collect();
        let y: Vec<f64> = (0..10).map(|k| 2.0 * k as f64 / 10.0).collect();
        let prob = view(&x, &y);
        let param = Parameter {
            svm_type: SvmType::EpsilonSvr,
            kernel_type: KernelType::Linear,
            c: 10.0,
            p: 0.01,
            ..Parameter::default()
        };
        let (alpha, _) = solve_epsilon_svr(&prob, &param);

        let sum: f64 = alpha.iter().sum();
        assert!(sum.abs() < 1e-8);
        assert!(alpha.iter().all(|a| a.abs() <= 10.0 + 1e-12));
    }

    #[test]
    fn test_train_one_dispatch() {
        let (x, y) = blobs();
        let prob = view(&x, &y);
        let f = train_one(&prob, &rbf(SvmType::CSvc), 1.0, 1.0);
        assert_eq!(f.alpha.len(), x.len());
        assert!(f.alpha.iter().any(|a| a.abs() > 0.0));
    }
}
