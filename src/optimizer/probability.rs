//! Probability calibration
//!
//! Classification: decision values from an internal 5-fold cross
//! validation are mapped through a fitted sigmoid (Platt scaling) per class
//! pair, and pairwise probabilities are coupled into one distribution.
//! Regression: the residuals of a 5-fold cross validation are modelled as
//! Laplace noise and their scale is stored in the model.

use crate::core::{Parameter, ProblemView};
use crate::optimizer::cross_validation::cross_validation_view;
use crate::optimizer::train::train_view;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

const CALIBRATION_FOLDS: usize = 5;

/// Platt sigmoid parameters `(A, B)` with `P(y=1|f) = 1 / (1 + exp(A f + B))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sigmoid {
    pub a: f64,
    pub b: f64,
}

/// Fit the sigmoid to decision values by Newton's method with backtracking.
///
/// Targets are smoothed towards the class priors. Failure to converge is
/// logged and the best parameters found are returned.
pub fn sigmoid_train(dec_values: &[f64], labels: &[f64]) -> Sigmoid {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let t: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        dec_values
            .iter()
            .zip(&t)
            .map(|(&d, &ti)| {
                let f_apb = d * a + b;
                if f_apb >= 0.0 {
                    ti * f_apb + (-f_apb).exp().ln_1p()
                } else {
                    (ti - 1.0) * f_apb + f_apb.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    let mut iter = 0;
    while iter < MAX_ITER {
        // Gradient and Hessian (with a small ridge on the diagonal)
        let mut h11 = SIGMA;
        let mut h22 = SIGMA;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for (&d, &ti) in dec_values.iter().zip(&t) {
            let f_apb = d * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += d * d * d2;
            h22 += d2;
            h21 += d * d2;
            let d1 = ti - p;
            g1 += d * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let new_a = a + step * da;
            let new_b = b + step * db;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            warn!("line search fails in two-class probability estimates");
            break;
        }
        iter += 1;
    }

    if iter >= MAX_ITER {
        warn!("reaching maximal iterations in two-class probability estimates");
    }

    Sigmoid { a, b }
}

/// Probability of the positive class for a decision value
pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        (-f_apb).exp() / (1.0 + (-f_apb).exp())
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Couple pairwise probabilities `r[i][j] = P(i | i or j)` into a
/// distribution over all classes (Wu, Lin and Weng, method 2).
pub fn multiclass_probability(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 0 {
        return Vec::new();
    }
    let max_iter = k.max(100);
    let eps = 0.005 / k as f64;

    let mut p = vec![1.0 / k as f64; k];
    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in t + 1..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut qp = vec![0.0; k];
    let mut iter = 0;
    while iter < max_iter {
        let mut p_qp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            p_qp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - p_qp).abs())
            .fold(0.0_f64, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + p_qp) / q[t][t];
            p[t] += diff;
            p_qp = (p_qp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
        iter += 1;
    }

    if iter >= max_iter {
        warn!("exceeds max_iter in multiclass probability coupling");
    }
    p
}

/// Fit the sigmoid of one class pair from cross-validated decision values.
///
/// `prob` is the pair's sub-problem with labels +1/-1; `cp` and `cn` are the
/// class costs of the pair.
pub fn binary_svc_probability(
    prob: &ProblemView<'_>,
    param: &Parameter,
    cp: f64,
    cn: f64,
    rng: &mut StdRng,
) -> Sigmoid {
    let l = prob.len();
    let mut perm: Vec<usize> = (0..l).collect();
    perm.shuffle(rng);

    let mut dec_values = vec![0.0; l];
    for fold in 0..CALIBRATION_FOLDS {
        let begin = fold * l / CALIBRATION_FOLDS;
        let end = (fold + 1) * l / CALIBRATION_FOLDS;

        let train_positions: Vec<usize> = perm[..begin]
            .iter()
            .chain(&perm[end..])
            .copied()
            .collect();
        let sub = prob.subset(&train_positions);

        let p_count = sub.y.iter().filter(|&&y| y > 0.0).count();
        let n_count = sub.len() - p_count;

        let constant = match (p_count, n_count) {
            (0, 0) => Some(0.0),
            (_, 0) => Some(1.0),
            (0, _) => Some(-1.0),
            _ => None,
        };

        if let Some(value) = constant {
            for &k in &perm[begin..end] {
                dec_values[k] = value;
            }
            continue;
        }

        let sub_param = Parameter {
            probability: false,
            c: 1.0,
            weights: vec![(1, cp), (-1, cn)],
            ..param.clone()
        };
        let model = train_view(&sub, &sub_param, rng);
        let sign = model
            .labels()
            .and_then(|labels| labels.first())
            .copied()
            .unwrap_or(1) as f64;

        for &k in &perm[begin..end] {
            let (_, dec) = model.predict_values(prob.x[k]);
            // Decision values are oriented towards the sub-model's first label
            dec_values[k] = dec.first().copied().unwrap_or(0.0) * sign;
        }
    }

    sigmoid_train(&dec_values, &prob.y)
}

/// Laplace scale of cross-validated regression residuals.
///
/// Residuals beyond five standard deviations are discarded as outliers.
pub fn svr_probability(prob: &ProblemView<'_>, param: &Parameter, rng: &mut StdRng) -> f64 {
    let sub_param = Parameter {
        probability: false,
        ..param.clone()
    };
    let predicted = cross_validation_view(prob, &sub_param, CALIBRATION_FOLDS, rng);

    let residuals: Vec<f64> = prob
        .y
        .iter()
        .zip(&predicted)
        .map(|(y, p)| y - p)
        .collect();
    let l = residuals.len() as f64;

    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / l;
    let std = (2.0 * mae * mae).sqrt();

    let kept: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|&r| r <= 5.0 * std)
        .collect();
    let scale = if kept.is_empty() {
        mae
    } else {
        kept.iter().sum::<f64>() / kept.len() as f64
    };

    info!(
        "Prob. model for test data: target value = predicted value + z, \
         z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {}",
        scale
    );
    scale
}
