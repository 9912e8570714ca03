//! Training orchestrator
//!
//! Validates the parameters, resolves the default kernel width and turns
//! the per-type decision functions into a [`Model`]. Classification trains
//! one decision function per pair of classes on a borrowed sub-problem.

use crate::core::{
    DecisionFunction, KernelType, Parameter, Problem, ProblemView, Result, SVMError, SvmType,
};
use crate::kernel::serial_number;
use crate::model::Model;
use crate::optimizer::probability::{binary_svc_probability, svr_probability};
use crate::optimizer::{train_one, DEFAULT_SEED};
use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Training examples grouped by class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassGroups {
    /// Distinct labels in order of first appearance
    pub labels: Vec<i32>,
    /// Offset of each class in `perm`
    pub start: Vec<usize>,
    pub count: Vec<usize>,
    /// Example positions ordered class by class
    pub perm: Vec<usize>,
}

impl ClassGroups {
    pub fn nr_class(&self) -> usize {
        self.labels.len()
    }
}

/// Group labels by class in order of first appearance.
///
/// A two-class problem seen as `-1` then `+1` is reordered to `+1, -1` so
/// that binary decision values are positive for the `+1` class.
pub fn group_classes(y: &[f64]) -> ClassGroups {
    let mut labels: Vec<i32> = Vec::new();
    let mut count: Vec<usize> = Vec::new();
    let mut data_label = Vec::with_capacity(y.len());

    for &value in y {
        let this_label = value as i32;
        match labels.iter().position(|&l| l == this_label) {
            Some(j) => {
                count[j] += 1;
                data_label.push(j);
            }
            None => {
                labels.push(this_label);
                count.push(1);
                data_label.push(labels.len() - 1);
            }
        }
    }

    if labels.len() == 2 && labels[0] == -1 && labels[1] == 1 {
        labels.swap(0, 1);
        count.swap(0, 1);
        for d in data_label.iter_mut() {
            *d = 1 - *d;
        }
    }

    let mut start = vec![0usize; labels.len()];
    for i in 1..labels.len() {
        start[i] = start[i - 1] + count[i - 1];
    }

    let mut next = start.clone();
    let mut perm = vec![0usize; y.len()];
    for (i, &d) in data_label.iter().enumerate() {
        perm[next[d]] = i;
        next[d] += 1;
    }

    ClassGroups {
        labels,
        start,
        count,
        perm,
    }
}

/// Train a model on a problem.
///
/// A zero `gamma` becomes `1 / max_index`. Precomputed-kernel problems must
/// carry a valid `0:serial` entry in front of every sample.
pub fn svm_train(problem: &Problem, param: &Parameter) -> Result<Model> {
    svm_train_with_seed(problem, param, DEFAULT_SEED)
}

/// Train with an explicit seed for the probability calibration folds
pub fn svm_train_with_seed(problem: &Problem, param: &Parameter, seed: u64) -> Result<Model> {
    let param = prepare(problem, param)?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(train_view(&problem.view(), &param, &mut rng))
}

/// Shared pre-flight of training and cross validation
pub(crate) fn prepare(problem: &Problem, param: &Parameter) -> Result<Parameter> {
    if problem.is_empty() {
        return Err(SVMError::EmptyDataset);
    }
    param.check(problem)?;

    let mut param = param.clone();
    if param.gamma == 0.0 && problem.max_index() > 0 {
        param.gamma = 1.0 / problem.max_index() as f64;
    }

    if param.kernel_type == KernelType::Precomputed {
        check_precomputed(problem)?;
    }
    Ok(param)
}

fn check_precomputed(problem: &Problem) -> Result<()> {
    let max_index = problem.max_index();
    for (i, sample) in problem.samples().iter().enumerate() {
        match serial_number(&sample.features) {
            Some(serial) if serial <= max_index => {}
            Some(_) => {
                return Err(SVMError::InvalidDataset(format!(
                    "sample {}: serial number out of range",
                    i + 1
                )))
            }
            None => {
                return Err(SVMError::InvalidDataset(format!(
                    "sample {}: first column must be 0:sample_serial_number",
                    i + 1
                )))
            }
        }
    }
    Ok(())
}

/// Train on a borrowed view with an already validated parameter set
pub(crate) fn train_view(prob: &ProblemView<'_>, param: &Parameter, rng: &mut StdRng) -> Model {
    match param.svm_type {
        SvmType::OneClass | SvmType::EpsilonSvr | SvmType::NuSvr => {
            train_single(prob, param, rng)
        }
        SvmType::CSvc | SvmType::NuSvc => train_classifier(prob, param, rng),
    }
}

fn train_single(prob: &ProblemView<'_>, param: &Parameter, rng: &mut StdRng) -> Model {
    let prob_a = if param.probability && param.svm_type.is_regression() {
        Some(vec![svr_probability(prob, param, rng)])
    } else {
        None
    };

    let f = train_one(prob, param, 0.0, 0.0);

    let mut sv = Vec::new();
    let mut coef = Vec::new();
    let mut sv_indices = Vec::new();
    for (i, &a) in f.alpha.iter().enumerate() {
        if a.abs() > 0.0 {
            sv.push(prob.x[i].clone());
            coef.push(a);
            sv_indices.push(i + 1);
        }
    }

    Model {
        param: param.clone(),
        nr_class: 2,
        sv,
        sv_coef: vec![coef],
        rho: vec![f.rho],
        prob_a,
        prob_b: None,
        sv_indices,
        label: None,
        n_sv: None,
    }
}

fn train_classifier(prob: &ProblemView<'_>, param: &Parameter, rng: &mut StdRng) -> Model {
    let l = prob.len();
    let groups = group_classes(&prob.y);
    let nr_class = groups.nr_class();
    let ClassGroups {
        labels,
        start,
        count,
        perm,
    } = &groups;

    if nr_class == 1 {
        warn!("training data in only one class; every prediction will be {}", labels[0]);
    }

    let x: Vec<_> = perm.iter().map(|&i| prob.x[i]).collect();

    let mut weighted_c = vec![param.c; nr_class];
    for &(weight_label, weight) in &param.weights {
        match labels.iter().position(|&known| known == weight_label) {
            Some(j) => weighted_c[j] *= weight,
            None => warn!("class label {} specified in weight is not found", weight_label),
        }
    }

    let nr_pairs = nr_class * nr_class.saturating_sub(1) / 2;
    let mut nonzero = vec![false; l];
    let mut decisions: Vec<DecisionFunction> = Vec::with_capacity(nr_pairs);
    let mut prob_a = Vec::with_capacity(nr_pairs);
    let mut prob_b = Vec::with_capacity(nr_pairs);

    for i in 0..nr_class {
        for j in i + 1..nr_class {
            let (si, sj) = (start[i], start[j]);
            let (ci, cj) = (count[i], count[j]);

            let mut sub_x = Vec::with_capacity(ci + cj);
            sub_x.extend_from_slice(&x[si..si + ci]);
            sub_x.extend_from_slice(&x[sj..sj + cj]);
            let mut sub_y = vec![1.0; ci];
            sub_y.extend(std::iter::repeat(-1.0).take(cj));
            let sub = ProblemView { x: sub_x, y: sub_y };

            if param.probability {
                let sigmoid =
                    binary_svc_probability(&sub, param, weighted_c[i], weighted_c[j], rng);
                prob_a.push(sigmoid.a);
                prob_b.push(sigmoid.b);
            }

            let f = train_one(&sub, param, weighted_c[i], weighted_c[j]);
            for k in 0..ci {
                if f.alpha[k].abs() > 0.0 {
                    nonzero[si + k] = true;
                }
            }
            for k in 0..cj {
                if f.alpha[ci + k].abs() > 0.0 {
                    nonzero[sj + k] = true;
                }
            }
            decisions.push(f);
        }
    }

    let mut nz_count = vec![0usize; nr_class];
    for c in 0..nr_class {
        nz_count[c] = (0..count[c]).filter(|&k| nonzero[start[c] + k]).count();
    }
    let mut nz_start = vec![0usize; nr_class];
    for c in 1..nr_class {
        nz_start[c] = nz_start[c - 1] + nz_count[c - 1];
    }

    let mut sv = Vec::new();
    let mut sv_indices = Vec::new();
    for i in 0..l {
        if nonzero[i] {
            sv.push(x[i].clone());
            sv_indices.push(perm[i] + 1);
        }
    }
    let total_sv = sv.len();

    let mut sv_coef = vec![vec![0.0; total_sv]; nr_class.saturating_sub(1)];
    let mut p = 0;
    for i in 0..nr_class {
        for j in i + 1..nr_class {
            let f = &decisions[p];
            let (si, sj) = (start[i], start[j]);
            let (ci, cj) = (count[i], count[j]);

            let mut q = nz_start[i];
            for k in 0..ci {
                if nonzero[si + k] {
                    sv_coef[j - 1][q] = f.alpha[k];
                    q += 1;
                }
            }
            let mut q = nz_start[j];
            for k in 0..cj {
                if nonzero[sj + k] {
                    sv_coef[i][q] = f.alpha[ci + k];
                    q += 1;
                }
            }
            p += 1;
        }
    }

    let (prob_a, prob_b) = if param.probability {
        (Some(prob_a), Some(prob_b))
    } else {
        (None, None)
    };

    Model {
        param: param.clone(),
        nr_class,
        sv,
        sv_coef,
        rho: decisions.iter().map(|f| f.rho).collect(),
        prob_a,
        prob_b,
        sv_indices,
        label: Some(labels.clone()),
        n_sv: Some(nz_count),
    }
}
