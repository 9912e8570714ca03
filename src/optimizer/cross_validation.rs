//! k-fold cross validation
//!
//! Classification problems are split per class so every fold keeps the
//! class proportions; other problems are split after a random shuffle.

use crate::core::{Parameter, Problem, ProblemView, Result, SVMError};
use crate::model::Model;
use crate::optimizer::train::{group_classes, prepare, train_view};
use crate::optimizer::DEFAULT_SEED;
use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Cross-validated predictions, one per sample in problem order
pub fn cross_validation(problem: &Problem, param: &Parameter, nr_fold: usize) -> Result<Vec<f64>> {
    cross_validation_with_seed(problem, param, nr_fold, DEFAULT_SEED)
}

/// [`cross_validation`] with an explicit seed for the fold assignment
pub fn cross_validation_with_seed(
    problem: &Problem,
    param: &Parameter,
    nr_fold: usize,
    seed: u64,
) -> Result<Vec<f64>> {
    if nr_fold < 2 {
        return Err(SVMError::InvalidParameter(
            "n-fold cross validation: n must >= 2".to_string(),
        ));
    }
    let param = prepare(problem, param)?;

    let l = problem.len();
    if nr_fold > l {
        warn!(
            "# folds ({}) > # data ({}); using leave-one-out cross validation",
            nr_fold, l
        );
    }

    let mut rng = StdRng::seed_from_u64(seed);
    Ok(cross_validation_view(&problem.view(), &param, nr_fold, &mut rng))
}

pub(crate) fn cross_validation_view(
    prob: &ProblemView<'_>,
    param: &Parameter,
    nr_fold: usize,
    rng: &mut StdRng,
) -> Vec<f64> {
    let l = prob.len();
    let nr_fold = nr_fold.min(l).max(1);
    let (perm, fold_start) = fold_permutation(prob, param, nr_fold, rng);

    let mut target = vec![0.0; l];
    for fold in 0..nr_fold {
        let (begin, end) = (fold_start[fold], fold_start[fold + 1]);
        let train_positions: Vec<usize> = perm[..begin]
            .iter()
            .chain(&perm[end..])
            .copied()
            .collect();
        if train_positions.is_empty() {
            continue;
        }

        let sub = prob.subset(&train_positions);
        let model = train_view(&sub, param, rng);
        for &k in &perm[begin..end] {
            target[k] = predict_target(&model, param, prob, k);
        }
    }
    target
}

fn predict_target(model: &Model, param: &Parameter, prob: &ProblemView<'_>, k: usize) -> f64 {
    let x = prob.x[k];
    if param.probability && param.svm_type.is_classification() {
        model
            .predict_probability(x)
            .map(|(label, _)| label)
            .unwrap_or_else(|_| model.predict(x))
    } else {
        model.predict(x)
    }
}

/// Order of the samples and the fold boundaries within it
fn fold_permutation(
    prob: &ProblemView<'_>,
    param: &Parameter,
    nr_fold: usize,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let l = prob.len();

    if param.svm_type.is_classification() && nr_fold < l {
        let groups = group_classes(&prob.y);
        let nr_class = groups.nr_class();
        let mut index = groups.perm.clone();
        for c in 0..nr_class {
            let begin = groups.start[c];
            index[begin..begin + groups.count[c]].shuffle(rng);
        }

        let mut fold_start = vec![0usize; nr_fold + 1];
        for i in 0..nr_fold {
            let fold_count: usize = groups
                .count
                .iter()
                .map(|&n| (i + 1) * n / nr_fold - i * n / nr_fold)
                .sum();
            fold_start[i + 1] = fold_start[i] + fold_count;
        }

        let mut next = fold_start.clone();
        let mut perm = vec![0usize; l];
        for c in 0..nr_class {
            let (start, n) = (groups.start[c], groups.count[c]);
            for i in 0..nr_fold {
                let begin = start + i * n / nr_fold;
                let end = start + (i + 1) * n / nr_fold;
                for &sample in &index[begin..end] {
                    perm[next[i]] = sample;
                    next[i] += 1;
                }
            }
        }
        (perm, fold_start)
    } else {
        let mut perm: Vec<usize> = (0..l).collect();
        perm.shuffle(rng);
        let fold_start = (0..=nr_fold).map(|i| i * l / nr_fold).collect();
        (perm, fold_start)
    }
}
