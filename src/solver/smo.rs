//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the dual problem
//!
//! ```text
//! min  0.5 * a^T Q a + p^T a
//! s.t. y^T a = delta,  0 <= a_i <= C(y_i)
//! ```
//!
//! by repeatedly optimizing a pair of variables chosen with second-order
//! working set selection (Fan, Chen and Lin, JMLR 2005). The nu variant
//! additionally keeps the sum of alphas fixed within each class.

use crate::cache::Qfloat;
use crate::core::{OptimizerConfig, SolutionInfo};
use crate::solver::qmatrix::QMatrix;
use log::{debug, info, warn};

/// Replacement for non-positive curvature in the pair sub-problem
pub(crate) const TAU: f64 = 1e-12;
pub(crate) const INF: f64 = f64::INFINITY;

/// Position of a variable relative to its box constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AlphaStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// Which dual the solver works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverVariant {
    /// One equality constraint `y^T a = delta`
    Standard,
    /// One equality constraint per class (nu-SVC, nu-SVR)
    Nu,
}

/// SMO solver for SVM optimization
///
/// Owns the Q matrix and every per-run array. Variables are permuted while
/// shrinking; `active_set` maps positions back to the caller's order.
pub struct SMOSolver<Q: QMatrix> {
    pub(crate) q: Q,
    pub(crate) variant: SolverVariant,
    pub(crate) config: OptimizerConfig,

    pub(crate) l: usize,
    pub(crate) active_size: usize,
    pub(crate) y: Vec<i8>,
    pub(crate) g: Vec<f64>,
    pub(crate) g_bar: Vec<f64>,
    pub(crate) alpha: Vec<f64>,
    pub(crate) alpha_status: Vec<AlphaStatus>,
    pub(crate) p: Vec<f64>,
    pub(crate) qd: Vec<f64>,
    pub(crate) active_set: Vec<usize>,
    pub(crate) unshrink: bool,

    // Rows are copied out of the cache so two can be held at once
    pub(crate) q_i: Vec<Qfloat>,
    pub(crate) q_j: Vec<Qfloat>,
}

/// Copy the first `len` entries of row `i` into `buf`
pub(crate) fn load_row<Q: QMatrix>(q: &mut Q, i: usize, len: usize, buf: &mut Vec<Qfloat>) {
    buf.clear();
    buf.extend_from_slice(q.get_q(i, len));
}

impl<Q: QMatrix> SMOSolver<Q> {
    /// Create a new SMO solver over the given Q matrix
    pub fn new(q: Q, variant: SolverVariant, config: OptimizerConfig) -> Self {
        Self {
            q,
            variant,
            config,
            l: 0,
            active_size: 0,
            y: Vec::new(),
            g: Vec::new(),
            g_bar: Vec::new(),
            alpha: Vec::new(),
            alpha_status: Vec::new(),
            p: Vec::new(),
            qd: Vec::new(),
            active_set: Vec::new(),
            unshrink: false,
            q_i: Vec::new(),
            q_j: Vec::new(),
        }
    }

    /// The Q matrix, for inspecting evaluation and cache counters
    pub fn q_matrix(&self) -> &Q {
        &self.q
    }

    /// Solve the dual problem.
    ///
    /// `alpha` holds a feasible starting point on entry and the solution on
    /// return. `p` is the linear term and `y` the +1/-1 signs.
    pub fn solve(&mut self, p: &[f64], y: &[i8], alpha: &mut [f64]) -> SolutionInfo {
        let l = y.len();
        self.l = l;
        self.active_size = l;
        self.y = y.to_vec();
        self.p = p.to_vec();
        self.alpha = alpha.to_vec();
        self.qd = self.q.get_qd().to_vec();
        self.active_set = (0..l).collect();
        self.unshrink = false;
        self.alpha_status = vec![AlphaStatus::LowerBound; l];
        for i in 0..l {
            self.update_alpha_status(i);
        }

        self.initialize_gradient();

        let max_iterations = self
            .config
            .max_iterations
            .unwrap_or_else(|| 10_000_000usize.max(l.saturating_mul(100)));
        let mut counter = l.min(1000) + 1;
        let mut iterations = 0;

        while iterations < max_iterations {
            counter -= 1;
            if counter == 0 {
                counter = l.min(1000);
                if self.config.shrinking {
                    self.do_shrinking();
                }
            }

            let (i, j) = match self.select_working_set() {
                Some(pair) => pair,
                None => {
                    // Optimal on the active set; verify against all variables
                    self.reconstruct_gradient();
                    self.active_size = l;
                    debug!("re-activated all {} variables", l);
                    match self.select_working_set() {
                        Some(pair) => {
                            counter = 1;
                            pair
                        }
                        None => break,
                    }
                }
            };

            iterations += 1;
            self.update_pair(i, j);
        }

        if iterations >= max_iterations {
            if self.active_size < l {
                self.reconstruct_gradient();
                self.active_size = l;
            }
            warn!("reaching max number of iterations ({})", max_iterations);
        }

        let (rho, r) = match self.variant {
            SolverVariant::Standard => (self.calculate_rho(), 0.0),
            SolverVariant::Nu => self.calculate_rho_nu(),
        };

        let obj = (0..l)
            .map(|i| self.alpha[i] * (self.g[i] + self.p[i]))
            .sum::<f64>()
            / 2.0;

        for i in 0..l {
            alpha[self.active_set[i]] = self.alpha[i];
        }

        info!("optimization finished, #iter = {}", iterations);

        SolutionInfo {
            obj,
            rho,
            upper_bound_p: self.config.cp,
            upper_bound_n: self.config.cn,
            r,
            iterations,
        }
    }

    fn initialize_gradient(&mut self) {
        let l = self.l;
        self.g = self.p.clone();
        self.g_bar = vec![0.0; l];

        for i in 0..l {
            if self.is_lower_bound(i) {
                continue;
            }
            load_row(&mut self.q, i, l, &mut self.q_i);
            let alpha_i = self.alpha[i];
            for j in 0..l {
                self.g[j] += alpha_i * self.q_i[j] as f64;
            }
            if self.is_upper_bound(i) {
                let c_i = self.get_c(i);
                for j in 0..l {
                    self.g_bar[j] += c_i * self.q_i[j] as f64;
                }
            }
        }
    }

    /// Analytically optimize the pair `(i, j)` and refresh the gradients
    fn update_pair(&mut self, i: usize, j: usize) {
        let active_size = self.active_size;
        load_row(&mut self.q, i, active_size, &mut self.q_i);
        load_row(&mut self.q, j, active_size, &mut self.q_j);

        let c_i = self.get_c(i);
        let c_j = self.get_c(j);
        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];
        let q_ij = self.q_i[j] as f64;

        if self.y[i] != self.y[j] {
            let mut quad_coef = self.qd[i] + self.qd[j] + 2.0 * q_ij;
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (-self.g[i] - self.g[j]) / quad_coef;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let mut quad_coef = self.qd[i] + self.qd[j] - 2.0 * q_ij;
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (self.g[i] - self.g[j]) / quad_coef;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }
            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_alpha_i = self.alpha[i] - old_alpha_i;
        let delta_alpha_j = self.alpha[j] - old_alpha_j;
        for k in 0..active_size {
            self.g[k] += self.q_i[k] as f64 * delta_alpha_i + self.q_j[k] as f64 * delta_alpha_j;
        }

        let was_upper_i = self.is_upper_bound(i);
        let was_upper_j = self.is_upper_bound(j);
        self.update_alpha_status(i);
        self.update_alpha_status(j);

        let l = self.l;
        if was_upper_i != self.is_upper_bound(i) {
            load_row(&mut self.q, i, l, &mut self.q_i);
            let step = if was_upper_i { -c_i } else { c_i };
            for k in 0..l {
                self.g_bar[k] += step * self.q_i[k] as f64;
            }
        }
        if was_upper_j != self.is_upper_bound(j) {
            load_row(&mut self.q, j, l, &mut self.q_j);
            let step = if was_upper_j { -c_j } else { c_j };
            for k in 0..l {
                self.g_bar[k] += step * self.q_j[k] as f64;
            }
        }
    }

    /// Pick the next working pair, or `None` when the active set is optimal
    pub(crate) fn select_working_set(&mut self) -> Option<(usize, usize)> {
        match self.variant {
            SolverVariant::Standard => self.select_working_set_standard(),
            SolverVariant::Nu => self.select_working_set_nu(),
        }
    }

    fn select_working_set_standard(&mut self) -> Option<(usize, usize)> {
        let mut gmax = -INF;
        let mut gmax2 = -INF;
        let mut gmax_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for t in 0..self.active_size {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmax {
                    gmax = -self.g[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmax {
                gmax = self.g[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        load_row(&mut self.q, i, self.active_size, &mut self.q_i);
        let y_i = self.y[i] as f64;

        for j in 0..self.active_size {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmax + self.g[j];
                    if self.g[j] >= gmax2 {
                        gmax2 = self.g[j];
                    }
                    if grad_diff > 0.0 {
                        let quad_coef = self.qd[i] + self.qd[j] - 2.0 * y_i * self.q_i[j] as f64;
                        let obj_diff = second_order_decrease(grad_diff, quad_coef);
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmax - self.g[j];
                if -self.g[j] >= gmax2 {
                    gmax2 = -self.g[j];
                }
                if grad_diff > 0.0 {
                    let quad_coef = self.qd[i] + self.qd[j] + 2.0 * y_i * self.q_i[j] as f64;
                    let obj_diff = second_order_decrease(grad_diff, quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if gmax + gmax2 < self.config.eps {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    fn select_working_set_nu(&mut self) -> Option<(usize, usize)> {
        let mut gmaxp = -INF;
        let mut gmaxp2 = -INF;
        let mut gmaxp_idx = None;
        let mut gmaxn = -INF;
        let mut gmaxn2 = -INF;
        let mut gmaxn_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for t in 0..self.active_size {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmaxp {
                    gmaxp = -self.g[t];
                    gmaxp_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmaxn {
                gmaxn = self.g[t];
                gmaxn_idx = Some(t);
            }
        }

        // q_i holds the row of the positive candidate, q_j the negative one
        if let Some(ip) = gmaxp_idx {
            load_row(&mut self.q, ip, self.active_size, &mut self.q_i);
        }
        if let Some(in_) = gmaxn_idx {
            load_row(&mut self.q, in_, self.active_size, &mut self.q_j);
        }

        for j in 0..self.active_size {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmaxp + self.g[j];
                    if self.g[j] >= gmaxp2 {
                        gmaxp2 = self.g[j];
                    }
                    if let (true, Some(ip)) = (grad_diff > 0.0, gmaxp_idx) {
                        let quad_coef = self.qd[ip] + self.qd[j] - 2.0 * self.q_i[j] as f64;
                        let obj_diff = second_order_decrease(grad_diff, quad_coef);
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmaxn - self.g[j];
                if -self.g[j] >= gmaxn2 {
                    gmaxn2 = -self.g[j];
                }
                if let (true, Some(in_)) = (grad_diff > 0.0, gmaxn_idx) {
                    let quad_coef = self.qd[in_] + self.qd[j] - 2.0 * self.q_j[j] as f64;
                    let obj_diff = second_order_decrease(grad_diff, quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if (gmaxp + gmaxp2).max(gmaxn + gmaxn2) < self.config.eps {
            return None;
        }
        let j = gmin_idx?;
        let i = if self.y[j] == 1 { gmaxp_idx } else { gmaxn_idx }?;
        Some((i, j))
    }

    /// Bias of the standard dual
    pub(crate) fn calculate_rho(&self) -> f64 {
        let mut nr_free = 0;
        let mut ub = INF;
        let mut lb = -INF;
        let mut sum_free = 0.0;

        for i in 0..self.active_size {
            let y_g = self.y[i] as f64 * self.g[i];
            match self.alpha_status[i] {
                AlphaStatus::UpperBound => {
                    if self.y[i] == -1 {
                        ub = ub.min(y_g);
                    } else {
                        lb = lb.max(y_g);
                    }
                }
                AlphaStatus::LowerBound => {
                    if self.y[i] == 1 {
                        ub = ub.min(y_g);
                    } else {
                        lb = lb.max(y_g);
                    }
                }
                AlphaStatus::Free => {
                    nr_free += 1;
                    sum_free += y_g;
                }
            }
        }

        if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    /// Returns `(rho, r)` of the nu dual
    pub(crate) fn calculate_rho_nu(&self) -> (f64, f64) {
        let mut nr_free = [0usize; 2];
        let mut ub = [INF; 2];
        let mut lb = [-INF; 2];
        let mut sum_free = [0.0; 2];

        for i in 0..self.active_size {
            let c = if self.y[i] == 1 { 0 } else { 1 };
            match self.alpha_status[i] {
                AlphaStatus::UpperBound => lb[c] = lb[c].max(self.g[i]),
                AlphaStatus::LowerBound => ub[c] = ub[c].min(self.g[i]),
                AlphaStatus::Free => {
                    nr_free[c] += 1;
                    sum_free[c] += self.g[i];
                }
            }
        }

        let side = |c: usize| {
            if nr_free[c] > 0 {
                sum_free[c] / nr_free[c] as f64
            } else {
                (ub[c] + lb[c]) / 2.0
            }
        };
        let r1 = side(0);
        let r2 = side(1);
        ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
    }

    pub(crate) fn get_c(&self, i: usize) -> f64 {
        if self.y[i] > 0 {
            self.config.cp
        } else {
            self.config.cn
        }
    }

    pub(crate) fn update_alpha_status(&mut self, i: usize) {
        let c = self.get_c(i);
        self.alpha_status[i] = if self.alpha[i] >= c {
            AlphaStatus::UpperBound
        } else if self.alpha[i] <= 0.0 {
            AlphaStatus::LowerBound
        } else {
            AlphaStatus::Free
        };
    }

    pub(crate) fn is_upper_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::UpperBound
    }

    pub(crate) fn is_lower_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::LowerBound
    }

    pub(crate) fn is_free(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::Free
    }

    /// Exchange variables `i` and `j` everywhere, including the Q matrix
    pub(crate) fn swap_index(&mut self, i: usize, j: usize) {
        self.q.swap_index(i, j);
        self.y.swap(i, j);
        self.g.swap(i, j);
        self.alpha_status.swap(i, j);
        self.alpha.swap(i, j);
        self.p.swap(i, j);
        self.qd.swap(i, j);
        self.active_set.swap(i, j);
        self.g_bar.swap(i, j);
    }
}

/// Objective decrease `-b^2 / a` of the two-variable sub-problem
fn second_order_decrease(grad_diff: f64, quad_coef: f64) -> f64 {
    let a = if quad_coef > 0.0 { quad_coef } else { TAU };
    -(grad_diff * grad_diff) / a
}
