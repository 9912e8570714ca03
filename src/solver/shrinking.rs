//! Shrinking heuristic implementation
//!
//! Variables stuck at a bound whose gradient says they would stay there
//! are moved past `active_size` and left out of working set selection.
//! Their gradient is recovered from `G_bar` (the contribution of all
//! upper-bounded variables) plus the free variables when they are needed
//! again.

use crate::solver::qmatrix::QMatrix;
use crate::solver::smo::{load_row, SMOSolver, SolverVariant, INF};
use log::debug;

/// Extremal gradients over the active set driving the shrinking decision
#[derive(Debug, Clone, Copy)]
enum ShrinkBounds {
    /// `-y_i G_i` maximum over I_up and `y_i G_i` maximum over I_low
    Standard { gmax1: f64, gmax2: f64 },
    /// Per-class maxima: positive up/low (1, 2), negative low/up (3, 4)
    Nu {
        gmax1: f64,
        gmax2: f64,
        gmax3: f64,
        gmax4: f64,
    },
}

impl ShrinkBounds {
    fn gap(&self) -> f64 {
        match *self {
            ShrinkBounds::Standard { gmax1, gmax2 } => gmax1 + gmax2,
            ShrinkBounds::Nu {
                gmax1,
                gmax2,
                gmax3,
                gmax4,
            } => (gmax1 + gmax2).max(gmax3 + gmax4),
        }
    }
}

impl<Q: QMatrix> SMOSolver<Q> {
    /// Shrink the active set, first unshrinking once near convergence
    pub(crate) fn do_shrinking(&mut self) {
        let bounds = self.shrink_bounds();

        if !self.unshrink && bounds.gap() <= self.config.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.active_size = self.l;
            debug!("unshrinking, gap {:.6e}", bounds.gap());
        }

        let before = self.active_size;
        let mut i = 0;
        while i < self.active_size {
            if self.be_shrunk(i, bounds) {
                self.active_size -= 1;
                while self.active_size > i {
                    if !self.be_shrunk(self.active_size, bounds) {
                        self.swap_index(i, self.active_size);
                        break;
                    }
                    self.active_size -= 1;
                }
            }
            i += 1;
        }

        if self.active_size < before {
            debug!("shrinking: active size {} -> {}", before, self.active_size);
        }
    }

    fn shrink_bounds(&self) -> ShrinkBounds {
        match self.variant {
            SolverVariant::Standard => {
                let mut gmax1 = -INF;
                let mut gmax2 = -INF;
                for i in 0..self.active_size {
                    let g = self.g[i];
                    if self.y[i] == 1 {
                        if !self.is_upper_bound(i) && -g >= gmax1 {
                            gmax1 = -g;
                        }
                        if !self.is_lower_bound(i) && g >= gmax2 {
                            gmax2 = g;
                        }
                    } else {
                        if !self.is_upper_bound(i) && -g >= gmax2 {
                            gmax2 = -g;
                        }
                        if !self.is_lower_bound(i) && g >= gmax1 {
                            gmax1 = g;
                        }
                    }
                }
                ShrinkBounds::Standard { gmax1, gmax2 }
            }
            SolverVariant::Nu => {
                let mut gmax1 = -INF;
                let mut gmax2 = -INF;
                let mut gmax3 = -INF;
                let mut gmax4 = -INF;
                for i in 0..self.active_size {
                    let g = self.g[i];
                    if !self.is_upper_bound(i) {
                        if self.y[i] == 1 {
                            gmax1 = gmax1.max(-g);
                        } else {
                            gmax4 = gmax4.max(-g);
                        }
                    }
                    if !self.is_lower_bound(i) {
                        if self.y[i] == 1 {
                            gmax2 = gmax2.max(g);
                        } else {
                            gmax3 = gmax3.max(g);
                        }
                    }
                }
                ShrinkBounds::Nu {
                    gmax1,
                    gmax2,
                    gmax3,
                    gmax4,
                }
            }
        }
    }

    fn be_shrunk(&self, i: usize, bounds: ShrinkBounds) -> bool {
        let g = self.g[i];
        let positive = self.y[i] == 1;
        match bounds {
            ShrinkBounds::Standard { gmax1, gmax2 } => {
                if self.is_upper_bound(i) {
                    -g > if positive { gmax1 } else { gmax2 }
                } else if self.is_lower_bound(i) {
                    g > if positive { gmax2 } else { gmax1 }
                } else {
                    false
                }
            }
            ShrinkBounds::Nu {
                gmax1,
                gmax2,
                gmax3,
                gmax4,
            } => {
                if self.is_upper_bound(i) {
                    -g > if positive { gmax1 } else { gmax4 }
                } else if self.is_lower_bound(i) {
                    g > if positive { gmax2 } else { gmax3 }
                } else {
                    false
                }
            }
        }
    }

    /// Recompute the gradient of the inactive variables
    pub(crate) fn reconstruct_gradient(&mut self) {
        let l = self.l;
        let active_size = self.active_size;
        if active_size == l {
            return;
        }

        for j in active_size..l {
            self.g[j] = self.g_bar[j] + self.p[j];
        }

        let nr_free = (0..active_size).filter(|&j| self.is_free(j)).count();
        if 2 * nr_free < active_size {
            debug!("few free variables while reconstructing; disabling shrinking may be faster");
        }

        if nr_free * l > 2 * active_size * (l - active_size) {
            for i in active_size..l {
                load_row(&mut self.q, i, active_size, &mut self.q_i);
                for j in 0..active_size {
                    if self.is_free(j) {
                        self.g[i] += self.alpha[j] * self.q_i[j] as f64;
                    }
                }
            }
        } else {
            for i in 0..active_size {
                if !self.is_free(i) {
                    continue;
                }
                load_row(&mut self.q, i, l, &mut self.q_i);
                let alpha_i = self.alpha[i];
                for j in active_size..l {
                    self.g[j] += alpha_i * self.q_i[j] as f64;
                }
            }
        }
    }
}
