//! Q matrices consumed by the SMO solver
//!
//! Each adapter pairs a [`KernelMatrix`] with a [`KernelCache`] and exposes
//! rows of the dual Hessian:
//! - [`SvcQ`]: `Q[i][j] = y_i * y_j * K(i, j)`
//! - [`OneClassQ`]: `Q[i][j] = K(i, j)`
//! - [`SvrQ`]: the `2l x 2l` signed matrix of the regression dual
//!
//! On a cache miss only the missing suffix of a row is evaluated.

use crate::cache::{CacheStats, KernelCache, Qfloat};
use crate::core::SparseVector;
use crate::kernel::{KernelFunction, KernelMatrix};

/// Row access to the Q matrix of a dual problem
pub trait QMatrix {
    /// First `len` entries of row `i`
    fn get_q(&mut self, i: usize, len: usize) -> &[Qfloat];

    /// Diagonal of Q
    fn get_qd(&self) -> &[f64];

    /// Exchange variables `i` and `j`
    fn swap_index(&mut self, i: usize, j: usize);

    /// Number of kernel evaluations performed so far
    fn kernel_evaluations(&self) -> u64;

    fn cache_stats(&self) -> CacheStats;
}

/// Q matrix of C-SVC and nu-SVC
#[derive(Debug)]
pub struct SvcQ<'a> {
    kernel: KernelMatrix<'a>,
    cache: KernelCache,
    y: Vec<i8>,
    qd: Vec<f64>,
    evaluations: u64,
}

impl<'a> SvcQ<'a> {
    pub fn new(
        x: &[&'a SparseVector],
        y: &[i8],
        function: KernelFunction,
        cache_size_mb: f64,
    ) -> Self {
        let kernel = KernelMatrix::new(function, x);
        let qd: Vec<f64> = (0..x.len()).map(|i| kernel.evaluate(i, i)).collect();
        Self {
            cache: KernelCache::with_megabytes(x.len(), cache_size_mb),
            kernel,
            y: y.to_vec(),
            evaluations: qd.len() as u64,
            qd,
        }
    }
}

impl QMatrix for SvcQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[Qfloat] {
        let (data, start) = self.cache.get_data(i, len);
        if start < len {
            let yi = self.y[i] as f64;
            for j in start..len {
                let value = yi * self.y[j] as f64 * self.kernel.evaluate(i, j);
                data[j] = value as Qfloat;
            }
            self.evaluations += (len - start) as u64;
        }
        data
    }

    fn get_qd(&self) -> &[f64] {
        &self.qd
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.cache.swap_index(i, j);
        self.kernel.swap_index(i, j);
        self.y.swap(i, j);
        self.qd.swap(i, j);
    }

    fn kernel_evaluations(&self) -> u64 {
        self.evaluations
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Q matrix of one-class SVM
#[derive(Debug)]
pub struct OneClassQ<'a> {
    kernel: KernelMatrix<'a>,
    cache: KernelCache,
    qd: Vec<f64>,
    evaluations: u64,
}

impl<'a> OneClassQ<'a> {
    pub fn new(x: &[&'a SparseVector], function: KernelFunction, cache_size_mb: f64) -> Self {
        let kernel = KernelMatrix::new(function, x);
        let qd: Vec<f64> = (0..x.len()).map(|i| kernel.evaluate(i, i)).collect();
        Self {
            cache: KernelCache::with_megabytes(x.len(), cache_size_mb),
            kernel,
            evaluations: qd.len() as u64,
            qd,
        }
    }
}

impl QMatrix for OneClassQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[Qfloat] {
        let (data, start) = self.cache.get_data(i, len);
        if start < len {
            for j in start..len {
                data[j] = self.kernel.evaluate(i, j) as Qfloat;
            }
            self.evaluations += (len - start) as u64;
        }
        data
    }

    fn get_qd(&self) -> &[f64] {
        &self.qd
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.cache.swap_index(i, j);
        self.kernel.swap_index(i, j);
        self.qd.swap(i, j);
    }

    fn kernel_evaluations(&self) -> u64 {
        self.evaluations
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Q matrix of epsilon-SVR and nu-SVR.
///
/// Variable `k < l` is `alpha+_k`, variable `k + l` is `alpha-_k`. The cache
/// holds the `l` real kernel rows, which are never permuted; `swap_index`
/// only reorders the sign and index maps.
#[derive(Debug)]
pub struct SvrQ<'a> {
    kernel: KernelMatrix<'a>,
    cache: KernelCache,
    l: usize,
    sign: Vec<i8>,
    index: Vec<usize>,
    qd: Vec<f64>,
    buffer: Vec<Qfloat>,
    evaluations: u64,
}

impl<'a> SvrQ<'a> {
    pub fn new(x: &[&'a SparseVector], function: KernelFunction, cache_size_mb: f64) -> Self {
        let l = x.len();
        let kernel = KernelMatrix::new(function, x);

        let mut sign = vec![0i8; 2 * l];
        let mut index = vec![0usize; 2 * l];
        let mut qd = vec![0.0; 2 * l];
        for k in 0..l {
            sign[k] = 1;
            sign[k + l] = -1;
            index[k] = k;
            index[k + l] = k;
            let diagonal = kernel.evaluate(k, k);
            qd[k] = diagonal;
            qd[k + l] = diagonal;
        }

        Self {
            cache: KernelCache::with_megabytes(l, cache_size_mb),
            kernel,
            l,
            sign,
            index,
            qd,
            buffer: vec![0.0; 2 * l],
            evaluations: l as u64,
        }
    }
}

impl QMatrix for SvrQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[Qfloat] {
        let real_i = self.index[i];
        let l = self.l;

        let (data, start) = self.cache.get_data(real_i, l);
        if start < l {
            for j in start..l {
                data[j] = self.kernel.evaluate(real_i, j) as Qfloat;
            }
            self.evaluations += (l - start) as u64;
        }

        let si = self.sign[i] as Qfloat;
        for j in 0..len {
            self.buffer[j] = si * self.sign[j] as Qfloat * data[self.index[j]];
        }
        &self.buffer[..len]
    }

    fn get_qd(&self) -> &[f64] {
        &self.qd
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.sign.swap(i, j);
        self.index.swap(i, j);
        self.qd.swap(i, j);
    }

    fn kernel_evaluations(&self) -> u64 {
        self.evaluations
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
