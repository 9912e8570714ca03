//! Kernel cache implementation
//!
//! Provides a bounded LRU cache of kernel matrix rows for the SMO solver.
//! Each training example owns one row record; cached rows are kept in a
//! circular doubly linked list (an arena of records linked by index, with a
//! sentinel at position `l`) ordered from least to most recently used.
//! Rows are stored as 4-byte floats and are evicted whole from the LRU end
//! when the budget runs out.

use std::mem;

/// Element type of cached kernel rows
pub type Qfloat = f32;

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    prev: usize,
    next: usize,
    /// Cached prefix of the row; its length is the number of valid values
    data: Vec<Qfloat>,
}

/// LRU cache of kernel matrix rows
#[derive(Debug)]
pub struct KernelCache {
    l: usize,
    /// Remaining budget in `Qfloat` units
    size: usize,
    capacity: usize,
    /// `l` row records followed by the list sentinel
    entries: Vec<CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl KernelCache {
    /// Create a cache for `l` rows with a budget of `size_bytes`.
    ///
    /// The per-row bookkeeping is charged against the budget, which is
    /// floored at two full rows.
    pub fn new(l: usize, size_bytes: usize) -> Self {
        let unit = mem::size_of::<Qfloat>();
        let overhead = l * mem::size_of::<CacheEntry>() / unit;
        let size = (size_bytes / unit).saturating_sub(overhead).max(2 * l);

        let mut entries = vec![CacheEntry::default(); l + 1];
        entries[l].prev = l;
        entries[l].next = l;

        Self {
            l,
            size,
            capacity: size,
            entries,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Create a cache for `l` rows from a budget given in MB
    pub fn with_megabytes(l: usize, megabytes: f64) -> Self {
        Self::new(l, (megabytes.max(0.0) * (1u64 << 20) as f64) as usize)
    }

    /// Fetch row `index` with room for `len` values.
    ///
    /// Returns the row slice and the position from which the caller must fill
    /// it: values before `start` are already valid, `start == len` on a full
    /// hit.
    pub fn get_data(&mut self, index: usize, len: usize) -> (&mut [Qfloat], usize) {
        let had = self.entries[index].data.len();
        if had > 0 {
            self.lru_delete(index);
        }

        let start = if had < len {
            let more = len - had;
            while self.size < more {
                let oldest = self.entries[self.l].next;
                if oldest == self.l {
                    break;
                }
                self.evict(oldest);
            }
            self.entries[index].data.resize(len, 0.0);
            self.size = self.size.saturating_sub(more);
            self.misses += 1;
            had
        } else {
            self.hits += 1;
            len
        };

        self.lru_insert(index);
        (&mut self.entries[index].data[..len], start)
    }

    /// Exchange rows and columns `i` and `j`.
    ///
    /// Rows long enough to hold both columns swap their values; rows that
    /// hold column `i` but not column `j` are dropped.
    pub fn swap_index(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }

        if !self.entries[i].data.is_empty() {
            self.lru_delete(i);
        }
        if !self.entries[j].data.is_empty() {
            self.lru_delete(j);
        }
        let data_i = mem::take(&mut self.entries[i].data);
        let data_j = mem::replace(&mut self.entries[j].data, data_i);
        self.entries[i].data = data_j;
        if !self.entries[i].data.is_empty() {
            self.lru_insert(i);
        }
        if !self.entries[j].data.is_empty() {
            self.lru_insert(j);
        }

        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let mut h = self.entries[self.l].next;
        while h != self.l {
            let next = self.entries[h].next;
            let len = self.entries[h].data.len();
            if len > lo {
                if len > hi {
                    self.entries[h].data.swap(lo, hi);
                } else {
                    self.evict(h);
                }
            }
            h = next;
        }
    }

    /// Number of valid values cached for row `index`
    pub fn row_len(&self, index: usize) -> usize {
        self.entries[index].data.len()
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            capacity: self.capacity,
            used: self.capacity - self.size,
        }
    }

    fn evict(&mut self, index: usize) {
        self.lru_delete(index);
        let freed = mem::take(&mut self.entries[index].data);
        self.size += freed.len();
        self.evictions += 1;
    }

    fn lru_delete(&mut self, index: usize) {
        let prev = self.entries[index].prev;
        let next = self.entries[index].next;
        self.entries[prev].next = next;
        self.entries[next].prev = prev;
    }

    fn lru_insert(&mut self, index: usize) {
        let head = self.l;
        let last = self.entries[head].prev;
        self.entries[index].next = head;
        self.entries[index].prev = last;
        self.entries[last].next = index;
        self.entries[head].prev = index;
    }
}

/// Cache statistics; sizes are in `Qfloat` units
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub capacity: usize,
    pub used: usize,
}
