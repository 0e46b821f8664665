#![allow(clippy::needless_range_loop)]
//! Sparse matrix operations backed by sprs.
//!
//! Column-major (CSC) storage: the fine-mapping engine consumes design
//! matrices column by column (per-variable products, column sums, pairwise
//! column dots), so every operation here touches only stored non-zeros of
//! the columns involved.

use sprs::{CsMatI, TriMat};

/// A sparse matrix wrapper around sprs CSC format.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    inner: CsMatI<f64, usize>,
    nrows: usize,
    ncols: usize,
}

impl SparseMatrix {
    /// Create a sparse matrix from COO (coordinate) triplets.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        rows: &[usize],
        cols: &[usize],
        vals: &[f64],
    ) -> Self {
        assert_eq!(rows.len(), cols.len());
        assert_eq!(rows.len(), vals.len());
        let mut tri = TriMat::new((nrows, ncols));
        for i in 0..rows.len() {
            tri.add_triplet(rows[i], cols[i], vals[i]);
        }
        let csc = tri.to_csc();
        Self {
            inner: csc,
            nrows,
            ncols,
        }
    }

    /// Create from a dense column-major buffer (keeps only non-zero entries).
    pub fn from_dense(data: &[f64], nrows: usize, ncols: usize) -> Self {
        assert_eq!(data.len(), nrows * ncols);
        let mut tri = TriMat::new((nrows, ncols));
        for j in 0..ncols {
            for i in 0..nrows {
                let val = data[j * nrows + i];
                if val != 0.0 {
                    tri.add_triplet(i, j, val);
                }
            }
        }
        let csc = tri.to_csc();
        Self {
            inner: csc,
            nrows,
            ncols,
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    /// Get element at (row, col). Returns 0.0 if not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        match self.inner.get(row, col) {
            Some(&v) => v,
            None => 0.0,
        }
    }

    /// Column range in the CSC data arrays.
    fn col_range(&self, j: usize) -> (usize, usize) {
        let indptr = self.inner.indptr();
        let ptr = indptr.as_slice().unwrap();
        (ptr[j], ptr[j + 1])
    }

    /// Sparse matrix-vector product: self * v.
    ///
    /// Scatters each column's non-zeros, so cost is O(nnz).
    pub fn mat_vec(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.ncols);
        let indices = self.inner.indices();
        let data = self.inner.data();
        let mut result = vec![0.0; self.nrows];
        for j in 0..self.ncols {
            let vj = v[j];
            if vj == 0.0 {
                continue;
            }
            let (start, end) = self.col_range(j);
            for idx in start..end {
                result[indices[idx]] += data[idx] * vj;
            }
        }
        result
    }

    /// Transposed product: self' * v, one dot per column.
    pub fn t_mat_vec(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.nrows);
        let indices = self.inner.indices();
        let data = self.inner.data();
        let mut result = vec![0.0; self.ncols];
        for j in 0..self.ncols {
            let (start, end) = self.col_range(j);
            let mut s = 0.0;
            for idx in start..end {
                s += data[idx] * v[indices[idx]];
            }
            result[j] = s;
        }
        result
    }

    /// Sum of a column's entries.
    pub fn col_sum(&self, j: usize) -> f64 {
        let data = self.inner.data();
        let (start, end) = self.col_range(j);
        data[start..end].iter().sum()
    }

    /// Sum of squares of a column's entries.
    pub fn col_sq_sum(&self, j: usize) -> f64 {
        let data = self.inner.data();
        let (start, end) = self.col_range(j);
        data[start..end].iter().map(|v| v * v).sum()
    }

    /// Dot product between two columns, merging sorted non-zero index lists.
    pub fn col_dot(&self, a: usize, b: usize) -> f64 {
        if a == b {
            return self.col_sq_sum(a);
        }
        let indices = self.inner.indices();
        let data = self.inner.data();
        let (mut ia, enda) = self.col_range(a);
        let (mut ib, endb) = self.col_range(b);
        let mut s = 0.0;
        while ia < enda && ib < endb {
            let ra = indices[ia];
            let rb = indices[ib];
            if ra == rb {
                s += data[ia] * data[ib];
                ia += 1;
                ib += 1;
            } else if ra < rb {
                ia += 1;
            } else {
                ib += 1;
            }
        }
        s
    }
}
