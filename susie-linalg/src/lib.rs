//! susie-linalg: Linear algebra layer for susie-rs.
//!
//! Provides dense and sparse matrix wrappers, the scaled matrix view used
//! for matrix-free standardized products over large sparse design matrices,
//! and the Cholesky-based positive-semi-definiteness check applied to
//! correlation matrices.

pub mod dense;
pub mod decomposition;
pub mod scaled;
pub mod sparse;

pub use dense::DenseMatrix;
pub use scaled::{DesignMatrix, ScaledMatrixView};
pub use sparse::SparseMatrix;
