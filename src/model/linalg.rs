//! Dense matrix math for the sequence models
//!
//! A deliberately small row-major `f64` matrix, sized for on-device models
//! (hidden widths in the tens). Shapes are asserted at the call site through
//! debug assertions; artifact loading is the only boundary where shape
//! errors are recoverable, and that path validates explicitly.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Row-major dense matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    /// Zero matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Uniform(-bound, bound) initialization
    pub fn uniform(rows: usize, cols: usize, bound: f64, rng: &mut StdRng) -> Self {
        let data = (0..rows * cols)
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        Self { rows, cols, data }
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, v: f64) {
        self.data[r * self.cols + c] = v;
    }

    #[inline]
    pub fn add_at(&mut self, r: usize, c: usize, v: f64) {
        self.data[r * self.cols + c] += v;
    }

    /// `self * other`
    pub fn matmul(&self, other: &Matrix) -> Matrix {
        debug_assert_eq!(self.cols, other.rows);
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out.data[i * other.cols + j] += a * other.get(k, j);
                }
            }
        }
        out
    }

    /// `self^T`
    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.set(j, i, self.get(i, j));
            }
        }
        out
    }

    /// `self * v` for a column vector `v`
    pub fn matvec(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(self.cols, v.len());
        let mut out = vec![0.0; self.rows];
        for (i, o) in out.iter_mut().enumerate() {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            *o = row.iter().zip(v).map(|(a, b)| a * b).sum();
        }
        out
    }

    /// `self^T * v` without materializing the transpose
    pub fn matvec_transposed(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(self.rows, v.len());
        let mut out = vec![0.0; self.cols];
        for (i, &vi) in v.iter().enumerate() {
            if vi == 0.0 {
                continue;
            }
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            for (o, &a) in out.iter_mut().zip(row) {
                *o += vi * a;
            }
        }
        out
    }

    /// Accumulate the outer product `a * b^T` into `self`
    pub fn add_outer(&mut self, a: &[f64], b: &[f64]) {
        debug_assert_eq!(self.rows, a.len());
        debug_assert_eq!(self.cols, b.len());
        for (i, &ai) in a.iter().enumerate() {
            if ai == 0.0 {
                continue;
            }
            let row = &mut self.data[i * self.cols..(i + 1) * self.cols];
            for (r, &bj) in row.iter_mut().zip(b) {
                *r += ai * bj;
            }
        }
    }

    /// Elementwise accumulate `other * scale` into `self`
    pub fn add_scaled(&mut self, other: &Matrix, scale: f64) {
        debug_assert_eq!(self.rows, other.rows);
        debug_assert_eq!(self.cols, other.cols);
        for (d, o) in self.data.iter_mut().zip(&other.data) {
            *d += o * scale;
        }
    }

    /// One row as a slice
    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }
}

/// Logistic sigmoid
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// In-place softmax over a slice (max-shifted for stability)
pub fn softmax_inplace(xs: &mut [f64]) {
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for x in xs.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    if sum > 0.0 {
        for x in xs.iter_mut() {
            *x /= sum;
        }
    }
}

/// Index of the maximum value; ties break toward the lowest index
pub fn argmax(xs: &[f64]) -> usize {
    let mut best = 0;
    for (i, &x) in xs.iter().enumerate().skip(1) {
        if x > xs[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_matmul() {
        let a = Matrix {
            rows: 2,
            cols: 3,
            data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        };
        let b = Matrix {
            rows: 3,
            cols: 2,
            data: vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0],
        };
        let c = a.matmul(&b);
        assert_eq!(c.data, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matvec_and_transpose_agree() {
        let a = Matrix {
            rows: 2,
            cols: 3,
            data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        };
        let v = vec![1.0, 0.5];
        let direct = a.matvec_transposed(&v);
        let via_transpose = a.transpose().matvec(&v);
        assert_eq!(direct, via_transpose);
    }

    #[test]
    fn test_add_outer() {
        let mut m = Matrix::zeros(2, 2);
        m.add_outer(&[1.0, 2.0], &[3.0, 4.0]);
        assert_eq!(m.data, vec![3.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_softmax_is_distribution() {
        let mut xs = vec![1.0, 2.0, 3.0, 4.0];
        softmax_inplace(&mut xs);
        let sum: f64 = xs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_argmax_breaks_ties_low() {
        assert_eq!(argmax(&[0.25, 0.25, 0.25, 0.25]), 0);
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), 1);
        assert_eq!(argmax(&[0.0, 0.0, 0.9, 0.1]), 2);
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert!(sigmoid(-50.0) < 1e-10);
        assert!(sigmoid(50.0) > 1.0 - 1e-10);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
    }
}
