//! Limited-memory QR factorization of a sliding window of columns.
//!
//! Maintains `A = Q·R` for the `min(k, memory)` most recently added
//! columns. Appending orthogonalizes the new column against the current
//! basis (modified Gram-Schmidt); when the window is full the oldest
//! column is evicted first, which leaves R in upper-Hessenberg form and is
//! repaired with a sweep of Givens rotations applied to R and to the basis
//! Q. The R factor supports a scalar rescale, used when the residuals the
//! columns were built from are rescaled by a step-size change.
//!
//! Least-squares solves `min ‖A·γ − b‖` go through `γ = R⁻¹ Qᵀ b` by back
//! substitution. A rank-deficient window yields non-finite coefficients,
//! which callers detect and answer with [`LimitedMemoryQR::reset`].

use crate::float::Float;

#[derive(Debug, Clone)]
pub struct LimitedMemoryQR<F> {
    n: usize,
    memory: usize,
    size: usize,
    /// `n × memory` column-major orthonormal basis.
    q: Vec<F>,
    /// `memory × memory` column-major upper-triangular factor.
    r: Vec<F>,
}

impl<F: Float> LimitedMemoryQR<F> {
    pub fn new(n: usize, memory: usize) -> Self {
        LimitedMemoryQR {
            n,
            memory,
            size: 0,
            q: vec![F::zero(); n * memory],
            r: vec![F::zero(); memory * memory],
        }
    }

    /// Number of columns currently in the window.
    pub fn num_columns(&self) -> usize {
        self.size
    }

    /// Window capacity.
    pub fn memory(&self) -> usize {
        self.memory
    }

    /// Index of the most recently added column.
    ///
    /// Only meaningful while the window is nonempty.
    pub fn newest_column(&self) -> usize {
        debug_assert!(self.size > 0);
        self.size - 1
    }

    /// Drop every column.
    pub fn reset(&mut self) {
        self.size = 0;
    }

    /// Multiply the R factor by `factor`.
    ///
    /// Equivalent to scaling every window column by `factor` (the basis Q
    /// is unchanged).
    pub fn scale_r(&mut self, factor: F) {
        for col in 0..self.size {
            for row in 0..=col {
                self.r[col * self.memory + row] = self.r[col * self.memory + row] * factor;
            }
        }
    }

    /// Append `v` to the window, evicting the oldest column if full.
    pub fn add_column(&mut self, v: &[F]) {
        debug_assert_eq!(v.len(), self.n);
        if self.size == self.memory {
            self.remove_oldest();
        }
        let n = self.n;
        let j = self.size;
        self.q[j * n..(j + 1) * n].copy_from_slice(v);

        // Modified Gram-Schmidt against the existing basis.
        for i in 0..j {
            let mut rij = F::zero();
            for row in 0..n {
                rij = rij + self.q[i * n + row] * self.q[j * n + row];
            }
            self.r[j * self.memory + i] = rij;
            for row in 0..n {
                self.q[j * n + row] = self.q[j * n + row] - rij * self.q[i * n + row];
            }
        }

        let mut norm_sq = F::zero();
        for row in 0..n {
            norm_sq = norm_sq + self.q[j * n + row] * self.q[j * n + row];
        }
        let norm = norm_sq.sqrt();
        self.r[j * self.memory + j] = norm;
        if norm > F::zero() {
            for row in 0..n {
                self.q[j * n + row] = self.q[j * n + row] / norm;
            }
        }
        self.size += 1;
    }

    /// Least squares against the window: write the first
    /// [`num_columns`](Self::num_columns) entries of `gamma` with
    /// `argmin ‖A·γ − b‖`.
    ///
    /// A zero diagonal in R produces non-finite entries rather than an
    /// error; the caller decides how to recover.
    pub fn solve(&self, b: &[F], gamma: &mut [F]) {
        debug_assert_eq!(b.len(), self.n);
        debug_assert!(gamma.len() >= self.size);
        let n = self.n;
        // γ ← Qᵀ b
        for i in 0..self.size {
            let mut s = F::zero();
            for row in 0..n {
                s = s + self.q[i * n + row] * b[row];
            }
            gamma[i] = s;
        }
        // Back substitution R·γ = Qᵀb.
        for i in (0..self.size).rev() {
            let mut s = gamma[i];
            for j in (i + 1)..self.size {
                s = s - self.r[j * self.memory + i] * gamma[j];
            }
            gamma[i] = s / self.r[i * self.memory + i];
        }
    }

    /// Evict the oldest column.
    ///
    /// Dropping the first column of R leaves the remaining coefficients in
    /// upper-Hessenberg form; a sweep of Givens rotations restores the
    /// triangle, rotating the corresponding basis vectors of Q to keep
    /// `A = Q·R`.
    fn remove_oldest(&mut self) {
        let n = self.n;
        let mem = self.memory;
        // Shift the R columns left; column j keeps rows 0..=j+1.
        for j in 0..self.size - 1 {
            for row in 0..=(j + 1).min(mem - 1) {
                self.r[j * mem + row] = self.r[(j + 1) * mem + row];
            }
        }
        self.size -= 1;

        for i in 0..self.size {
            let a = self.r[i * mem + i];
            let b = self.r[i * mem + i + 1];
            if b == F::zero() {
                continue;
            }
            let h = (a * a + b * b).sqrt();
            let c = a / h;
            let s = b / h;
            self.r[i * mem + i] = h;
            self.r[i * mem + i + 1] = F::zero();
            for j in (i + 1)..self.size {
                let r1 = self.r[j * mem + i];
                let r2 = self.r[j * mem + i + 1];
                self.r[j * mem + i] = c * r1 + s * r2;
                self.r[j * mem + i + 1] = c * r2 - s * r1;
            }
            for row in 0..n {
                let q1 = self.q[i * n + row];
                let q2 = self.q[(i + 1) * n + row];
                self.q[i * n + row] = c * q1 + s * q2;
                self.q[(i + 1) * n + row] = c * q2 - s * q1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn random_vec(rng: &mut StdRng, n: usize) -> Vec<f64> {
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    /// Dense least-squares reference via normal equations `AᵀA γ = Aᵀb`,
    /// solved with Gaussian elimination. Fine for the small, well-
    /// conditioned systems used in these tests.
    fn lstsq_reference(cols: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
        let k = cols.len();
        let mut ata = vec![vec![0.0; k]; k];
        let mut atb = vec![0.0; k];
        for i in 0..k {
            for j in 0..k {
                ata[i][j] = cols[i].iter().zip(&cols[j]).map(|(a, b)| a * b).sum();
            }
            atb[i] = cols[i].iter().zip(b).map(|(a, b)| a * b).sum();
        }
        // Gaussian elimination with partial pivoting.
        for col in 0..k {
            let pivot = (col..k)
                .max_by(|&a, &b| ata[a][col].abs().partial_cmp(&ata[b][col].abs()).unwrap())
                .unwrap();
            ata.swap(col, pivot);
            atb.swap(col, pivot);
            for row in (col + 1)..k {
                let f = ata[row][col] / ata[col][col];
                for j in col..k {
                    ata[row][j] -= f * ata[col][j];
                }
                atb[row] -= f * atb[col];
            }
        }
        let mut x = vec![0.0; k];
        for i in (0..k).rev() {
            let mut s = atb[i];
            for j in (i + 1)..k {
                s -= ata[i][j] * x[j];
            }
            x[i] = s / ata[i][i];
        }
        x
    }

    fn residual_norm(cols: &[Vec<f64>], gamma: &[f64], b: &[f64]) -> f64 {
        let n = b.len();
        let mut r = 0.0;
        for row in 0..n {
            let mut v = -b[row];
            for (c, g) in cols.iter().zip(gamma) {
                v += c[row] * g;
            }
            r += v * v;
        }
        r.sqrt()
    }

    #[test]
    fn solve_matches_dense_reference() {
        let mut rng = StdRng::seed_from_u64(7);
        let (n, k) = (8, 4);
        let cols: Vec<Vec<f64>> = (0..k).map(|_| random_vec(&mut rng, n)).collect();
        let b = random_vec(&mut rng, n);

        let mut qr = LimitedMemoryQR::new(n, k);
        for c in &cols {
            qr.add_column(c);
        }
        let mut gamma = vec![0.0; k];
        qr.solve(&b, &mut gamma);

        let reference = lstsq_reference(&cols, &b);
        for i in 0..k {
            assert!(
                (gamma[i] - reference[i]).abs() < 1e-9,
                "gamma[{i}] = {}, reference {}",
                gamma[i],
                reference[i]
            );
        }
    }

    #[test]
    fn eviction_matches_fresh_factorization() {
        let mut rng = StdRng::seed_from_u64(42);
        let (n, mem, total) = (10, 3, 9);
        let cols: Vec<Vec<f64>> = (0..total).map(|_| random_vec(&mut rng, n)).collect();
        let b = random_vec(&mut rng, n);

        let mut qr = LimitedMemoryQR::new(n, mem);
        for c in &cols {
            qr.add_column(c);
        }
        assert_eq!(qr.num_columns(), mem);

        let mut gamma = vec![0.0; mem];
        qr.solve(&b, &mut gamma);

        // Same window, factored from scratch.
        let window = &cols[total - mem..];
        let mut fresh = LimitedMemoryQR::new(n, mem);
        for c in window {
            fresh.add_column(c);
        }
        let mut expected = vec![0.0; mem];
        fresh.solve(&b, &mut expected);

        for i in 0..mem {
            assert!(
                (gamma[i] - expected[i]).abs() < 1e-9,
                "gamma[{i}] = {}, expected {}",
                gamma[i],
                expected[i]
            );
        }
        // And both must actually minimize the residual over the window.
        let reference = lstsq_reference(window, &b);
        let diff = residual_norm(window, &gamma, &b) - residual_norm(window, &reference, &b);
        assert!(diff.abs() < 1e-9, "residual gap {diff}");
    }

    #[test]
    fn scale_r_rescales_the_window() {
        let mut rng = StdRng::seed_from_u64(3);
        let (n, k) = (6, 3);
        let cols: Vec<Vec<f64>> = (0..k).map(|_| random_vec(&mut rng, n)).collect();
        let b = random_vec(&mut rng, n);

        let mut qr = LimitedMemoryQR::new(n, k);
        for c in &cols {
            qr.add_column(c);
        }
        qr.scale_r(0.5);
        let mut gamma = vec![0.0; k];
        qr.solve(&b, &mut gamma);

        // min ‖(cA)γ − b‖ has solution γ*/c.
        let reference = lstsq_reference(&cols, &b);
        for i in 0..k {
            assert!(
                (gamma[i] - reference[i] / 0.5).abs() < 1e-9,
                "gamma[{i}] = {}, expected {}",
                gamma[i],
                reference[i] / 0.5
            );
        }
    }

    #[test]
    fn rank_deficiency_yields_non_finite() {
        let n = 4;
        let c = vec![1.0, 2.0, 3.0, 4.0];
        let mut qr: LimitedMemoryQR<f64> = LimitedMemoryQR::new(n, 2);
        qr.add_column(&c);
        qr.add_column(&c); // linearly dependent
        let mut gamma = vec![0.0; 2];
        qr.solve(&[1.0, 0.0, 0.0, 0.0], &mut gamma);
        assert!(gamma.iter().any(|g| !g.is_finite()));
    }

    #[test]
    fn reset_empties_the_window() {
        let mut qr: LimitedMemoryQR<f64> = LimitedMemoryQR::new(3, 2);
        qr.add_column(&[1.0, 0.0, 0.0]);
        assert_eq!(qr.num_columns(), 1);
        assert_eq!(qr.newest_column(), 0);
        qr.reset();
        assert_eq!(qr.num_columns(), 0);
        qr.add_column(&[0.0, 1.0, 0.0]);
        let mut gamma = vec![0.0; 1];
        qr.solve(&[0.0, 2.0, 0.0], &mut gamma);
        assert!((gamma[0] - 2.0).abs() < 1e-12);
    }
}
