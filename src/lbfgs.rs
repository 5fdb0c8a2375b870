//! Limited-memory BFGS direction provider for the PANOC iteration.
//!
//! Stores the most recent `(s, y)` pairs in a preallocated ring, with
//! `s = xₖ₊₁ − xₖ` and `y = pₖ − pₖ₊₁` (difference of proximal residuals),
//! and applies the inverse-Hessian approximation to the current residual
//! via the standard two-loop recursion. History is flushed whenever the
//! step size changes, since the residuals it was built from scale with γ.

use crate::direction::Direction;
use crate::float::Float;
use crate::linalg::dot;

/// L-BFGS history over preallocated ring storage.
///
/// Call [`Direction::resize`] before use; `update` and `apply` never
/// allocate.
#[derive(Debug, Clone, Default)]
pub struct Lbfgs<F> {
    n: usize,
    memory: usize,
    /// `n × memory` column-major step history.
    s: Vec<F>,
    /// `n × memory` column-major residual-difference history.
    y: Vec<F>,
    /// `1 / sᵀy` per stored pair.
    rho: Vec<F>,
    /// First-loop coefficients, scratch.
    alpha: Vec<F>,
    /// Ring slot of the oldest pair.
    head: usize,
    /// Number of stored pairs.
    size: usize,
}

impl<F: Float> Lbfgs<F> {
    pub fn new() -> Self {
        Lbfgs {
            n: 0,
            memory: 0,
            s: Vec::new(),
            y: Vec::new(),
            rho: Vec::new(),
            alpha: Vec::new(),
            head: 0,
            size: 0,
        }
    }

    /// Number of stored curvature pairs.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn col<'a>(buf: &'a [F], n: usize, slot: usize) -> &'a [F] {
        &buf[slot * n..(slot + 1) * n]
    }
}

impl<F: Float> Direction<F> for Lbfgs<F> {
    fn resize(&mut self, n: usize, memory: usize) {
        self.n = n;
        self.memory = memory;
        self.s.clear();
        self.s.resize(n * memory, F::zero());
        self.y.clear();
        self.y.resize(n * memory, F::zero());
        self.rho.clear();
        self.rho.resize(memory, F::zero());
        self.alpha.clear();
        self.alpha.resize(memory, F::zero());
        self.head = 0;
        self.size = 0;
    }

    fn initialize(&mut self, _x: &[F], _x_hat: &[F], _p: &[F], _grad_psi: &[F]) {
        self.reset();
    }

    /// Two-loop recursion: `q = H·p` with `H₀ = (sᵀy / yᵀy)·I` from the
    /// newest pair. With no history, `q = p`.
    fn apply(&mut self, _x: &[F], _x_hat: &[F], p: &[F], q: &mut [F]) {
        let n = self.n;
        q.copy_from_slice(p);
        if self.size == 0 {
            return;
        }

        // Newest to oldest.
        for i in (0..self.size).rev() {
            let slot = (self.head + i) % self.memory;
            let s_i = Self::col(&self.s, n, slot);
            let y_i = Self::col(&self.y, n, slot);
            let a = self.rho[i] * dot(s_i, q);
            self.alpha[i] = a;
            for j in 0..n {
                q[j] = q[j] - a * y_i[j];
            }
        }

        // Initial inverse-Hessian scaling from the most recent pair.
        let newest = (self.head + self.size - 1) % self.memory;
        let y_new = Self::col(&self.y, n, newest);
        let yy = dot(y_new, y_new);
        if yy > F::zero() {
            let sy = F::one() / self.rho[self.size - 1];
            let scale = sy / yy;
            for v in q.iter_mut() {
                *v = *v * scale;
            }
        }

        // Oldest to newest.
        for i in 0..self.size {
            let slot = (self.head + i) % self.memory;
            let s_i = Self::col(&self.s, n, slot);
            let y_i = Self::col(&self.y, n, slot);
            let beta = self.rho[i] * dot(y_i, q);
            let a = self.alpha[i];
            for j in 0..n {
                q[j] = q[j] + (a - beta) * s_i[j];
            }
        }
    }

    fn update(
        &mut self,
        x: &[F],
        x_next: &[F],
        p: &[F],
        p_next: &[F],
        _grad_psi_next: &[F],
        _gamma: F,
    ) -> bool {
        if self.memory == 0 {
            return false;
        }
        let n = self.n;

        // Curvature check before touching the ring, so a rejected pair
        // cannot clobber the oldest stored one.
        let mut sy = F::zero();
        for i in 0..n {
            sy = sy + (x_next[i] - x[i]) * (p[i] - p_next[i]);
        }
        if !(sy > F::zero()) {
            return false;
        }

        let slot = (self.head + self.size) % self.memory;
        {
            let s_col = &mut self.s[slot * n..(slot + 1) * n];
            for i in 0..n {
                s_col[i] = x_next[i] - x[i];
            }
        }
        {
            let y_col = &mut self.y[slot * n..(slot + 1) * n];
            for i in 0..n {
                y_col[i] = p[i] - p_next[i];
            }
        }

        if self.size == self.memory {
            // Ring full: the new pair overwrote the oldest slot.
            self.head = (self.head + 1) % self.memory;
            self.rho.copy_within(1..self.memory, 0);
            self.rho[self.memory - 1] = F::one() / sy;
        } else {
            self.rho[self.size] = F::one() / sy;
            self.size += 1;
        }
        true
    }

    fn changed_gamma(&mut self, _gamma: F, _old_gamma: F) {
        // Residual differences are expressed in the old γ scale.
        self.reset();
    }

    fn reset(&mut self) {
        self.head = 0;
        self.size = 0;
    }
}
