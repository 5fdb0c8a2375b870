//! Anderson acceleration of the projected-gradient fixed-point iteration.
//!
//! Away from the constraint boundary the forward-backward map is the
//! fixed-point iteration of `g(x) = x − γ∇ψ(x)`; Anderson acceleration
//! extrapolates through the recent history of fixed-point images `g` and
//! residuals `r = g − y_prev`, picking least-squares optimal coefficients
//! over the window of residual differences. The least-squares problem is
//! carried incrementally by a [`LimitedMemoryQR`].
//!
//! Because `r(x) = −γ∇ψ(x)` is linear in γ away from the boundary, a
//! step-size change rescales the stored residual history: both the R
//! factor of the QR and the previous residual are multiplied by
//! `γ_new/γ_old`.

use crate::float::Float;
use crate::problem::Problem;
use crate::qr::LimitedMemoryQR;

#[derive(Debug, Clone)]
pub struct AndersonAccelerator<F> {
    n: usize,
    memory: usize,
    /// `n × memory` column-major history of fixed-point images.
    g_hist: Vec<F>,
    /// Column of `g_hist` written last.
    newest: usize,
    qr: LimitedMemoryQR<F>,
    /// Residual of the previous iteration.
    r_prev: Vec<F>,
    /// Residual of the current iteration.
    r_cur: Vec<F>,
    /// Extrapolated (pre-projection) point.
    y_acc: Vec<F>,
    /// Projection of `y_acc` onto the feasible set.
    x_proj: Vec<F>,
    /// Current fixed-point image `g(xₖ)`.
    g_cur: Vec<F>,
    /// Least-squares coefficients.
    gamma_ls: Vec<F>,
    /// Residual difference, scratch.
    dr: Vec<F>,
    /// Multiplier estimate at the projected accelerated point.
    y_hat: Vec<F>,
}

impl<F: Float> AndersonAccelerator<F> {
    /// `n`/`m` are the primal/dual dimensions, `memory` the acceleration
    /// depth (callers clamp it to `n`).
    pub fn new(n: usize, m: usize, memory: usize) -> Self {
        AndersonAccelerator {
            n,
            memory,
            g_hist: vec![F::zero(); n * memory],
            newest: 0,
            qr: LimitedMemoryQR::new(n, memory),
            r_prev: vec![F::zero(); n],
            r_cur: vec![F::zero(); n],
            y_acc: vec![F::zero(); n],
            x_proj: vec![F::zero(); n],
            g_cur: vec![F::zero(); n],
            gamma_ls: vec![F::zero(); memory],
            dr: vec![F::zero(); n],
            y_hat: vec![F::zero(); m],
        }
    }

    /// Iteration-0 setup: seed the history with the first fixed-point
    /// image `y = x₀ − γ∇ψ(x₀)` and the corresponding residual.
    pub fn initialize(&mut self, x0: &[F], grad_psi: &[F], gamma: F) {
        self.qr.reset();
        for i in 0..self.n {
            self.r_prev[i] = -gamma * grad_psi[i];
            self.y_acc[i] = x0[i] + self.r_prev[i];
        }
        self.g_hist[..self.n].copy_from_slice(&self.y_acc);
        self.newest = 0;
    }

    /// The step size changed; rescale the residual history accordingly.
    pub fn changed_gamma(&mut self, gamma: F, old_gamma: F) {
        let ratio = gamma / old_gamma;
        self.qr.scale_r(ratio);
        for v in self.r_prev.iter_mut() {
            *v = *v * ratio;
        }
    }

    /// One acceleration step (iterations k ≥ 1): update the residual
    /// window, extrapolate, project onto the feasible set, and evaluate ψ
    /// there. Returns `ψ(x_proj)`; the caller accepts the candidate iff it
    /// beats the current proximal image.
    pub fn step<P: Problem<F>>(
        &mut self,
        problem: &P,
        x: &[F],
        grad_psi: &[F],
        gamma: F,
        y: &[F],
        sigma: &[F],
    ) -> F {
        let n = self.n;
        for i in 0..n {
            self.g_cur[i] = x[i] - gamma * grad_psi[i];
            self.r_cur[i] = self.g_cur[i] - self.y_acc[i];
            self.dr[i] = self.r_cur[i] - self.r_prev[i];
        }
        self.qr.add_column(&self.dr);
        let k = self.qr.num_columns();
        self.qr.solve(&self.r_cur, &mut self.gamma_ls);

        // Combine the window: α₀ = γ₀, αⱼ = γⱼ − γⱼ₋₁, α_k = 1 − γₖ₋₁,
        // applied to the stored images g_{k−m}..g_{k−1} and the current g.
        for i in 0..n {
            self.y_acc[i] = F::zero();
        }
        for j in 0..k {
            let alpha = if j == 0 {
                self.gamma_ls[0]
            } else {
                self.gamma_ls[j] - self.gamma_ls[j - 1]
            };
            let col = &self.g_hist[j * n..(j + 1) * n];
            for i in 0..n {
                self.y_acc[i] = self.y_acc[i] + alpha * col[i];
            }
        }
        let alpha_last = F::one() - self.gamma_ls[k - 1];
        for i in 0..n {
            self.y_acc[i] = self.y_acc[i] + alpha_last * self.g_cur[i];
        }

        // Store the current image. The image window trails the residual
        // window by one, so it slides one step after the QR fills up.
        self.newest = if k == self.memory {
            self.g_hist.copy_within(n.., 0);
            self.memory - 1
        } else {
            k
        };
        let dst = self.newest * n;
        self.g_hist[dst..dst + n].copy_from_slice(&self.g_cur);

        // Non-finite coefficients: keep only the newest image and refactor
        // from scratch.
        if self.gamma_ls[..k].iter().any(|v| !v.is_finite()) {
            if self.newest != 0 {
                self.g_hist.copy_within(dst..dst + n, 0);
                self.newest = 0;
            }
            self.qr.reset();
        }

        problem.proj(&self.y_acc, &mut self.x_proj);
        problem.psi_and_y_hat(&self.x_proj, y, sigma, &mut self.y_hat)
    }

    /// Swap the projected accelerated point with the solver's proximal
    /// image on acceptance. O(1).
    pub fn swap_x_proj(&mut self, x_hat: &mut Vec<F>) {
        std::mem::swap(&mut self.x_proj, x_hat);
    }

    /// Multiplier estimate at the accelerated point, valid after
    /// [`step`](Self::step).
    pub fn y_hat(&self) -> &[F] {
        &self.y_hat
    }

    /// End-of-iteration bookkeeping: a rejected candidate keeps the plain
    /// fixed-point image as the reference point; the residual always
    /// becomes the previous one.
    pub fn finish_iteration(&mut self, accepted: bool) {
        if !accepted {
            std::mem::swap(&mut self.y_acc, &mut self.g_cur);
        }
        std::mem::swap(&mut self.r_cur, &mut self.r_prev);
    }
}
