//! Forward-backward quantities derived from a proximal gradient step.

use crate::float::Float;

/// Forward-backward envelope `φ_γ(x) = ψ(x) + ‖p‖²/(2γ) + ⟨∇ψ(x), p⟩`,
/// where `p = T_γ(x) − x`.
///
/// A continuously differentiable merit function for the forward-backward
/// map; the line search enforces descent on it.
pub fn forward_backward_envelope<F: Float>(psi: F, norm_sq_p: F, grad_dot_p: F, gamma: F) -> F {
    let two = F::one() + F::one();
    psi + norm_sq_p / (two * gamma) + grad_dot_p
}

/// Stationarity measure `ε̂ = max_i |pᵢ/γ − (∇ψ(x̂)ᵢ − ∇ψ(x)ᵢ)|`.
///
/// This is the ∞-norm of a residual of the fixed-point map; it vanishes
/// exactly at stationary points of the composite problem. Non-finite
/// entries propagate so the caller can exit with a not-finite status.
pub fn error_stop_criterion<F: Float>(p: &[F], gamma: F, grad_psi_hat: &[F], grad_psi: &[F]) -> F {
    let mut err = F::zero();
    for i in 0..p.len() {
        let e = (p[i] / gamma + (grad_psi[i] - grad_psi_hat[i])).abs();
        if !e.is_finite() {
            return e;
        }
        if e > err {
            err = e;
        }
    }
    err
}
