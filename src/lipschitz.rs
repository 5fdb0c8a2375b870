//! Lipschitz constant estimation for ∇ψ: a one-shot finite-difference
//! estimate at the starting point, and the adaptive doubling loop driven by
//! the quadratic upper bound.

use crate::float::Float;
use crate::linalg::{dot, norm, norm_sq};
use crate::problem::Problem;

/// Parameters of the initial Lipschitz estimate and the step-size coupling.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LipschitzParams<F> {
    /// Relative perturbation for the finite-difference estimate (default: 1e-6).
    pub epsilon: F,
    /// Minimum absolute perturbation (default: 1e-12).
    pub delta: F,
    /// Factor relating the step size γ to the Lipschitz estimate L:
    /// `γ = lgamma_factor / L` (default: 0.95).
    pub lgamma_factor: F,
}

impl Default for LipschitzParams<f64> {
    fn default() -> Self {
        LipschitzParams {
            epsilon: 1e-6,
            delta: 1e-12,
            lgamma_factor: 0.95,
        }
    }
}

impl Default for LipschitzParams<f32> {
    fn default() -> Self {
        LipschitzParams {
            epsilon: 1e-4,
            delta: 1e-8,
            lgamma_factor: 0.95,
        }
    }
}

/// Finite-difference estimate of the Lipschitz constant of ∇ψ at `x0`.
///
/// Perturbs a scratch copy of `x0` by `hᵢ = max(|x0ᵢ|·ε, δ)` and returns
/// `(ψ(x0), ‖∇ψ(x0 + h) − ∇ψ(x0)‖ / ‖h‖)`. The caller's `x0` is never
/// modified. Degenerate estimates are clamped to machine epsilon from
/// below; a non-finite estimate is returned as-is for the caller to turn
/// into a not-finite status.
///
/// On return `grad_psi` holds `∇ψ(x0)`; `h`, `x_pert` and `grad_pert` are
/// scratch.
#[allow(clippy::too_many_arguments)]
pub(crate) fn initial_estimate<F: Float, P: Problem<F>>(
    problem: &P,
    params: &LipschitzParams<F>,
    x0: &[F],
    y: &[F],
    sigma: &[F],
    h: &mut [F],
    x_pert: &mut [F],
    grad_psi: &mut [F],
    grad_pert: &mut [F],
    work_n: &mut [F],
    work_m: &mut [F],
) -> (F, F) {
    let n = x0.len();
    for i in 0..n {
        h[i] = (x0[i] * params.epsilon).abs().max(params.delta);
        x_pert[i] = x0[i] + h[i];
    }

    problem.grad_psi(x_pert, y, sigma, grad_pert, work_n, work_m);
    let psi = problem.psi_and_grad_psi(x0, y, sigma, grad_psi, work_n, work_m);

    let mut diff_sq = F::zero();
    for i in 0..n {
        let d = grad_pert[i] - grad_psi[i];
        diff_sq = diff_sq + d * d;
    }
    let mut lipschitz = diff_sq.sqrt() / norm(h);
    if lipschitz < F::epsilon() {
        lipschitz = F::epsilon();
    }
    (psi, lipschitz)
}

/// Adaptive step-size update: double L and halve γ until the quadratic
/// upper bound `ψ(x̂) − ψ(x) ≤ ⟨∇ψ(x), p⟩ + ½L‖p‖²` holds.
///
/// The ψ-relative guard `|⟨∇ψ(x), p⟩ / ψ(x)| > threshold` stops the loop
/// when the violation is within numerical noise of a tiny ψ; pass a zero
/// threshold to keep doubling for any nonzero ⟨∇ψ, p⟩.
///
/// On every halving the proximal step and the dependent quantities
/// (`x_hat`, `p`, `ŷ`, `⟨∇ψ, p⟩`, `‖p‖²`, `ψ(x̂)`) are recomputed in place.
/// The caller is responsible for reacting to a changed γ (flushing the
/// direction provider, rescaling Anderson history, recomputing σ).
#[allow(clippy::too_many_arguments)]
pub(crate) fn quadratic_upper_bound<F: Float, P: Problem<F>>(
    problem: &P,
    threshold: F,
    psi: F,
    x: &[F],
    grad_psi: &[F],
    y: &[F],
    sigma: &[F],
    lipschitz: &mut F,
    gamma: &mut F,
    x_hat: &mut [F],
    p: &mut [F],
    y_hat: &mut [F],
    grad_dot_p: &mut F,
    norm_sq_p: &mut F,
    psi_hat: &mut F,
) {
    let two = F::one() + F::one();
    let half = F::one() / two;
    while *psi_hat - psi > *grad_dot_p + half * *lipschitz * *norm_sq_p
        && (*grad_dot_p / psi).abs() > threshold
    {
        *lipschitz = *lipschitz * two;
        *gamma = *gamma / two;

        problem.prox_step(*gamma, x, grad_psi, x_hat, p);
        *grad_dot_p = dot(grad_psi, p);
        *norm_sq_p = norm_sq(p);
        *psi_hat = problem.psi_and_y_hat(x_hat, y, sigma, y_hat);
    }
}
