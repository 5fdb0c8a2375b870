use crate::float::Float;

/// Quasi-Newton direction oracle consumed by the PANOC iteration.
///
/// The solver treats the provider as a black box: it asks for a candidate
/// direction `q` each iteration, feeds back the accepted step as a
/// curvature pair, and notifies the provider whenever the proximal step
/// size γ changes (which invalidates history expressed in the old scale).
pub trait Direction<F: Float> {
    /// One-shot capacity hint; called at the start of every solve.
    fn resize(&mut self, n: usize, memory: usize);

    /// Called once at iteration 0 with the initial iterate and prox step.
    fn initialize(&mut self, x: &[F], x_hat: &[F], p: &[F], grad_psi: &[F]);

    /// Produce a candidate direction `q` from the current iterate.
    fn apply(&mut self, x: &[F], x_hat: &[F], p: &[F], q: &mut [F]);

    /// Feed back the accepted step. Returns false if the curvature pair was
    /// rejected (e.g. non-positive `sᵀy`).
    fn update(
        &mut self,
        x: &[F],
        x_next: &[F],
        p: &[F],
        p_next: &[F],
        grad_psi_next: &[F],
        gamma: F,
    ) -> bool;

    /// The step size changed from `old_gamma` to `gamma`; invalidate or
    /// rescale any history that depends on it.
    fn changed_gamma(&mut self, gamma: F, old_gamma: F);

    /// Discard all history.
    fn reset(&mut self);
}

/// Trivial provider: the candidate direction is the prox step itself, so
/// the line-search interpolation collapses to the safe proximal update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirection;

impl<F: Float> Direction<F> for NoDirection {
    fn resize(&mut self, _n: usize, _memory: usize) {}

    fn initialize(&mut self, _x: &[F], _x_hat: &[F], _p: &[F], _grad_psi: &[F]) {}

    fn apply(&mut self, _x: &[F], _x_hat: &[F], p: &[F], q: &mut [F]) {
        q.copy_from_slice(p);
    }

    fn update(
        &mut self,
        _x: &[F],
        _x_next: &[F],
        _p: &[F],
        _p_next: &[F],
        _grad_psi_next: &[F],
        _gamma: F,
    ) -> bool {
        true
    }

    fn changed_gamma(&mut self, _gamma: F, _old_gamma: F) {}

    fn reset(&mut self) {}
}
