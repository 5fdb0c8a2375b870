use crate::float::Float;

/// Contract between the inner solvers and the problem description.
///
/// The smooth part ψ is the augmented Lagrangian reformulation of the
/// original objective: `ψ(x) = f(x) + ½‖g(x) − z(x, y, Σ)‖²_Σ`, where `y`
/// are the current multipliers and `Σ` the penalty weights. `ŷ` is the
/// augmented multiplier estimate at a candidate point. How these are
/// computed is entirely the implementor's business; the solvers only call
/// the operations below and propagate non-finite values through their
/// stop criterion.
///
/// Gradient outputs are written into caller-provided buffers so the solvers
/// can run allocation-free; `work_n` and `work_m` are scratch space of
/// primal and dual dimension.
///
/// A problem is read-only for the duration of a solve and may be shared
/// across sequential invocations.
pub trait Problem<F: Float> {
    /// Primal dimension.
    fn n(&self) -> usize;

    /// Dual dimension (number of constraints `g`).
    fn m(&self) -> usize;

    /// Evaluate `ψ(x)` and the multiplier estimate `ŷ(x)`.
    fn psi_and_y_hat(&self, x: &[F], y: &[F], sigma: &[F], y_hat: &mut [F]) -> F;

    /// Evaluate `ψ(x)` and `∇ψ(x)`.
    fn psi_and_grad_psi(
        &self,
        x: &[F],
        y: &[F],
        sigma: &[F],
        grad_psi: &mut [F],
        work_n: &mut [F],
        work_m: &mut [F],
    ) -> F;

    /// Evaluate `∇ψ(x)` only.
    fn grad_psi(
        &self,
        x: &[F],
        y: &[F],
        sigma: &[F],
        grad_psi: &mut [F],
        work_n: &mut [F],
        work_m: &mut [F],
    ) {
        self.psi_and_grad_psi(x, y, sigma, grad_psi, work_n, work_m);
    }

    /// Evaluate `∇ψ(x)` reusing a precomputed multiplier estimate `ŷ(x)`.
    fn grad_psi_from_y_hat(&self, x: &[F], y_hat: &[F], grad_psi: &mut [F], work_n: &mut [F]);

    /// Project `v` onto the feasible set `C`.
    fn proj(&self, v: &[F], out: &mut [F]);

    /// Projected gradient step: `x̂ = proj_C(x − γ∇ψ(x))`, `p = x̂ − x`.
    ///
    /// The default implementation uses `p` as scratch for the gradient step
    /// before overwriting it with the residual.
    fn prox_step(&self, gamma: F, x: &[F], grad_psi: &[F], x_hat: &mut [F], p: &mut [F]) {
        for i in 0..x.len() {
            p[i] = x[i] - gamma * grad_psi[i];
        }
        self.proj(p, x_hat);
        for i in 0..x.len() {
            p[i] = x_hat[i] - x[i];
        }
    }

    /// Slack violation `g(x̂) − ẑ` at a candidate point.
    fn err_z(&self, x_hat: &[F], y: &[F], sigma: &[F], err_z: &mut [F]);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ψ(x) = ½‖x‖² over the box [1, 2]ⁿ, no constraints g.
    struct ShiftedBox;

    impl Problem<f64> for ShiftedBox {
        fn n(&self) -> usize {
            2
        }

        fn m(&self) -> usize {
            0
        }

        fn psi_and_y_hat(&self, x: &[f64], _y: &[f64], _sigma: &[f64], _y_hat: &mut [f64]) -> f64 {
            0.5 * x.iter().map(|&v| v * v).sum::<f64>()
        }

        fn psi_and_grad_psi(
            &self,
            x: &[f64],
            _y: &[f64],
            _sigma: &[f64],
            grad_psi: &mut [f64],
            _work_n: &mut [f64],
            _work_m: &mut [f64],
        ) -> f64 {
            grad_psi.copy_from_slice(x);
            0.5 * x.iter().map(|&v| v * v).sum::<f64>()
        }

        fn grad_psi_from_y_hat(
            &self,
            x: &[f64],
            _y_hat: &[f64],
            grad_psi: &mut [f64],
            _work_n: &mut [f64],
        ) {
            grad_psi.copy_from_slice(x);
        }

        fn proj(&self, v: &[f64], out: &mut [f64]) {
            for i in 0..v.len() {
                out[i] = v[i].clamp(1.0, 2.0);
            }
        }

        fn err_z(&self, _x_hat: &[f64], _y: &[f64], _sigma: &[f64], _err_z: &mut [f64]) {}
    }

    #[test]
    fn default_prox_step() {
        let p = ShiftedBox;
        let x = [1.5, 3.0];
        let grad = [1.5, 3.0];
        let mut x_hat = [0.0; 2];
        let mut res = [0.0; 2];
        // γ = 1: gradient step lands at the origin, projection clamps to 1.
        p.prox_step(1.0, &x, &grad, &mut x_hat, &mut res);
        assert_eq!(x_hat, [1.0, 1.0]);
        assert_eq!(res, [-0.5, -2.0]);
    }
}
