//! Proximal gradient algorithm without any bells and whistles: the
//! adaptive step-size control of PANOC, none of the acceleration. Useful
//! as a baseline and as a fallback when curvature information is useless.

use std::mem;
use std::time::{Duration, Instant};

use crate::float::Float;
use crate::linalg::{dot, norm_sq};
use crate::lipschitz::{self, LipschitzParams};
use crate::panoc::print_progress;
use crate::problem::Problem;
use crate::prox;
use crate::stats::{SolverStatus, Stats};
use crate::stop::StopSignal;

/// Tuning parameters of the proximal gradient iteration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PgaParams<F> {
    /// Lipschitz estimation and step-size coupling.
    pub lipschitz: LipschitzParams<F>,
    /// Maximum number of inner iterations (default: 100).
    pub max_iter: u32,
    /// Wall-clock budget (default: 5 minutes).
    pub max_time: Duration,
    /// Print a progress line every N iterations; 0 prints nothing
    /// (default: 0).
    pub print_interval: u32,
}

impl Default for PgaParams<f64> {
    fn default() -> Self {
        PgaParams {
            lipschitz: LipschitzParams::default(),
            max_iter: 100,
            max_time: Duration::from_secs(300),
            print_interval: 0,
        }
    }
}

impl Default for PgaParams<f32> {
    fn default() -> Self {
        PgaParams {
            lipschitz: LipschitzParams::default(),
            max_iter: 100,
            max_time: Duration::from_secs(300),
            print_interval: 0,
        }
    }
}

/// Plain adaptive proximal gradient inner solver.
pub struct PgaSolver<F: Float> {
    params: PgaParams<F>,
    stop_signal: StopSignal,
}

impl<F: Float> PgaSolver<F> {
    pub fn new(params: PgaParams<F>) -> Self {
        PgaSolver {
            params,
            stop_signal: StopSignal::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "PGA"
    }

    pub fn params(&self) -> &PgaParams<F> {
        &self.params
    }

    /// Handle for requesting a stop from another thread.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    /// Drive `x` toward a stationary point to primal tolerance `eps`.
    ///
    /// Unlike PANOC, results are written back on every exit.
    pub fn solve<P: Problem<F>>(
        &mut self,
        problem: &P,
        sigma: &[F],
        eps: F,
        x: &mut [F],
        y: &mut [F],
        err_z: &mut [F],
    ) -> Stats<F> {
        let start_time = Instant::now();
        let mut stats = Stats::new();
        let params = self.params.clone();

        let n = problem.n();
        let m = problem.m();
        assert_eq!(x.len(), n);
        assert_eq!(y.len(), m);
        assert_eq!(sigma.len(), m);
        assert_eq!(err_z.len(), m);

        let mut x_k = x.to_vec();
        let mut x_hat_k = vec![F::zero(); n];
        let mut p_k = vec![F::zero(); n];
        let mut y_hat_k = vec![F::zero(); m];
        let mut grad_k = vec![F::zero(); n];
        let mut grad_hat_k = vec![F::zero(); n];
        let mut work_n = vec![F::zero(); n];
        let mut work_m = vec![F::zero(); m];

        // The perturbed point lives in scratch; the caller's x is left
        // alone.
        let (mut psi_k, mut l_k) = lipschitz::initial_estimate(
            problem,
            &params.lipschitz,
            &x_k,
            y,
            sigma,
            &mut p_k,
            &mut x_hat_k,
            &mut grad_k,
            &mut grad_hat_k,
            &mut work_n,
            &mut work_m,
        );
        if !l_k.is_finite() {
            stats.status = SolverStatus::NotFinite;
            stats.elapsed_time = start_time.elapsed();
            return stats;
        }

        let mut gamma_k = params.lipschitz.lgamma_factor / l_k;
        let mut no_progress: u32 = 0;

        for k in 0..=params.max_iter {
            // Projected gradient step, then adapt the step size until the
            // quadratic upper bound holds (no noise guard here).
            problem.prox_step(gamma_k, &x_k, &grad_k, &mut x_hat_k, &mut p_k);
            let mut psi_hat_k = problem.psi_and_y_hat(&x_hat_k, y, sigma, &mut y_hat_k);
            let mut grad_dot_p = dot(&grad_k, &p_k);
            let mut norm_sq_p = norm_sq(&p_k);
            lipschitz::quadratic_upper_bound(
                problem,
                F::zero(),
                psi_k,
                &x_k,
                &grad_k,
                y,
                sigma,
                &mut l_k,
                &mut gamma_k,
                &mut x_hat_k,
                &mut p_k,
                &mut y_hat_k,
                &mut grad_dot_p,
                &mut norm_sq_p,
                &mut psi_hat_k,
            );

            problem.grad_psi_from_y_hat(&x_hat_k, &y_hat_k, &mut grad_hat_k, &mut work_n);

            let eps_k = prox::error_stop_criterion(&p_k, gamma_k, &grad_hat_k, &grad_k);

            if params.print_interval != 0 && k % params.print_interval == 0 {
                print_progress("PGA  ", k, psi_k, &grad_k, norm_sq_p.sqrt(), gamma_k, eps_k);
            }

            let elapsed = start_time.elapsed();
            let converged = eps_k <= eps;
            let out_of_iter = k == params.max_iter;
            let out_of_time = elapsed > params.max_time;
            let not_finite = !eps_k.is_finite();
            let interrupted = self.stop_signal.stop_requested();
            let max_no_progress = no_progress > 1;
            if converged || out_of_iter || out_of_time || not_finite || interrupted
                || max_no_progress
            {
                problem.err_z(&x_hat_k, y, sigma, err_z);
                x.copy_from_slice(&x_hat_k);
                y.copy_from_slice(&y_hat_k);
                stats.iterations = k;
                stats.eps = eps_k;
                stats.elapsed_time = elapsed;
                stats.status = if converged {
                    SolverStatus::Converged
                } else if out_of_iter {
                    SolverStatus::MaxIter
                } else if out_of_time {
                    SolverStatus::MaxTime
                } else if not_finite {
                    SolverStatus::NotFinite
                } else if interrupted {
                    SolverStatus::Interrupted
                } else {
                    SolverStatus::NoProgress
                };
                return stats;
            }

            if x_k == x_hat_k {
                no_progress += 1;
            } else {
                no_progress = 0;
            }

            mem::swap(&mut x_k, &mut x_hat_k);
            mem::swap(&mut grad_k, &mut grad_hat_k);
            psi_k = psi_hat_k;
        }
        unreachable!("PGA must exit through the stop test at k == max_iter");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ψ(x) = ½x² over [5, 10].
    struct FarBox;

    impl Problem<f64> for FarBox {
        fn n(&self) -> usize {
            1
        }

        fn m(&self) -> usize {
            0
        }

        fn psi_and_y_hat(&self, x: &[f64], _y: &[f64], _s: &[f64], _yh: &mut [f64]) -> f64 {
            0.5 * x[0] * x[0]
        }

        fn psi_and_grad_psi(
            &self,
            x: &[f64],
            _y: &[f64],
            _s: &[f64],
            grad: &mut [f64],
            _wn: &mut [f64],
            _wm: &mut [f64],
        ) -> f64 {
            grad[0] = x[0];
            0.5 * x[0] * x[0]
        }

        fn grad_psi_from_y_hat(&self, x: &[f64], _yh: &[f64], grad: &mut [f64], _wn: &mut [f64]) {
            grad[0] = x[0];
        }

        fn proj(&self, v: &[f64], out: &mut [f64]) {
            out[0] = v[0].clamp(5.0, 10.0);
        }

        fn err_z(&self, _x: &[f64], _y: &[f64], _s: &[f64], _e: &mut [f64]) {}
    }

    #[test]
    fn infeasible_start_lands_on_the_boundary() {
        let problem = FarBox;
        let mut solver = PgaSolver::new(PgaParams::default());
        let mut x = vec![0.0];
        let stats = solver.solve(&problem, &[], 1e-9, &mut x, &mut [], &mut []);
        assert_eq!(stats.status, SolverStatus::Converged);
        assert!((x[0] - 5.0).abs() < 1e-9, "x = {}", x[0]);
    }

    #[test]
    fn max_iter_zero_still_writes_results() {
        let problem = FarBox;
        let params = PgaParams {
            max_iter: 0,
            ..PgaParams::default()
        };
        let mut solver = PgaSolver::new(params);
        let mut x = vec![0.0];
        let stats = solver.solve(&problem, &[], 1e-30, &mut x, &mut [], &mut []);
        assert_eq!(stats.status, SolverStatus::MaxIter);
        assert_eq!(stats.iterations, 0);
        // PGA writes the prox image back on every exit.
        assert_eq!(x[0], 5.0);
    }
}
