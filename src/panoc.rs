//! PANOC: proximal averaged Newton-type iteration for the inner problem of
//! an augmented Lagrangian solver.
//!
//! Each iteration combines the safe projected-gradient step `p` with a
//! quasi-Newton candidate `q` as `xₖ₊₁ = xₖ + (1 − τ)p + τq`, backtracking
//! on τ until the forward-backward envelope decreases. The step size γ is
//! tied to a running Lipschitz estimate through the quadratic upper bound,
//! and an optional Anderson accelerator may replace the proximal image
//! before the line search when it lowers ψ.

use std::mem;
use std::time::{Duration, Instant};

use crate::anderson::AndersonAccelerator;
use crate::direction::Direction;
use crate::float::Float;
use crate::linalg::{all_finite, dot, norm_sq};
use crate::lipschitz::{self, LipschitzParams};
use crate::problem::Problem;
use crate::prox;
use crate::stats::{SolverStatus, Stats};
use crate::stop::StopSignal;

/// Tuning parameters of the PANOC iteration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PanocParams<F> {
    /// Lipschitz estimation and step-size coupling.
    pub lipschitz: LipschitzParams<F>,
    /// Direction-provider memory depth; also the cadence and threshold of
    /// the no-progress check (default: 10).
    pub lbfgs_mem: usize,
    /// Maximum number of inner iterations (default: 100).
    pub max_iter: u32,
    /// Wall-clock budget (default: 5 minutes).
    pub max_time: Duration,
    /// Line-search floor: once τ drops below this, the safe proximal step
    /// is accepted (default: 1/256).
    pub tau_min: F,
    /// ψ-relative noise guard of the quadratic upper bound check
    /// (default: 1e-14 for `f64`).
    pub quadratic_upperbound_threshold: F,
    /// Run the step-size adaptation inside the line search rather than
    /// before it (default: true).
    pub update_lipschitz_in_linesearch: bool,
    /// Add the cross-γ correction term to the line-search condition
    /// (default: false).
    pub alternative_linesearch_cond: bool,
    /// Anderson acceleration memory depth; 0 disables it (default: 0).
    pub anderson_acceleration: usize,
    /// Print a progress line every N iterations; 0 prints nothing
    /// (default: 0).
    pub print_interval: u32,
}

impl Default for PanocParams<f64> {
    fn default() -> Self {
        PanocParams {
            lipschitz: LipschitzParams::default(),
            lbfgs_mem: 10,
            max_iter: 100,
            max_time: Duration::from_secs(300),
            tau_min: 1.0 / 256.0,
            quadratic_upperbound_threshold: 1e-14,
            update_lipschitz_in_linesearch: true,
            alternative_linesearch_cond: false,
            anderson_acceleration: 0,
            print_interval: 0,
        }
    }
}

impl Default for PanocParams<f32> {
    fn default() -> Self {
        PanocParams {
            lipschitz: LipschitzParams::default(),
            lbfgs_mem: 10,
            max_iter: 100,
            max_time: Duration::from_secs(300),
            tau_min: 1.0 / 256.0,
            quadratic_upperbound_threshold: 1e-6,
            update_lipschitz_in_linesearch: true,
            alternative_linesearch_cond: false,
            anderson_acceleration: 0,
            print_interval: 0,
        }
    }
}

/// Per-iteration snapshot handed to the progress callback.
pub struct ProgressInfo<'a, F> {
    pub k: u32,
    pub x: &'a [F],
    pub p: &'a [F],
    pub norm_sq_p: F,
    pub x_hat: &'a [F],
    pub psi: F,
    pub grad_psi: &'a [F],
    pub psi_hat: F,
    pub grad_psi_hat: &'a [F],
    pub lipschitz: F,
    pub gamma: F,
    pub eps: F,
    pub sigma: &'a [F],
    pub y: &'a [F],
    pub params: &'a PanocParams<F>,
}

/// PANOC inner solver over a pluggable direction provider.
///
/// The solver owns its parameters, the direction provider, and a stop
/// signal; `solve` may be invoked sequentially for multiple outer
/// iterations with the same dimensions.
pub struct PanocSolver<F: Float, D> {
    params: PanocParams<F>,
    direction: D,
    stop_signal: StopSignal,
    progress: Option<Box<dyn FnMut(&ProgressInfo<'_, F>)>>,
}

impl<F: Float, D: Direction<F>> PanocSolver<F, D> {
    pub fn new(params: PanocParams<F>, direction: D) -> Self {
        PanocSolver {
            params,
            direction,
            stop_signal: StopSignal::new(),
            progress: None,
        }
    }

    pub fn name(&self) -> &'static str {
        "PANOC"
    }

    pub fn params(&self) -> &PanocParams<F> {
        &self.params
    }

    /// Handle for requesting a stop from another thread.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    /// Install a per-iteration diagnostics callback.
    pub fn set_progress_callback(
        &mut self,
        callback: impl FnMut(&ProgressInfo<'_, F>) + 'static,
    ) {
        self.progress = Some(Box::new(callback));
    }

    /// Drive `x` toward a stationary point of ψ + indicator of C, to
    /// primal tolerance `eps`.
    ///
    /// On convergence (and on interruption, or whenever
    /// `always_overwrite_results` is set) `x` receives the proximal image
    /// of the final iterate, `y` the matching multiplier estimate, and
    /// `err_z` the slack violation `g(x̂) − ẑ`.
    #[allow(clippy::too_many_arguments)]
    pub fn solve<P: Problem<F>>(
        &mut self,
        problem: &P,
        sigma: &[F],
        eps: F,
        always_overwrite_results: bool,
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

        let two = F::one() + F::one();
        let half = F::one() / two;

        // Workspace, allocated once per invocation.
        let mut x_k = x.to_vec();
        let mut x_hat_k = vec![F::zero(); n];
        let mut x_next = vec![F::zero(); n];
        let mut x_hat_next = vec![F::zero(); n];
        let mut y_hat_k = vec![F::zero(); m];
        let mut y_hat_next = vec![F::zero(); m];
        let mut p_k = vec![F::zero(); n];
        let mut p_next = vec![F::zero(); n];
        let mut q_k = vec![F::zero(); n];
        let mut grad_k = vec![F::zero(); n];
        let mut grad_hat_k = vec![F::zero(); n];
        let mut grad_next = vec![F::zero(); n];
        let mut work_n = vec![F::zero(); n];
        let mut work_m = vec![F::zero(); m];

        self.direction.resize(n, params.lbfgs_mem);
        let mut anderson = if params.anderson_acceleration > 0 {
            Some(AndersonAccelerator::new(
                n,
                m,
                params.anderson_acceleration.min(n),
            ))
        } else {
            None
        };

        // Initial Lipschitz estimate; p_k and x_next double as scratch
        // until the first proximal step overwrites them.
        let (mut psi_k, mut l_k) = lipschitz::initial_estimate(
            problem,
            &params.lipschitz,
            &x_k,
            y,
            sigma,
            &mut p_k,
            &mut x_next,
            &mut grad_k,
            &mut grad_next,
            &mut work_n,
            &mut work_m,
        );
        if !l_k.is_finite() {
            stats.status = SolverStatus::NotFinite;
            stats.elapsed_time = start_time.elapsed();
            return stats;
        }

        let mut gamma_k = params.lipschitz.lgamma_factor / l_k;
        let mut sigma_k = gamma_k * (F::one() - gamma_k * l_k) / two;

        // First projected gradient step and envelope.
        problem.prox_step(gamma_k, &x_k, &grad_k, &mut x_hat_k, &mut p_k);
        let mut psi_hat_k = problem.psi_and_y_hat(&x_hat_k, y, sigma, &mut y_hat_k);
        let mut grad_dot_p = dot(&grad_k, &p_k);
        let mut norm_sq_p = norm_sq(&p_k);
        let mut phi_k = prox::forward_backward_envelope(psi_k, norm_sq_p, grad_dot_p, gamma_k);

        let mut no_progress: usize = 0;
        let no_progress_period = params.lbfgs_mem.max(1);

        for k in 0..=params.max_iter {
            // Step-size adaptation before the stop test (only here at
            // k = 0, or always when not done inside the line search).
            let old_gamma = gamma_k;
            if k == 0 || !params.update_lipschitz_in_linesearch {
                lipschitz::quadratic_upper_bound(
                    problem,
                    params.quadratic_upperbound_threshold,
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
                sigma_k = gamma_k * (F::one() - gamma_k * l_k) / two;
            }
            if k > 0 && gamma_k != old_gamma {
                self.direction.changed_gamma(gamma_k, old_gamma);
                if let Some(aa) = anderson.as_mut() {
                    aa.changed_gamma(gamma_k, old_gamma);
                }
            }

            if k == 0 {
                self.direction.initialize(&x_k, &x_hat_k, &p_k, &grad_k);
            }

            problem.grad_psi_from_y_hat(&x_hat_k, &y_hat_k, &mut grad_hat_k, &mut work_n);

            // Stop test ----------------------------------------------------
            let eps_k = prox::error_stop_criterion(&p_k, gamma_k, &grad_hat_k, &grad_k);

            if params.print_interval != 0 && k % params.print_interval == 0 {
                print_progress("PANOC", k, psi_k, &grad_k, norm_sq_p.sqrt(), gamma_k, eps_k);
            }
            if let Some(callback) = self.progress.as_mut() {
                callback(&ProgressInfo {
                    k,
                    x: &x_k,
                    p: &p_k,
                    norm_sq_p,
                    x_hat: &x_hat_k,
                    psi: psi_k,
                    grad_psi: &grad_k,
                    psi_hat: psi_hat_k,
                    grad_psi_hat: &grad_hat_k,
                    lipschitz: l_k,
                    gamma: gamma_k,
                    eps: eps_k,
                    sigma,
                    y,
                    params: &self.params,
                });
            }

            let elapsed = start_time.elapsed();
            let converged = eps_k <= eps;
            let out_of_iter = k == params.max_iter;
            let out_of_time = elapsed > params.max_time;
            let not_finite = !eps_k.is_finite();
            let interrupted = self.stop_signal.stop_requested();
            let max_no_progress = no_progress > params.lbfgs_mem;
            if converged || out_of_iter || out_of_time || not_finite || interrupted
                || max_no_progress
            {
                if converged || interrupted || always_overwrite_results {
                    problem.err_z(&x_hat_k, y, sigma, err_z);
                    x.copy_from_slice(&x_hat_k);
                    y.copy_from_slice(&y_hat_k);
                }
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

            // Quasi-Newton candidate --------------------------------------
            if k > 0 {
                self.direction.apply(&x_k, &x_hat_k, &p_k, &mut q_k);
            }

            // Anderson acceleration ---------------------------------------
            let mut anderson_accepted = false;
            if let Some(aa) = anderson.as_mut() {
                if k == 0 {
                    aa.initialize(&x_k, &grad_k, gamma_k);
                } else {
                    let psi_aa = aa.step(problem, &x_k, &grad_k, gamma_k, y, sigma);
                    anderson_accepted = psi_aa < psi_hat_k;
                    if anderson_accepted {
                        aa.swap_x_proj(&mut x_hat_k);
                        for i in 0..n {
                            p_k[i] = x_hat_k[i] - x_k[i];
                        }
                        psi_hat_k = psi_aa;
                        problem.grad_psi_from_y_hat(
                            &x_hat_k,
                            aa.y_hat(),
                            &mut grad_hat_k,
                            &mut work_n,
                        );
                    }
                }
            }

            // Line search -------------------------------------------------
            let mut tau = F::one();
            if k == 0 {
                tau = F::zero();
            } else if !all_finite(&q_k) {
                tau = F::zero();
                stats.lbfgs_failures += 1;
                self.direction.reset();
            }
            let sigma_norm_inv_gamma_p = sigma_k * norm_sq_p / (gamma_k * gamma_k);

            let mut l_next;
            let mut sigma_next;
            let mut gamma_next;
            let mut psi_next;
            let mut psi_hat_next;
            let mut grad_dot_p_next;
            let mut norm_sq_p_next;
            let mut phi_next;

            loop {
                l_next = l_k;
                sigma_next = sigma_k;
                gamma_next = gamma_k;

                if tau / two < params.tau_min {
                    // Line search failed: fall back to the prox step.
                    mem::swap(&mut x_next, &mut x_hat_k);
                    psi_next = psi_hat_k;
                    mem::swap(&mut grad_next, &mut grad_hat_k);
                } else {
                    for i in 0..n {
                        x_next[i] = x_k[i] + (F::one() - tau) * p_k[i] + tau * q_k[i];
                    }
                    psi_next = problem.psi_and_grad_psi(
                        &x_next,
                        y,
                        sigma,
                        &mut grad_next,
                        &mut work_n,
                        &mut work_m,
                    );
                }

                problem.prox_step(gamma_next, &x_next, &grad_next, &mut x_hat_next, &mut p_next);
                psi_hat_next = problem.psi_and_y_hat(&x_hat_next, y, sigma, &mut y_hat_next);
                grad_dot_p_next = dot(&grad_next, &p_next);
                norm_sq_p_next = norm_sq(&p_next);
                // Residual norm at the step size the candidate was taken
                // with, before any in-search adaptation.
                let norm_sq_p_next_entry = norm_sq_p_next;

                if params.update_lipschitz_in_linesearch {
                    let old_gamma_next = gamma_next;
                    lipschitz::quadratic_upper_bound(
                        problem,
                        params.quadratic_upperbound_threshold,
                        psi_next,
                        &x_next,
                        &grad_next,
                        y,
                        sigma,
                        &mut l_next,
                        &mut gamma_next,
                        &mut x_hat_next,
                        &mut p_next,
                        &mut y_hat_next,
                        &mut grad_dot_p_next,
                        &mut norm_sq_p_next,
                        &mut psi_hat_next,
                    );
                    sigma_next = gamma_next * (F::one() - gamma_next * l_next) / two;
                    if gamma_next != old_gamma_next {
                        self.direction.changed_gamma(gamma_next, old_gamma_next);
                        if let Some(aa) = anderson.as_mut() {
                            aa.changed_gamma(gamma_next, old_gamma_next);
                        }
                    }
                }

                phi_next = prox::forward_backward_envelope(
                    psi_next,
                    norm_sq_p_next,
                    grad_dot_p_next,
                    gamma_next,
                );
                tau = tau / two;

                let mut ls_cond = phi_next - (phi_k - sigma_norm_inv_gamma_p);
                if params.alternative_linesearch_cond {
                    ls_cond = ls_cond
                        - (half / gamma_next - half / gamma_k) * norm_sq_p_next_entry;
                }
                if !(ls_cond > F::zero() && tau >= params.tau_min) {
                    break;
                }
            }

            if tau < params.tau_min && k != 0 {
                stats.linesearch_failures += 1;
            }

            // Curvature update --------------------------------------------
            let accepted = self.direction.update(
                &x_k,
                &x_next,
                &p_k,
                &p_next,
                &grad_next,
                gamma_next,
            );
            if !accepted {
                stats.lbfgs_rejected += 1;
            }

            // No-progress tracking (exact equality, checked every
            // lbfgs_mem iterations and while a streak is alive).
            if no_progress > 0 || k as usize % no_progress_period == 0 {
                no_progress = if x_k == x_next { no_progress + 1 } else { 0 };
            }

            if k > 0 {
                if let Some(aa) = anderson.as_mut() {
                    aa.finish_iteration(anderson_accepted);
                }
            }

            // Advance: scalars copy, vectors swap in O(1).
            l_k = l_next;
            sigma_k = sigma_next;
            gamma_k = gamma_next;
            psi_k = psi_next;
            psi_hat_k = psi_hat_next;
            phi_k = phi_next;
            mem::swap(&mut x_k, &mut x_next);
            mem::swap(&mut x_hat_k, &mut x_hat_next);
            mem::swap(&mut y_hat_k, &mut y_hat_next);
            mem::swap(&mut p_k, &mut p_next);
            mem::swap(&mut grad_k, &mut grad_next);
            grad_dot_p = grad_dot_p_next;
            norm_sq_p = norm_sq_p_next;
        }
        unreachable!("PANOC must exit through the stop test at k == max_iter");
    }
}

pub(crate) fn print_progress<F: Float>(
    tag: &str,
    k: u32,
    psi: F,
    grad_psi: &[F],
    norm_p: F,
    gamma: F,
    eps: F,
) {
    println!(
        "[{tag}] {k:6}: psi = {psi:13.6e}, |grad| = {:13.6e}, |p| = {norm_p:13.6e}, \
         gamma = {gamma:13.6e}, eps = {eps:13.6e}",
        crate::linalg::norm(grad_psi),
    );
}
