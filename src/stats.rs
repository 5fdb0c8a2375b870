use std::fmt;
use std::time::Duration;

use crate::float::Float;

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverStatus {
    /// No solve has finished yet.
    Unknown,
    /// The stop criterion fell below the requested tolerance.
    Converged,
    /// Ran out of wall-clock time.
    MaxTime,
    /// Reached the maximum number of iterations.
    MaxIter,
    /// The stop criterion (or the initial Lipschitz estimate) was not finite.
    NotFinite,
    /// Consecutive iterates were exactly equal for too long.
    NoProgress,
    /// A stop was requested through the [`StopSignal`](crate::StopSignal).
    Interrupted,
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverStatus::Unknown => write!(f, "unknown"),
            SolverStatus::Converged => write!(f, "converged"),
            SolverStatus::MaxTime => write!(f, "maximum time exceeded"),
            SolverStatus::MaxIter => write!(f, "maximum iterations reached"),
            SolverStatus::NotFinite => write!(f, "not finite"),
            SolverStatus::NoProgress => write!(f, "no progress"),
            SolverStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Statistics of a single inner-solver invocation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats<F> {
    /// Number of iterations performed.
    pub iterations: u32,
    /// Value of the stop criterion at the final iterate.
    pub eps: F,
    /// Wall-clock time spent in the solve.
    pub elapsed_time: Duration,
    /// Reason for returning.
    pub status: SolverStatus,
    /// Times the FBE line search hit its floor and fell back to the prox step.
    pub linesearch_failures: u32,
    /// Times the quasi-Newton direction was non-finite and discarded.
    pub lbfgs_failures: u32,
    /// Times a curvature pair was rejected by the direction provider.
    pub lbfgs_rejected: u32,
}

impl<F: Float> Stats<F> {
    pub(crate) fn new() -> Self {
        Stats {
            iterations: 0,
            eps: F::infinity(),
            elapsed_time: Duration::ZERO,
            status: SolverStatus::Unknown,
            linesearch_failures: 0,
            lbfgs_failures: 0,
            lbfgs_rejected: 0,
        }
    }
}
