pub mod anderson;
pub mod direction;
pub mod float;
pub mod lbfgs;
pub mod linalg;
pub mod lipschitz;
pub mod panoc;
pub mod pga;
pub mod problem;
pub mod prox;
pub mod qr;
pub mod stats;
pub mod stop;

pub use anderson::AndersonAccelerator;
pub use direction::{Direction, NoDirection};
pub use float::Float;
pub use lbfgs::Lbfgs;
pub use lipschitz::LipschitzParams;
pub use panoc::{PanocParams, PanocSolver, ProgressInfo};
pub use pga::{PgaParams, PgaSolver};
pub use problem::Problem;
pub use qr::LimitedMemoryQR;
pub use stats::{SolverStatus, Stats};
pub use stop::StopSignal;

/// PANOC solver with the bundled L-BFGS direction provider over `f64`.
pub type PanocSolver64 = PanocSolver<f64, Lbfgs<f64>>;
/// PANOC solver with the bundled L-BFGS direction provider over `f32`.
pub type PanocSolver32 = PanocSolver<f32, Lbfgs<f32>>;
