use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dunnart::{Lbfgs, PanocParams, PanocSolver, PgaParams, PgaSolver, Problem};

/// Chained Rosenbrock over the box [−2, 2]ⁿ.
struct Rosenbrock {
    n: usize,
}

impl Rosenbrock {
    fn eval(x: &[f64], grad: Option<&mut [f64]>) -> f64 {
        let mut f = 0.0;
        if let Some(g) = grad {
            g.fill(0.0);
            for i in 0..x.len() - 1 {
                let a = 1.0 - x[i];
                let b = x[i + 1] - x[i] * x[i];
                f += a * a + 100.0 * b * b;
                g[i] += -2.0 * a - 400.0 * x[i] * b;
                g[i + 1] += 200.0 * b;
            }
        } else {
            for i in 0..x.len() - 1 {
                let a = 1.0 - x[i];
                let b = x[i + 1] - x[i] * x[i];
                f += a * a + 100.0 * b * b;
            }
        }
        f
    }
}

impl Problem<f64> for Rosenbrock {
    fn n(&self) -> usize {
        self.n
    }

    fn m(&self) -> usize {
        0
    }

    fn psi_and_y_hat(&self, x: &[f64], _y: &[f64], _s: &[f64], _yh: &mut [f64]) -> f64 {
        Rosenbrock::eval(x, None)
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
        Rosenbrock::eval(x, Some(grad))
    }

    fn grad_psi_from_y_hat(&self, x: &[f64], _yh: &[f64], grad: &mut [f64], _wn: &mut [f64]) {
        Rosenbrock::eval(x, Some(grad));
    }

    fn proj(&self, v: &[f64], out: &mut [f64]) {
        for i in 0..v.len() {
            out[i] = v[i].clamp(-2.0, 2.0);
        }
    }

    fn err_z(&self, _x: &[f64], _y: &[f64], _s: &[f64], _e: &mut [f64]) {}
}

fn params(anderson: usize) -> PanocParams<f64> {
    PanocParams {
        max_iter: 2000,
        max_time: Duration::from_secs(30),
        anderson_acceleration: anderson,
        ..PanocParams::default()
    }
}

fn bench_panoc(c: &mut Criterion) {
    let mut group = c.benchmark_group("panoc_rosenbrock");
    for n in [2, 10, 50] {
        let problem = Rosenbrock { n };
        group.bench_with_input(BenchmarkId::new("lbfgs", n), &problem, |b, problem| {
            b.iter(|| {
                let mut solver = PanocSolver::new(params(0), Lbfgs::new());
                let mut x = vec![0.0; problem.n()];
                black_box(solver.solve(problem, &[], 1e-8, false, &mut x, &mut [], &mut []))
            })
        });
        group.bench_with_input(BenchmarkId::new("lbfgs_anderson", n), &problem, |b, problem| {
            b.iter(|| {
                let mut solver = PanocSolver::new(params(5), Lbfgs::new());
                let mut x = vec![0.0; problem.n()];
                black_box(solver.solve(problem, &[], 1e-8, false, &mut x, &mut [], &mut []))
            })
        });
    }
    group.finish();
}

fn bench_pga(c: &mut Criterion) {
    let mut group = c.benchmark_group("pga_rosenbrock");
    for n in [2, 10] {
        let problem = Rosenbrock { n };
        let pga_params = PgaParams {
            max_iter: 2000,
            max_time: Duration::from_secs(30),
            ..PgaParams::default()
        };
        group.bench_with_input(BenchmarkId::new("pga", n), &problem, |b, problem| {
            b.iter(|| {
                let mut solver = PgaSolver::new(pga_params.clone());
                let mut x = vec![0.0; problem.n()];
                black_box(solver.solve(problem, &[], 1e-8, &mut x, &mut [], &mut []))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_panoc, bench_pga);
criterion_main!(benches);
