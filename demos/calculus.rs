//! Derivative Warm-ups
//!
//! Minimizes `(x + 1)^2 - 2` by gradient descent with derivatives from
//! finite differences and from dual numbers, then minimizes
//! `G(H(I(x)))` with the chain-rule derivative.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example calculus -- --seed 3
//! ```

use clap::Parser;
use dualgrad::calculus::{
    chain, derivative_dual, derivative_finite_difference, descend, quadratic, DEFAULT_STEPS,
    DEFAULT_STEP_SIZE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "calculus")]
#[command(about = "Gradient descent on one variable with three kinds of derivative")]
struct Args {
    /// Descent steps
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    steps: usize,

    /// Descent step size
    #[arg(long, default_value_t = DEFAULT_STEP_SIZE)]
    step_size: f64,

    /// Finite-difference step
    #[arg(long, default_value = "0.01")]
    epsilon: f64,

    /// Seed for the starting point (random when absent)
    #[arg(long)]
    seed: Option<u64>,
}

fn report(title: &str, path: &[f64], f: impl Fn(f64) -> f64, derivative: impl Fn(f64) -> f64) {
    println!("{}", title);
    let steps = path.len().saturating_sub(1);
    let mut last_percent = None;
    for (i, &x) in path[..steps].iter().enumerate() {
        let percent = 100 * i / steps.saturating_sub(1).max(1);
        if last_percent != Some(percent) {
            println!("{:3}%: x = {:.2}, y = {:.2}, y' = {:.2}", percent, x, f(x), derivative(x));
            last_percent = Some(percent);
        }
    }
    println!();
}

fn main() {
    let args = Args::parse();
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let x0: f64 = rng.gen_range(-10.0..10.0);

    let fd = |x| derivative_finite_difference(quadratic, x, args.epsilon);
    let path = descend(x0, args.steps, args.step_size, fd);
    report("Finite differences on (x + 1)^2 - 2", &path, quadratic, fd);

    let dual = |x| derivative_dual(quadratic, x);
    let path = descend(x0, args.steps, args.step_size, dual);
    report("Dual numbers on (x + 1)^2 - 2", &path, quadratic, dual);

    let path = descend(x0, args.steps, args.step_size, chain::composed_derivative);
    report(
        "Chain rule on G(H(I(x)))",
        &path,
        chain::composed,
        chain::composed_derivative,
    );
    println!("Expected minima: x = -1 and x = {:.4}", chain::minimum());
}
