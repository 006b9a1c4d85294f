//! Population-based metaheuristic search over per-train action sequences.
//!
//! Grounded on `original_source/code/app/controller/core/base_controller.py` and its three
//! subclasses. Python's `BaseController` is an abstract base with `run()`/`update_best_solution()`
//! /`check_stop_conditions()`/`report()` shared across subclasses that only override
//! `take_step_actions()`; here that becomes the [`Controller`] trait plus a free `run()` function,
//! since Rust has no implementation inheritance to hang the shared logic off of.
//!
//! Running a batch of candidate solutions is grounded on the teacher's `ensemble::generate`:
//! partition work across `std::thread::spawn` workers, collect through an `mpsc::channel`. Each
//! unit of work here is a whole blocking `Simulation::run`, not a data-parallel array transform,
//! which is why this reaches for `std::thread`/`mpsc` rather than `rayon`.

pub mod genetic;
pub mod pso;
pub mod random;

use std::sync::mpsc;
use std::sync::Arc;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::action::ActionKind;
use crate::scenario::Scenario;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub solutions_size: usize,
    pub max_thread_workers: usize,
    pub max_iterations: usize,
    pub max_consecutive_steps_with_same_best: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self {
            solutions_size: 20,
            max_thread_workers: cpus * 2,
            max_iterations: 50,
            max_consecutive_steps_with_same_best: 3,
        }
    }
}

/// One candidate assignment of an action sequence to every train in the scenario's manifest.
#[derive(Debug, Clone)]
pub struct Solution {
    pub genes: Vec<Vec<ActionKind>>,
    pub cost: Option<f64>,
    pub completed: bool,
    /// The action kinds each train actually executed, filled in once the solution has been run.
    /// Used by [`genetic`] crossover/mutation and by [`pso`] position reconstruction.
    pub executed_genes: Vec<Vec<ActionKind>>,
}

impl Solution {
    pub fn new(genes: Vec<Vec<ActionKind>>) -> Self {
        Self { genes, cost: None, completed: false, executed_genes: Vec::new() }
    }

    pub fn is_solved(&self) -> bool {
        self.cost.is_some()
    }
}

/// A controller only needs to say how it refills/evolves its population each iteration; the run
/// loop, evaluation, best-tracking and stop conditions live in [`run`].
pub trait Controller {
    fn options(&self) -> &ControllerOptions;
    fn solutions(&self) -> &[Solution];
    fn solutions_mut(&mut self) -> &mut Vec<Solution>;
    fn controller_name(&self) -> &'static str;

    /// Refills or evolves the population ahead of the next evaluation round. Called once before
    /// the first evaluation and again after every subsequent one.
    fn take_step_actions(&mut self, scenario: &Scenario, rng: &mut StdRng, best_cost: Option<f64>);

    /// Narrows `SimulationOptions.max_cost` for the next evaluation round. Only
    /// [`random::RandomActionController`] overrides this, to the best cost seen so far.
    fn max_cost_override(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub controller_name: String,
    pub iterations_run: usize,
    pub best_cost: Option<f64>,
    pub best_genes: Option<Vec<Vec<ActionKind>>>,
}

impl RunReport {
    /// Plain multi-line text, matching the register of `BaseController.report()`.
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("Controller: {}", self.controller_name),
            format!("Iterations run: {}", self.iterations_run),
        ];
        match self.best_cost {
            Some(cost) => lines.push(format!("Best cost: {cost:.4}")),
            None => lines.push("Best cost: none (no solution completed)".to_string()),
        }
        lines.join("\n")
    }
}

/// Shared `BaseController.run()` loop: evaluate the current population, track the best solution
/// seen, refill/evolve, and repeat until a stop condition fires.
pub fn run<C: Controller>(controller: &mut C, scenario: &Scenario, seed: u64) -> RunReport {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut best_cost: Option<f64> = None;
    let mut best_genes: Option<Vec<Vec<ActionKind>>> = None;
    let mut best_last_updated_step = 0usize;
    let mut iteration = 0usize;

    loop {
        controller.take_step_actions(scenario, &mut rng, best_cost);
        let max_thread_workers = controller.options().max_thread_workers;
        let max_cost_override = controller.max_cost_override();
        evaluate_solutions(
            controller.solutions_mut(),
            scenario,
            max_thread_workers,
            max_cost_override,
            seed.wrapping_add(iteration as u64),
        );

        if let Some((cost, genes)) = update_best_solution(controller.solutions()) {
            if best_cost.map(|b| cost < b).unwrap_or(true) {
                debug!("{}: new best cost {cost:.4} at iteration {iteration}", controller.controller_name());
                best_cost = Some(cost);
                best_genes = Some(genes);
                best_last_updated_step = iteration;
            }
        }

        iteration += 1;

        let reached_iteration_limit = iteration >= controller.options().max_iterations;
        let max_consecutive_steps_with_same_best = controller.options().max_consecutive_steps_with_same_best;
        let stagnated = max_consecutive_steps_with_same_best > 0
            && iteration >= best_last_updated_step + max_consecutive_steps_with_same_best - 1;
        if reached_iteration_limit || stagnated {
            break;
        }
    }

    info!("{} finished after {iteration} iterations, best cost {best_cost:?}", controller.controller_name());

    RunReport {
        controller_name: controller.controller_name().to_string(),
        iterations_run: iteration,
        best_cost,
        best_genes,
    }
}

/// Prefers the best *completed* solution; falls back to the best of all solutions (completed or
/// not) if none finished.
fn update_best_solution(solutions: &[Solution]) -> Option<(f64, Vec<Vec<ActionKind>>)> {
    let completed_best = solutions
        .iter()
        .filter(|s| s.completed)
        .filter_map(|s| s.cost.map(|c| (c, s)))
        .min_by(|a, b| a.0.total_cmp(&b.0));

    let candidate = completed_best.or_else(|| {
        solutions
            .iter()
            .filter_map(|s| s.cost.map(|c| (c, s)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
    });

    candidate.map(|(cost, solution)| {
        let genes = if solution.executed_genes.is_empty() { solution.genes.clone() } else { solution.executed_genes.clone() };
        (cost, genes)
    })
}

/// Runs every solution that has not yet been scored, distributing them across
/// `max_thread_workers` OS threads, each driving its assigned solutions' simulations to
/// completion sequentially and reporting results back over an `mpsc::channel`.
fn evaluate_solutions(
    solutions: &mut [Solution],
    scenario: &Scenario,
    max_thread_workers: usize,
    max_cost_override: Option<f64>,
    seed: u64,
) {
    let unsolved: Vec<usize> = solutions
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_solved())
        .map(|(i, _)| i)
        .collect();
    if unsolved.is_empty() {
        return;
    }

    let worker_count = max_thread_workers.max(1).min(unsolved.len());
    let chunk_size = unsolved.len().div_ceil(worker_count);
    let train_count = scenario.trains.len();
    let scenario = Arc::new(scenario.clone());

    let (tx, rx) = mpsc::channel();
    let mut handles = Vec::new();

    for (worker_id, chunk) in unsolved.chunks(chunk_size).enumerate() {
        let tx = tx.clone();
        let scenario = Arc::clone(&scenario);
        let genes: Vec<(usize, Vec<Vec<ActionKind>>)> =
            chunk.iter().map(|&i| (i, solutions[i].genes.clone())).collect();
        let worker_seed = seed.wrapping_add(worker_id as u64);

        let handle = std::thread::spawn(move || {
            for (solution_index, gene) in genes {
                let simulation_id = format!("search-{worker_seed}-{solution_index}");
                let gene_ref = if gene.is_empty() { None } else { Some(gene.as_slice()) };
                let mut simulation = scenario.build_simulation(
                    simulation_id,
                    gene_ref,
                    max_cost_override,
                    worker_seed.wrapping_add(solution_index as u64),
                );
                let outcome = simulation.run();
                let result = match outcome {
                    Ok(()) => {
                        let executed = simulation.actions_by_manifest_index(train_count);
                        Some((simulation.total_cost, simulation.get_status_text() == "SUCCESS", executed))
                    }
                    Err(_) => None,
                };
                let _ = tx.send((solution_index, result));
            }
        });
        handles.push(handle);
    }
    drop(tx);

    for (solution_index, result) in rx {
        if let Some((cost, completed, executed_genes)) = result {
            solutions[solution_index].cost = Some(cost);
            solutions[solution_index].completed = completed;
            solutions[solution_index].executed_genes = executed_genes;
        }
    }

    for handle in handles {
        let _ = handle.join();
    }
}
