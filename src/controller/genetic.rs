//! Genetic algorithm over per-train action sequences.
//!
//! Grounded on `original_source/code/app/controller/genetic_algorithm/controller.py`. The
//! population's "genome" is each solution's *executed* action history rather than some abstract
//! chromosome, exactly as the source reads `train.actions_history` to build crossover/mutation
//! material. Selection keeps the cheapest `selection_preserve_ratio` fraction, crossover refills
//! the population back up to `solutions_size` by splicing two random survivors' per-train
//! histories at their midpoints, and mutation re-derives a fresh random solution from a mutated
//! copy of an existing one's genes with some probability.

use rand::rngs::StdRng;
use rand::Rng;

use crate::action::{ActionKind, ALL_POSSIBLE_ACTIONS};
use crate::controller::{Controller, ControllerOptions, Solution};
use crate::scenario::Scenario;

#[derive(Debug, Clone)]
pub struct GeneticAlgorithmOptions {
    pub base: ControllerOptions,
    pub train_crossing_probability: f64,
    pub selection_preserve_ratio: f64,
    pub solution_mutation_probability: f64,
    pub train_mutation_probability: f64,
    pub gene_mutation_occurrence: f64,
}

impl Default for GeneticAlgorithmOptions {
    fn default() -> Self {
        Self {
            base: ControllerOptions::default(),
            train_crossing_probability: 0.8,
            selection_preserve_ratio: 0.6,
            solution_mutation_probability: 0.3,
            train_mutation_probability: 0.5,
            gene_mutation_occurrence: 0.5,
        }
    }
}

pub struct GeneticAlgorithmController {
    options: GeneticAlgorithmOptions,
    solutions: Vec<Solution>,
}

impl GeneticAlgorithmController {
    /// Fills the initial population with blank (fully-random) solutions, matching the
    /// constructor's `while len(self.solutions) < solutions_size: self.create_solution()`.
    pub fn new(options: GeneticAlgorithmOptions) -> Self {
        let size = options.base.solutions_size;
        Self { options, solutions: (0..size).map(|_| Solution::new(Vec::new())).collect() }
    }

    fn apply_selection(&mut self) {
        let mut ordered: Vec<usize> = (0..self.solutions.len()).collect();
        ordered.sort_by(|&a, &b| {
            let ca = self.solutions[a].cost.unwrap_or(f64::INFINITY);
            let cb = self.solutions[b].cost.unwrap_or(f64::INFINITY);
            ca.total_cmp(&cb)
        });
        let total_preserved = (self.options.selection_preserve_ratio * ordered.len() as f64).round() as usize;
        let preserved: std::collections::HashSet<usize> = ordered.into_iter().take(total_preserved).collect();

        let mut kept = Vec::with_capacity(preserved.len());
        for (index, solution) in self.solutions.drain(..).enumerate() {
            if preserved.contains(&index) {
                kept.push(solution);
            }
        }
        self.solutions = kept;
    }

    fn apply_crossover(&mut self, train_count: usize, rng: &mut StdRng) {
        while self.solutions.len() < self.options.base.solutions_size && !self.solutions.is_empty() {
            let parent1 = &self.solutions[rng.random_range(0..self.solutions.len())];
            let parent2 = &self.solutions[rng.random_range(0..self.solutions.len())];
            let genes = cross_genes(parent1, parent2, train_count, self.options.train_crossing_probability, rng);
            self.solutions.push(Solution::new(genes));
        }
    }

    fn apply_mutation(&mut self, rng: &mut StdRng) {
        let mut mutated = Vec::new();
        self.solutions.retain(|solution| {
            if !solution.is_solved() {
                return true;
            }
            if rng.random::<f64>() >= 1.0 - self.options.solution_mutation_probability {
                let mut genes = solution.executed_genes.clone();
                for train_genes in genes.iter_mut() {
                    if rng.random::<f64>() >= 1.0 - self.options.train_mutation_probability {
                        mutate_train_genes(train_genes, self.options.gene_mutation_occurrence, rng);
                    }
                }
                mutated.push(Solution::new(genes));
                false
            } else {
                true
            }
        });
        self.solutions.extend(mutated);
    }
}

fn cross_genes(parent1: &Solution, parent2: &Solution, train_count: usize, crossing_probability: f64, rng: &mut StdRng) -> Vec<Vec<ActionKind>> {
    let mut genes = Vec::with_capacity(train_count);
    for train_index in 0..train_count {
        let genes1 = parent1.executed_genes.get(train_index).cloned().unwrap_or_default();
        if rng.random::<f64>() >= crossing_probability {
            genes.push(genes1);
            continue;
        }

        let genes2 = match parent2.executed_genes.get(train_index) {
            Some(g) => g,
            None => {
                genes.push(genes1);
                continue;
            }
        };

        let half1 = (genes1.len() as f64 / 2.0).round() as usize;
        let mut crossed: Vec<ActionKind> = genes1[..half1.min(genes1.len())].to_vec();
        let half2 = (genes2.len() as f64 / 2.0).round() as usize;
        crossed.extend_from_slice(&genes2[half2.min(genes2.len())..]);
        genes.push(crossed);
    }
    genes
}

fn mutate_train_genes(genes: &mut [ActionKind], occurrence: f64, rng: &mut StdRng) {
    for gene in genes.iter_mut() {
        if rng.random::<f64>() >= 1.0 - occurrence {
            *gene = ALL_POSSIBLE_ACTIONS[rng.random_range(0..ALL_POSSIBLE_ACTIONS.len())];
        }
    }
}

impl Controller for GeneticAlgorithmController {
    fn options(&self) -> &ControllerOptions {
        &self.options.base
    }

    fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    fn solutions_mut(&mut self) -> &mut Vec<Solution> {
        &mut self.solutions
    }

    fn controller_name(&self) -> &'static str {
        "GeneticAlgorithmController"
    }

    fn take_step_actions(&mut self, scenario: &Scenario, rng: &mut StdRng, _best_cost: Option<f64>) {
        let any_finished = self.solutions.iter().any(|s| s.completed);
        if any_finished {
            self.apply_selection();
            self.apply_crossover(scenario.trains.len(), rng);
            self.apply_mutation(rng);
        }

        while self.solutions.len() < self.options.base.solutions_size {
            self.solutions.push(Solution::new(Vec::new()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Route;
    use crate::section::{Endpoint, Section, SectionConnection};
    use crate::train::TrainOptions;
    use std::sync::Arc;

    fn sample_scenario() -> Scenario {
        let mut a = Section::new("A", 0.0, 1000.0);
        a.connections.push(SectionConnection::new("B", Endpoint::EndStraight));
        let mut b = Section::new("B", 1.0, 1000.0);
        b.connections.push(SectionConnection::new("A", Endpoint::StartStraight));
        b.connections.push(SectionConnection::new("C", Endpoint::EndStraight));
        let mut c = Section::new("C", 2.0, 1000.0);
        c.connections.push(SectionConnection::new("B", Endpoint::StartStraight));
        let route = Arc::new(Route::new("GA Route", vec![a, b, c]));
        Scenario::new(
            "genetic-search",
            route,
            vec![TrainOptions {
                prefix: Some("A00".into()),
                start_section: "A".into(),
                finish_section: "B".into(),
                start_relative_position: 0.99,
                ..Default::default()
            }],
        )
    }

    #[test]
    fn genetic_search_improves_or_matches_a_single_run() {
        let scenario = sample_scenario();
        let options = GeneticAlgorithmOptions {
            base: ControllerOptions { solutions_size: 4, max_iterations: 3, max_thread_workers: 2, ..Default::default() },
            ..Default::default()
        };
        let mut controller = GeneticAlgorithmController::new(options);
        let report = crate::controller::run(&mut controller, &scenario, 11);
        assert!(report.best_cost.is_some());
    }
}
