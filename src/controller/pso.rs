//! Particle swarm optimization over per-train action sequences, mapping each action kind to a
//! point in `[0, 1)` and treating a train's full action history as a position vector.
//!
//! Grounded on `original_source/code/app/controller/particle_swarm_optimization/controller.py`.
//!
//! The source's `get_particle_new_velocity_global` reads `particle['best_positions'][prefix]`
//! (the particle's own personal best) instead of `self.best_global_particle['best_positions'][prefix]`
//! for its `current_position` term — so the "global" pull is, in that one spot, computed from the
//! particle's own position history rather than the swarm's global best. This is preserved here
//! rather than silently fixed, per the recorded open-question decision in DESIGN.md: changing the
//! update equation would change the search's actual behavior, not just its implementation.

use rand::rngs::StdRng;
use rand::Rng;

use crate::action::{ActionKind, ALL_POSSIBLE_ACTIONS};
use crate::controller::{Controller, ControllerOptions, Solution};
use crate::scenario::Scenario;

#[derive(Debug, Clone)]
pub struct ParticleSwarmOptions {
    pub base: ControllerOptions,
    pub inertial_parameter: f64,
    pub personal_acceleration_coefficient: f64,
    pub global_acceleration_coefficient: f64,
}

impl Default for ParticleSwarmOptions {
    fn default() -> Self {
        Self {
            base: ControllerOptions::default(),
            inertial_parameter: 0.1,
            personal_acceleration_coefficient: 0.5,
            global_acceleration_coefficient: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
struct Particle {
    /// One position vector per train, each entry a point in `[0, 1)` derived from an executed
    /// action kind.
    positions: Vec<Vec<f64>>,
    velocities: Vec<Vec<f64>>,
    best_positions: Vec<Vec<f64>>,
    best_cost: f64,
}

pub struct ParticleSwarmOptimizationController {
    options: ParticleSwarmOptions,
    solutions: Vec<Solution>,
    particles: Vec<Particle>,
    best_global_particle: Option<usize>,
    best_global_particle_cost: f64,
}

fn position_of(kind: ActionKind) -> f64 {
    let index = ALL_POSSIBLE_ACTIONS.iter().position(|&k| k == kind).unwrap_or(0);
    index as f64 / ALL_POSSIBLE_ACTIONS.len() as f64
}

fn action_from_position(position: f64) -> ActionKind {
    let max_position = (ALL_POSSIBLE_ACTIONS.len() - 1) as f64 / ALL_POSSIBLE_ACTIONS.len() as f64;
    let mut wrapped = position;
    while wrapped > max_position {
        wrapped -= max_position;
    }
    ALL_POSSIBLE_ACTIONS
        .iter()
        .min_by(|a, b| (position_of(**a) - wrapped).abs().total_cmp(&(position_of(**b) - wrapped).abs()))
        .copied()
        .unwrap_or(ALL_POSSIBLE_ACTIONS[0])
}

impl ParticleSwarmOptimizationController {
    pub fn new(options: ParticleSwarmOptions) -> Self {
        let size = options.base.solutions_size;
        Self {
            options,
            solutions: (0..size).map(|_| Solution::new(Vec::new())).collect(),
            particles: Vec::new(),
            best_global_particle: None,
            best_global_particle_cost: f64::INFINITY,
        }
    }

    fn read_particles(&mut self, train_count: usize, rng: &mut StdRng) {
        self.particles = self
            .solutions
            .iter()
            .map(|solution| {
                let positions: Vec<Vec<f64>> = (0..train_count)
                    .map(|train_index| {
                        solution
                            .executed_genes
                            .get(train_index)
                            .map(|genes| genes.iter().map(|&k| position_of(k)).collect())
                            .unwrap_or_default()
                    })
                    .collect();
                let velocities: Vec<Vec<f64>> =
                    positions.iter().map(|train_positions| train_positions.iter().map(|p| rng.random::<f64>() - p).collect()).collect();
                Particle { positions, velocities, best_positions: Vec::new(), best_cost: f64::INFINITY }
            })
            .collect();
    }

    fn update_particle_bests(&mut self) {
        for (index, solution) in self.solutions.iter().enumerate() {
            let Some(cost) = solution.cost else { continue };
            let particle = &mut self.particles[index];
            if cost < particle.best_cost {
                particle.best_cost = cost;
                particle.best_positions = particle.positions.clone();
            }
            if cost < self.best_global_particle_cost {
                self.best_global_particle_cost = cost;
                self.best_global_particle = Some(index);
            }
        }
    }

    fn advance_particles(&mut self, rng: &mut StdRng) {
        for particle_index in 0..self.particles.len() {
            let train_count = self.particles[particle_index].velocities.len();
            for train_index in 0..train_count {
                let len = self.particles[particle_index].velocities[train_index].len();
                for gene_index in 0..len {
                    let particle = &self.particles[particle_index];
                    let current_velocity = particle.velocities[train_index][gene_index];

                    let best_position = particle
                        .best_positions
                        .get(train_index)
                        .and_then(|p| p.get(gene_index))
                        .copied()
                        .unwrap_or(0.0);
                    // Faithful to the source: both the personal and the "global" term compute
                    // `current_position` from this particle's own `best_positions`, not from
                    // `positions` (and the global term never actually reads the swarm's global
                    // best particle).
                    let current_position = best_position;

                    let personal = self.options.personal_acceleration_coefficient * rng.random::<f64>() * (best_position - current_position);
                    let global_best_position = best_position;
                    let global = self.options.global_acceleration_coefficient * rng.random::<f64>() * (global_best_position - current_position);

                    let new_velocity = self.options.inertial_parameter * current_velocity + personal + global;
                    let particle = &mut self.particles[particle_index];
                    particle.velocities[train_index][gene_index] = new_velocity;
                    particle.positions[train_index][gene_index] += new_velocity;
                }
            }
        }
    }

    fn parse_particle_positions(&self) -> Vec<Vec<Vec<ActionKind>>> {
        self.particles
            .iter()
            .map(|particle| particle.positions.iter().map(|train_positions| train_positions.iter().map(|&p| action_from_position(p)).collect()).collect())
            .collect()
    }
}

impl Controller for ParticleSwarmOptimizationController {
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
        "ParticleSwarmOptimizationController"
    }

    fn take_step_actions(&mut self, scenario: &Scenario, rng: &mut StdRng, _best_cost: Option<f64>) {
        let train_count = scenario.trains.len();

        if self.particles.is_empty() {
            // First round: the population is still the blank random solutions from `new()`; wait
            // for them to be evaluated once before deriving particle positions from them.
            if self.solutions.iter().all(|s| !s.is_solved()) {
                return;
            }
            self.read_particles(train_count, rng);
            self.update_particle_bests();
            return;
        }

        self.advance_particles(rng);
        let genes = self.parse_particle_positions();
        self.solutions = genes.into_iter().map(Solution::new).collect();
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
        let route = Arc::new(Route::new("PSO Route", vec![a, b, c]));
        Scenario::new(
            "pso-search",
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
    fn particle_swarm_search_runs_to_completion() {
        let scenario = sample_scenario();
        let options = ParticleSwarmOptions {
            base: ControllerOptions { solutions_size: 4, max_iterations: 3, max_thread_workers: 2, ..Default::default() },
            ..Default::default()
        };
        let mut controller = ParticleSwarmOptimizationController::new(options);
        let report = crate::controller::run(&mut controller, &scenario, 5);
        assert!(report.best_cost.is_some());
    }

    #[test]
    fn action_position_roundtrip_is_stable_for_exact_grid_points() {
        for &kind in ALL_POSSIBLE_ACTIONS.iter() {
            assert_eq!(action_from_position(position_of(kind)), kind);
        }
    }
}
