//! Pure random search: every iteration throws away the whole population and refills it with
//! blank solutions, letting each train pick uniformly among its currently-applicable actions via
//! its own seeded RNG (`Train::select_next_action`) rather than following any pre-scripted gene.
//!
//! Grounded on `original_source/code/app/controller/random_action/controller.py`: `take_step_actions`
//! just calls `create_solution()` (no `trains_actions`) until `solutions_size` is reached, then
//! narrows `simulation_options.max_cost` to the best cost found so far
//! (`update_max_simulation_cost`) so that later random draws that can't possibly beat it are
//! scored but never promoted.

use rand::rngs::StdRng;

use crate::controller::{Controller, ControllerOptions, Solution};
use crate::scenario::Scenario;

pub struct RandomActionController {
    options: ControllerOptions,
    solutions: Vec<Solution>,
    best_cost_so_far: Option<f64>,
}

impl RandomActionController {
    pub fn new(options: ControllerOptions) -> Self {
        Self { options, solutions: Vec::new(), best_cost_so_far: None }
    }
}

impl Controller for RandomActionController {
    fn options(&self) -> &ControllerOptions {
        &self.options
    }

    fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    fn solutions_mut(&mut self) -> &mut Vec<Solution> {
        &mut self.solutions
    }

    fn controller_name(&self) -> &'static str {
        "RandomActionController"
    }

    fn max_cost_override(&self) -> Option<f64> {
        self.best_cost_so_far
    }

    fn take_step_actions(&mut self, _scenario: &Scenario, _rng: &mut StdRng, best_cost: Option<f64>) {
        self.best_cost_so_far = best_cost;
        self.solutions = (0..self.options.solutions_size).map(|_| Solution::new(Vec::new())).collect();
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
        let route = Arc::new(Route::new("Random Route", vec![a, b, c]));
        Scenario::new(
            "random-search",
            route,
            vec![TrainOptions {
                start_section: "A".into(),
                finish_section: "B".into(),
                start_relative_position: 0.99,
                ..Default::default()
            }],
        )
    }

    #[test]
    fn random_search_finds_a_completed_solution() {
        let scenario = sample_scenario();
        let options = ControllerOptions {
            solutions_size: 4,
            max_iterations: 3,
            max_thread_workers: 2,
            ..Default::default()
        };
        let mut controller = RandomActionController::new(options);
        let report = crate::controller::run(&mut controller, &scenario, 7);
        assert!(report.best_cost.is_some());
    }
}
