//! A named bundle of a [`Route`] and the trains that run on it, ready to be simulated once or
//! searched over by a [`crate::controller`].
//!
//! Grounded on `original_source/code/app/comparison/scenario.py` and `comparison/run.py`: both
//! wire together a route, a fixed train manifest, and simulation options before handing the
//! result to either a bare `Simulation` or a `Controller`.

use std::sync::Arc;

use crate::action::ActionKind;
use crate::route::Route;
use crate::simulation::{Simulation, SimulationOptions};
use crate::train::TrainOptions;

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub route: Arc<Route>,
    pub trains: Vec<TrainOptions>,
    pub simulation_options: SimulationOptions,
}

impl Scenario {
    pub fn new(name: impl Into<String>, route: Arc<Route>, trains: Vec<TrainOptions>) -> Self {
        Self {
            name: name.into(),
            route,
            trains,
            simulation_options: SimulationOptions::default(),
        }
    }

    pub fn check_integrity(&self) -> Result<(), crate::error::DispatchError> {
        self.route.check_integrity()
    }

    /// Builds a fresh [`Simulation`] with every train in the manifest enqueued, optionally
    /// pre-loading each train's `initial_actions_queue` from `genes` (one entry per train, in
    /// manifest order) — the mechanism a controller uses to try out a candidate solution.
    /// `max_cost_override`, when set, narrows `simulation_options.max_cost` below the scenario's
    /// own default, mirroring `RandomActionController.update_max_simulation_cost`.
    pub fn build_simulation(
        &self,
        id: impl Into<String>,
        genes: Option<&[Vec<ActionKind>]>,
        max_cost_override: Option<f64>,
        seed_base: u64,
    ) -> Simulation {
        let mut simulation_options = self.simulation_options.clone();
        if let Some(max_cost) = max_cost_override {
            simulation_options.max_cost = simulation_options.max_cost.min(max_cost);
        }
        let mut simulation = Simulation::new(self.route.clone(), simulation_options, id);
        for (index, options) in self.trains.iter().enumerate() {
            let mut options = options.clone();
            options.manifest_index = index;
            if let Some(genes) = genes {
                if let Some(gene) = genes.get(index) {
                    options.initial_actions_queue = gene.clone();
                }
            }
            simulation.enqueue_train(options, seed_base.wrapping_add(index as u64));
        }
        simulation
    }

    pub fn run_once(&self, id: impl Into<String>, seed_base: u64) -> Result<Simulation, crate::error::DispatchError> {
        let mut simulation = self.build_simulation(id, None, None, seed_base);
        simulation.run()?;
        Ok(simulation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{Endpoint, Section, SectionConnection};

    /// `B` (the finish section) needs a further connection of its own so a train can keep moving
    /// past its arrival: `has_finished` requires `relative_position >= 0.5`, but arriving resets
    /// position to exactly 0, so a true dead end would strand the train there forever.
    fn sample_route() -> Arc<Route> {
        let mut a = Section::new("A", 0.0, 1000.0);
        a.connections.push(SectionConnection::new("B", Endpoint::EndStraight));
        let mut b = Section::new("B", 1.0, 1000.0);
        b.connections.push(SectionConnection::new("A", Endpoint::StartStraight));
        b.connections.push(SectionConnection::new("C", Endpoint::EndStraight));
        let mut c = Section::new("C", 2.0, 1000.0);
        c.connections.push(SectionConnection::new("B", Endpoint::StartStraight));
        Arc::new(Route::new("Scenario Route", vec![a, b, c]))
    }

    #[test]
    fn running_a_single_train_scenario_succeeds() {
        let scenario = Scenario::new(
            "single-train",
            sample_route(),
            vec![TrainOptions {
                start_section: "A".into(),
                finish_section: "B".into(),
                start_relative_position: 0.99,
                ..Default::default()
            }],
        );
        let simulation = scenario.run_once("run-1", 42).unwrap();
        assert_eq!(simulation.get_status_text(), "SUCCESS");
    }
}
