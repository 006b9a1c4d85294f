//! Lifecycle and termination bookkeeping around a [`Dispatcher`].
//!
//! Grounded on `original_source/code/app/simulation/core/simulation.py`. The source's
//! `check_stop_conditions` runs all four termination checks unconditionally every tick and
//! happens to apply only the first multiplier reached through incidental Python control flow;
//! here that is made an explicit `else if` chain so "first condition wins, multiply once" (§4.7)
//! is structural rather than accidental.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dispatcher::Dispatcher;
use crate::dynamics::TimeDynamics;
use crate::error::DispatchResult;
use crate::io::DataPersistence;
use crate::route::Route;
use crate::train::TrainOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    Running,
    Paused,
    Success,
    Fail,
}

impl SimulationStatus {
    pub fn as_text(self) -> &'static str {
        match self {
            SimulationStatus::Running => "RUNNING",
            SimulationStatus::Paused => "PAUSED",
            SimulationStatus::Success => "SUCCESS",
            SimulationStatus::Fail => "FAIL",
        }
    }
}

/// Defaults mirror `Simulation.DEFAULT_OPTIONS` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOptions {
    pub step_duration: f64,
    pub max_cost: f64,
    pub max_steps: u64,
    pub max_steps_without_train_movement: u64,
    pub abort_cost_multiplier: f64,
    pub step_limit_multiplier: f64,
    pub cost_limit_multiplier: f64,
    pub without_movement_multiplier: f64,
    pub controller_name: String,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            step_duration: 30.0,
            max_cost: 1e6,
            max_steps: 1000,
            max_steps_without_train_movement: 10,
            abort_cost_multiplier: 100.0,
            step_limit_multiplier: 10.0,
            cost_limit_multiplier: 10.0,
            without_movement_multiplier: 10.0,
            controller_name: "No Controller".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainFrame {
    pub prefix: String,
    pub section: String,
    pub relative_position: f64,
    pub reversed: bool,
    pub accumulated_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationFrame {
    pub step: u64,
    pub timestamp: f64,
    pub trains: Vec<TrainFrame>,
    pub total_cost: f64,
}

/// The recorded output of a finished (or aborted) simulation run, ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResults {
    pub id: String,
    pub route_name: String,
    pub controller_name: String,
    pub frames: Vec<SimulationFrame>,
    pub total_cost: f64,
    pub status: SimulationStatus,
}

impl DataPersistence for SimulationResults {
    fn binary_path(&self) -> PathBuf {
        PathBuf::from("./data/simulation").join(format!("{}.bin", self.id))
    }

    fn json_path(&self) -> PathBuf {
        PathBuf::from("./data/simulation").join(format!("{}.json", self.id))
    }
}

pub struct Simulation {
    pub id: String,
    pub options: SimulationOptions,
    pub dispatcher: Dispatcher,
    pub frames: Vec<SimulationFrame>,
    pub total_cost: f64,
    pub running: bool,
    pub status: SimulationStatus,
}

impl Simulation {
    pub fn new(route: Arc<Route>, options: SimulationOptions, id: impl Into<String>) -> Self {
        let time_dynamics = TimeDynamics::new(options.step_duration, 0.0);
        let dispatcher = Dispatcher::new(route, time_dynamics);
        Self {
            id: id.into(),
            options,
            dispatcher,
            frames: Vec::new(),
            total_cost: 0.0,
            running: false,
            status: SimulationStatus::Paused,
        }
    }

    pub fn enqueue_train(&mut self, options: TrainOptions, seed: u64) {
        self.dispatcher.enqueue_train(options, seed);
    }

    pub fn get_status_text(&self) -> &'static str {
        self.status.as_text()
    }

    pub fn start(&mut self) {
        self.running = true;
        self.status = SimulationStatus::Running;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn abort(&mut self) {
        self.total_cost *= self.options.abort_cost_multiplier;
        self.status = SimulationStatus::Fail;
        self.stop();
    }

    /// A `ConflictCondition` surfaced by the dispatcher aborts this simulation rather than
    /// propagating: it is a runtime state a single candidate run can hit (e.g. two trains routed
    /// into the same section), not a fault in the scenario's construction. Every other error kind
    /// is fatal and does propagate, since it points at a malformed scenario.
    pub fn step(&mut self) -> DispatchResult<()> {
        match self.dispatcher.step() {
            Ok(()) => {}
            Err(err) if err.aborts_simulation() => {
                self.abort();
                return Ok(());
            }
            Err(err) => return Err(err),
        }
        self.recompute_total_cost();
        self.record_frame();
        self.check_stop_conditions();
        Ok(())
    }

    pub fn run(&mut self) -> DispatchResult<()> {
        self.start();
        while self.running {
            self.step()?;
        }
        Ok(())
    }

    /// Every train's (active or already retired) executed action kinds, indexed by the train's
    /// position in the originating scenario's manifest (`TrainOptions::manifest_index`) — the
    /// raw material a controller crosses over or mutates into the next generation's genes.
    pub fn actions_by_manifest_index(&self, train_count: usize) -> Vec<Vec<crate::action::ActionKind>> {
        let mut genes = vec![Vec::new(); train_count];
        for train in self.dispatcher.trains.iter().chain(self.dispatcher.retired_trains.iter()) {
            if let Some(slot) = genes.get_mut(train.options.manifest_index) {
                *slot = train.actions_history.iter().map(|entry| entry.kind).collect();
            }
        }
        genes
    }

    fn recompute_total_cost(&mut self) {
        let active: f64 = self.dispatcher.trains.iter().map(|t| t.accumulated_cost).sum();
        self.total_cost = self.dispatcher.retired_cost + active;
    }

    fn record_frame(&mut self) {
        let trains = self
            .dispatcher
            .trains
            .iter()
            .map(|t| TrainFrame {
                prefix: t.prefix.clone(),
                section: t.current_head_section.clone(),
                relative_position: t.relative_position,
                reversed: t.is_reversed,
                accumulated_cost: t.accumulated_cost,
            })
            .collect();
        self.frames.push(SimulationFrame {
            step: self.dispatcher.time_dynamics.current_step,
            timestamp: self.dispatcher.time_dynamics.current_timestamp,
            trains,
            total_cost: self.total_cost,
        });
    }

    /// First condition reached wins and multiplies `total_cost` exactly once (§4.7).
    fn check_stop_conditions(&mut self) {
        if self.reached_step_limit() {
            self.total_cost *= self.options.step_limit_multiplier;
            self.status = SimulationStatus::Fail;
            self.stop();
        } else if self.reached_cost_limit() {
            self.total_cost *= self.options.cost_limit_multiplier;
            self.status = SimulationStatus::Fail;
            self.stop();
        } else if self.reached_no_movement_limit() {
            self.total_cost *= self.options.without_movement_multiplier;
            self.status = SimulationStatus::Fail;
            self.stop();
        } else if self.completed_every_train() {
            self.status = SimulationStatus::Success;
            self.stop();
        }
    }

    fn reached_step_limit(&self) -> bool {
        self.dispatcher.time_dynamics.current_step >= self.options.max_steps
    }

    fn reached_cost_limit(&self) -> bool {
        self.total_cost >= self.options.max_cost
    }

    fn reached_no_movement_limit(&self) -> bool {
        self.dispatcher.steps_without_movement >= self.options.max_steps_without_train_movement
    }

    fn completed_every_train(&self) -> bool {
        !self.dispatcher.has_any_train_remaining()
    }

    pub fn into_results(self) -> SimulationResults {
        SimulationResults {
            id: self.id,
            route_name: self.dispatcher.route.name.clone(),
            controller_name: self.options.controller_name,
            frames: self.frames,
            total_cost: self.total_cost,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{Endpoint, Section, SectionConnection};

    /// A train finishing at `B` needs to keep moving past its arrival before `has_finished`'s
    /// `relative_position >= 0.5` can ever become true (arriving resets position to exactly 0), so
    /// the finish section needs a further connection of its own even though nothing ever reaches
    /// `C` for real.
    fn two_section_route() -> Arc<Route> {
        let mut a = Section::new("A", 0.0, 1000.0);
        a.connections.push(SectionConnection::new("B", Endpoint::EndStraight));
        let mut b = Section::new("B", 1.0, 1000.0);
        b.connections.push(SectionConnection::new("A", Endpoint::StartStraight));
        b.connections.push(SectionConnection::new("C", Endpoint::EndStraight));
        let mut c = Section::new("C", 2.0, 1000.0);
        c.connections.push(SectionConnection::new("B", Endpoint::StartStraight));
        Arc::new(Route::new("Test Route", vec![a, b, c]))
    }

    #[test]
    fn a_single_train_eventually_succeeds() {
        let mut sim = Simulation::new(two_section_route(), SimulationOptions::default(), "t1");
        sim.enqueue_train(
            TrainOptions {
                start_section: "A".into(),
                finish_section: "B".into(),
                start_relative_position: 0.99,
                ..Default::default()
            },
            1,
        );
        sim.run().unwrap();
        assert_eq!(sim.status, SimulationStatus::Success);
        assert!(!sim.frames.is_empty());
    }

    #[test]
    fn aborting_multiplies_cost_and_stops() {
        let mut sim = Simulation::new(two_section_route(), SimulationOptions::default(), "t2");
        sim.total_cost = 10.0;
        sim.abort();
        assert_eq!(sim.total_cost, 1000.0);
        assert!(!sim.running);
        assert_eq!(sim.status, SimulationStatus::Fail);
    }

    #[test]
    fn step_limit_is_checked_before_cost_limit() {
        let mut options = SimulationOptions::default();
        options.max_steps = 1;
        options.max_cost = 0.0;
        let mut sim = Simulation::new(two_section_route(), options, "t3");
        sim.enqueue_train(
            TrainOptions {
                start_section: "A".into(),
                finish_section: "B".into(),
                ..Default::default()
            },
            1,
        );
        sim.start();
        sim.step().unwrap();
        assert_eq!(sim.status, SimulationStatus::Fail);
        assert_eq!(sim.total_cost, 0.0 * options_multiplier());
    }

    fn options_multiplier() -> f64 {
        SimulationOptions::default().step_limit_multiplier
    }
}
