//! First-order kinematic update and cost computation.
//!
//! Grounded on `original_source/code/app/simulation/math/equation.py`. The source wraps
//! `velocity` in a `Variable` object with unused history-tracking and unit-conversion
//! machinery; nothing in the spec reads it, so this port keeps `velocity` a plain `f64`
//! (see DESIGN.md).

use serde::{Deserialize, Serialize};

use super::TrainOptions;

/// Cost coefficients and kinematic state for a single train.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainEquation {
    pub velocity: f64,
    pub desired_velocity: f64,
    pub cost_normalizer: f64,
    pub meter_travelled_cost: f64,
    pub traveling_time_cost: f64,
    pub stopped_time_cost: f64,
    pub distance_to_goal_cost: f64,
    pub action_cost: f64,
}

impl TrainEquation {
    pub fn new(options: &TrainOptions) -> Self {
        Self {
            velocity: 0.0,
            desired_velocity: 0.0,
            cost_normalizer: options.cost_normalizer,
            meter_travelled_cost: options.meter_travelled_cost,
            traveling_time_cost: options.traveling_time_cost,
            stopped_time_cost: options.stopped_time_cost,
            distance_to_goal_cost: options.distance_to_goal_cost,
            action_cost: options.action_cost,
        }
    }

    /// First-order, no ramp: velocity snaps directly to the desired value.
    pub fn update_velocity(&mut self) {
        if self.velocity != self.desired_velocity {
            self.velocity = self.desired_velocity;
        }
    }

    pub fn calculate_next_step_position(&self, section_length: f64, last_relative_position: f64, step_duration: f64) -> f64 {
        let last_real_position = section_length * last_relative_position;
        let new_real_position = self.velocity * step_duration + last_real_position;
        new_real_position / section_length
    }

    pub fn calculate_cost(
        &self,
        odometer: f64,
        traveling_time: f64,
        stopped_time: f64,
        distance_to_goal: f64,
        actions_history_len: usize,
    ) -> f64 {
        self.cost_normalizer
            * (odometer * self.meter_travelled_cost
                + traveling_time * self.traveling_time_cost
                + stopped_time * self.stopped_time_cost
                + distance_to_goal * self.distance_to_goal_cost
                + actions_history_len as f64 * self.action_cost)
    }
}
