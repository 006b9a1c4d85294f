//! Per-simulation train agent.
//!
//! Grounded on `original_source/code/app/simulation/model/train.py`. Sections are referenced by
//! name rather than by direct pointer (§9's arena/index recommendation): the dispatcher resolves
//! names against the shared, read-only `Route` whenever it needs full `Section` data, and writes
//! the resolved neighbour *names* back onto the train as cached adjacency pointers.

pub mod equation;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKind};
use crate::section::Endpoint;
use equation::TrainEquation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    Normal,
    Reversed,
}

impl Direction {
    pub fn is_reversed(self) -> bool {
        matches!(self, Direction::Reversed)
    }
}

/// Construction-time options for a [`Train`]. Field names and defaults mirror
/// `original_source/code/app/simulation/model/train.py::TrainOptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOptions {
    pub prefix: Option<String>,
    pub start_section: String,
    pub finish_section: String,
    pub direction: Direction,
    pub priority: u32,
    pub length: f64,
    pub weight: f64,
    pub start_relative_position: f64,
    pub action_cost: f64,
    pub cost_normalizer: f64,
    pub distance_to_goal_cost: f64,
    pub meter_travelled_cost: f64,
    pub stopped_time_cost: f64,
    pub traveling_time_cost: f64,
    pub allow_reverse_action: bool,
    pub may_invade_interdicted_sections: bool,
    pub step_to_add: u64,
    /// A pre-scripted sequence of actions a controller wants this train to attempt, consulted
    /// head-first by `select_next_action` whenever it names a currently-applicable action.
    pub initial_actions_queue: Vec<ActionKind>,
    /// This train's position in its [`crate::scenario::Scenario`]'s manifest, used by a
    /// controller to match the same logical train across independently-run candidate solutions
    /// regardless of admission order or randomly-generated prefixes.
    pub manifest_index: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            start_section: String::new(),
            finish_section: String::new(),
            direction: Direction::Normal,
            priority: 1,
            length: 100.0,
            weight: 1e6,
            start_relative_position: 0.5,
            action_cost: 100.0,
            cost_normalizer: 1e-9,
            distance_to_goal_cost: 0.5,
            meter_travelled_cost: 0.2,
            stopped_time_cost: 0.3,
            traveling_time_cost: 0.4,
            allow_reverse_action: false,
            may_invade_interdicted_sections: false,
            step_to_add: 0,
            initial_actions_queue: Vec::new(),
            manifest_index: 0,
        }
    }
}

/// One entry of a train's action log: what was taken, where, and the cost state at that time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionHistoryEntry {
    pub step: u64,
    pub kind: ActionKind,
    pub abbrev: String,
    pub at_section: String,
    pub at_position: f64,
    pub reversed: bool,
    pub accumulated_cost: f64,
    pub instant_cost: f64,
}

#[derive(Debug, Clone)]
pub struct Train {
    pub options: TrainOptions,
    pub prefix: String,
    pub train_equation: TrainEquation,
    pub rng: StdRng,

    pub current_head_section: String,
    pub relative_position: f64,
    pub section_start: Endpoint,
    pub is_reversed: bool,
    pub operative: bool,

    pub next_straight_section: Option<String>,
    pub next_deviated_section: Option<String>,
    pub next_turnout_section: Option<String>,
    pub previous_straight_section: Option<String>,
    pub previous_deviated_section: Option<String>,
    pub previous_turnout_section: Option<String>,
    pub routes_between_closest_turnouts: Vec<Vec<String>>,

    pub trains_ahead: Vec<String>,
    pub trains_behind: Vec<String>,
    pub higher_priority_behind: bool,

    pub possible_actions: Vec<ActionKind>,
    pub executing_action: Option<Action>,
    pub actions_queue: Vec<ActionKind>,
    pub actions_history: Vec<ActionHistoryEntry>,

    pub odometer: f64,
    pub traveling_time: f64,
    pub stopped_time: f64,
    pub last_accumulated_cost: f64,
    pub accumulated_cost: f64,
    pub instant_cost: f64,
}

const PREFIX_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const PREFIX_DIGITS: &[u8] = b"0123456789";

impl Train {
    pub fn new(options: TrainOptions, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let prefix = options
            .prefix
            .clone()
            .unwrap_or_else(|| Self::generate_random_prefix(&mut rng));
        let is_reversed = options.direction.is_reversed();
        let train_equation = TrainEquation::new(&options);
        let start_section = options.start_section.clone();
        let relative_position = options.start_relative_position;
        let actions_queue = options.initial_actions_queue.clone();

        Self {
            prefix,
            train_equation,
            rng,
            current_head_section: start_section,
            relative_position,
            section_start: Endpoint::EndStraight,
            is_reversed,
            operative: true,
            next_straight_section: None,
            next_deviated_section: None,
            next_turnout_section: None,
            previous_straight_section: None,
            previous_deviated_section: None,
            previous_turnout_section: None,
            routes_between_closest_turnouts: Vec::new(),
            trains_ahead: Vec::new(),
            trains_behind: Vec::new(),
            higher_priority_behind: false,
            possible_actions: Vec::new(),
            executing_action: None,
            actions_queue,
            actions_history: Vec::new(),
            odometer: 0.0,
            traveling_time: 0.0,
            stopped_time: 0.0,
            last_accumulated_cost: 0.0,
            accumulated_cost: 0.0,
            instant_cost: 0.0,
            options,
        }
    }

    fn generate_random_prefix(rng: &mut StdRng) -> String {
        // Format "A00": one letter followed by two digits, matching the source's default
        // `prefix_format`.
        let letter = PREFIX_LETTERS[rng.random_range(0..PREFIX_LETTERS.len())] as char;
        let d1 = PREFIX_DIGITS[rng.random_range(0..PREFIX_DIGITS.len())] as char;
        let d2 = PREFIX_DIGITS[rng.random_range(0..PREFIX_DIGITS.len())] as char;
        format!("{letter}{d1}{d2}")
    }

    pub fn stop(&mut self) {
        self.train_equation.desired_velocity = 0.0;
    }

    pub fn is_at_section_end(&self) -> bool {
        (self.relative_position <= 0.0 && self.is_reversed) || (self.relative_position >= 1.0 && !self.is_reversed)
    }

    pub fn has_higher_priority_trains_behind(&self) -> bool {
        // Resolved by the dispatcher, which has access to the other trains' priorities; stored
        // here as a cached flag refreshed alongside `trains_behind`.
        self.higher_priority_behind
    }

    /// Steps velocity/position/timers. `step_duration` and priority-dependent fields are read
    /// from the caller (Dispatcher), which owns the shared clock.
    /// Updates velocity and timers. Position is advanced separately via `advance_position`,
    /// since a `Train` holds no reference to `Section` data (§9 arena/index note) and the
    /// dispatcher must supply the current section's length.
    pub fn step(&mut self, step_duration: f64) {
        self.check_operative();
        self.train_equation.update_velocity();

        if self.operative {
            self.check_executing_action();
        }

        self.update_times(step_duration);
    }

    fn check_operative(&mut self) {
        // Rolling stock is a supplemental, minimal concept (SPEC_FULL §3): absent an explicit
        // fleet a train is always operative.
        self.operative = true;
    }

    pub fn advance_position(&mut self, section_length: f64, step_duration: f64) {
        let mut new_position = self
            .train_equation
            .calculate_next_step_position(section_length, self.relative_position, step_duration);
        if new_position < 0.0 {
            new_position = 0.0;
        } else if new_position > 1.0 {
            new_position = 1.0;
        }
        self.odometer += (section_length * (new_position - self.relative_position)).abs();
        self.relative_position = new_position;
    }

    fn check_executing_action(&mut self) {
        if let Some(action) = &self.executing_action {
            if action.was_executed() {
                self.executing_action = None;
            }
        }

        if self.executing_action.is_none() {
            self.stop();
            self.select_next_action();
        }
    }

    fn select_next_action(&mut self) {
        if self.possible_actions.is_empty() {
            return;
        }

        if !self.actions_queue.is_empty() {
            let selected = self.actions_queue.remove(0);
            if self.possible_actions.contains(&selected) {
                self.set_action(selected);
                return;
            }
        }

        let index = self.rng.random_range(0..self.possible_actions.len());
        let selected = self.possible_actions[index];
        self.set_action(selected);
    }

    fn set_action(&mut self, kind: ActionKind) {
        self.executing_action = Some(Action::new(kind));
    }

    pub fn record_action_history(&mut self, current_step: u64) {
        if let Some(action) = &self.executing_action {
            self.actions_history.push(ActionHistoryEntry {
                step: current_step,
                kind: action.kind(),
                abbrev: action.kind().abbrev().to_string(),
                at_section: self.current_head_section.clone(),
                at_position: self.relative_position,
                reversed: self.is_reversed,
                accumulated_cost: self.accumulated_cost,
                instant_cost: self.instant_cost,
            });
        }
    }

    pub fn go_at_maximum_speed(&mut self, max_km_h: f64) {
        let signed = (max_km_h / 3.6) * if self.is_reversed { -1.0 } else { 1.0 };
        self.train_equation.desired_velocity = signed;
    }

    fn update_times(&mut self, step_duration: f64) {
        if self.train_equation.velocity != 0.0 {
            self.traveling_time += step_duration;
        } else {
            self.stopped_time += step_duration;
        }
    }

    pub fn has_finished(&self) -> bool {
        if self.current_head_section != self.options.finish_section {
            return false;
        }
        if self.is_reversed {
            self.relative_position <= 0.5
        } else {
            self.relative_position >= 0.5
        }
    }

    pub fn is_at_turnout_closing(&self, turnout_successors: usize, turnout_predecessors: usize) -> bool {
        match (&self.next_straight_section, &self.next_turnout_section) {
            (Some(straight), Some(turnout)) if straight == turnout => {
                turnout_successors == 1 && turnout_predecessors > 1
            }
            _ => false,
        }
    }

    pub fn keep_train_going_if_not_at_section_end(&mut self, max_km_h: f64) {
        if !self.is_at_section_end() {
            self.go_at_maximum_speed(max_km_h);
        } else {
            self.stop();
        }
    }
}
