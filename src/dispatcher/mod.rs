//! The per-tick train scheduler.
//!
//! Grounded on `original_source/code/app/simulation/core/dispatcher.py`. Trains live in a single
//! owned `Vec<Train>`; sections are never referenced by pointer, only by name, resolved against
//! the shared, read-only [`Route`] (§9 arena/index note). Processing each train in turn needs
//! simultaneous read access to its siblings and mutable access to itself — handled here by
//! pulling `self.trains` out into a local `Vec` for the duration of the tick and splitting it
//! with `split_at_mut`, rather than threading indices through every helper.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::{ActionKind, ALL_POSSIBLE_ACTIONS};
use crate::dynamics::TimeDynamics;
use crate::error::{DispatchError, DispatchResult};
use crate::route::Route;
use crate::section::{Endpoint, Section};
use crate::train::{Train, TrainOptions};

/// A train manifest entry waiting for its `step_to_add` to be reached.
#[derive(Debug, Clone)]
pub struct QueuedTrain {
    pub options: TrainOptions,
    pub seed: u64,
}

pub struct Dispatcher {
    pub route: Arc<Route>,
    pub time_dynamics: TimeDynamics,
    pub trains: Vec<Train>,
    pub trains_queue: Vec<QueuedTrain>,
    pub occupancy_dict: HashMap<String, Vec<String>>,
    pub steps_without_movement: u64,
    pub retired_cost: f64,
    /// Trains that reached their finish section, kept around (instead of dropped) so a
    /// controller can still read their full `actions_history` for crossover/mutation after the
    /// simulation ends.
    pub retired_trains: Vec<Train>,
    last_positions: Vec<f64>,
}

impl Dispatcher {
    pub fn new(route: Arc<Route>, time_dynamics: TimeDynamics) -> Self {
        Self {
            route,
            time_dynamics,
            trains: Vec::new(),
            trains_queue: Vec::new(),
            occupancy_dict: HashMap::new(),
            steps_without_movement: 0,
            retired_cost: 0.0,
            retired_trains: Vec::new(),
            last_positions: Vec::new(),
        }
    }

    pub fn enqueue_train(&mut self, options: TrainOptions, seed: u64) {
        self.trains_queue.push(QueuedTrain { options, seed });
    }

    pub fn has_any_train_remaining(&self) -> bool {
        !self.trains.is_empty() || !self.trains_queue.is_empty()
    }

    /// Advances the simulation by exactly one tick: admits due trains, retires finished ones,
    /// steps every remaining train in order, and advances the shared clock.
    pub fn step(&mut self) -> DispatchResult<()> {
        self.check_trains_to_add()?;
        self.occupancy_dict = Self::build_occupancy_dict(&self.trains);
        let mut retired_sum = 0.0;
        let (still_running, finished): (Vec<Train>, Vec<Train>) =
            std::mem::take(&mut self.trains).into_iter().partition(|t| !t.has_finished());
        for t in &finished {
            retired_sum += t.accumulated_cost;
        }
        self.retired_cost += retired_sum;
        self.retired_trains.extend(finished);

        let mut active = still_running;
        let step_duration = self.time_dynamics.step_duration;
        let current_step = self.time_dynamics.current_step;

        for idx in 0..active.len() {
            {
                let (before, rest) = active.split_at_mut(idx);
                let (train, after) = rest.split_first_mut().expect("idx is within bounds");

                train.step(step_duration);

                if train.operative {
                    if let Ok(section) = self.route.sections_mapper.find_section_by_name(&train.current_head_section) {
                        train.advance_position(section.length, step_duration);
                    }
                }

                if let Some(mut action) = train.executing_action.take() {
                    action.execute(self, train)?;
                    train.executing_action = Some(action);
                }
                train.record_action_history(current_step);
                let _ = (before, after);
            }

            self.update_train_sections(&mut active[idx])?;
            self.occupancy_dict = Self::build_occupancy_dict(&active);

            {
                let (before, rest) = active.split_at_mut(idx);
                let (train, after) = rest.split_first_mut().expect("idx is within bounds");
                let applicable: Vec<ActionKind> = ALL_POSSIBLE_ACTIONS
                    .into_iter()
                    .filter(|kind| kind.is_applicable(self, train, before, after))
                    .collect();
                train.possible_actions = applicable;
                self.update_related_trains(train, before, after);
            }

            self.update_train_cost(&mut active[idx])?;
        }

        self.trains = active;
        self.update_steps_without_movement();
        self.time_dynamics.step();
        Ok(())
    }

    fn check_trains_to_add(&mut self) -> DispatchResult<()> {
        let current_step = self.time_dynamics.current_step;
        let mut ready = Vec::new();
        for (i, queued) in self.trains_queue.iter().enumerate() {
            let due = current_step >= queued.options.step_to_add;
            let start_free = !self
                .is_section_occupied(&queued.options.start_section, queued.options.direction.is_reversed())
                .unwrap_or(true);
            if due && start_free {
                ready.push(i);
            }
        }
        for i in ready.into_iter().rev() {
            let queued = self.trains_queue.remove(i);
            self.add_generic_train(queued.options, queued.seed)?;
        }
        Ok(())
    }

    pub fn add_generic_train(&mut self, options: TrainOptions, seed: u64) -> DispatchResult<()> {
        if self.is_section_occupied(&options.start_section, options.direction.is_reversed())? {
            return Err(DispatchError::ConflictCondition(format!(
                "start section {} is already occupied",
                options.start_section
            )));
        }
        let mut train = Train::new(options, seed);
        self.update_train_sections(&mut train)?;
        self.trains.push(train);
        Ok(())
    }

    fn build_occupancy_dict(trains: &[Train]) -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for train in trains {
            map.entry(train.current_head_section.clone()).or_default().push(train.prefix.clone());
        }
        map
    }

    /// A section is occupied if it has a direct occupant, or — when it's a turnout with no
    /// direct occupant — if every one of its next sections is itself occupied.
    pub fn is_section_occupied(&self, section_name: &str, reversed: bool) -> DispatchResult<bool> {
        if self.occupancy_dict.get(section_name).map(|v| !v.is_empty()).unwrap_or(false) {
            return Ok(true);
        }
        let section = self.route.sections_mapper.find_section_by_name(section_name)?;
        if !section.is_turnout() {
            return Ok(false);
        }
        let next = self.route.sections_mapper.get_next_sections(section, reversed)?;
        if next.is_empty() {
            return Ok(false);
        }
        for candidate in next {
            if !self.is_section_occupied(&candidate.name, reversed)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn section_is_free(&self, section_name: Option<&str>, reversed: bool) -> bool {
        match section_name {
            None => false,
            Some(name) => !self.is_section_occupied(name, reversed).unwrap_or(true),
        }
    }

    /// Whether every section along `route` is free, checked in the direction opposite `reversed`
    /// — the wait actions use this to see if an alternate siding route is clear for a train
    /// coming the other way through it.
    pub fn is_route_available(&self, route: &[String], reversed: bool) -> bool {
        route.iter().all(|name| !self.is_section_occupied(name, !reversed).unwrap_or(true))
    }

    pub fn section_is_turnout(&self, section_name: &str) -> bool {
        self.route
            .sections_mapper
            .find_section_by_name(section_name)
            .map(|s| s.is_turnout())
            .unwrap_or(false)
    }

    pub fn max_velocity_at(&self, section_name: &str, relative_position: f64) -> f64 {
        self.route
            .sections_mapper
            .find_section_by_name(section_name)
            .map(|s| s.maximum_velocity_at_relative_position(relative_position))
            .unwrap_or(Section::DEFAULT_MAX_VELOCITY)
    }

    pub fn turnout_successor_count(&self, section_name: Option<&str>, reversed: bool) -> usize {
        match section_name.and_then(|name| self.route.sections_mapper.find_section_by_name(name).ok()) {
            Some(section) => self
                .route
                .sections_mapper
                .get_next_sections(section, reversed)
                .map(|v| v.len())
                .unwrap_or(0),
            None => 0,
        }
    }

    pub fn turnout_predecessor_count(&self, section_name: Option<&str>, reversed: bool) -> usize {
        match section_name.and_then(|name| self.route.sections_mapper.find_section_by_name(name).ok()) {
            Some(section) => self
                .route
                .sections_mapper
                .get_previous_sections(section, reversed)
                .map(|v| v.len())
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Moves a train onto `next_section_name`, recomputing `section_start` from the matching
    /// connection back to the section it came from.
    pub fn move_train_to_section(&self, train: &mut Train, next_section_name: &str) -> DispatchResult<()> {
        let next_section = self.route.sections_mapper.find_section_by_name(next_section_name)?;
        if next_section.interdicted && !train.options.may_invade_interdicted_sections {
            return Err(DispatchError::ConflictCondition(format!(
                "section {next_section_name} is interdicted"
            )));
        }

        let previous_head = train.current_head_section.clone();
        let origin = next_section
            .connections
            .iter()
            .find(|c| c.destiny_section_name == previous_head)
            .map(|c| c.connection_origin)
            .unwrap_or(Endpoint::StartStraight);

        train.current_head_section = next_section_name.to_string();
        train.relative_position = if train.is_reversed { 1.0 } else { 0.0 };
        train.section_start = origin;
        Ok(())
    }

    /// Refreshes a train's cached adjacency pointers after it has moved.
    pub fn update_train_sections(&self, train: &mut Train) -> DispatchResult<()> {
        let mapper = &self.route.sections_mapper;
        let section = mapper.find_section_by_name(&train.current_head_section)?;
        let reversed = train.is_reversed;

        train.next_straight_section = next_by_endpoint(section, reversed, false);
        train.next_deviated_section = next_by_endpoint(section, reversed, true);
        train.previous_straight_section = previous_by_endpoint(section, reversed, false);
        train.previous_deviated_section = previous_by_endpoint(section, reversed, true);

        train.next_turnout_section = mapper.get_next_turnout(section, reversed)?.map(|s| s.name.clone());
        train.previous_turnout_section = mapper.get_previous_turnout(section, reversed)?.map(|s| s.name.clone());

        train.routes_between_closest_turnouts = match (&train.previous_turnout_section, &train.next_turnout_section) {
            (Some(prev), Some(next)) => {
                let prev_section = mapper.find_section_by_name(prev)?;
                let next_section = mapper.find_section_by_name(next)?;
                mapper.get_routes_between_sections(prev_section, next_section, reversed, &[])?
            }
            _ => Vec::new(),
        };

        Ok(())
    }

    /// Recomputes which sibling trains are ahead of / behind `train`, and whether any train
    /// behind outranks it, used by the wait actions' applicability checks.
    fn update_related_trains(&self, train: &mut Train, before: &[Train], after: &[Train]) {
        let mapper = &self.route.sections_mapper;
        let Ok(section) = mapper.find_section_by_name(&train.current_head_section) else {
            return;
        };
        let ahead_sections: std::collections::HashSet<String> = mapper
            .get_all_sections_after(section, train.is_reversed)
            .unwrap_or_default()
            .into_iter()
            .collect();
        let behind_sections: std::collections::HashSet<String> = mapper
            .get_all_sections_before(section, train.is_reversed)
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut trains_ahead = Vec::new();
        let mut trains_behind = Vec::new();
        let mut higher_priority_behind = false;

        for other in before.iter().chain(after.iter()) {
            if other.is_reversed != train.is_reversed {
                continue;
            }
            let same_section = other.current_head_section == train.current_head_section;
            let is_ahead = if same_section {
                if train.is_reversed {
                    other.relative_position < train.relative_position
                } else {
                    other.relative_position > train.relative_position
                }
            } else {
                ahead_sections.contains(&other.current_head_section)
            };
            let is_behind = if same_section {
                if train.is_reversed {
                    other.relative_position > train.relative_position
                } else {
                    other.relative_position < train.relative_position
                }
            } else {
                behind_sections.contains(&other.current_head_section)
            };

            if is_ahead {
                trains_ahead.push(other.prefix.clone());
            }
            if is_behind {
                trains_behind.push(other.prefix.clone());
                if other.options.priority >= train.options.priority {
                    higher_priority_behind = true;
                }
            }
        }

        train.trains_ahead = trains_ahead;
        train.trains_behind = trains_behind;
        train.higher_priority_behind = higher_priority_behind;
    }

    pub fn get_train_distance_to_goal(&self, train: &Train) -> DispatchResult<f64> {
        let mapper = &self.route.sections_mapper;
        let current = mapper.find_section_by_name(&train.current_head_section)?;
        let finish = mapper.find_section_by_name(&train.options.finish_section)?;

        let mut distance = mapper.get_distance_between_sections(current, finish, train.is_reversed)?;
        if distance.is_infinite() {
            let total: f64 = mapper.sections.iter().map(|s| s.length).sum();
            distance = 2.0 * total;
        }

        let remaining_in_current = if train.is_reversed {
            train.relative_position * current.length
        } else {
            (1.0 - train.relative_position) * current.length
        };
        distance -= current.length - remaining_in_current;
        distance -= 0.5 * finish.length;
        Ok(distance.max(0.0))
    }

    pub fn update_train_cost(&self, train: &mut Train) -> DispatchResult<()> {
        let distance_to_goal = self.get_train_distance_to_goal(train)?;
        let instant_cost = train.options.priority as f64
            * train.train_equation.calculate_cost(
                train.odometer,
                train.traveling_time,
                train.stopped_time,
                distance_to_goal,
                train.actions_history.len(),
            );
        train.instant_cost = instant_cost;
        train.last_accumulated_cost = train.accumulated_cost;
        train.accumulated_cost += instant_cost;
        Ok(())
    }

    fn update_steps_without_movement(&mut self) {
        if self.trains.is_empty() {
            self.steps_without_movement = 0;
            return;
        }
        let current_positions: Vec<f64> = self.trains.iter().map(|t| t.odometer).collect();
        if current_positions == self.last_positions {
            self.steps_without_movement += 1;
        } else {
            self.steps_without_movement = 0;
        }
        self.last_positions = current_positions;
    }
}

fn next_by_endpoint(section: &Section, reversed: bool, deviated: bool) -> Option<String> {
    let endpoint = match (reversed, deviated) {
        (false, false) => Endpoint::EndStraight,
        (false, true) => Endpoint::EndDeviated,
        (true, false) => Endpoint::StartStraight,
        (true, true) => Endpoint::StartDeviated,
    };
    section.accessible_connections(Some(endpoint)).first().map(|c| c.destiny_section_name.clone())
}

fn previous_by_endpoint(section: &Section, reversed: bool, deviated: bool) -> Option<String> {
    let endpoint = match (reversed, deviated) {
        (false, false) => Endpoint::StartStraight,
        (false, true) => Endpoint::StartDeviated,
        (true, false) => Endpoint::EndStraight,
        (true, true) => Endpoint::EndDeviated,
    };
    section.accessible_connections(Some(endpoint)).first().map(|c| c.destiny_section_name.clone())
}
