//! The closed set of actions a train may take each step.
//!
//! Grounded on `original_source/code/app/simulation/action/{base,all,move_straight,move_deviate,
//! reverse,wait_crossing,wait_overtake}.py`. The source models actions as a small class hierarchy
//! with a static `is_applicable` and an instance `execute`; here that collapses into a single
//! tagged union, matching the "closed-set of variants" guidance in §9.

use serde::{Deserialize, Serialize};

use crate::dispatcher::Dispatcher;
use crate::error::DispatchResult;
use crate::train::Train;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    MoveStraight,
    MoveDeviate,
    WaitOvertake,
    WaitCrossing,
    Reverse,
}

pub const ALL_POSSIBLE_ACTIONS: [ActionKind; 5] = [
    ActionKind::MoveStraight,
    ActionKind::MoveDeviate,
    ActionKind::WaitOvertake,
    ActionKind::WaitCrossing,
    ActionKind::Reverse,
];

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::MoveStraight => "move_straight",
            ActionKind::MoveDeviate => "move_deviate",
            ActionKind::WaitOvertake => "wait_overtake",
            ActionKind::WaitCrossing => "wait_crossing",
            ActionKind::Reverse => "reverse",
        }
    }

    pub fn abbrev(self) -> &'static str {
        match self {
            ActionKind::MoveStraight => "MST",
            ActionKind::MoveDeviate => "MDV",
            ActionKind::WaitOvertake => "WOT",
            ActionKind::WaitCrossing => "WCR",
            ActionKind::Reverse => "REV",
        }
    }

    pub fn find(keyword: &str) -> Option<ActionKind> {
        ALL_POSSIBLE_ACTIONS
            .into_iter()
            .find(|kind| kind.name() == keyword || kind.abbrev() == keyword)
    }

    /// Mirrors each action class's static `is_applicable`. `before`/`after` (the sibling trains
    /// on either side of `train` in the dispatcher's working slice) are only consulted by
    /// `WaitCrossing`, to check whether every train ahead is already waiting to cross.
    pub fn is_applicable(self, dispatcher: &Dispatcher, train: &Train, before: &[Train], after: &[Train]) -> bool {
        let reversed = train.is_reversed;
        match self {
            ActionKind::MoveStraight => dispatcher.section_is_free(train.next_straight_section.as_deref(), reversed),
            ActionKind::MoveDeviate => dispatcher.section_is_free(train.next_deviated_section.as_deref(), reversed),
            ActionKind::Reverse => {
                let no_next_sections = train.next_straight_section.is_none() && train.next_deviated_section.is_none();
                let in_straight_section = !dispatcher.section_is_turnout(&train.current_head_section);
                let at_turnout_blocked = in_straight_section
                    && !dispatcher.section_is_free(train.next_straight_section.as_deref(), reversed)
                    && !dispatcher.section_is_free(train.next_deviated_section.as_deref(), reversed);
                no_next_sections || at_turnout_blocked
            }
            ActionKind::WaitCrossing => {
                if train.trains_ahead.is_empty() {
                    return false;
                }
                let next_is_turnout = train
                    .next_straight_section
                    .as_deref()
                    .map(|name| dispatcher.section_is_turnout(name))
                    .unwrap_or(false);
                let has_siding = train.routes_between_closest_turnouts.len() > 1;
                let has_available_siding = train
                    .routes_between_closest_turnouts
                    .iter()
                    .any(|route| dispatcher.is_route_available(route, reversed));
                let all_ahead_already_waiting = train.trains_ahead.iter().all(|prefix| {
                    find_train(before, after, prefix)
                        .map(|other| matches!(other.executing_action.as_ref().map(|a| a.kind()), Some(ActionKind::WaitCrossing)))
                        .unwrap_or(false)
                });
                next_is_turnout && has_siding && has_available_siding && !all_ahead_already_waiting
            }
            ActionKind::WaitOvertake => {
                if train.trains_behind.is_empty() {
                    return false;
                }
                let has_available_siding = train
                    .routes_between_closest_turnouts
                    .iter()
                    .any(|route| dispatcher.is_route_available(route, reversed));
                train.is_at_turnout_closing(
                    dispatcher.turnout_successor_count(train.next_turnout_section.as_deref(), reversed),
                    dispatcher.turnout_predecessor_count(train.next_turnout_section.as_deref(), reversed),
                ) && train.routes_between_closest_turnouts.len() > 1
                    && has_available_siding
                    && train.has_higher_priority_trains_behind()
            }
        }
    }
}

fn find_train<'a>(before: &'a [Train], after: &'a [Train], prefix: &str) -> Option<&'a Train> {
    before.iter().chain(after.iter()).find(|t| t.prefix == prefix)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    MoveStraight { executed: bool },
    MoveDeviate { executed: bool },
    WaitOvertake { lookup_train: Option<String>, executed: bool },
    WaitCrossing { lookup_train: Option<String>, executed: bool },
    Reverse { executed: bool },
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        match kind {
            ActionKind::MoveStraight => Action::MoveStraight { executed: false },
            ActionKind::MoveDeviate => Action::MoveDeviate { executed: false },
            ActionKind::WaitOvertake => Action::WaitOvertake { lookup_train: None, executed: false },
            ActionKind::WaitCrossing => Action::WaitCrossing { lookup_train: None, executed: false },
            ActionKind::Reverse => Action::Reverse { executed: false },
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::MoveStraight { .. } => ActionKind::MoveStraight,
            Action::MoveDeviate { .. } => ActionKind::MoveDeviate,
            Action::WaitOvertake { .. } => ActionKind::WaitOvertake,
            Action::WaitCrossing { .. } => ActionKind::WaitCrossing,
            Action::Reverse { .. } => ActionKind::Reverse,
        }
    }

    pub fn was_executed(&self) -> bool {
        match self {
            Action::MoveStraight { executed }
            | Action::MoveDeviate { executed }
            | Action::Reverse { executed }
            | Action::WaitOvertake { executed, .. }
            | Action::WaitCrossing { executed, .. } => *executed,
        }
    }

    pub fn describe(&self) -> String {
        format!("{} ({})", self.kind().name(), self.kind().abbrev())
    }

    /// Mutates `train` in place; mirrors `BaseAction.execute` / `move_to` and the two wait
    /// actions' latch-onto-a-train behaviour.
    pub fn execute(&mut self, dispatcher: &Dispatcher, train: &mut Train) -> DispatchResult<()> {
        match self {
            Action::MoveStraight { executed } => {
                *executed = move_to(dispatcher, train, train.next_straight_section.clone())?;
            }
            Action::MoveDeviate { executed } => {
                *executed = move_to(dispatcher, train, train.next_deviated_section.clone())?;
            }
            Action::Reverse { executed } => {
                if !train.is_at_section_end() {
                    let max_velocity = dispatcher.max_velocity_at(&train.current_head_section, train.relative_position);
                    train.go_at_maximum_speed(max_velocity);
                } else {
                    train.is_reversed = !train.is_reversed;
                    train.section_start = train.section_start.paired_on_reverse();
                    *executed = true;
                }
            }
            Action::WaitCrossing { lookup_train, executed } => {
                let max_velocity = dispatcher.max_velocity_at(&train.current_head_section, train.relative_position);
                train.keep_train_going_if_not_at_section_end(max_velocity);
                if lookup_train.is_none() {
                    *lookup_train = train.trains_ahead.first().cloned();
                }
                *executed = match lookup_train {
                    Some(prefix) => !train.trains_ahead.contains(prefix),
                    None => true,
                };
            }
            Action::WaitOvertake { lookup_train, executed } => {
                let max_velocity = dispatcher.max_velocity_at(&train.current_head_section, train.relative_position);
                train.keep_train_going_if_not_at_section_end(max_velocity);
                if lookup_train.is_none() {
                    *lookup_train = train.trains_behind.first().cloned();
                }
                *executed = match lookup_train {
                    Some(prefix) => !train.trains_behind.contains(prefix),
                    None => true,
                };
            }
        }
        Ok(())
    }
}

/// Shared helper behind `MoveStraightAction`/`MoveDeviateAction`: advance at speed until the
/// section end, then hand off to the next section if it is free.
fn move_to(dispatcher: &Dispatcher, train: &mut Train, next_section: Option<String>) -> DispatchResult<bool> {
    if !train.is_at_section_end() {
        let max_velocity = dispatcher.max_velocity_at(&train.current_head_section, train.relative_position);
        train.go_at_maximum_speed(max_velocity);
        return Ok(false);
    }

    train.stop();
    let next_section = next_section.ok_or_else(|| {
        crate::error::DispatchError::ConflictCondition(format!(
            "train {} has no next section to move into",
            train.prefix
        ))
    })?;

    if !dispatcher.section_is_free(Some(&next_section), train.is_reversed) {
        return Ok(true);
    }

    dispatcher.move_train_to_section(train, &next_section)?;
    Ok(true)
}
