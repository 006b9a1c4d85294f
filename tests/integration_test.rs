//! End-to-end coverage of the dispatcher/action/controller stack, exercised the way a scenario
//! author would drive the crate: build a route and train manifest, run it, inspect the outcome.

use std::sync::Arc;

use dispatch_lib::action::ActionKind;
use dispatch_lib::controller::random::RandomActionController;
use dispatch_lib::controller::ControllerOptions;
use dispatch_lib::dispatcher::Dispatcher;
use dispatch_lib::dynamics::TimeDynamics;
use dispatch_lib::error::DispatchError;
use dispatch_lib::route::Route;
use dispatch_lib::scenario::Scenario;
use dispatch_lib::section::{Endpoint, Section, SectionConnection};
use dispatch_lib::simulation::SimulationStatus;
use dispatch_lib::train::{Direction, TrainOptions};

/// A single train on an otherwise empty straight route should reach its finish section in a
/// handful of ticks. `C` is a sink beyond the finish section `B`: a train arriving at `B` lands
/// at `relative_position == 0.0`, and `has_finished` only fires once it has travelled past the
/// midpoint, so the finish section needs somewhere further to roll into.
#[test]
fn single_train_on_a_straight_route_completes_within_the_step_budget() {
    let mut a = Section::new("A", 0.0, 1000.0);
    a.connections.push(SectionConnection::new("B", Endpoint::EndStraight));
    let mut b = Section::new("B", 1.0, 1000.0);
    b.connections.push(SectionConnection::new("A", Endpoint::StartStraight));
    b.connections.push(SectionConnection::new("C", Endpoint::EndStraight));
    let mut c = Section::new("C", 2.0, 1000.0);
    c.connections.push(SectionConnection::new("B", Endpoint::StartStraight));
    let route = Arc::new(Route::new("Straight Route", vec![a, b, c]));

    let scenario = Scenario::new(
        "single-train-straight",
        route,
        vec![TrainOptions {
            start_section: "A".into(),
            finish_section: "B".into(),
            start_relative_position: 0.99,
            ..Default::default()
        }],
    );

    let simulation = scenario.run_once("single-train-straight-run", 1).unwrap();
    assert_eq!(simulation.status, SimulationStatus::Success);
    assert!(simulation.dispatcher.time_dynamics.current_step <= 12, "took {} steps", simulation.dispatcher.time_dynamics.current_step);
}

/// Two trains approaching each other head-on over a siding should still be searchable: the
/// controller should find at least one scored candidate solution rather than erroring out. Both
/// directions walk the same six-section graph, one reading it via `End*` endpoints, the other
/// (reversed) via `Start*` endpoints.
#[test]
fn head_on_trains_over_a_passing_siding_are_searchable() {
    let mut west = Section::new("WEST", 0.0, 1000.0);
    west.connections.push(SectionConnection::new("TURNOUT", Endpoint::EndStraight));

    let mut turnout = Section::new("TURNOUT", 1.0, 200.0);
    turnout.connections.push(SectionConnection::new("WEST", Endpoint::StartStraight));
    turnout.connections.push(SectionConnection::new("MAIN", Endpoint::EndStraight));
    turnout.connections.push(SectionConnection::new("SIDING", Endpoint::EndDeviated));

    let mut main = Section::new("MAIN", 1.2, 800.0);
    main.connections.push(SectionConnection::new("TURNOUT", Endpoint::StartStraight));
    main.connections.push(SectionConnection::new("MERGE", Endpoint::EndStraight));

    let mut siding = Section::new("SIDING", 1.2, 800.0);
    siding.connections.push(SectionConnection::new("TURNOUT", Endpoint::StartDeviated));
    siding.connections.push(SectionConnection::new("MERGE", Endpoint::EndDeviated));

    let mut merge = Section::new("MERGE", 2.0, 200.0);
    merge.connections.push(SectionConnection::new("MAIN", Endpoint::StartStraight));
    merge.connections.push(SectionConnection::new("SIDING", Endpoint::StartDeviated));
    merge.connections.push(SectionConnection::new("EAST", Endpoint::EndStraight));

    let mut east = Section::new("EAST", 3.0, 1000.0);
    east.connections.push(SectionConnection::new("MERGE", Endpoint::StartStraight));

    let route = Arc::new(Route::new("Siding Route", vec![west, turnout, main, siding, merge, east]));
    assert!(route.check_integrity().is_ok());

    let scenario = Scenario::new(
        "head-on-siding",
        route,
        vec![
            TrainOptions {
                prefix: Some("W00".into()),
                start_section: "WEST".into(),
                finish_section: "EAST".into(),
                start_relative_position: 0.1,
                priority: 2,
                ..Default::default()
            },
            TrainOptions {
                prefix: Some("E00".into()),
                start_section: "EAST".into(),
                finish_section: "WEST".into(),
                start_relative_position: 0.9,
                direction: Direction::Reversed,
                priority: 1,
                ..Default::default()
            },
        ],
    );

    let options = ControllerOptions { solutions_size: 6, max_iterations: 4, max_thread_workers: 2, ..Default::default() };
    let mut controller = RandomActionController::new(options);
    let report = dispatch_lib::controller::run(&mut controller, &scenario, 13);
    assert!(report.best_cost.is_some());
}

/// A train approaching a closing turnout with a higher- (or equal-) priority train behind it,
/// and at least one of the two alternate routes to the next turnout genuinely clear, should find
/// `WaitOvertake` applicable. The graph: `S0 -> S1 -> TURNOUT -> {MAIN, SIDING} -> MERGE -> S2`.
/// `MERGE` is the closing turnout seen from `MAIN` (one way out, two ways in); the trailing train
/// sits on `S0`, clear of the turnout leading into the siding so that route reads as available.
#[test]
fn trailing_higher_priority_train_makes_overtake_applicable() {
    let mut s0 = Section::new("S0", 0.0, 1000.0);
    s0.connections.push(SectionConnection::new("S1", Endpoint::EndStraight));
    let mut s1 = Section::new("S1", 1.0, 1000.0);
    s1.connections.push(SectionConnection::new("TURNOUT", Endpoint::EndStraight));
    let mut turnout = Section::new("TURNOUT", 2.0, 200.0);
    turnout.connections.push(SectionConnection::new("S1", Endpoint::StartStraight));
    turnout.connections.push(SectionConnection::new("MAIN", Endpoint::EndStraight));
    turnout.connections.push(SectionConnection::new("SIDING", Endpoint::EndDeviated));
    let mut main = Section::new("MAIN", 2.2, 800.0);
    main.connections.push(SectionConnection::new("TURNOUT", Endpoint::StartStraight));
    main.connections.push(SectionConnection::new("MERGE", Endpoint::EndStraight));
    let mut siding = Section::new("SIDING", 2.2, 800.0);
    siding.connections.push(SectionConnection::new("TURNOUT", Endpoint::StartDeviated));
    siding.connections.push(SectionConnection::new("MERGE", Endpoint::EndDeviated));
    let mut merge = Section::new("MERGE", 3.0, 200.0);
    merge.connections.push(SectionConnection::new("MAIN", Endpoint::StartStraight));
    merge.connections.push(SectionConnection::new("SIDING", Endpoint::StartDeviated));
    merge.connections.push(SectionConnection::new("S2", Endpoint::EndStraight));
    let mut s2 = Section::new("S2", 4.0, 1000.0);
    s2.connections.push(SectionConnection::new("MERGE", Endpoint::StartStraight));

    let route = Arc::new(Route::new("Overtake Route", vec![s0, s1, turnout, main, siding, merge, s2]));

    let mut dispatcher = Dispatcher::new(route, TimeDynamics::new(30.0, 0.0));
    dispatcher
        .add_generic_train(
            TrainOptions {
                prefix: Some("T01".into()),
                start_section: "S0".into(),
                finish_section: "S2".into(),
                start_relative_position: 0.8,
                priority: 75,
                ..Default::default()
            },
            1,
        )
        .unwrap();
    dispatcher
        .add_generic_train(
            TrainOptions {
                prefix: Some("T02".into()),
                start_section: "MAIN".into(),
                finish_section: "S2".into(),
                start_relative_position: 0.8,
                priority: 75,
                ..Default::default()
            },
            2,
        )
        .unwrap();

    // One tick is enough: both trains were admitted before it, so `update_related_trains`
    // already sees both and populates `trains_behind` for T02 by the end of it.
    dispatcher.step().unwrap();

    let t02 = dispatcher.trains.iter().find(|t| t.prefix == "T02").unwrap();
    assert_eq!(t02.next_turnout_section.as_deref(), Some("MERGE"));
    assert_eq!(t02.previous_turnout_section.as_deref(), Some("TURNOUT"));
    assert_eq!(t02.routes_between_closest_turnouts.len(), 2);
    assert_eq!(t02.trains_behind, vec!["T01".to_string()]);
    assert!(t02.has_higher_priority_trains_behind());
    assert!(dispatcher.is_route_available(&["TURNOUT".to_string(), "SIDING".to_string(), "MERGE".to_string()], false));
    assert!(ActionKind::WaitOvertake.is_applicable(&dispatcher, t02, &[], &[]));
}

/// A route where the forward connection from `A` to `B` has no mirroring reverse connection
/// declared on `B` fails the integrity check: the count of forward paths between the route's
/// endpoints has to match the count of reverse paths.
#[test]
fn one_directional_connection_fails_integrity_check() {
    let mut a = Section::new("A", 0.0, 1000.0);
    a.connections.push(SectionConnection::new("B", Endpoint::EndStraight));
    let b = Section::new("B", 1.0, 1000.0);
    // Deliberately omit B's StartStraight connection back to A.
    let route = Route::new("Broken Route", vec![a, b]);

    let err = route.check_integrity().unwrap_err();
    assert!(matches!(err, DispatchError::ConflictCondition(_)));
}
