//! Coverage of the simulation lifecycle's timing-sensitive and cost-accounting behaviour.

use std::sync::Arc;
use std::time::Instant;

use dispatch_lib::route::Route;
use dispatch_lib::section::{Endpoint, Section, SectionConnection};
use dispatch_lib::simulation::{Simulation, SimulationOptions, SimulationStatus};
use dispatch_lib::train::TrainOptions;

/// Builds a route shaped like `depth` chained turnout/merge diamonds: `T0` splits into `U1`/`L1`,
/// which merge back into `T1`, which splits again into `U2`/`L2`, and so on up to `Tdepth`. Each
/// diamond doubles the number of simple paths from `T0` to `Tdepth`, giving `2^depth` routes —
/// enough recursive work in `get_routes_between_sections` to make an uncached call measurably
/// more expensive than a cached one.
fn build_branching_route(depth: usize) -> Arc<Route> {
    let mut sections = vec![Section::new("CT0", 0.0, 100.0)];
    for i in 0..depth {
        sections.push(Section::new(format!("CU{}", i + 1), 0.0, 100.0));
        sections.push(Section::new(format!("CL{}", i + 1), 0.0, 100.0));
        sections.push(Section::new(format!("CT{}", i + 1), 0.0, 100.0));
    }
    for i in 0..depth {
        let turnout_name = format!("CT{i}");
        let up_name = format!("CU{}", i + 1);
        let low_name = format!("CL{}", i + 1);
        let merge_name = format!("CT{}", i + 1);

        let turnout = sections.iter_mut().find(|s| s.name == turnout_name).unwrap();
        turnout.connections.push(SectionConnection::new(up_name.clone(), Endpoint::EndStraight));
        turnout.connections.push(SectionConnection::new(low_name.clone(), Endpoint::EndDeviated));

        let up = sections.iter_mut().find(|s| s.name == up_name).unwrap();
        up.connections.push(SectionConnection::new(merge_name.clone(), Endpoint::EndStraight));

        let low = sections.iter_mut().find(|s| s.name == low_name).unwrap();
        low.connections.push(SectionConnection::new(merge_name, Endpoint::EndStraight));
    }
    Arc::new(Route::new("Cache Bench Route", sections))
}

#[test]
fn cache_speeds_up_repeated_route_queries() {
    let depth = 8;
    let route = build_branching_route(depth);
    let mapper = &route.sections_mapper;
    let start = mapper.find_section_by_name("CT0").unwrap();
    let end = mapper.find_section_by_name(&format!("CT{depth}")).unwrap();

    let cold_started = Instant::now();
    let routes = mapper.get_routes_between_sections(start, end, false, &[]).unwrap();
    let cold_elapsed = cold_started.elapsed();
    assert_eq!(routes.len(), 1 << depth);

    let warm_started = Instant::now();
    for _ in 0..50 {
        let cached = mapper.get_routes_between_sections(start, end, false, &[]).unwrap();
        assert_eq!(cached.len(), 1 << depth);
    }
    let warm_elapsed = warm_started.elapsed();

    // Generous margin: 50 cache hits together should still not cost more than 10x the single
    // uncached call that had to enumerate every route from scratch.
    assert!(
        warm_elapsed < cold_elapsed * 10,
        "expected 50 cached lookups ({warm_elapsed:?}) to stay well under 10x the cold lookup ({cold_elapsed:?})"
    );
}

fn dead_end_route() -> Arc<Route> {
    let mut a = Section::new("CostA", 0.0, 1000.0);
    a.connections.push(SectionConnection::new("CostB", Endpoint::EndStraight));
    let mut b = Section::new("CostB", 1.0, 1000.0);
    b.connections.push(SectionConnection::new("CostA", Endpoint::StartStraight));
    b.connections.push(SectionConnection::new("CostC", Endpoint::EndStraight));
    let mut c = Section::new("CostC", 2.0, 1000.0);
    c.connections.push(SectionConnection::new("CostB", Endpoint::StartStraight));
    Arc::new(Route::new("Cost Route", vec![a, b, c]))
}

fn run_one_step_with(max_steps_without_train_movement: u64) -> f64 {
    let mut options = SimulationOptions::default();
    options.max_cost = 0.0;
    options.max_steps_without_train_movement = max_steps_without_train_movement;
    let mut sim = Simulation::new(dead_end_route(), options, "cost-chain");
    sim.enqueue_train(
        TrainOptions {
            start_section: "CostA".into(),
            finish_section: "CostB".into(),
            ..Default::default()
        },
        1,
    );
    sim.start();
    sim.step().unwrap();
    assert_eq!(sim.status, SimulationStatus::Fail);
    sim.total_cost
}

/// When a tick simultaneously crosses the cost limit and the no-movement limit, only the first
/// condition reached in the check order (cost, here, since `max_steps` is untouched and cost is
/// checked before no-movement) should multiply `total_cost`. Comparing against a run where the
/// no-movement limit is unreachable isolates whether a second multiplier snuck in.
#[test]
fn cost_limit_multiplies_total_cost_exactly_once_even_when_stalled() {
    let isolated = run_one_step_with(u64::MAX);
    let combined = run_one_step_with(0);
    assert_eq!(isolated, combined);
    assert!(isolated > 0.0);
}
