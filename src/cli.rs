//! # CLI Module - Command Line Interface for the Dispatch Simulator
//!
//! Three subcommands:
//!
//! - `check` validates a scenario file's route topology and train manifest without simulating it.
//! - `run` simulates a scenario once, or searches it with a controller, and prints/persists the
//!   result.
//! - `bench-cache` times a handful of [`crate::sections_mapper::SectionsMapper`] queries with and
//!   without [`crate::cache::Cache`] warm, to make the memoisation payoff visible.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::info;

use crate::config::RunConfig;
use crate::controller::genetic::GeneticAlgorithmController;
use crate::controller::pso::ParticleSwarmOptimizationController;
use crate::controller::random::RandomActionController;
use crate::io::{bin, json, DataPersistence};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a scenario file's route topology and train manifest
    Check {
        /// Path to a scenario TOML file
        config: PathBuf,
    },

    /// Run a scenario once, or search it with a controller
    Run {
        /// Path to a scenario TOML file
        config: PathBuf,

        /// Seed for the simulation's / controller's pseudo-random streams
        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        /// Also write the result to ./data/simulation/<id>.{bin,json}
        #[arg(long)]
        persist: bool,
    },

    /// Time sections-mapper queries with a cold vs. warm cache
    BenchCache {
        /// Path to a scenario TOML file
        config: PathBuf,

        /// Number of repeated queries to time
        #[arg(long, default_value_t = 200)]
        iterations: usize,
    },
}

pub fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Check { config } => run_check(&config),
        Commands::Run { config, seed, persist } => run_run(&config, seed, persist),
        Commands::BenchCache { config, iterations } => run_bench_cache(&config, iterations),
    }
}

fn run_check(config_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = RunConfig::load(config_path)?;
    let scenario = config.build_scenario();
    scenario.check_integrity()?;
    println!("OK: '{}' has a consistent route and {} train(s)", scenario.name, scenario.trains.len());
    Ok(())
}

fn run_run(config_path: &PathBuf, seed: u64, persist: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = RunConfig::load(config_path)?;
    let scenario = config.build_scenario();
    scenario.check_integrity()?;

    let report = match config.controller.as_ref().and_then(|c| c.kind.clone()) {
        None => {
            let simulation = scenario.run_once(format!("{}-run", scenario.name), seed)?;
            println!("Status: {}", simulation.get_status_text());
            println!("Total cost: {:.4}", simulation.total_cost);
            if persist {
                let results = simulation.into_results();
                bin::save_file(&results)?;
                json::export_json(&results)?;
                println!("Persisted to {}", results.binary_path().display());
            }
            return Ok(());
        }
        Some(kind) => {
            let controller_config = config.controller.as_ref().expect("checked above");
            let base = controller_config.base_options();
            match kind {
                crate::config::ControllerKind::Random => {
                    let mut controller = RandomActionController::new(base);
                    crate::controller::run(&mut controller, &scenario, seed)
                }
                crate::config::ControllerKind::Genetic { .. } => {
                    let options = kind.genetic_options(base);
                    let mut controller = GeneticAlgorithmController::new(options);
                    crate::controller::run(&mut controller, &scenario, seed)
                }
                crate::config::ControllerKind::ParticleSwarm { .. } => {
                    let options = kind.particle_swarm_options(base);
                    let mut controller = ParticleSwarmOptimizationController::new(options);
                    crate::controller::run(&mut controller, &scenario, seed)
                }
            }
        }
    };

    println!("{}", report.render());
    info!("run finished: {} iterations, best cost {:?}", report.iterations_run, report.best_cost);
    Ok(())
}

fn run_bench_cache(config_path: &PathBuf, iterations: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = RunConfig::load(config_path)?;
    let scenario = config.build_scenario();
    let mapper = &scenario.route.sections_mapper;

    let Some(first) = mapper.sections.first() else {
        println!("Scenario has no sections to query.");
        return Ok(());
    };
    let Some(last) = mapper.sections.last() else {
        println!("Scenario has no sections to query.");
        return Ok(());
    };

    let started = Instant::now();
    for _ in 0..iterations {
        let _ = mapper.get_distance_between_sections(first, last, false);
    }
    let elapsed = started.elapsed();

    println!(
        "{} repeated get_distance_between_sections('{}', '{}') queries took {:.3}ms ({:.3}us/call, cache already warm after the first)",
        iterations,
        first.name,
        last.name,
        elapsed.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64() * 1_000_000.0 / iterations as f64,
    );
    Ok(())
}
