//! TOML-deserialisable run configuration.
//!
//! Grounded on the teacher's `cli.rs`, which reads a TOML config file (via the `toml` crate) into
//! a small `#[derive(Deserialize)]` struct before building its ensembles; the shape here is the
//! same idea applied to a route/train manifest/controller selection instead of a flock.

use std::path::Path;

use serde::Deserialize;

use crate::controller::genetic::GeneticAlgorithmOptions;
use crate::controller::pso::ParticleSwarmOptions;
use crate::controller::ControllerOptions;
use crate::error::DispatchError;
use crate::route::Route;
use crate::scenario::Scenario;
use crate::section::Section;
use crate::simulation::SimulationOptions;
use crate::train::TrainOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControllerKind {
    Random,
    Genetic {
        #[serde(default)]
        train_crossing_probability: Option<f64>,
        #[serde(default)]
        selection_preserve_ratio: Option<f64>,
        #[serde(default)]
        solution_mutation_probability: Option<f64>,
        #[serde(default)]
        train_mutation_probability: Option<f64>,
        #[serde(default)]
        gene_mutation_occurrence: Option<f64>,
    },
    ParticleSwarm {
        #[serde(default)]
        inertial_parameter: Option<f64>,
        #[serde(default)]
        personal_acceleration_coefficient: Option<f64>,
        #[serde(default)]
        global_acceleration_coefficient: Option<f64>,
    },
}

impl ControllerKind {
    pub fn genetic_options(&self, base: ControllerOptions) -> GeneticAlgorithmOptions {
        let mut options = GeneticAlgorithmOptions { base, ..Default::default() };
        if let ControllerKind::Genetic {
            train_crossing_probability,
            selection_preserve_ratio,
            solution_mutation_probability,
            train_mutation_probability,
            gene_mutation_occurrence,
        } = self
        {
            if let Some(v) = train_crossing_probability {
                options.train_crossing_probability = *v;
            }
            if let Some(v) = selection_preserve_ratio {
                options.selection_preserve_ratio = *v;
            }
            if let Some(v) = solution_mutation_probability {
                options.solution_mutation_probability = *v;
            }
            if let Some(v) = train_mutation_probability {
                options.train_mutation_probability = *v;
            }
            if let Some(v) = gene_mutation_occurrence {
                options.gene_mutation_occurrence = *v;
            }
        }
        options
    }

    pub fn particle_swarm_options(&self, base: ControllerOptions) -> ParticleSwarmOptions {
        let mut options = ParticleSwarmOptions { base, ..Default::default() };
        if let ControllerKind::ParticleSwarm { inertial_parameter, personal_acceleration_coefficient, global_acceleration_coefficient } = self {
            if let Some(v) = inertial_parameter {
                options.inertial_parameter = *v;
            }
            if let Some(v) = personal_acceleration_coefficient {
                options.personal_acceleration_coefficient = *v;
            }
            if let Some(v) = global_acceleration_coefficient {
                options.global_acceleration_coefficient = *v;
            }
        }
        options
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub solutions_size: Option<usize>,
    #[serde(default)]
    pub max_thread_workers: Option<usize>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub max_consecutive_steps_with_same_best: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub kind: Option<ControllerKind>,
}

impl ControllerConfig {
    pub fn base_options(&self) -> ControllerOptions {
        let mut options = ControllerOptions::default();
        if let Some(v) = self.solutions_size {
            options.solutions_size = v;
        }
        if let Some(v) = self.max_thread_workers {
            options.max_thread_workers = v;
        }
        if let Some(v) = self.max_iterations {
            options.max_iterations = v;
        }
        if let Some(v) = self.max_consecutive_steps_with_same_best {
            options.max_consecutive_steps_with_same_best = v;
        }
        options
    }
}

/// The top-level shape of a scenario TOML file: a route's sections, a fixed train manifest,
/// simulation-level options, and optionally a controller to search with instead of a bare run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub name: String,
    pub sections: Vec<Section>,
    pub trains: Vec<TrainOptions>,
    #[serde(default)]
    pub simulation: SimulationOptions,
    #[serde(default)]
    pub controller: Option<ControllerConfig>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, DispatchError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| DispatchError::InvalidChoice(format!("failed to read config '{}': {err}", path.display())))?;
        toml::from_str(&raw).map_err(|err| DispatchError::InvalidChoice(format!("failed to parse config '{}': {err}", path.display())))
    }

    pub fn build_scenario(&self) -> Scenario {
        let route = std::sync::Arc::new(Route::new(self.name.clone(), self.sections.clone()));
        let mut scenario = Scenario::new(self.name.clone(), route, self.trains.clone());
        scenario.simulation_options = self.simulation.clone();
        scenario
    }
}
