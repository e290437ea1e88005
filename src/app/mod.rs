//! # App
//!
//! Command-line entry point wiring configuration, telemetry and the voltage
//! sweep together.

mod configuration;
mod telemetry;

pub(crate) use configuration::Configuration;
pub use configuration::{GeometryConfiguration, PhysicalConfiguration, SimulationConfiguration};

use crate::backend::ColumnBackend;
use crate::charge::ChargeDensityModel;
use crate::newton::{NewtonSettings, NewtonSolver};
use crate::parameters::{DimensionlessScale, PhysicalParameters};
use crate::sweep::{SweepPlan, VoltageSweep};
use clap::{ArgEnum, Parser};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct App {
    /// TOML configuration file; the built-in 4H-SiC column is used when
    /// absent
    config_path: Option<PathBuf>,
    #[clap(arg_enum, short, long, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Error => "error",
        };
        write!(f, "{}", level)
    }
}

/// Parses the command line, builds the problem and runs the voltage sweep.
pub fn run() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = App::parse();

    let (subscriber, _guard) = telemetry::get_subscriber(cli.log_level);
    telemetry::init_subscriber(subscriber);

    let configuration = match &cli.config_path {
        Some(path) => Configuration::build(path)?,
        None => Configuration::default(),
    };

    let parameters = PhysicalParameters::from_configuration(&configuration.physical)?;
    let scale = DimensionlessScale::from_parameters(&parameters);
    let charge = ChargeDensityModel::new(&parameters, &scale);
    let backend = ColumnBackend::new(&configuration.geometry, &parameters, &scale)?;

    let simulation = &configuration.simulation;
    let newton = NewtonSolver::new(NewtonSettings {
        maximum_iterations: simulation.maximum_iterations,
        tolerance: simulation.tolerance,
        damping: simulation.damping,
        metric: simulation.convergence_metric,
    });
    let plan = SweepPlan::new(&simulation.tip_voltages)?;
    let farfield_coefficient =
        1.0 / scale.length_to_dimensionless(configuration.geometry.farfield_radius);
    let sweep = VoltageSweep::new(
        &backend,
        newton,
        simulation.continuation_steps,
        scale,
        farfield_coefficient,
    );

    let records = sweep.run(&plan, &charge);
    for record in &records {
        match &record.outcome {
            Ok(solution) => {
                let surface = scale.potential_to_volts(backend.surface_potential(&solution.potential));
                println!(
                    "tip {:+.3} V -> surface potential {:+.6} V ({} iterations)",
                    record.voltage, surface, solution.iterations
                );
            }
            Err(error) => {
                println!("tip {:+.3} V -> failed: {}", record.voltage, error);
            }
        }
    }

    Ok(())
}
