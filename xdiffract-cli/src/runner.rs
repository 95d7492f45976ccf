//! Simulation runner: builds the collaborators and propagates the shots.

use anyhow::{Context, Result};
use xdiffract::{ExperimentAggregate, SimulationConfig, Value};

/// Run every exposure of a parsed configuration.
pub fn run_simulation(job: &SimulationConfig, shots: Option<usize>) -> Result<ExperimentAggregate> {
    let simulation = job.build().context("building simulation")?;
    let shots = shots.unwrap_or(simulation.number_of_shots);
    println!(
        "  {} particle model(s), {}x{} detector, {} shot(s)",
        simulation.sample.models().len(),
        job.detector.nx,
        job.detector.ny,
        shots
    );
    let mut propagator = simulation.into_propagator();
    let aggregate = propagator.propagate(shots).context("propagating")?;
    log::debug!("computed {} qmap(s)", propagator.qmap_cache().computations());
    Ok(aggregate)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Real(_) => "real",
        Value::Complex(_) => "complex",
        Value::Mask(_) => "mask",
        Value::Flag(_) => "flag",
    }
}

pub fn print_summary(aggregate: &ExperimentAggregate) {
    println!(
        "\n{} exposure(s), particles per exposure: {:?}",
        aggregate.number_of_exposures(),
        aggregate.particle_counts()
    );
    for (group, record) in [
        ("source", &aggregate.source),
        ("sample", &aggregate.sample),
        ("detector", &aggregate.detector),
        ("particles", &aggregate.particles),
        ("channels", &aggregate.channels),
    ] {
        println!("  [{group}]");
        for (name, value) in record {
            println!("    {name:<24} {:<8} {:?}", describe(value), value.shape());
        }
    }
    if let Some(intensity) = aggregate.channels.get("intensity_pattern").and_then(Value::as_real) {
        let total: f64 = intensity.iter().filter(|v| v.is_finite()).sum();
        println!(
            "  mean photons per exposure: {:.4e}",
            total / aggregate.number_of_exposures().max(1) as f64
        );
    }
}
