//! xdiffract command-line interface.
//!
//! Run simulations from TOML configuration files:
//! ```sh
//! xdiffract run shot.toml
//! xdiffract validate shot.toml
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xdiffract")]
#[command(about = "Coherent X-ray diffraction pattern simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation from a TOML configuration file.
    Run {
        /// Path to the simulation configuration file.
        config: PathBuf,
        /// Number of exposures (overrides the configuration).
        #[arg(short = 'n', long)]
        shots: Option<usize>,
    },
    /// Validate a configuration file without running the simulation.
    Validate {
        /// Path to the simulation configuration file.
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, shots } => {
            println!("xdiffract");
            println!("=========");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let aggregate = runner::run_simulation(&job, shots)?;
            runner::print_summary(&aggregate);
            println!("Simulation complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            job.build()?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
    }
}
