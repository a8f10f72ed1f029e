use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use airside_sim::layout::Layout;
use airside_sim::params::SimulationParams;
use airside_sim::simulator::runner::run_simulation;

#[derive(Parser)]
#[command(name = "airside-sim")]
#[command(about = "Discrete-time airport ground-traffic simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print (or write) the result JSON
    Run {
        #[arg(short, long)]
        layout: PathBuf,

        /// Parameter bundle; built-in defaults are used if omitted
        #[arg(short, long)]
        params: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a layout file without running anything
    Validate {
        #[arg(short, long)]
        layout: PathBuf,
    },

    /// Print the default parameter bundle as JSON
    Defaults,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { layout, params, output } => {
            let layout_json = fs::read_to_string(&layout)
                .with_context(|| format!("Failed to read layout: {}", layout.display()))?;
            let params_json = match params {
                Some(path) => fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read params: {}", path.display()))?,
                None => SimulationParams::default().to_json(),
            };

            let result = run_simulation(&layout_json, &params_json);

            match output {
                Some(path) => {
                    fs::write(&path, result)
                        .with_context(|| format!("Failed to write results: {}", path.display()))?;
                    info!("Results written to {}", path.display());
                }
                None => println!("{result}"),
            }
        }

        Commands::Validate { layout } => {
            let layout_json = fs::read_to_string(&layout)
                .with_context(|| format!("Failed to read layout: {}", layout.display()))?;
            let layout = Layout::from_json(&layout_json)?;
            let errors = layout.validate();
            if errors.is_empty() {
                info!("Layout '{}' is valid", layout.name);
            } else {
                for error in &errors {
                    eprintln!("{error}");
                }
                anyhow::bail!("Layout validation failed with {} error(s)", errors.len());
            }
        }

        Commands::Defaults => {
            println!("{}", SimulationParams::default().to_json());
        }
    }

    Ok(())
}
