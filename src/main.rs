use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use serverless_sim::config::load_experiments;
use serverless_sim::error::SimulationError;
use serverless_sim::parallel::run_experiments;
use serverless_sim::trace::Trace;

#[derive(Parser)]
#[command(about = "Cycle-driven FaaS platform simulator", version)]
struct Args {
    /// Directory with one CSV trace file per function.
    trace: PathBuf,
    /// Directory with one YAML experiment config per scenario.
    #[arg(long, short)]
    experiments: PathBuf,
    /// Base random seed.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Directory for per-scenario usage records; omitted means no output.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Worker threads for running scenarios in parallel.
    #[arg(long, default_value_t = 4)]
    threads: usize,
}

fn run(args: Args) -> Result<(), SimulationError> {
    let trace = Arc::new(Trace::from_dir(&args.trace)?);
    let configs = load_experiments(&args.experiments)?;
    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)?;
    }
    let reports = run_experiments(trace, configs, args.seed, args.output, args.threads)?;
    for report in reports {
        println!("{}\n", report);
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
