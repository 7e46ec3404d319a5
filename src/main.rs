use anyhow::Context;
use clap::Parser;
use codonopt::config::ConfigManager;
use codonopt::engines::generation::{ConsoleProgressCallback, PopulationController, RunStatus};
use std::path::PathBuf;
use std::process::ExitCode;

/// Codon optimizer for mRNA sequences
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML (or JSON) run configuration
    config: PathBuf,

    /// Overrides output.directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overrides evolution.seed
    #[arg(long)]
    seed: Option<u64>,

    /// Overrides evolution.iterations
    #[arg(short = 'n', long)]
    iterations: Option<usize>,
}

fn run(args: Args) -> anyhow::Result<RunStatus> {
    let manager = ConfigManager::new();
    manager
        .load_from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    manager.update(|config| {
        if let Some(output) = args.output {
            config.output.directory = output;
        }
        if let Some(seed) = args.seed {
            config.evolution.seed = seed;
        }
        if let Some(iterations) = args.iterations {
            config.evolution.iterations = iterations;
        }
    })?;
    let config = manager.get();

    let mut controller = PopulationController::from_config(&config)?;
    let outcome = controller.run(&mut ConsoleProgressCallback)?;
    if outcome.status != RunStatus::Failed {
        controller.save_results(&config.output, &config)?;
    }
    Ok(outcome.status)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(RunStatus::Failed) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
