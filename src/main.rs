use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use vesting_sim::config::{MonteCarloConfig, SimulationRequest};
use vesting_sim::jobs::{JobOutput, JobQueue, QueueConfig};
use vesting_sim::output;

#[derive(Parser)]
#[command(
    name = "vesting-sim",
    about = "Agent-based market simulator for token vesting schedules"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a request file without running anything
    Validate {
        /// Request file (.json or .toml)
        #[arg(long)]
        request: PathBuf,
    },

    /// Run a single simulation
    Run {
        /// Request file (.json or .toml)
        #[arg(long)]
        request: PathBuf,

        /// Output directory for run artifacts
        #[arg(long, default_value = "output/run")]
        output_dir: PathBuf,

        /// Override the request seed
        #[arg(long)]
        seed: Option<u64>,

        /// Skip the result cache
        #[arg(long)]
        bypass_cache: bool,
    },

    /// Run a Monte-Carlo replication
    MonteCarlo {
        /// Request file (.json or .toml); must carry a monte_carlo block
        /// unless --trials is given
        #[arg(long)]
        request: PathBuf,

        /// Output directory for Monte-Carlo artifacts
        #[arg(long, default_value = "output/monte_carlo")]
        output_dir: PathBuf,

        /// Override the number of trials
        #[arg(long)]
        trials: Option<u32>,

        /// Override the Monte-Carlo master seed
        #[arg(long)]
        seed: Option<u64>,

        /// Skip the result cache
        #[arg(long)]
        bypass_cache: bool,
    },
}

fn load_request(path: &Path) -> Result<SimulationRequest, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&text).map_err(|e| format!("invalid TOML request: {e}")),
        _ => serde_json::from_str(&text).map_err(|e| format!("invalid JSON request: {e}")),
    }
}

/// Follow a job's progress stream with a terminal bar until the done
/// event arrives; returns the terminal outcome label.
async fn watch_progress(queue: &JobQueue, job_id: Uuid) -> Option<String> {
    let mut subscription = match queue.subscribe(job_id) {
        Ok(subscription) => subscription,
        Err(_) => return None,
    };

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("valid progress template"),
    );

    let mut outcome = None;
    while let Some(event) = subscription.next().await {
        if event.total > 0 {
            bar.set_length(event.total as u64);
            bar.set_position(event.current as u64);
        }
        if event.done {
            outcome = event.outcome;
            break;
        }
    }
    bar.finish_and_clear();
    outcome
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { request } => {
            let request = match load_request(&request) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            };
            match request.validate() {
                Ok(()) => println!("Request is valid."),
                Err(e) => {
                    eprintln!("Invalid request: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Run {
            request,
            output_dir,
            seed,
            bypass_cache,
        } => {
            let mut request = match load_request(&request) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            };
            if let Some(seed) = seed {
                request.abm.seed = Some(seed);
            }

            let queue = JobQueue::new(QueueConfig::default());
            let receipt = match queue.submit(request, bypass_cache) {
                Ok(receipt) => receipt,
                Err(e) => {
                    eprintln!("Submission rejected: {e}");
                    std::process::exit(1);
                }
            };
            if receipt.cached {
                println!("Result served from cache.");
            } else {
                println!("Job {} submitted.", receipt.job_id);
                watch_progress(&queue, receipt.job_id).await;
            }

            match queue.result(receipt.job_id) {
                Ok(result) => {
                    let result = result.as_single().expect("single job yields single result");
                    match output::save_run(result, &output_dir) {
                        Ok(()) => println!(
                            "Saved {} months (seed {}) to {}",
                            result.months.len(),
                            result.seed,
                            output_dir.display()
                        ),
                        Err(e) => eprintln!("Error saving artifacts: {e}"),
                    }
                    println!(
                        "final_price={:.6} final_circulating={:.2} cumulative_sold={:.2}",
                        result.summary.final_price,
                        result.summary.final_circulating,
                        result.summary.cumulative_sold
                    );
                }
                Err(e) => {
                    eprintln!("Run did not complete: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::MonteCarlo {
            request,
            output_dir,
            trials,
            seed,
            bypass_cache,
        } => {
            let mut request = match load_request(&request) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            };
            if let Some(trials) = trials {
                let mc = request
                    .monte_carlo
                    .get_or_insert_with(|| MonteCarloConfig::with_trials(trials));
                mc.num_trials = trials;
            }
            if let Some(seed) = seed {
                if let Some(mc) = request.monte_carlo.as_mut() {
                    mc.seed = Some(seed);
                }
            }

            let queue = JobQueue::new(QueueConfig::default());
            let receipt = match queue.submit_monte_carlo(request, bypass_cache) {
                Ok(receipt) => receipt,
                Err(e) => {
                    eprintln!("Submission rejected: {e}");
                    std::process::exit(1);
                }
            };
            if receipt.cached {
                println!("Result served from cache.");
            } else {
                println!("Monte-Carlo job {} submitted.", receipt.job_id);
                watch_progress(&queue, receipt.job_id).await;
            }

            match queue.result(receipt.job_id) {
                Ok(result) => {
                    let result = match &*result {
                        JobOutput::MonteCarlo(result) => result,
                        JobOutput::Single(_) => unreachable!("monte_carlo job yields MC result"),
                    };
                    match output::save_monte_carlo(result, &output_dir) {
                        Ok(()) => println!(
                            "Saved {} trials (master seed {}) to {}",
                            result.num_trials,
                            result.master_seed,
                            output_dir.display()
                        ),
                        Err(e) => eprintln!("Error saving artifacts: {e}"),
                    }
                }
                Err(e) => {
                    eprintln!("Run did not complete: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
