use std::sync::atomic::{AtomicU32, Ordering};

use rand::rngs::OsRng;
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::agent::derive_seed;
use crate::config::SimulationRequest;
use crate::error::{EngineError, EngineResult};
use crate::simulation::{
    MonthMetrics, RunControl, RunOutcome, Simulation, SimulationSummary,
};

/// Metric set every trial reports per month.
const METRIC_NAMES: [&str; 5] = ["price", "circulating", "sold", "staked", "burned"];

fn metric_value(name: &str, m: &MonthMetrics) -> f64 {
    match name {
        "price" => m.price,
        "circulating" => m.circulating_supply,
        "sold" => m.tokens_sold,
        "staked" => m.staked_supply,
        _ => m.burned_supply,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PercentileTrajectory {
    pub percentile: f64,
    pub values: Vec<f64>,
}

/// Statistics of one metric at the terminal month, across trials.
#[derive(Debug, Clone, Serialize)]
pub struct TerminalStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricAggregate {
    pub metric: String,
    pub mean: Vec<f64>,
    pub percentiles: Vec<PercentileTrajectory>,
    pub terminal: TerminalStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloResult {
    /// Master seed actually used (drawn from OS entropy when the request
    /// left it out), recorded for reproducibility.
    pub master_seed: u64,
    pub num_trials: u32,
    pub confidence_levels: Vec<f64>,
    pub horizon_months: u32,
    pub metrics: Vec<MetricAggregate>,
    pub trial_summaries: Vec<SimulationSummary>,
}

#[derive(Debug)]
pub enum MonteCarloOutcome {
    Completed(MonteCarloResult),
    Cancelled,
}

/// Linear-interpolation percentile over a sorted slice, rank in [0, 1].
pub fn percentile(sorted: &[f64], rank: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let idx = rank.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = idx - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Replicate the base simulation across seeded trials and aggregate
/// per-month percentile and mean trajectories.
///
/// Trial seeds are counter-mixed from the master seed, and each trial
/// resamples its population under its own seed. Cancellation stops all
/// trials at their next month boundary; a single trial failure fails the
/// whole run.
pub fn run_monte_carlo(
    request: &SimulationRequest,
    control: &RunControl,
) -> EngineResult<MonteCarloOutcome> {
    request.validate()?;
    let mc = request
        .monte_carlo
        .as_ref()
        .ok_or_else(|| EngineError::validation("request has no monte_carlo block"))?
        .clone();

    let master_seed = mc.seed.unwrap_or_else(|| OsRng.gen());
    let num_trials = mc.num_trials;
    let horizon = request.token.horizon_months;

    let completed = AtomicU32::new(0);
    let cancel = control.cancel_flag();

    let trials: Vec<Option<(Vec<MonthMetrics>, SimulationSummary)>> = (0..num_trials)
        .into_par_iter()
        .map(|trial| {
            if cancel.load(Ordering::Relaxed) {
                return Ok(None);
            }

            let mut trial_request = request.clone();
            trial_request.abm.seed = Some(derive_seed(master_seed, trial as u64, 0x5452_4941));

            let simulation = Simulation::new(&trial_request)?;
            match simulation.run(&RunControl::with_cancel(cancel.clone()))? {
                RunOutcome::Completed(result) => {
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    control.publish(done, num_trials);
                    Ok(Some((result.months, result.summary)))
                }
                RunOutcome::Cancelled => Ok(None),
            }
        })
        .collect::<EngineResult<Vec<_>>>()?;

    if control.is_cancelled() || trials.iter().any(|t| t.is_none()) {
        return Ok(MonteCarloOutcome::Cancelled);
    }

    let mut series = Vec::with_capacity(num_trials as usize);
    let mut trial_summaries = Vec::with_capacity(num_trials as usize);
    for trial in trials.into_iter().flatten() {
        series.push(trial.0);
        trial_summaries.push(trial.1);
    }

    let mut levels = mc.confidence_levels.clone();
    levels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    // Trials simulate the TGE month plus the horizon, so the month count
    // comes from the series itself.
    let months = series.first().map(|s| s.len()).unwrap_or(0);
    let metrics = METRIC_NAMES
        .iter()
        .map(|name| aggregate_metric(name, &series, months, &levels))
        .collect();

    Ok(MonteCarloOutcome::Completed(MonteCarloResult {
        master_seed,
        num_trials,
        confidence_levels: levels,
        horizon_months: horizon,
        metrics,
        trial_summaries,
    }))
}

fn aggregate_metric(
    name: &str,
    series: &[Vec<MonthMetrics>],
    months: usize,
    levels: &[f64],
) -> MetricAggregate {
    let mut mean = Vec::with_capacity(months);
    let mut trajectories: Vec<PercentileTrajectory> = levels
        .iter()
        .map(|&level| PercentileTrajectory {
            percentile: level,
            values: Vec::with_capacity(months),
        })
        .collect();

    let mut terminal_values = Vec::new();
    for month in 0..months {
        let mut values: Vec<f64> = series.iter().map(|s| metric_value(name, &s[month])).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        mean.push(values.iter().sum::<f64>() / values.len() as f64);
        for trajectory in &mut trajectories {
            trajectory
                .values
                .push(percentile(&values, trajectory.percentile / 100.0));
        }
        if month + 1 == months {
            terminal_values = values;
        }
    }

    let terminal_mean = terminal_values.iter().sum::<f64>() / terminal_values.len().max(1) as f64;
    let variance = if terminal_values.len() > 1 {
        terminal_values
            .iter()
            .map(|v| (v - terminal_mean).powi(2))
            .sum::<f64>()
            / terminal_values.len() as f64
    } else {
        0.0
    };

    MetricAggregate {
        metric: name.to_string(),
        mean,
        percentiles: trajectories,
        terminal: TerminalStats {
            mean: terminal_mean,
            std_dev: variance.sqrt(),
            min: terminal_values.first().copied().unwrap_or(0.0),
            max: terminal_values.last().copied().unwrap_or(0.0),
            percentiles: levels
                .iter()
                .map(|&level| (level, percentile(&terminal_values, level / 100.0)))
                .collect(),
        },
    }
}
