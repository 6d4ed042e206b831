use std::path::Path;

use crate::error::EngineResult;
use crate::montecarlo::MonteCarloResult;
use crate::simulation::{CohortSeries, MonthMetrics, SimulationResult};

/// Save the per-month global series to CSV.
pub fn save_months_csv(months: &[MonthMetrics], path: &Path) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "month",
        "price",
        "total_supply",
        "circulating_supply",
        "staked_supply",
        "burned_supply",
        "locked_supply",
        "tokens_unlocked",
        "tokens_sold",
        "tokens_staked",
        "tokens_released",
        "staking_rewards",
        "staking_apy",
        "treasury_fees",
        "treasury_tokens_bought",
        "treasury_tokens_burned",
    ])?;

    for m in months {
        wtr.write_record(&[
            m.month.to_string(),
            format!("{:.6}", m.price),
            format!("{:.2}", m.total_supply),
            format!("{:.2}", m.circulating_supply),
            format!("{:.2}", m.staked_supply),
            format!("{:.2}", m.burned_supply),
            format!("{:.2}", m.locked_supply),
            format!("{:.2}", m.tokens_unlocked),
            format!("{:.2}", m.tokens_sold),
            format!("{:.2}", m.tokens_staked),
            format!("{:.2}", m.tokens_released),
            format!("{:.2}", m.staking_rewards),
            format!("{:.6}", m.staking_apy),
            format!("{:.2}", m.treasury_fees),
            format!("{:.2}", m.treasury_tokens_bought),
            format!("{:.2}", m.treasury_tokens_burned),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save per-cohort monthly aggregates to CSV (long format).
pub fn save_cohorts_csv(series: &[CohortSeries], path: &Path) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["cohort", "month", "sold", "staked", "held", "unlocked"])?;

    for cohort in series {
        for (month, aggregate) in cohort.months.iter().enumerate() {
            wtr.write_record(&[
                cohort.label.clone(),
                month.to_string(),
                format!("{:.2}", aggregate.sold),
                format!("{:.2}", aggregate.staked),
                format!("{:.2}", aggregate.held),
                format!("{:.2}", aggregate.unlocked),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Save Monte-Carlo mean and percentile trajectories to CSV. The column
/// set depends on the requested confidence levels, so the header is built
/// dynamically.
pub fn save_trajectories_csv(result: &MonteCarloResult, path: &Path) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["metric".to_string(), "month".to_string(), "mean".to_string()];
    for level in &result.confidence_levels {
        header.push(format!("p{level}"));
    }
    wtr.write_record(&header)?;

    for metric in &result.metrics {
        for month in 0..metric.mean.len() {
            let mut row = vec![
                metric.metric.clone(),
                month.to_string(),
                format!("{:.6}", metric.mean[month]),
            ];
            for trajectory in &metric.percentiles {
                row.push(format!("{:.6}", trajectory.values[month]));
            }
            wtr.write_record(&row)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Save any serializable artifact as pretty JSON.
pub fn save_json<T: serde::Serialize>(value: &T, path: &Path) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Save all artifacts of a single run to a directory.
pub fn save_run(result: &SimulationResult, output_dir: &Path) -> EngineResult<()> {
    std::fs::create_dir_all(output_dir)?;
    save_months_csv(&result.months, &output_dir.join("timeseries.csv"))?;
    if let Some(series) = &result.cohort_series {
        save_cohorts_csv(series, &output_dir.join("cohorts.csv"))?;
    }
    save_json(&result.summary, &output_dir.join("summary.json"))?;
    Ok(())
}

/// Save all artifacts of a Monte-Carlo run to a directory.
pub fn save_monte_carlo(result: &MonteCarloResult, output_dir: &Path) -> EngineResult<()> {
    std::fs::create_dir_all(output_dir)?;
    save_trajectories_csv(result, &output_dir.join("trajectories.csv"))?;
    save_json(result, &output_dir.join("monte_carlo.json"))?;
    Ok(())
}
