use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::agent::{AgentAction, AggregateActions, HolderAgent, StakingView};
use crate::cohort::Cohort;
use crate::config::{RewardSource, SimulationRequest};
use crate::economy::TokenEconomy;
use crate::error::EngineResult;
use crate::pricing::PricingModel;
use crate::progress::ProgressChannel;
use crate::scaler::{plan_cohort, ScalingPlan};
use crate::staking::StakingController;
use crate::treasury::{TreasuryController, TreasuryMonthOutcome};

/// Agents evaluated per rayon work unit.
pub const AGENT_BATCH: usize = 100;

// ═══════════════════════════════════════════════════════════════════════
// Run control — cancellation flag + progress publisher
// ═══════════════════════════════════════════════════════════════════════

/// Cooperative controls for one run: a cancellation flag polled at each
/// month boundary and an optional progress channel.
#[derive(Debug, Clone)]
pub struct RunControl {
    cancel: Arc<AtomicBool>,
    progress: Option<Arc<ProgressChannel>>,
}

impl RunControl {
    /// Control block with nothing attached, for direct library use.
    pub fn unmanaged() -> Self {
        RunControl {
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    pub fn new(cancel: Arc<AtomicBool>, progress: Arc<ProgressChannel>) -> Self {
        RunControl {
            cancel,
            progress: Some(progress),
        }
    }

    /// Shares a cancellation flag but publishes no progress. Used for
    /// Monte-Carlo trials, whose per-month progress is not surfaced.
    pub fn with_cancel(cancel: Arc<AtomicBool>) -> Self {
        RunControl {
            cancel,
            progress: None,
        }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn publish(&self, current: u32, total: u32) {
        if let Some(progress) = &self.progress {
            progress.publish(current, total);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Result types
// ═══════════════════════════════════════════════════════════════════════

/// Global metrics recorded at the end of each month.
#[derive(Debug, Clone, Serialize)]
pub struct MonthMetrics {
    pub month: u32,
    /// Committed price after this month's pricing step.
    pub price: f64,
    pub total_supply: f64,
    pub circulating_supply: f64,
    pub staked_supply: f64,
    pub burned_supply: f64,
    /// Allocation not yet unlocked (plus any never-allocated remainder).
    pub locked_supply: f64,
    pub tokens_unlocked: f64,
    pub tokens_sold: f64,
    /// Stake accepted by the pool this month.
    pub tokens_staked: f64,
    pub tokens_released: f64,
    pub staking_rewards: f64,
    pub staking_apy: f64,
    pub treasury_fees: f64,
    pub treasury_tokens_bought: f64,
    pub treasury_tokens_burned: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CohortTotals {
    pub label: String,
    pub sold: f64,
    pub staked: f64,
    pub held: f64,
    pub unlocked: f64,
}

/// Per-month action aggregates for one cohort, kept only when the request
/// asks for cohort details.
#[derive(Debug, Clone, Serialize)]
pub struct CohortSeries {
    pub label: String,
    pub months: Vec<AggregateActions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StakingSummary {
    pub total_staked: f64,
    pub cumulative_rewards: f64,
    pub final_apy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreasurySummary {
    pub fiat_balance: f64,
    pub token_balance: f64,
    pub fees_collected: f64,
    pub liquidity_deployed: f64,
    pub tokens_bought: f64,
    pub tokens_burned: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub final_price: f64,
    pub final_circulating: f64,
    pub cumulative_sold: f64,
    pub average_price: f64,
    pub months_simulated: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staking: Option<StakingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treasury: Option<TreasurySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    /// Seed the run actually used; recorded so unseeded requests stay
    /// reproducible.
    pub seed: u64,
    pub months: Vec<MonthMetrics>,
    pub cohort_totals: Vec<CohortTotals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort_series: Option<Vec<CohortSeries>>,
    pub summary: SimulationSummary,
}

/// A run either completes with a result or observes its cancellation flag
/// and stops cleanly at a month boundary, discarding partial state.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(SimulationResult),
    Cancelled,
}

// ═══════════════════════════════════════════════════════════════════════
// Simulation loop
// ═══════════════════════════════════════════════════════════════════════

/// One fully-initialized simulation: agents materialized, economy and
/// controllers constructed. Consumed by `run`.
pub struct Simulation {
    seed: u64,
    horizon: u32,
    store_cohort_details: bool,
    economy: TokenEconomy,
    pricing: PricingModel,
    staking: Option<StakingController>,
    treasury: Option<TreasuryController>,
    agents: Vec<HolderAgent>,
    cohorts: Vec<Cohort>,
    plans: Vec<ScalingPlan>,
    initial_supply: f64,
}

impl Simulation {
    /// Validate the request and materialize the full population.
    pub fn new(request: &SimulationRequest) -> EngineResult<Self> {
        request.validate()?;

        let seed = request.abm.seed.unwrap_or_else(|| OsRng.gen());
        let horizon = request.token.horizon_months;

        let cohorts = Cohort::from_request(request);
        let mut agents = Vec::new();
        let mut plans = Vec::with_capacity(cohorts.len());
        let mut next_id = 0u64;
        for (index, cohort) in cohorts.iter().enumerate() {
            let plan = plan_cohort(
                request.abm.total_holders,
                cohort.holder_fraction,
                request.abm.agents_per_cohort,
            );
            let mut batch = cohort.materialize(index, &plan, next_id, seed)?;
            next_id += batch.len() as u64;
            agents.append(&mut batch);
            plans.push(plan);
        }

        let pricing = PricingModel::from_config(&request.abm.pricing, request.abm.initial_price);
        let economy = TokenEconomy::new(
            request.abm.initial_price,
            request.token.total_supply as f64,
            pricing.min_price(),
        );
        let staking = request
            .abm
            .staking
            .clone()
            .map(|config| StakingController::new(config, cohorts.len()));
        let treasury = request
            .abm
            .treasury
            .clone()
            .map(TreasuryController::new);

        tracing::debug!(
            seed,
            horizon,
            agents = agents.len(),
            cohorts = cohorts.len(),
            "simulation initialized"
        );

        Ok(Simulation {
            seed,
            horizon,
            store_cohort_details: request.abm.store_cohort_details,
            economy,
            pricing,
            staking,
            treasury,
            agents,
            cohorts,
            plans,
            initial_supply: request.token.total_supply as f64,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn plans(&self) -> &[ScalingPlan] {
        &self.plans
    }

    /// Run the monthly loop: the TGE month (month 0) plus `horizon_months`
    /// further months. Iterating `0..=horizon` means a schedule with
    /// `cliff + vesting == horizon` reaches its final tick — its last
    /// unlock lands at month index `cliff + vesting` — so the whole
    /// allocation vests whenever the horizon covers the schedule.
    ///
    /// The per-month steps run in a fixed order: snapshot, agent decisions,
    /// aggregation, supply update, staking, treasury, pricing, commit,
    /// progress, cancellation check. Agent decisions may run in parallel;
    /// their PRNG streams are keyed by (seed, month, agent id) so the
    /// outcome is independent of scheduling.
    pub fn run(mut self, control: &RunControl) -> EngineResult<RunOutcome> {
        let horizon = self.horizon;
        let total_steps = horizon + 1;
        let cohort_count = self.cohorts.len();
        let mut months: Vec<MonthMetrics> = Vec::with_capacity(total_steps as usize);
        let mut cohort_totals = vec![AggregateActions::default(); cohort_count];
        let mut cohort_series: Vec<Vec<AggregateActions>> = if self.store_cohort_details {
            vec![Vec::with_capacity(total_steps as usize); cohort_count]
        } else {
            Vec::new()
        };
        let mut cumulative_unlocked = 0.0;
        let mut cumulative_sold = 0.0;

        for month in 0..=horizon {
            // (1) Immutable view for this month's decisions.
            let snapshot = self.economy.snapshot();

            let staking_view = match &self.staking {
                Some(staking) => {
                    let base = staking.config().base_apy;
                    StakingView {
                        enabled: true,
                        pool_full: staking.is_full(snapshot.total_supply),
                        apy_scale: if base > 0.0 {
                            staking.current_apy(snapshot.total_supply) / base
                        } else {
                            0.0
                        },
                    }
                }
                None => StakingView::disabled(),
            };

            // (2) Agent decisions, order-independent under the seed stream.
            let seed = self.seed;
            let actions: Vec<AgentAction> = self
                .agents
                .par_iter_mut()
                .with_min_len(AGENT_BATCH)
                .map(|agent| agent.decide(&snapshot, month, &staking_view, seed))
                .collect();

            // (3) Weighted aggregation, global and per cohort.
            let mut global = AggregateActions::default();
            let mut per_cohort = vec![AggregateActions::default(); cohort_count];
            for (agent, action) in self.agents.iter().zip(&actions) {
                global.add_weighted(action, agent.weight);
                per_cohort[agent.cohort].add_weighted(action, agent.weight);
            }

            // (4) Supply update: unlocks enter circulation, sales set the
            // month's transaction volume.
            self.economy.update_supply(global.unlocked, 0.0, 0.0)?;
            cumulative_unlocked += global.unlocked;
            self.economy.record_transaction(global.sold, snapshot.price);
            cumulative_sold += global.sold;

            // (5) Staking: stake-in capped by capacity, lockup releases,
            // reward payout.
            let mut tokens_released = 0.0;
            let mut staking_rewards = 0.0;
            let mut staking_apy = 0.0;
            if let Some(staking) = &mut self.staking {
                let requested: Vec<f64> = per_cohort.iter().map(|c| c.staked).collect();
                let intake = staking.stake(month, &requested, self.economy.total_supply());
                if intake.total_accepted > 0.0 {
                    self.economy
                        .update_supply(-intake.total_accepted, intake.total_accepted, 0.0)?;
                }
                // Overflow beyond capacity stays liquid as held tokens.
                for (i, accepted) in intake.accepted.iter().enumerate() {
                    let overflow = per_cohort[i].staked - accepted;
                    per_cohort[i].held += overflow;
                    per_cohort[i].staked = *accepted;
                }
                global.held += intake.overflow;
                global.staked = intake.total_accepted;

                let released = staking.release_due(month);
                tokens_released = released.iter().sum();
                if tokens_released > 0.0 {
                    self.economy
                        .update_supply(tokens_released, -tokens_released, 0.0)?;
                }

                staking_apy = staking.current_apy(self.economy.total_supply());
                let reward = staking.monthly_reward(self.economy.total_supply());
                if reward > 0.0 {
                    let paid = match staking.config().reward_source {
                        RewardSource::Emission => {
                            self.economy.mint_emission(reward);
                            reward
                        }
                        // Treasury-funded rewards come off the treasury's
                        // token book, which is already circulating; zero if
                        // the book cannot cover it.
                        RewardSource::Treasury => match &mut self.treasury {
                            Some(treasury) => treasury.pay_token_rewards(reward),
                            None => 0.0,
                        },
                    };
                    staking.note_rewards_paid(paid);
                    staking_rewards = paid;
                }
            }

            // (6) Treasury: fees, allocation, buyback and burn.
            let mut treasury_outcome = TreasuryMonthOutcome::default();
            if let Some(treasury) = &mut self.treasury {
                treasury_outcome = treasury.process_month(global.sold, snapshot.price);
                if treasury_outcome.tokens_burned > 0.0 {
                    self.economy.update_supply(
                        -treasury_outcome.tokens_burned,
                        0.0,
                        treasury_outcome.tokens_burned,
                    )?;
                }
            }

            // (7) Pricing on the post-update state.
            let post_update = self.economy.snapshot();
            let new_price = self.pricing.next_price(&post_update, &global);

            // (8) Commit the month.
            self.economy.commit_month(new_price);

            for (i, aggregate) in per_cohort.iter().enumerate() {
                cohort_totals[i].sold += aggregate.sold;
                cohort_totals[i].staked += aggregate.staked;
                cohort_totals[i].held += aggregate.held;
                cohort_totals[i].unlocked += aggregate.unlocked;
            }
            if self.store_cohort_details {
                for (i, aggregate) in per_cohort.iter().enumerate() {
                    cohort_series[i].push(*aggregate);
                }
            }

            months.push(MonthMetrics {
                month,
                price: self.economy.price(),
                total_supply: self.economy.total_supply(),
                circulating_supply: self.economy.circulating_supply(),
                staked_supply: self.economy.staked_supply(),
                burned_supply: self.economy.burned_supply(),
                locked_supply: (self.initial_supply - cumulative_unlocked).max(0.0),
                tokens_unlocked: global.unlocked,
                tokens_sold: global.sold,
                tokens_staked: global.staked,
                tokens_released,
                staking_rewards,
                staking_apy,
                treasury_fees: treasury_outcome.fees_collected,
                treasury_tokens_bought: treasury_outcome.tokens_bought,
                treasury_tokens_burned: treasury_outcome.tokens_burned,
            });

            // (9) Progress, then (10) the cancellation poll. Stopping here
            // keeps every per-month invariant intact; partial results are
            // discarded by the caller.
            control.publish(month + 1, total_steps);
            if control.is_cancelled() {
                tracing::info!(month, "simulation cancelled at month boundary");
                return Ok(RunOutcome::Cancelled);
            }
        }

        let average_price = if months.is_empty() {
            self.economy.price()
        } else {
            months.iter().map(|m| m.price).sum::<f64>() / months.len() as f64
        };

        let summary = SimulationSummary {
            final_price: self.economy.price(),
            final_circulating: self.economy.circulating_supply(),
            cumulative_sold,
            average_price,
            months_simulated: months.len() as u32,
            staking: self.staking.as_ref().map(|s| StakingSummary {
                total_staked: s.total_staked(),
                cumulative_rewards: s.cumulative_rewards(),
                final_apy: s.current_apy(self.economy.total_supply()),
            }),
            treasury: self.treasury.as_ref().map(|t| TreasurySummary {
                fiat_balance: t.fiat_balance(),
                token_balance: t.token_balance(),
                fees_collected: t.fees_collected(),
                liquidity_deployed: t.liquidity_deployed(),
                tokens_bought: t.tokens_bought(),
                tokens_burned: t.tokens_burned(),
            }),
        };

        let cohort_totals = self
            .cohorts
            .iter()
            .zip(cohort_totals)
            .map(|(cohort, totals)| CohortTotals {
                label: cohort.label.clone(),
                sold: totals.sold,
                staked: totals.staked,
                held: totals.held,
                unlocked: totals.unlocked,
            })
            .collect();

        let cohort_series = if self.store_cohort_details {
            Some(
                self.cohorts
                    .iter()
                    .zip(cohort_series)
                    .map(|(cohort, series)| CohortSeries {
                        label: cohort.label.clone(),
                        months: series,
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok(RunOutcome::Completed(SimulationResult {
            seed: self.seed,
            months,
            cohort_totals,
            cohort_series,
            summary,
        }))
    }
}

/// Convenience wrapper: build and run in one call without external
/// controls.
pub fn run_simulation(request: &SimulationRequest) -> EngineResult<SimulationResult> {
    let simulation = Simulation::new(request)?;
    match simulation.run(&RunControl::unmanaged())? {
        RunOutcome::Completed(result) => Ok(result),
        RunOutcome::Cancelled => unreachable!("unmanaged control is never cancelled"),
    }
}
