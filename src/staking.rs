use std::collections::VecDeque;

use crate::config::StakingConfig;

/// Tokens locked in the pool until a release month.
#[derive(Debug, Clone)]
struct Lockup {
    cohort: usize,
    amount: f64,
    release_month: u32,
}

/// Accepted stake-in for one month. Overflow beyond pool capacity is
/// handed back to the caller and stays liquid.
#[derive(Debug, Clone)]
pub struct StakeIntake {
    pub accepted: Vec<f64>,
    pub total_accepted: f64,
    pub overflow: f64,
}

/// Optional staking pool with lockups and utilization-dependent APY.
#[derive(Debug)]
pub struct StakingController {
    config: StakingConfig,
    total_staked: f64,
    cohort_staked: Vec<f64>,
    lockups: VecDeque<Lockup>,
    cumulative_rewards: f64,
}

impl StakingController {
    pub fn new(config: StakingConfig, cohort_count: usize) -> Self {
        StakingController {
            config,
            total_staked: 0.0,
            cohort_staked: vec![0.0; cohort_count],
            lockups: VecDeque::new(),
            cumulative_rewards: 0.0,
        }
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    pub fn total_staked(&self) -> f64 {
        self.total_staked
    }

    pub fn cohort_staked(&self) -> &[f64] {
        &self.cohort_staked
    }

    pub fn cumulative_rewards(&self) -> f64 {
        self.cumulative_rewards
    }

    pub fn capacity(&self, total_supply: f64) -> f64 {
        self.config.max_capacity * total_supply
    }

    pub fn remaining_capacity(&self, total_supply: f64) -> f64 {
        (self.capacity(total_supply) - self.total_staked).max(0.0)
    }

    pub fn is_full(&self, total_supply: f64) -> bool {
        // Pro-rata intake leaves floating-point dust; treat it as full.
        self.remaining_capacity(total_supply) <= self.capacity(total_supply) * 1e-9
    }

    /// staked / capacity, clamped to [0, 1].
    pub fn utilization(&self, total_supply: f64) -> f64 {
        let capacity = self.capacity(total_supply);
        if capacity <= 0.0 {
            return 1.0;
        }
        (self.total_staked / capacity).clamp(0.0, 1.0)
    }

    /// Annualized yield, linear in utilization between the empty-pool and
    /// full-pool multipliers of the base APY.
    pub fn current_apy(&self, total_supply: f64) -> f64 {
        let u = self.utilization(total_supply);
        let multiplier = self.config.empty_pool_multiplier
            + (self.config.full_pool_multiplier - self.config.empty_pool_multiplier) * u;
        self.config.base_apy * multiplier
    }

    /// Accept per-cohort stake requests, capped by remaining capacity.
    /// Requests beyond capacity are scaled down pro-rata; the cut portion
    /// is returned as overflow and converts back to held tokens.
    pub fn stake(&mut self, month: u32, requested: &[f64], total_supply: f64) -> StakeIntake {
        let total_requested: f64 = requested.iter().sum();
        let remaining = self.remaining_capacity(total_supply);

        let factor = if total_requested <= remaining || total_requested <= 0.0 {
            1.0
        } else {
            remaining / total_requested
        };

        let mut accepted = vec![0.0; requested.len()];
        let mut total_accepted = 0.0;
        for (i, &req) in requested.iter().enumerate() {
            let take = req * factor;
            if take <= 0.0 {
                continue;
            }
            accepted[i] = take;
            total_accepted += take;
            self.cohort_staked[i] += take;
            self.lockups.push_back(Lockup {
                cohort: i,
                amount: take,
                release_month: month + self.config.lockup_months,
            });
        }
        self.total_staked += total_accepted;

        StakeIntake {
            accepted,
            total_accepted,
            overflow: total_requested - total_accepted,
        }
    }

    /// Release every lockup due at or before `month`. Returns the released
    /// amount per cohort; released tokens go back to the cohort's liquid
    /// pool.
    pub fn release_due(&mut self, month: u32) -> Vec<f64> {
        let mut released = vec![0.0; self.cohort_staked.len()];
        // Lockups are pushed in month order, so due entries sit at the front.
        while let Some(front) = self.lockups.front() {
            if front.release_month > month {
                break;
            }
            let lockup = self.lockups.pop_front().unwrap();
            released[lockup.cohort] += lockup.amount;
            self.cohort_staked[lockup.cohort] -= lockup.amount;
            self.total_staked -= lockup.amount;
        }
        self.total_staked = self.total_staked.max(0.0);
        released
    }

    /// Reward owed for one month at the current APY.
    pub fn monthly_reward(&self, total_supply: f64) -> f64 {
        self.current_apy(total_supply) / 12.0 * self.total_staked
    }

    pub fn note_rewards_paid(&mut self, amount: f64) {
        self.cumulative_rewards += amount;
    }
}
