use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::economy::{EconomySnapshot, HISTORY_WINDOW};
use crate::vesting::VestingSchedule;

/// Splitmix64-style mix of a seed with two counters. Gives every
/// (simulation, month, agent) triple its own PRNG stream so that agent
/// evaluation order never affects the outcome.
pub fn derive_seed(global_seed: u64, a: u64, b: u64) -> u64 {
    let mut z = global_seed
        .wrapping_add(a.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(b.wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Behavioral parameters, sampled once at construction from the cohort's
/// distributions.
#[derive(Debug, Clone)]
pub struct BehaviorParams {
    /// In (0, 1). Widens the take-profit band and narrows the stop-loss band.
    pub risk_tolerance: f64,
    /// Preferred holding horizon in months, positive.
    pub hold_time_months: f64,
    /// Baseline fraction of holdings sold per month, in [0, 1].
    pub base_sell_pressure: f64,
    /// Probability weight of staking the unsold remainder, in [0, 1].
    pub staking_propensity: f64,
    /// Scales take-profit / stop-loss amplification, in [0, 1].
    pub price_sensitivity: f64,
    /// Sell-pressure multiplier on the first post-cliff month, >= 1.
    pub cliff_shock: f64,
}

/// What one agent did this month, in unweighted token amounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentAction {
    pub sold: f64,
    pub staked: f64,
    pub held: f64,
    pub unlocked: f64,
}

/// Weighted totals across agents for one month.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct AggregateActions {
    pub sold: f64,
    pub staked: f64,
    pub held: f64,
    pub unlocked: f64,
}

impl AggregateActions {
    pub fn add_weighted(&mut self, action: &AgentAction, weight: f64) {
        self.sold += action.sold * weight;
        self.staked += action.staked * weight;
        self.held += action.held * weight;
        self.unlocked += action.unlocked * weight;
    }
}

/// Staking conditions visible to agents during `decide`.
#[derive(Debug, Clone, Copy)]
pub struct StakingView {
    pub enabled: bool,
    pub pool_full: bool,
    /// current APY / base APY, used to scale staking propensity.
    pub apy_scale: f64,
}

impl StakingView {
    pub fn disabled() -> Self {
        StakingView {
            enabled: false,
            pool_full: true,
            apy_scale: 0.0,
        }
    }
}

/// One token holder. Weight > 1 means this agent stands in for that many
/// real holders; its action is multiplied by the weight on aggregation.
#[derive(Debug, Clone)]
pub struct HolderAgent {
    pub id: u64,
    /// Index into the simulation's cohort table.
    pub cohort: usize,
    pub schedule: VestingSchedule,
    pub weight: f64,
    pub behavior: BehaviorParams,
    /// Unlocked tokens not yet sold or staked.
    holdings: f64,
    nan_warned: bool,
}

impl HolderAgent {
    pub fn new(
        id: u64,
        cohort: usize,
        schedule: VestingSchedule,
        weight: f64,
        behavior: BehaviorParams,
    ) -> Self {
        HolderAgent {
            id,
            cohort,
            schedule,
            weight,
            behavior,
            holdings: 0.0,
            nan_warned: false,
        }
    }

    pub fn holdings(&self) -> f64 {
        self.holdings
    }

    /// Decide this month's action against an immutable economy snapshot.
    ///
    /// All randomness comes from a PRNG seeded from
    /// `(global_seed, month, agent_id)`, so re-running with the same seed
    /// yields identical actions regardless of evaluation order.
    /// Decisions cannot fail: a non-finite intermediate falls back to the
    /// baseline sell pressure with no shock amplification.
    pub fn decide(
        &mut self,
        snapshot: &EconomySnapshot,
        month: u32,
        staking: &StakingView,
        global_seed: u64,
    ) -> AgentAction {
        let unlocked = self.schedule.unlock_amount(month);
        self.holdings += unlocked;

        if self.holdings <= 0.0 {
            return AgentAction {
                unlocked,
                ..AgentAction::default()
            };
        }

        let mut rng = StdRng::seed_from_u64(derive_seed(global_seed, month as u64, self.id));

        let mut fraction = self.sell_fraction(snapshot, month, &mut rng);
        if !fraction.is_finite() {
            if !self.nan_warned {
                tracing::warn!(
                    agent = self.id,
                    month,
                    "non-finite sell fraction, falling back to baseline pressure"
                );
                self.nan_warned = true;
            }
            fraction = self.behavior.base_sell_pressure;
        }
        let fraction = fraction.clamp(0.0, 1.0);

        let sold = (self.holdings * fraction).min(self.holdings);
        let remainder = self.holdings - sold;

        let staked = if staking.enabled && !staking.pool_full && remainder > 0.0 {
            let p = self.behavior.staking_propensity * staking.apy_scale;
            let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
            if rng.gen_bool(p) {
                remainder
            } else {
                0.0
            }
        } else {
            0.0
        };

        let held = self.holdings - sold - staked;
        self.holdings = held;

        AgentAction {
            sold,
            staked,
            held,
            unlocked,
        }
    }

    fn sell_fraction(&self, snapshot: &EconomySnapshot, month: u32, rng: &mut StdRng) -> f64 {
        let b = &self.behavior;
        let mut fraction = b.base_sell_pressure;

        // Pent-up supply hits the market right after the cliff opens.
        if self.schedule.cliff_months() > 0 && month == self.schedule.first_post_cliff_month() {
            fraction *= b.cliff_shock;
        }

        let price = snapshot.price;
        let anchor = snapshot.mean_price(b.hold_time_months.round().max(1.0) as usize);

        // Take profit once price runs past the anchor by more than the
        // agent's tolerance band.
        if anchor > 0.0 && price > anchor * (1.0 + b.risk_tolerance) {
            let excess = price / anchor - 1.0 - b.risk_tolerance;
            fraction += b.price_sensitivity * excess;
        }

        // Stop loss once price falls from the last-K mean by more than
        // (1 - risk_tolerance).
        let recent_mean = snapshot.mean_price(HISTORY_WINDOW);
        if recent_mean > 0.0 {
            let drop = (recent_mean - price) / recent_mean;
            let threshold = 1.0 - b.risk_tolerance;
            if drop > threshold {
                fraction += b.price_sensitivity * (drop - threshold);
            }
        }

        // Behavioral jitter so identical parameter draws do not act in
        // lockstep.
        fraction * rng.gen_range(0.85..1.15)
    }
}
