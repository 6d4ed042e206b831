use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub const MAX_HORIZON_MONTHS: u32 = 240;
pub const MAX_BUCKETS: usize = 1000;
pub const MAX_TRIALS: u32 = 1000;

// ═══════════════════════════════════════════════════════════════════════
// Request payload
// ═══════════════════════════════════════════════════════════════════════

/// One simulation request. This is the canonical payload hashed for the
/// result cache, so every recognized option is enumerated here and unknown
/// keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationRequest {
    pub token: TokenConfig,
    pub buckets: Vec<VestingBucket>,
    pub abm: AbmConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<MonteCarloConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Total token supply at TGE, in whole tokens.
    pub total_supply: u64,
    pub start_date: NaiveDate,
    pub horizon_months: u32,
}

/// A configured allocation slice. One bucket maps to one cohort; the
/// cohort label defaults to the bucket name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VestingBucket {
    pub name: String,
    /// Share of total supply, in percent. Bucket shares may sum to < 100;
    /// the remainder never enters circulation.
    pub allocation_percent: f64,
    pub tge_percent: f64,
    #[serde(default)]
    pub cliff_months: u32,
    pub vesting_months: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<String>,
}

impl VestingBucket {
    pub fn cohort_label(&self) -> &str {
        self.cohort.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbmConfig {
    /// Number of real holders represented by the simulation.
    #[serde(default = "default_total_holders")]
    pub total_holders: u64,
    /// Explicit agents per cohort. Absent means adaptive scaling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents_per_cohort: Option<u32>,
    pub pricing: PricingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staking: Option<StakingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treasury: Option<TreasuryConfig>,
    /// Behavioral profiles, matched to buckets by cohort label. Buckets
    /// without a matching profile use the default behavior.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cohorts: Vec<CohortConfig>,
    pub initial_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub store_cohort_details: bool,
}

fn default_total_holders() -> u64 {
    1000
}

// ═══════════════════════════════════════════════════════════════════════
// Pricing
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PricingConfig {
    Constant,
    Eoe {
        #[serde(default = "default_smoothing_alpha")]
        smoothing_alpha: f64,
        #[serde(default = "default_holding_time")]
        holding_time_months: f64,
        #[serde(default = "default_min_price")]
        min_price: f64,
    },
    BondingCurve {
        k: f64,
        exponent: f64,
    },
    IssuanceCurve {
        base_price: f64,
        max_supply: f64,
        alpha: f64,
    },
}

fn default_smoothing_alpha() -> f64 {
    0.5
}

fn default_holding_time() -> f64 {
    6.0
}

fn default_min_price() -> f64 {
    0.001
}

// ═══════════════════════════════════════════════════════════════════════
// Staking / treasury
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardSource {
    Emission,
    Treasury,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StakingConfig {
    /// Annualized base yield.
    #[serde(default = "default_base_apy")]
    pub base_apy: f64,
    /// Pool capacity as a fraction of total supply.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: f64,
    #[serde(default = "default_lockup_months")]
    pub lockup_months: u32,
    /// APY multiplier at utilization 0.
    #[serde(default = "default_empty_multiplier")]
    pub empty_pool_multiplier: f64,
    /// APY multiplier at utilization 1.
    #[serde(default = "default_full_multiplier")]
    pub full_pool_multiplier: f64,
    #[serde(default = "default_reward_source")]
    pub reward_source: RewardSource,
}

impl Default for StakingConfig {
    fn default() -> Self {
        StakingConfig {
            base_apy: default_base_apy(),
            max_capacity: default_max_capacity(),
            lockup_months: default_lockup_months(),
            empty_pool_multiplier: default_empty_multiplier(),
            full_pool_multiplier: default_full_multiplier(),
            reward_source: default_reward_source(),
        }
    }
}

fn default_base_apy() -> f64 {
    0.12
}

fn default_max_capacity() -> f64 {
    0.5
}

fn default_lockup_months() -> u32 {
    3
}

fn default_empty_multiplier() -> f64 {
    1.5
}

fn default_full_multiplier() -> f64 {
    0.5
}

fn default_reward_source() -> RewardSource {
    RewardSource::Emission
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreasuryConfig {
    /// Fraction of every sale collected as a fee.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    #[serde(default)]
    pub allocation: TreasuryAllocation,
    #[serde(default = "default_burn_bought")]
    pub burn_bought: bool,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        TreasuryConfig {
            fee_rate: default_fee_rate(),
            allocation: TreasuryAllocation::default(),
            burn_bought: default_burn_bought(),
        }
    }
}

fn default_fee_rate() -> f64 {
    0.02
}

fn default_burn_bought() -> bool {
    true
}

/// How collected fees are split. Fractions must sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreasuryAllocation {
    pub hold: f64,
    pub liquidity: f64,
    pub buyback: f64,
}

impl Default for TreasuryAllocation {
    fn default() -> Self {
        TreasuryAllocation {
            hold: 0.5,
            liquidity: 0.3,
            buyback: 0.2,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Cohort behavior
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CohortConfig {
    pub label: String,
    /// Share of total holders. Defaults to the cohort's share of the
    /// allocated supply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_fraction: Option<f64>,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

/// Distribution over one behavioral attribute. Samples are clamped into
/// the attribute's domain after drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case")]
pub enum DistributionSpec {
    Fixed { value: f64 },
    Beta { alpha: f64, beta: f64 },
    Gamma { shape: f64, scale: f64 },
    Normal { mean: f64, std_dev: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviorConfig {
    #[serde(default = "default_risk_tolerance")]
    pub risk_tolerance: DistributionSpec,
    #[serde(default = "default_hold_time")]
    pub hold_time_months: DistributionSpec,
    #[serde(default = "default_sell_pressure")]
    pub base_sell_pressure: DistributionSpec,
    #[serde(default = "default_staking_propensity")]
    pub staking_propensity: DistributionSpec,
    #[serde(default = "default_price_sensitivity")]
    pub price_sensitivity: DistributionSpec,
    #[serde(default = "default_cliff_shock")]
    pub cliff_shock: DistributionSpec,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        BehaviorConfig {
            risk_tolerance: default_risk_tolerance(),
            hold_time_months: default_hold_time(),
            base_sell_pressure: default_sell_pressure(),
            staking_propensity: default_staking_propensity(),
            price_sensitivity: default_price_sensitivity(),
            cliff_shock: default_cliff_shock(),
        }
    }
}

fn default_risk_tolerance() -> DistributionSpec {
    DistributionSpec::Beta {
        alpha: 2.0,
        beta: 2.0,
    }
}

fn default_hold_time() -> DistributionSpec {
    DistributionSpec::Gamma {
        shape: 2.0,
        scale: 3.0,
    }
}

fn default_sell_pressure() -> DistributionSpec {
    DistributionSpec::Beta {
        alpha: 2.0,
        beta: 6.0,
    }
}

fn default_staking_propensity() -> DistributionSpec {
    DistributionSpec::Beta {
        alpha: 2.0,
        beta: 5.0,
    }
}

fn default_price_sensitivity() -> DistributionSpec {
    DistributionSpec::Beta {
        alpha: 2.0,
        beta: 2.0,
    }
}

fn default_cliff_shock() -> DistributionSpec {
    DistributionSpec::Normal {
        mean: 1.5,
        std_dev: 0.25,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Monte Carlo
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonteCarloConfig {
    pub num_trials: u32,
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_confidence_levels() -> Vec<f64> {
    vec![10.0, 50.0, 90.0]
}

impl MonteCarloConfig {
    /// Block with the default confidence levels and no master seed.
    pub fn with_trials(num_trials: u32) -> Self {
        MonteCarloConfig {
            num_trials,
            confidence_levels: default_confidence_levels(),
            seed: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════════════════

impl SimulationRequest {
    /// Semantic validation of the whole request. Schema-level problems
    /// (unknown keys, wrong types) are already rejected during
    /// deserialization.
    pub fn validate(&self) -> EngineResult<()> {
        if self.token.total_supply < 1 {
            return Err(EngineError::validation("total_supply must be at least 1"));
        }
        if self.token.horizon_months < 1 || self.token.horizon_months > MAX_HORIZON_MONTHS {
            return Err(EngineError::validation(format!(
                "horizon_months must be in [1, {MAX_HORIZON_MONTHS}], got {}",
                self.token.horizon_months
            )));
        }

        if self.buckets.is_empty() {
            return Err(EngineError::validation("at least one vesting bucket required"));
        }
        if self.buckets.len() > MAX_BUCKETS {
            return Err(EngineError::validation(format!(
                "at most {MAX_BUCKETS} vesting buckets allowed, got {}",
                self.buckets.len()
            )));
        }
        let mut allocation_sum = 0.0;
        for bucket in &self.buckets {
            if bucket.name.is_empty() {
                return Err(EngineError::validation("bucket name must not be empty"));
            }
            if bucket.allocation_percent <= 0.0 || bucket.allocation_percent > 100.0 {
                return Err(EngineError::validation(format!(
                    "bucket '{}': allocation_percent must be in (0, 100]",
                    bucket.name
                )));
            }
            if !(0.0..=100.0).contains(&bucket.tge_percent) {
                return Err(EngineError::validation(format!(
                    "bucket '{}': tge_percent must be in [0, 100]",
                    bucket.name
                )));
            }
            if bucket.vesting_months == 0 && bucket.tge_percent < 100.0 {
                return Err(EngineError::validation(format!(
                    "bucket '{}': vesting_months = 0 requires tge_percent = 100",
                    bucket.name
                )));
            }
            allocation_sum += bucket.allocation_percent;
        }
        if allocation_sum > 100.0 + 1e-9 {
            return Err(EngineError::validation(format!(
                "bucket allocations sum to {allocation_sum:.4}%, exceeding 100%"
            )));
        }

        self.validate_abm()?;

        if let Some(mc) = &self.monte_carlo {
            if mc.num_trials < 1 || mc.num_trials > MAX_TRIALS {
                return Err(EngineError::validation(format!(
                    "num_trials must be in [1, {MAX_TRIALS}], got {}",
                    mc.num_trials
                )));
            }
            for level in &mc.confidence_levels {
                if !(*level > 0.0 && *level < 100.0) {
                    return Err(EngineError::validation(format!(
                        "confidence levels must be strictly inside (0, 100), got {level}"
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_abm(&self) -> EngineResult<()> {
        let abm = &self.abm;

        if abm.total_holders < 1 {
            return Err(EngineError::validation("total_holders must be at least 1"));
        }
        if let Some(n) = abm.agents_per_cohort {
            if n < 1 {
                return Err(EngineError::validation("agents_per_cohort must be at least 1"));
            }
        }
        if !(abm.initial_price.is_finite() && abm.initial_price > 0.0) {
            return Err(EngineError::validation("initial_price must be positive"));
        }

        match &abm.pricing {
            PricingConfig::Constant => {}
            PricingConfig::Eoe {
                smoothing_alpha,
                holding_time_months,
                min_price,
            } => {
                if !(0.0..=1.0).contains(smoothing_alpha) {
                    return Err(EngineError::validation("EOE smoothing_alpha must be in [0, 1]"));
                }
                if *holding_time_months <= 0.0 {
                    return Err(EngineError::validation(
                        "EOE holding_time_months must be positive",
                    ));
                }
                if *min_price <= 0.0 {
                    return Err(EngineError::validation("EOE min_price must be positive"));
                }
            }
            PricingConfig::BondingCurve { k, exponent } => {
                if *k <= 0.0 || !exponent.is_finite() {
                    return Err(EngineError::validation(
                        "bonding curve requires k > 0 and a finite exponent",
                    ));
                }
            }
            PricingConfig::IssuanceCurve {
                base_price,
                max_supply,
                alpha,
            } => {
                if *base_price <= 0.0 || *max_supply <= 0.0 || !alpha.is_finite() {
                    return Err(EngineError::validation(
                        "issuance curve requires base_price > 0, max_supply > 0 and finite alpha",
                    ));
                }
            }
        }

        if let Some(staking) = &abm.staking {
            if staking.base_apy < 0.0 {
                return Err(EngineError::validation("staking base_apy must be non-negative"));
            }
            if !(staking.max_capacity > 0.0 && staking.max_capacity <= 1.0) {
                return Err(EngineError::validation("staking max_capacity must be in (0, 1]"));
            }
            if staking.lockup_months < 1 {
                return Err(EngineError::validation("staking lockup_months must be at least 1"));
            }
            if staking.empty_pool_multiplier < 0.0 || staking.full_pool_multiplier < 0.0 {
                return Err(EngineError::validation(
                    "staking pool multipliers must be non-negative",
                ));
            }
        }

        if let Some(treasury) = &abm.treasury {
            if !(0.0..=1.0).contains(&treasury.fee_rate) {
                return Err(EngineError::validation("treasury fee_rate must be in [0, 1]"));
            }
            let a = &treasury.allocation;
            if a.hold < 0.0 || a.liquidity < 0.0 || a.buyback < 0.0 {
                return Err(EngineError::validation(
                    "treasury allocation fractions must be non-negative",
                ));
            }
            let sum = a.hold + a.liquidity + a.buyback;
            if (sum - 1.0).abs() > 1e-6 {
                return Err(EngineError::validation(format!(
                    "treasury allocation fractions must sum to 1, got {sum:.6}"
                )));
            }
        }

        for cohort in &abm.cohorts {
            if cohort.label.is_empty() {
                return Err(EngineError::validation("cohort label must not be empty"));
            }
            if let Some(f) = cohort.holder_fraction {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(EngineError::validation(format!(
                        "cohort '{}': holder_fraction must be in (0, 1]",
                        cohort.label
                    )));
                }
            }
            cohort.behavior.validate(&cohort.label)?;
        }

        Ok(())
    }
}

impl BehaviorConfig {
    fn validate(&self, label: &str) -> EngineResult<()> {
        for (name, spec) in [
            ("risk_tolerance", &self.risk_tolerance),
            ("hold_time_months", &self.hold_time_months),
            ("base_sell_pressure", &self.base_sell_pressure),
            ("staking_propensity", &self.staking_propensity),
            ("price_sensitivity", &self.price_sensitivity),
            ("cliff_shock", &self.cliff_shock),
        ] {
            spec.validate().map_err(|msg| {
                EngineError::validation(format!("cohort '{label}', attribute {name}: {msg}"))
            })?;
        }
        Ok(())
    }
}

impl DistributionSpec {
    fn validate(&self) -> Result<(), String> {
        match self {
            DistributionSpec::Fixed { value } => {
                if !value.is_finite() {
                    return Err("fixed value must be finite".into());
                }
            }
            DistributionSpec::Beta { alpha, beta } => {
                if !(*alpha > 0.0 && *beta > 0.0) {
                    return Err("beta parameters must be positive".into());
                }
            }
            DistributionSpec::Gamma { shape, scale } => {
                if !(*shape > 0.0 && *scale > 0.0) {
                    return Err("gamma parameters must be positive".into());
                }
            }
            DistributionSpec::Normal { mean, std_dev } => {
                if !mean.is_finite() || *std_dev < 0.0 {
                    return Err("normal requires finite mean and std_dev >= 0".into());
                }
            }
        }
        Ok(())
    }
}
