use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution, Gamma, Normal};

use crate::agent::{derive_seed, BehaviorParams, HolderAgent};
use crate::config::{BehaviorConfig, DistributionSpec, SimulationRequest, VestingBucket};
use crate::error::EngineResult;
use crate::scaler::ScalingPlan;
use crate::vesting::VestingSchedule;

/// A labeled holder group derived from one vesting bucket, carrying the
/// behavioral distributions its agents are sampled from.
#[derive(Debug, Clone)]
pub struct Cohort {
    pub label: String,
    /// Share of total holders belonging to this cohort.
    pub holder_fraction: f64,
    /// Tokens allocated to this cohort's bucket.
    pub allocation_tokens: f64,
    pub bucket: VestingBucket,
    pub behavior: BehaviorConfig,
}

impl Cohort {
    /// Build the cohort table from the request: one cohort per bucket,
    /// matched to a behavioral profile by label. Holder fractions default
    /// to each bucket's share of the allocated supply and are normalized
    /// to sum to 1.
    pub fn from_request(request: &SimulationRequest) -> Vec<Cohort> {
        let total_supply = request.token.total_supply as f64;
        let allocated: f64 = request
            .buckets
            .iter()
            .map(|b| b.allocation_percent)
            .sum::<f64>()
            .max(f64::MIN_POSITIVE);

        let mut cohorts: Vec<Cohort> = request
            .buckets
            .iter()
            .map(|bucket| {
                let label = bucket.cohort_label().to_string();
                let profile = request.abm.cohorts.iter().find(|c| c.label == label);
                let holder_fraction = profile
                    .and_then(|c| c.holder_fraction)
                    .unwrap_or(bucket.allocation_percent / allocated);
                Cohort {
                    label,
                    holder_fraction,
                    allocation_tokens: total_supply * bucket.allocation_percent / 100.0,
                    bucket: bucket.clone(),
                    behavior: profile
                        .map(|c| c.behavior.clone())
                        .unwrap_or_default(),
                }
            })
            .collect();

        let fraction_sum: f64 = cohorts.iter().map(|c| c.holder_fraction).sum();
        if fraction_sum > 0.0 {
            for cohort in &mut cohorts {
                cohort.holder_fraction /= fraction_sum;
            }
        }
        cohorts
    }

    /// Sample this cohort's agent population under the scaling plan.
    ///
    /// Behaviors are drawn once, at construction. The weighted allocations
    /// of the produced agents sum to the cohort's allocation, so scaling
    /// never changes the tokens a cohort brings to market.
    pub fn materialize(
        &self,
        cohort_index: usize,
        plan: &ScalingPlan,
        first_agent_id: u64,
        global_seed: u64,
    ) -> EngineResult<Vec<HolderAgent>> {
        let mut rng = StdRng::seed_from_u64(derive_seed(
            global_seed,
            0x434F_484F,
            cohort_index as u64,
        ));

        let count = plan.agent_count.max(1);
        let per_agent_allocation = self.allocation_tokens / (count as f64 * plan.weight);

        let mut agents = Vec::with_capacity(count);
        for i in 0..count {
            let schedule = VestingSchedule::new(
                per_agent_allocation,
                self.bucket.tge_percent,
                self.bucket.cliff_months,
                self.bucket.vesting_months,
            )?;
            let behavior = sample_behavior(&self.behavior, &mut rng);
            agents.push(HolderAgent::new(
                first_agent_id + i as u64,
                cohort_index,
                schedule,
                plan.weight,
                behavior,
            ));
        }
        Ok(agents)
    }
}

/// Draw one value from a distribution spec. Parameters were validated with
/// the request, so construction cannot fail here.
fn sample_spec(spec: &DistributionSpec, rng: &mut StdRng) -> f64 {
    match spec {
        DistributionSpec::Fixed { value } => *value,
        DistributionSpec::Beta { alpha, beta } => Beta::new(*alpha, *beta).unwrap().sample(rng),
        DistributionSpec::Gamma { shape, scale } => {
            Gamma::new(*shape, *scale).unwrap().sample(rng)
        }
        DistributionSpec::Normal { mean, std_dev } => {
            Normal::new(*mean, *std_dev).unwrap().sample(rng)
        }
    }
}

/// Sample a full behavior tuple, clamping every draw into its attribute's
/// domain.
fn sample_behavior(config: &BehaviorConfig, rng: &mut StdRng) -> BehaviorParams {
    BehaviorParams {
        risk_tolerance: sample_spec(&config.risk_tolerance, rng).clamp(0.01, 0.99),
        hold_time_months: sample_spec(&config.hold_time_months, rng).clamp(0.5, 120.0),
        base_sell_pressure: sample_spec(&config.base_sell_pressure, rng).clamp(0.0, 1.0),
        staking_propensity: sample_spec(&config.staking_propensity, rng).clamp(0.0, 1.0),
        price_sensitivity: sample_spec(&config.price_sensitivity, rng).clamp(0.0, 1.0),
        cliff_shock: sample_spec(&config.cliff_shock, rng).max(1.0),
    }
}
