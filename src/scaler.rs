/// Below this holder count every holder gets its own agent.
pub const FULL_INDIVIDUAL_LIMIT: u64 = 1_000;
/// Above this holder count cohorts collapse to meta-agents.
pub const REPRESENTATIVE_LIMIT: u64 = 10_000;
/// Meta-agents per cohort in the large regime.
pub const META_AGENT_COUNT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingStrategy {
    FullIndividual,
    Representative,
    MetaAgents,
}

/// How many unique behavioral draws a cohort gets, and the weight each
/// carries into the global aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingPlan {
    pub strategy: ScalingStrategy,
    pub agent_count: usize,
    pub weight: f64,
}

/// Pick the agent count and per-agent weight for one cohort.
///
/// Weighting preserves aggregate sell/stake/hold totals: the plan only
/// changes how many unique draws contribute to them. An explicit
/// agents-per-cohort override wins in every regime; a non-empty cohort
/// always gets at least one agent, and weights never drop below 1.
pub fn plan_cohort(
    total_holders: u64,
    holder_fraction: f64,
    explicit_agents: Option<u32>,
) -> ScalingPlan {
    let cohort_holders = (total_holders as f64 * holder_fraction).round().max(1.0);

    let strategy = if total_holders < FULL_INDIVIDUAL_LIMIT {
        ScalingStrategy::FullIndividual
    } else if total_holders <= REPRESENTATIVE_LIMIT {
        ScalingStrategy::Representative
    } else {
        ScalingStrategy::MetaAgents
    };

    let agent_count = match explicit_agents {
        Some(n) => (n as usize).max(1),
        None => match strategy {
            ScalingStrategy::FullIndividual => cohort_holders as usize,
            ScalingStrategy::Representative => {
                let sampled = (FULL_INDIVIDUAL_LIMIT as f64 * holder_fraction).round() as usize;
                sampled.min(cohort_holders as usize).max(1)
            }
            ScalingStrategy::MetaAgents => META_AGENT_COUNT.min(cohort_holders as usize).max(1),
        },
    };

    let weight = (cohort_holders / agent_count as f64).max(1.0);

    ScalingPlan {
        strategy,
        agent_count,
        weight,
    }
}
