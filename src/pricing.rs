use crate::agent::AggregateActions;
use crate::config::PricingConfig;
use crate::economy::EconomySnapshot;

/// Pricing model variants. One instance lives per simulation; the EOE
/// smoothing state is carried inside the variant and discarded with it.
#[derive(Debug, Clone)]
pub enum PricingModel {
    /// Price never moves.
    Constant { price: f64 },
    /// Equation-of-exchange: price = demand / (supply × velocity), smoothed.
    Eoe {
        smoothing_alpha: f64,
        velocity: f64,
        min_price: f64,
        smoothed: f64,
    },
    /// price = k × circulating^n
    BondingCurve { k: f64, exponent: f64 },
    /// price = p0 × (1 + circulating / s_max)^alpha
    IssuanceCurve {
        base_price: f64,
        max_supply: f64,
        alpha: f64,
    },
}

impl PricingModel {
    pub fn from_config(config: &PricingConfig, initial_price: f64) -> Self {
        match config {
            PricingConfig::Constant => PricingModel::Constant {
                price: initial_price,
            },
            PricingConfig::Eoe {
                smoothing_alpha,
                holding_time_months,
                min_price,
            } => PricingModel::Eoe {
                smoothing_alpha: *smoothing_alpha,
                velocity: 12.0 / holding_time_months,
                min_price: *min_price,
                smoothed: initial_price,
            },
            PricingConfig::BondingCurve { k, exponent } => PricingModel::BondingCurve {
                k: *k,
                exponent: *exponent,
            },
            PricingConfig::IssuanceCurve {
                base_price,
                max_supply,
                alpha,
            } => PricingModel::IssuanceCurve {
                base_price: *base_price,
                max_supply: *max_supply,
                alpha: *alpha,
            },
        }
    }

    /// Price floor enforced by this model, used to clamp the committed price.
    pub fn min_price(&self) -> f64 {
        match self {
            PricingModel::Eoe { min_price, .. } => *min_price,
            _ => 0.0,
        }
    }

    /// Compute next month's price from the post-update economy state and
    /// the month's aggregated actions.
    pub fn next_price(
        &mut self,
        snapshot: &EconomySnapshot,
        _aggregate: &AggregateActions,
    ) -> f64 {
        match self {
            PricingModel::Constant { price } => *price,

            PricingModel::Eoe {
                smoothing_alpha,
                velocity,
                min_price,
                smoothed,
            } => {
                // Demand in fiat terms: this month's traded tokens valued
                // at the current price.
                let demand = snapshot.month_volume * snapshot.price;
                let supply = snapshot.circulating_supply;

                let raw = if supply > 0.0 && *velocity > 0.0 {
                    demand / (supply * *velocity)
                } else {
                    *smoothed
                };

                let next = if raw.is_finite() {
                    (1.0 - *smoothing_alpha) * *smoothed + *smoothing_alpha * raw
                } else {
                    *smoothed
                };

                *smoothed = next.max(*min_price);
                *smoothed
            }

            PricingModel::BondingCurve { k, exponent } => {
                let supply = snapshot.circulating_supply.max(0.0);
                *k * supply.powf(*exponent)
            }

            PricingModel::IssuanceCurve {
                base_price,
                max_supply,
                alpha,
            } => {
                let ratio = if *max_supply > 0.0 {
                    snapshot.circulating_supply / *max_supply
                } else {
                    0.0
                };
                *base_price * (1.0 + ratio).powf(*alpha)
            }
        }
    }
}
