use std::collections::VecDeque;

use crate::error::{EngineError, EngineResult};

/// Number of months of price / circulating-supply history kept.
pub const HISTORY_WINDOW: usize = 12;

/// Mutable token-economy state for one simulation run.
///
/// Supply buckets track circulating, staked and burned tokens; the balance
/// of the initial supply that has not unlocked yet lives implicitly in the
/// agents' vesting schedules. Burn permanently removes tokens from
/// `total_supply`; emission rewards add to it.
#[derive(Debug)]
pub struct TokenEconomy {
    current_price: f64,
    price_floor: f64,
    total_supply: f64,
    circulating_supply: f64,
    staked_supply: f64,
    burned_supply: f64,
    /// Tokens sold this month, reset on commit.
    month_volume: f64,
    price_history: VecDeque<f64>,
    circulating_history: VecDeque<f64>,
}

/// Immutable view of the economy handed to agents and pricing models.
#[derive(Debug, Clone)]
pub struct EconomySnapshot {
    pub price: f64,
    pub price_floor: f64,
    pub total_supply: f64,
    pub circulating_supply: f64,
    pub staked_supply: f64,
    pub burned_supply: f64,
    pub month_volume: f64,
    pub price_history: Vec<f64>,
    pub circulating_history: Vec<f64>,
}

impl EconomySnapshot {
    /// Mean of the last `window` recorded prices, falling back to the
    /// current price when no history exists yet.
    pub fn mean_price(&self, window: usize) -> f64 {
        let n = self.price_history.len().min(window);
        if n == 0 {
            return self.price;
        }
        let start = self.price_history.len() - n;
        self.price_history[start..].iter().sum::<f64>() / n as f64
    }
}

impl TokenEconomy {
    pub fn new(initial_price: f64, total_supply: f64, price_floor: f64) -> Self {
        TokenEconomy {
            current_price: initial_price.max(price_floor),
            price_floor,
            total_supply,
            circulating_supply: 0.0,
            staked_supply: 0.0,
            burned_supply: 0.0,
            month_volume: 0.0,
            price_history: VecDeque::with_capacity(HISTORY_WINDOW),
            circulating_history: VecDeque::with_capacity(HISTORY_WINDOW),
        }
    }

    pub fn price(&self) -> f64 {
        self.current_price
    }

    pub fn total_supply(&self) -> f64 {
        self.total_supply
    }

    pub fn circulating_supply(&self) -> f64 {
        self.circulating_supply
    }

    pub fn staked_supply(&self) -> f64 {
        self.staked_supply
    }

    pub fn burned_supply(&self) -> f64 {
        self.burned_supply
    }

    pub fn month_volume(&self) -> f64 {
        self.month_volume
    }

    /// Add a sale to this month's transaction volume.
    pub fn record_transaction(&mut self, tokens_sold: f64, _price: f64) {
        self.month_volume += tokens_sold;
    }

    /// Atomically adjust the supply buckets. A delta that would drive any
    /// balance negative is rejected and leaves the state untouched.
    pub fn update_supply(
        &mut self,
        delta_circulating: f64,
        delta_staked: f64,
        delta_burned: f64,
    ) -> EngineResult<()> {
        let circulating = self.circulating_supply + delta_circulating;
        let staked = self.staked_supply + delta_staked;
        let burned = self.burned_supply + delta_burned;
        // Burned tokens leave total supply for good.
        let total = self.total_supply - delta_burned;

        // Tolerate floating-point dust just below zero.
        const EPS: f64 = 1e-6;
        if circulating < -EPS || staked < -EPS || burned < -EPS || total < -EPS {
            return Err(EngineError::simulation(format!(
                "supply update would go negative: circulating={circulating:.4} \
                 staked={staked:.4} burned={burned:.4} total={total:.4}"
            )));
        }

        self.circulating_supply = circulating.max(0.0);
        self.staked_supply = staked.max(0.0);
        self.burned_supply = burned.max(0.0);
        self.total_supply = total.max(0.0);
        Ok(())
    }

    /// Emission rewards mint new liquid tokens.
    pub fn mint_emission(&mut self, amount: f64) {
        self.total_supply += amount;
        self.circulating_supply += amount;
    }

    /// Close the month: archive price and circulating supply, set the new
    /// price and reset the per-month volume.
    pub fn commit_month(&mut self, new_price: f64) {
        if self.price_history.len() == HISTORY_WINDOW {
            self.price_history.pop_front();
        }
        self.price_history.push_back(self.current_price);

        if self.circulating_history.len() == HISTORY_WINDOW {
            self.circulating_history.pop_front();
        }
        self.circulating_history.push_back(self.circulating_supply);

        self.current_price = new_price.max(self.price_floor);
        self.month_volume = 0.0;
    }

    pub fn snapshot(&self) -> EconomySnapshot {
        EconomySnapshot {
            price: self.current_price,
            price_floor: self.price_floor,
            total_supply: self.total_supply,
            circulating_supply: self.circulating_supply,
            staked_supply: self.staked_supply,
            burned_supply: self.burned_supply,
            month_volume: self.month_volume,
            price_history: self.price_history.iter().copied().collect(),
            circulating_history: self.circulating_history.iter().copied().collect(),
        }
    }
}
