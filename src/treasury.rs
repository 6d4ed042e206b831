use crate::config::TreasuryConfig;

/// What the treasury did with one month's fees.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreasuryMonthOutcome {
    pub fees_collected: f64,
    pub tokens_bought: f64,
    pub tokens_burned: f64,
}

/// Optional fee-collecting treasury with buyback-and-burn.
///
/// Tokens bought back but not burned stay on the treasury's book and
/// remain part of circulating supply; only burn removes tokens from the
/// total.
#[derive(Debug)]
pub struct TreasuryController {
    config: TreasuryConfig,
    fiat_balance: f64,
    token_balance: f64,
    fees_collected: f64,
    liquidity_deployed: f64,
    tokens_bought: f64,
    tokens_burned: f64,
}

impl TreasuryController {
    pub fn new(config: TreasuryConfig) -> Self {
        TreasuryController {
            config,
            fiat_balance: 0.0,
            token_balance: 0.0,
            fees_collected: 0.0,
            liquidity_deployed: 0.0,
            tokens_bought: 0.0,
            tokens_burned: 0.0,
        }
    }

    pub fn config(&self) -> &TreasuryConfig {
        &self.config
    }

    pub fn fiat_balance(&self) -> f64 {
        self.fiat_balance
    }

    pub fn token_balance(&self) -> f64 {
        self.token_balance
    }

    pub fn fees_collected(&self) -> f64 {
        self.fees_collected
    }

    pub fn liquidity_deployed(&self) -> f64 {
        self.liquidity_deployed
    }

    pub fn tokens_bought(&self) -> f64 {
        self.tokens_bought
    }

    pub fn tokens_burned(&self) -> f64 {
        self.tokens_burned
    }

    /// Collect fees on the month's aggregated sales and run the
    /// hold / liquidity / buyback split. The returned burn amount has to
    /// be applied to the economy's supply by the caller.
    pub fn process_month(&mut self, sold_tokens: f64, price: f64) -> TreasuryMonthOutcome {
        if sold_tokens <= 0.0 || price <= 0.0 {
            return TreasuryMonthOutcome::default();
        }

        let fees = sold_tokens * price * self.config.fee_rate;
        self.fiat_balance += fees;
        self.fees_collected += fees;

        let liquidity = fees * self.config.allocation.liquidity;
        self.fiat_balance -= liquidity;
        self.liquidity_deployed += liquidity;

        let buyback_budget = fees * self.config.allocation.buyback;
        let bought = buyback_budget / price;
        self.fiat_balance -= buyback_budget;
        self.tokens_bought += bought;

        let burned = if self.config.burn_bought {
            self.tokens_burned += bought;
            bought
        } else {
            self.token_balance += bought;
            0.0
        };

        TreasuryMonthOutcome {
            fees_collected: fees,
            tokens_bought: bought,
            tokens_burned: burned,
        }
    }

    /// Pay staking rewards out of the treasury's token balance. Pays what
    /// it can; an empty book silently pays zero.
    pub fn pay_token_rewards(&mut self, amount: f64) -> f64 {
        let paid = amount.min(self.token_balance).max(0.0);
        self.token_balance -= paid;
        paid
    }
}
