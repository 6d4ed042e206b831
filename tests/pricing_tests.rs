use approx::assert_relative_eq;
use vesting_sim::agent::AggregateActions;
use vesting_sim::config::PricingConfig;
use vesting_sim::economy::EconomySnapshot;
use vesting_sim::pricing::PricingModel;

fn snapshot(price: f64, circulating: f64, volume: f64) -> EconomySnapshot {
    EconomySnapshot {
        price,
        price_floor: 0.0,
        total_supply: circulating,
        circulating_supply: circulating,
        staked_supply: 0.0,
        burned_supply: 0.0,
        month_volume: volume,
        price_history: Vec::new(),
        circulating_history: Vec::new(),
    }
}

// ─── Test 1: constant model never moves ─────────────────────────────────

#[test]
fn test_constant_price() {
    let mut model = PricingModel::from_config(&PricingConfig::Constant, 1.0);
    let aggregate = AggregateActions::default();

    for volume in [0.0, 1_000.0, 1_000_000.0] {
        let next = model.next_price(&snapshot(1.0, 500_000.0, volume), &aggregate);
        assert_relative_eq!(next, 1.0);
    }
}

// ─── Test 2: EOE smoothing ──────────────────────────────────────────────

#[test]
fn test_eoe_smoothing() {
    let config = PricingConfig::Eoe {
        smoothing_alpha: 0.5,
        holding_time_months: 6.0, // velocity = 2
        min_price: 0.001,
    };
    let mut model = PricingModel::from_config(&config, 2.0);
    let aggregate = AggregateActions::default();

    // demand = 500 * 2.0 = 1000; raw = 1000 / (1000 * 2) = 0.5
    // next = 0.5 * 2.0 + 0.5 * 0.5 = 1.25
    let next = model.next_price(&snapshot(2.0, 1_000.0, 500.0), &aggregate);
    assert_relative_eq!(next, 1.25, epsilon = 1e-12);

    // Zero volume halves the smoothed price each step.
    let next = model.next_price(&snapshot(next, 1_000.0, 0.0), &aggregate);
    assert_relative_eq!(next, 0.625, epsilon = 1e-12);
}

// ─── Test 3: EOE price floor ────────────────────────────────────────────

#[test]
fn test_eoe_min_price_floor() {
    let config = PricingConfig::Eoe {
        smoothing_alpha: 0.7,
        holding_time_months: 6.0,
        min_price: 0.001,
    };
    let mut model = PricingModel::from_config(&config, 1.0);
    let aggregate = AggregateActions::default();

    // Dead market: price decays but never drops through the floor.
    let mut price = 1.0;
    for _ in 0..60 {
        price = model.next_price(&snapshot(price, 1_000_000.0, 0.0), &aggregate);
        assert!(price >= 0.001);
    }
    assert_relative_eq!(price, 0.001);
    assert_relative_eq!(model.min_price(), 0.001);
}

// ─── Test 4: bonding curve ──────────────────────────────────────────────

#[test]
fn test_bonding_curve() {
    let config = PricingConfig::BondingCurve {
        k: 0.001,
        exponent: 0.5,
    };
    let mut model = PricingModel::from_config(&config, 1.0);
    let aggregate = AggregateActions::default();

    // 0.001 * sqrt(1_000_000) = 1.0
    let next = model.next_price(&snapshot(1.0, 1_000_000.0, 0.0), &aggregate);
    assert_relative_eq!(next, 1.0, epsilon = 1e-12);

    let next = model.next_price(&snapshot(1.0, 4_000_000.0, 0.0), &aggregate);
    assert_relative_eq!(next, 2.0, epsilon = 1e-12);
}

// ─── Test 5: issuance curve ─────────────────────────────────────────────

#[test]
fn test_issuance_curve() {
    let config = PricingConfig::IssuanceCurve {
        base_price: 1.0,
        max_supply: 1_000_000.0,
        alpha: 2.0,
    };
    let mut model = PricingModel::from_config(&config, 1.0);
    let aggregate = AggregateActions::default();

    // (1 + S/S_max)^2 at full supply = 4
    let next = model.next_price(&snapshot(1.0, 1_000_000.0, 0.0), &aggregate);
    assert_relative_eq!(next, 4.0, epsilon = 1e-12);

    let next = model.next_price(&snapshot(1.0, 0.0, 0.0), &aggregate);
    assert_relative_eq!(next, 1.0, epsilon = 1e-12);
}
