use approx::assert_relative_eq;
use vesting_sim::agent::{BehaviorParams, HolderAgent, StakingView};
use vesting_sim::economy::TokenEconomy;
use vesting_sim::vesting::VestingSchedule;

fn behavior(base_sell_pressure: f64) -> BehaviorParams {
    BehaviorParams {
        risk_tolerance: 0.5,
        hold_time_months: 6.0,
        base_sell_pressure,
        staking_propensity: 0.0,
        price_sensitivity: 0.0,
        cliff_shock: 1.0,
    }
}

fn full_tge_agent(id: u64, allocation: f64, base_sell: f64) -> HolderAgent {
    let schedule = VestingSchedule::new(allocation, 100.0, 0, 0).unwrap();
    HolderAgent::new(id, 0, schedule, 1.0, behavior(base_sell))
}

// ─── Test 1: identical seeds give identical actions ─────────────────────

#[test]
fn test_decision_determinism_under_seed() {
    let economy = TokenEconomy::new(1.0, 1_000_000.0, 0.0);
    let snapshot = economy.snapshot();
    let staking = StakingView::disabled();

    let mut a = full_tge_agent(7, 1200.0, 0.3);
    let mut b = full_tge_agent(7, 1200.0, 0.3);

    let action_a = a.decide(&snapshot, 0, &staking, 42);
    let action_b = b.decide(&snapshot, 0, &staking, 42);
    assert_relative_eq!(action_a.sold, action_b.sold);
    assert_relative_eq!(action_a.held, action_b.held);

    // A different global seed shifts the jitter draw.
    let mut c = full_tge_agent(7, 1200.0, 0.3);
    let action_c = c.decide(&snapshot, 0, &staking, 43);
    assert!((action_a.sold - action_c.sold).abs() > 1e-9);
}

// ─── Test 2: sold never exceeds holdings, holdings carry over ───────────

#[test]
fn test_holdings_accounting() {
    let economy = TokenEconomy::new(1.0, 1_000_000.0, 0.0);
    let snapshot = economy.snapshot();
    let staking = StakingView::disabled();

    let mut agent = full_tge_agent(1, 1200.0, 0.5);
    let action = agent.decide(&snapshot, 0, &staking, 42);

    assert_relative_eq!(action.unlocked, 1200.0);
    assert!(action.sold <= 1200.0);
    assert!(action.sold > 0.0);
    assert_relative_eq!(action.sold + action.staked + action.held, 1200.0);
    assert_relative_eq!(agent.holdings(), action.held);

    // Next month: nothing unlocks, the held remainder is re-disposed.
    let carried = action.held;
    let action = agent.decide(&snapshot, 1, &staking, 42);
    assert_relative_eq!(action.unlocked, 0.0);
    assert!(action.sold <= carried);
    assert_relative_eq!(action.sold + action.held, carried, epsilon = 1e-9);
}

// ─── Test 3: cliff shock amplifies the first post-cliff month ───────────

#[test]
fn test_cliff_shock_amplification() {
    let economy = TokenEconomy::new(1.0, 1_000_000.0, 0.0);
    let snapshot = economy.snapshot();
    let staking = StakingView::disabled();

    let schedule = VestingSchedule::new(1200.0, 0.0, 6, 12).unwrap();
    let mut params = behavior(0.1);
    params.cliff_shock = 2.0;
    let mut agent = HolderAgent::new(1, 0, schedule, 1.0, params);

    // Month 7 is the first post-cliff unlock: 90 tokens, shocked pressure
    // 0.2 before jitter.
    let action = agent.decide(&snapshot, 7, &staking, 42);
    let fraction = action.sold / 90.0;
    assert!(fraction >= 0.2 * 0.85 && fraction <= 0.2 * 1.15, "fraction {fraction}");
}

// ─── Test 4: non-finite intermediates fall back to baseline ─────────────

#[test]
fn test_nan_fallback_to_baseline() {
    let mut economy = TokenEconomy::new(1.0, 1_000_000.0, 0.0);
    economy.commit_month(1.0);
    let mut snapshot = economy.snapshot();
    // Degenerate price blows up the take-profit term.
    snapshot.price = f64::INFINITY;

    let mut params = behavior(0.1);
    params.price_sensitivity = 1.0;
    let schedule = VestingSchedule::new(1200.0, 100.0, 0, 0).unwrap();
    let mut agent = HolderAgent::new(1, 0, schedule, 1.0, params);

    let action = agent.decide(&snapshot, 0, &staking_disabled(), 42);
    // Fallback sells exactly the baseline fraction, no shock, no jitter.
    assert_relative_eq!(action.sold, 1200.0 * 0.1, epsilon = 1e-9);
}

fn staking_disabled() -> StakingView {
    StakingView::disabled()
}

// ─── Test 5: staking draw moves the remainder into the pool ─────────────

#[test]
fn test_staking_allocation() {
    let economy = TokenEconomy::new(1.0, 1_000_000.0, 0.0);
    let snapshot = economy.snapshot();
    let staking = StakingView {
        enabled: true,
        pool_full: false,
        apy_scale: 1.0,
    };

    let schedule = VestingSchedule::new(1200.0, 100.0, 0, 0).unwrap();
    let mut params = behavior(0.25);
    params.staking_propensity = 1.0;
    let mut agent = HolderAgent::new(1, 0, schedule, 1.0, params);

    let action = agent.decide(&snapshot, 0, &staking, 42);
    assert!(action.staked > 0.0);
    assert_relative_eq!(action.staked, 1200.0 - action.sold, epsilon = 1e-9);
    assert_relative_eq!(action.held, 0.0, epsilon = 1e-9);

    // A full pool suppresses staking regardless of propensity.
    let mut agent = HolderAgent::new(
        2,
        0,
        VestingSchedule::new(1200.0, 100.0, 0, 0).unwrap(),
        1.0,
        {
            let mut p = behavior(0.25);
            p.staking_propensity = 1.0;
            p
        },
    );
    let full = StakingView {
        enabled: true,
        pool_full: true,
        apy_scale: 0.5,
    };
    let action = agent.decide(&snapshot, 0, &full, 42);
    assert_relative_eq!(action.staked, 0.0);
}
