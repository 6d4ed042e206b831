use approx::assert_relative_eq;
use vesting_sim::vesting::VestingSchedule;

// ─── Test 1: 100% TGE, no vesting ───────────────────────────────────────

#[test]
fn test_full_tge_unlocks_everything_at_month_zero() {
    let schedule = VestingSchedule::new(1_000_000.0, 100.0, 0, 0).unwrap();

    assert_relative_eq!(schedule.unlock_amount(0), 1_000_000.0);
    for month in 1..48 {
        assert_eq!(schedule.unlock_amount(month), 0.0);
    }
    assert_relative_eq!(schedule.cumulative_unlocked(47), 1_000_000.0);
}

// ─── Test 2: zero cliff, partial TGE ────────────────────────────────────

#[test]
fn test_zero_cliff_partial_tge() {
    // 40% TGE over 12 months: month 0 carries TGE plus the first tick.
    let schedule = VestingSchedule::new(1200.0, 40.0, 0, 12).unwrap();

    assert_relative_eq!(
        schedule.unlock_amount(0),
        1200.0 * (0.4 + 0.6 / 12.0),
        epsilon = 1e-9
    );
    for month in 1..12 {
        assert_relative_eq!(schedule.unlock_amount(month), 60.0, epsilon = 1e-9);
    }
    assert_eq!(schedule.unlock_amount(12), 0.0);
    assert_eq!(schedule.unlock_amount(100), 0.0);
}

// ─── Test 3: cliff pushes the linear stream out ─────────────────────────

#[test]
fn test_cliff_schedule() {
    let schedule = VestingSchedule::new(1200.0, 10.0, 6, 12).unwrap();

    assert_relative_eq!(schedule.unlock_amount(0), 120.0);
    for month in 1..=6 {
        assert_eq!(schedule.unlock_amount(month), 0.0, "month {month}");
    }
    for month in 7..=18 {
        assert_relative_eq!(schedule.unlock_amount(month), 90.0, epsilon = 1e-9);
    }
    assert_eq!(schedule.unlock_amount(19), 0.0);
    assert_eq!(schedule.first_post_cliff_month(), 7);
    assert_eq!(schedule.final_unlock_month(), 18);
}

// ─── Test 4: unlocks always sum to the allocation exactly ───────────────

#[test]
fn test_unlocks_sum_to_allocation() {
    // Awkward tick sizes: 1/7 and 1/13 do not divide cleanly in binary.
    let cases = [
        (1_000_000_000.0, 0.0, 0, 7),
        (1_000_000_000.0, 15.0, 3, 13),
        (999_999_937.0, 33.3, 0, 11),
        (1.0, 0.0, 24, 36),
    ];

    for (allocation, tge, cliff, vesting) in cases {
        let schedule = VestingSchedule::new(allocation, tge, cliff, vesting).unwrap();
        let horizon = schedule.final_unlock_month();
        assert_relative_eq!(
            schedule.cumulative_unlocked(horizon),
            allocation,
            max_relative = 1e-12
        );
        // Nothing beyond the final month.
        assert_eq!(schedule.unlock_amount(horizon + 1), 0.0);
    }
}

// ─── Test 5: invalid parameters rejected at construction ────────────────

#[test]
fn test_invalid_parameters_rejected() {
    assert!(VestingSchedule::new(1000.0, 120.0, 0, 12).is_err());
    assert!(VestingSchedule::new(1000.0, -5.0, 0, 12).is_err());
    assert!(VestingSchedule::new(-1.0, 50.0, 0, 12).is_err());
    // vesting = 0 is only allowed with a full TGE unlock.
    assert!(VestingSchedule::new(1000.0, 99.0, 0, 0).is_err());
    assert!(VestingSchedule::new(1000.0, 100.0, 0, 0).is_ok());
}
