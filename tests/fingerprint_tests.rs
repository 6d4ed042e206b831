use vesting_sim::config::SimulationRequest;
use vesting_sim::fingerprint::{canonical_string, fingerprint};

const BASE: &str = r#"{
  "token": {"total_supply": 1000000, "start_date": "2026-01-01", "horizon_months": 12},
  "buckets": [{"name": "community", "allocation_percent": 100.0, "tge_percent": 0.0, "vesting_months": 12}],
  "abm": {"pricing": {"model": "constant"}, "initial_price": 1.0, "seed": 42}
}"#;

fn parse(text: &str) -> SimulationRequest {
    serde_json::from_str(text).unwrap()
}

// ─── Test 1: identical requests collide ─────────────────────────────────

#[test]
fn test_identical_requests_share_fingerprint() {
    let a = parse(BASE);
    let b = parse(BASE);
    assert_eq!(
        fingerprint(&a, "single").unwrap(),
        fingerprint(&b, "single").unwrap()
    );
}

// ─── Test 2: key order does not matter ──────────────────────────────────

#[test]
fn test_key_order_is_canonical() {
    let reordered = r#"{
      "abm": {"seed": 42, "initial_price": 1.0, "pricing": {"model": "constant"}},
      "buckets": [{"vesting_months": 12, "tge_percent": 0.0, "allocation_percent": 100.0, "name": "community"}],
      "token": {"horizon_months": 12, "start_date": "2026-01-01", "total_supply": 1000000}
    }"#;
    assert_eq!(
        canonical_string(&parse(BASE)).unwrap(),
        canonical_string(&parse(reordered)).unwrap()
    );
}

// ─── Test 3: explicit null and absent optionals are identical ───────────

#[test]
fn test_null_and_absent_optionals_collide() {
    let with_null = BASE.replace(
        "\"initial_price\": 1.0, \"seed\": 42",
        "\"initial_price\": 1.0, \"seed\": 42, \"staking\": null",
    );
    assert_eq!(
        fingerprint(&parse(BASE), "single").unwrap(),
        fingerprint(&parse(&with_null), "single").unwrap()
    );
}

// ─── Test 4: behaviorally significant changes separate ──────────────────

#[test]
fn test_seed_and_payload_changes_separate() {
    let base = parse(BASE);

    let mut reseeded = base.clone();
    reseeded.abm.seed = Some(43);
    assert_ne!(
        fingerprint(&base, "single").unwrap(),
        fingerprint(&reseeded, "single").unwrap()
    );

    let mut longer = base.clone();
    longer.token.horizon_months = 13;
    assert_ne!(
        fingerprint(&base, "single").unwrap(),
        fingerprint(&longer, "single").unwrap()
    );
}

// ─── Test 5: the job-kind tag splits the cache space ────────────────────

#[test]
fn test_kind_tag_separates_cache_slots() {
    let request = parse(BASE);
    assert_ne!(
        fingerprint(&request, "single").unwrap(),
        fingerprint(&request, "monte_carlo").unwrap()
    );
}
