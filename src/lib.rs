//! Agent-based market simulation core for token-vesting analytics.
//!
//! Holder agents make monthly sell/stake/hold decisions against a vesting
//! schedule; their aggregate actions feed a pricing model that feeds back
//! into future decisions. An async job queue executes simulation requests
//! with bounded concurrency, streams progress and caches results by
//! request fingerprint; a Monte-Carlo engine replicates a base simulation
//! across seeded trials and aggregates percentile trajectories.

pub mod agent;
pub mod cohort;
pub mod config;
pub mod economy;
pub mod error;
pub mod fingerprint;
pub mod jobs;
pub mod montecarlo;
pub mod output;
pub mod pricing;
pub mod progress;
pub mod scaler;
pub mod simulation;
pub mod staking;
pub mod treasury;
pub mod vesting;
