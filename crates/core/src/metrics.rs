//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Cycles (count, duration, lock contention)
//! - Steps (runs by result, processor duration)
//! - Discovery (listing failures)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Cycle Metrics
// =============================================================================

/// Cycles total by result.
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("flowline_cycles_total", "Total processing cycles"),
        &["result"], // "completed", "skipped", "failed"
    )
    .unwrap()
});

/// Cycle duration in seconds.
pub static CYCLE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "flowline_cycle_duration_seconds",
            "Duration of completed processing cycles",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        &[],
    )
    .unwrap()
});

/// Stale execution locks reaped.
pub static STALE_LOCKS_REAPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "flowline_stale_locks_reaped_total",
        "Total stale execution locks removed",
    )
    .unwrap()
});

// =============================================================================
// Step Metrics
// =============================================================================

/// Runs handled by steps, by result.
pub static STEP_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("flowline_step_runs_total", "Total runs handled by steps"),
        &["recipe", "step", "result"], // "processed", "skipped", "failed"
    )
    .unwrap()
});

/// Processor duration per run in seconds.
pub static STEP_RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "flowline_step_run_duration_seconds",
            "Duration of one run through one step",
        )
        .buckets(vec![
            1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 14400.0,
        ]),
        &["recipe", "step"],
    )
    .unwrap()
});

// =============================================================================
// Discovery Metrics
// =============================================================================

/// Discovery listing failures.
pub static DISCOVERY_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "flowline_discovery_errors_total",
            "Total discovery listing failures",
        ),
        &["recipe", "provider"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Cycles
        Box::new(CYCLES_TOTAL.clone()),
        Box::new(CYCLE_DURATION.clone()),
        Box::new(STALE_LOCKS_REAPED.clone()),
        // Steps
        Box::new(STEP_RUNS.clone()),
        Box::new(STEP_RUN_DURATION.clone()),
        // Discovery
        Box::new(DISCOVERY_ERRORS.clone()),
    ]
}
