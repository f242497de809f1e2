//! Prometheus metrics for the Calendar engine's per-tick and per-cycle
//! work. Mirrors the install-once-then-fetch pattern: [`install`] must run
//! before any metric is recorded, which is intentional — a missing call
//! is a startup bug, not something to paper over with a lazy default.

use once_cell::sync::OnceCell;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};

static CALENDAR_TICK_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static CALENDAR_BUFFER_DEPTH: OnceCell<IntGauge> = OnceCell::new();
static ANCHOR_CYCLE_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static AUDIT_PASS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static AUDIT_FAIL_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static LOCK_ACQUIRE_WAIT_SECONDS: OnceCell<Histogram> = OnceCell::new();

macro_rules! get_metric {
    ($metric:ident) => {
        $metric
        .get()
        .expect("telemetry metrics not initialized; call telemetry::metrics::install() first")
    };
}

/// Registers every metric this crate exposes with the default Prometheus
/// registry. Must be called exactly once, early in process startup.
pub fn install() -> Result<(), prometheus::Error> {
    CALENDAR_TICK_DURATION_SECONDS
    .set(register_histogram!(
            "chronicle_calendar_tick_duration_seconds",
            "Wall-clock time to build and append one calendar tick's block."
        )?)
    .ok();
    CALENDAR_BUFFER_DEPTH
    .set(register_int_gauge!(
            "chronicle_calendar_buffer_depth",
            "Number of aggregator submissions waiting at the start of the current tick."
        )?)
    .ok();
    ANCHOR_CYCLE_DURATION_SECONDS
    .set(register_histogram!(
            "chronicle_anchor_cycle_duration_seconds",
            "Wall-clock time to complete one anchor cycle, including the quiet no-op case."
        )?)
    .ok();
    AUDIT_PASS_TOTAL
    .set(register_int_counter!(
            "chronicle_audit_pass_total",
            "Count of Node audit rounds that passed every predicate."
        )?)
    .ok();
    AUDIT_FAIL_TOTAL
    .set(register_int_counter!(
            "chronicle_audit_fail_total",
            "Count of Node audit rounds that failed at least one predicate."
        )?)
    .ok();
    LOCK_ACQUIRE_WAIT_SECONDS
    .set(register_histogram!(
            "chronicle_lock_acquire_wait_seconds",
            "Time spent retrying before a distributed lock was acquired."
        )?)
    .ok();
    Ok(())
}

/// Records the duration of one Calendar tick.
pub fn observe_calendar_tick(duration_secs: f64) {
    get_metric!(CALENDAR_TICK_DURATION_SECONDS).observe(duration_secs);
}

/// Records the buffer depth observed at tick entry.
pub fn set_calendar_buffer_depth(depth: i64) {
    get_metric!(CALENDAR_BUFFER_DEPTH).set(depth);
}

/// Records the duration of one anchor cycle.
pub fn observe_anchor_cycle(duration_secs: f64) {
    get_metric!(ANCHOR_CYCLE_DURATION_SECONDS).observe(duration_secs);
}

/// Increments the audit pass counter.
pub fn inc_audit_pass() {
    get_metric!(AUDIT_PASS_TOTAL).inc();
}

/// Increments the audit fail counter.
pub fn inc_audit_fail() {
    get_metric!(AUDIT_FAIL_TOTAL).inc();
}

/// Records the time spent waiting to acquire a distributed lock.
pub fn observe_lock_acquire_wait(duration_secs: f64) {
    get_metric!(LOCK_ACQUIRE_WAIT_SECONDS).observe(duration_secs);
}
