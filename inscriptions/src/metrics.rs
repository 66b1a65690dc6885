//! Business metrics for the inscriptions service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `aca_inscriptions_created_total{status}` - Inscriptions created (confirmed, waitlist)
//! - `aca_inscriptions_cancelled_total` - Successful cancellations
//! - `aca_inscription_cancel_failures_total{kind}` - Failed cancellations by error kind
//! - `aca_participant_counter_drift_total` - Cancels that deleted the row but kept the seat
//! - `aca_listing_cache_requests_total{result}` - Listing cache lookups (hit, miss, error)
//! - `aca_cache_invalidation_failures_total{step}` - Failed invalidation steps (tag, sweep)
//! - `aca_store_actions_total` - Actions reduced by client mirror stores

use metrics::describe_counter;

/// Describe every counter. Call once at startup, after the recorder is installed.
pub fn register_metrics() {
    // Inscriptions
    describe_counter!(
        "aca_inscriptions_created_total",
        "Inscriptions created, by resulting status"
    );
    describe_counter!(
        "aca_inscriptions_cancelled_total",
        "Inscriptions cancelled successfully"
    );
    describe_counter!(
        "aca_inscription_cancel_failures_total",
        "Cancellation attempts that failed, by error kind"
    );
    describe_counter!(
        "aca_participant_counter_drift_total",
        "Cancellations that deleted the inscription without releasing its seat"
    );

    // Listing cache
    describe_counter!(
        "aca_listing_cache_requests_total",
        "Listing cache lookups by result (hit, miss, error)"
    );
    describe_counter!(
        "aca_cache_invalidation_failures_total",
        "Best-effort cache invalidation steps that failed"
    );

    // Client runtime
    describe_counter!(
        "aca_store_actions_total",
        "Actions reduced by reducer stores"
    );

    tracing::info!("Business metrics registered");
}
