// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the catalog compilers.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host service is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `catalog_compiler_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: filter, query, sortby, patch, merge_patch
//! - `status`: success, error
//! - `error`: the [`CompileError::kind`](crate::CompileError::kind) label

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a finished compilation
pub fn record_compilation(kind: &str, status: &str) {
    counter!(
        "catalog_compiler_compilations_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a rejected compilation by error kind
pub fn record_compile_error(kind: &str, error: &str) {
    record_compilation(kind, "error");
    counter!(
        "catalog_compiler_compile_errors_total",
        "kind" => kind.to_string(),
        "error" => error.to_string()
    )
    .increment(1);
}

/// Record compilation latency
pub fn record_latency(kind: &str, duration: Duration) {
    histogram!(
        "catalog_compiler_compile_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a queryables refresh attempt
pub fn record_queryables_refresh(success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "catalog_compiler_queryables_refresh_total",
        "status" => status
    )
    .increment(1);
    histogram!("catalog_compiler_queryables_refresh_seconds").record(duration.as_secs_f64());
}

/// Set number of fields in the live queryables snapshot
pub fn set_queryables_fields(count: usize) {
    gauge!("catalog_compiler_queryables_fields").set(count as f64);
}

/// Record fields rejected by queryables validation
pub fn record_validation_rejections(count: usize) {
    counter!("catalog_compiler_validation_rejections_total").increment(count as u64);
}

/// Record compiled script size after deduplication
pub fn record_script_instructions(emitted: usize, kept: usize) {
    histogram!("catalog_compiler_script_instructions").record(kept as f64);
    if emitted > kept {
        counter!("catalog_compiler_script_deduplicated_total").increment((emitted - kept) as u64);
    }
}

/// Set coordinator lifecycle state (as label)
pub fn set_compiler_state(state: &str) {
    gauge!(
        "catalog_compiler_state",
        "state" => state.to_string()
    )
    .set(1.0);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    kind: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.kind, self.start.elapsed());
    }
}

/// Convenience macro for timing a compilation
#[macro_export]
macro_rules! time_compilation {
    ($kind:expr) => {
        $crate::metrics::LatencyTimer::new($kind)
    };
}
