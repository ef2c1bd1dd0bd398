// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics for tree operations, grounded on the teacher
//! workspace's raw-store metrics module. Registration is infallible at the
//! type level: a duplicate-registration panic during startup is the correct
//! failure mode for a misconfigured registry.

use once_cell::sync::OnceCell;
use prometheus::{HistogramVec, IntCounterVec, Registry, register_histogram_vec_with_registry, register_int_counter_vec_with_registry};

const LATENCY_SEC_BUCKETS: &[f64] = &[
    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0,
];

pub struct SmtMetrics {
    pub operation_latency_seconds: HistogramVec,
    pub nodes_written: IntCounterVec,
    pub proof_verifications: IntCounterVec,
}

impl SmtMetrics {
    fn new(registry: &Registry) -> Self {
        Self {
            operation_latency_seconds: register_histogram_vec_with_registry!(
                "smt_operation_latency_seconds",
                "Latency of get/update/delete/batch_update calls",
                &["operation"],
                LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            nodes_written: register_int_counter_vec_with_registry!(
                "smt_nodes_written_total",
                "Number of node blobs emitted by write operations",
                &["operation"],
                registry,
            )
            .unwrap(),
            proof_verifications: register_int_counter_vec_with_registry!(
                "smt_proof_verifications_total",
                "Proof verification outcomes",
                &["kind", "outcome"],
                registry,
            )
            .unwrap(),
        }
    }
}

static METRICS: OnceCell<SmtMetrics> = OnceCell::new();

/// Registers the tree's metrics against `registry`. Subsequent calls reuse
/// the already-initialized instance and ignore the registry argument.
pub fn init(registry: &Registry) -> &'static SmtMetrics {
    METRICS.get_or_init(|| SmtMetrics::new(registry))
}

/// Returns the process-wide metrics instance, initializing it against the
/// default global registry if `init` was never called.
pub fn get() -> &'static SmtMetrics {
    METRICS.get_or_init(|| SmtMetrics::new(prometheus::default_registry()))
}
