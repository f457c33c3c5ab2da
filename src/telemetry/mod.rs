// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry: structured logging, operation spans, and metrics.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    init_metrics, record_load_latency, record_registration, record_storage_read,
    record_storage_write, record_swap, record_swap_failure,
};
pub use spans::{OperationSpan, SpanExt};
