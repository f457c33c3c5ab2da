// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metrics recorded through the `metrics` facade.
//!
//! Without an installed recorder these calls are no-ops; embedding
//! applications install whichever exporter they use.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!("vesta_registrations_total", "Model versions registered");
    describe_counter!("vesta_swaps_total", Unit::Count, "Completed swaps by outcome");
    describe_counter!("vesta_swap_failures_total", Unit::Count, "Failed swaps");
    describe_counter!("vesta_storage_bytes_read_total", Unit::Bytes, "Bytes read from storage");
    describe_counter!("vesta_storage_bytes_written_total", Unit::Bytes, "Bytes written to storage");
    describe_histogram!("vesta_swap_load_seconds", Unit::Seconds, "Read and deserialize latency");
}

pub fn record_registration(name: &str) {
    counter!("vesta_registrations_total", "model" => name.to_string()).increment(1);
}

pub fn record_swap(name: &str, outcome: &'static str) {
    counter!("vesta_swaps_total", "model" => name.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_swap_failure(name: &str) {
    counter!("vesta_swap_failures_total", "model" => name.to_string()).increment(1);
}

pub fn record_storage_read(backend: &'static str, bytes: usize) {
    counter!("vesta_storage_bytes_read_total", "backend" => backend).increment(bytes as u64);
}

pub fn record_storage_write(backend: &'static str, bytes: usize) {
    counter!("vesta_storage_bytes_written_total", "backend" => backend).increment(bytes as u64);
}

pub fn record_load_latency(name: &str, seconds: f64) {
    histogram!("vesta_swap_load_seconds", "model" => name.to_string()).record(seconds);
}
