// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span utilities and extension traits for model operations.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for standardized model operation spans.
pub struct OperationSpan;

impl OperationSpan {
    /// Span with fields:
    /// - `operation`: e.g. `swap`
    /// - `model`: registered name
    /// - `status` / `error.message`: filled by `SpanExt::record_result`
    pub fn new(operation: &str, model: &str) -> Span {
        info_span!(
            "model_operation",
            operation = %operation,
            model = %model,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
