// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scheduled background reloads.
//!
//! A reload job periodically calls [`HotSwapController::swap`] with no
//! explicit version, so a newly registered or re-uploaded version is picked
//! up without a restart. Jobs hold only a weak reference to the controller
//! and stop once it is dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::swap::{HotSwapController, SwapError, SwapOutcome};

/// Shortest accepted reload period.
pub const MIN_RELOAD_INTERVAL: Duration = Duration::from_millis(10);

pub(super) struct ReloadJob {
    token: CancellationToken,
    interval: Duration,
    _handle: JoinHandle<()>,
}

impl HotSwapController {
    /// Start reloading `name` every `interval`. Must be called from within a
    /// Tokio runtime.
    pub fn schedule_reload(self: &Arc<Self>, name: &str, interval: Duration) -> Result<(), SwapError> {
        let interval = interval.max(MIN_RELOAD_INTERVAL);
        match self.reloads.entry(name.to_string()) {
            Entry::Occupied(_) => Err(SwapError::ReloadAlreadyScheduled(name.to_string())),
            Entry::Vacant(vacant) => {
                let token = CancellationToken::new();
                let handle = tokio::spawn(run_reload(
                    Arc::downgrade(self),
                    name.to_string(),
                    interval,
                    token.clone(),
                ));
                vacant.insert(ReloadJob { token, interval, _handle: handle });
                info!(name, interval_ms = interval.as_millis() as u64, "Scheduled reload");
                Ok(())
            }
        }
    }

    /// Stop the scheduled reload of `name`. A swap already in progress runs
    /// to completion.
    pub fn cancel_scheduled_reload(&self, name: &str) -> Result<(), SwapError> {
        let (_, job) = self
            .reloads
            .remove(name)
            .ok_or_else(|| SwapError::NoScheduledReload(name.to_string()))?;
        job.token.cancel();
        info!(name, "Cancelled scheduled reload");
        Ok(())
    }

    /// Names with a scheduled reload and their periods, sorted by name.
    pub fn scheduled_reloads(&self) -> Vec<(String, Duration)> {
        let mut jobs: Vec<(String, Duration)> = self
            .reloads
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().interval))
            .collect();
        jobs.sort();
        jobs
    }
}

impl Drop for HotSwapController {
    fn drop(&mut self) {
        for job in self.reloads.iter() {
            job.value().token.cancel();
        }
    }
}

async fn run_reload(
    controller: Weak<HotSwapController>,
    name: String,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(controller) = controller.upgrade() else {
            break;
        };
        match controller.swap(&name, None).await {
            Ok(SwapOutcome::Swapped { current, .. }) => {
                debug!(name = %name, version = %current, "Scheduled reload swapped instance");
            }
            Ok(SwapOutcome::Unchanged(_)) => {}
            Err(e) => {
                warn!(name = %name, error = %e, "Scheduled reload failed; keeping active instance");
            }
        }
    }
    debug!(name = %name, "Reload job stopped");
}
