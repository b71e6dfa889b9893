//! Time-based expiry reconciliation.

use crate::{Result, Shared};
use chrono::{DateTime, Utc};
use push::{Dispatcher, PushEvent};
use std::collections::BTreeMap;
use std::time::Duration;
use store::DelegationStore;
use tokio::time::MissedTickBehavior;

/// What one sweep pass changed, grouped by delegatee.
///
/// Grouping avoids one notification per case when a single employee loses
/// many delegations at once.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Converted case counts per delegatee, in stable order.
    pub by_delegatee: Vec<(String, usize)>,
}

impl SweepReport {
    /// Total rows this pass converted. Zero is success, not an error.
    pub fn affected_count(&self) -> usize {
        self.by_delegatee.iter().map(|(_, n)| n).sum()
    }
}

/// Maintains the invariant that no `active` delegation outlives its
/// `expiry_at`. The only writer of `active → expired` transitions.
pub struct ExpirySweeper {
    delegations: Shared<DelegationStore>,
    dispatcher: Dispatcher,
}

impl ExpirySweeper {
    pub(crate) fn new(delegations: Shared<DelegationStore>, dispatcher: Dispatcher) -> Self {
        Self {
            delegations,
            dispatcher,
        }
    }

    /// One reconciliation pass at the given instant.
    ///
    /// Safe under concurrent execution: the store converts each row with a
    /// conditional update, so a periodic tick and an on-demand call racing
    /// on the same row cannot both report it. Notifications go out strictly
    /// after the transaction commits and never fail the sweep.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let swept = self.delegations.lock().sweep_expired(now)?;

        let mut grouped: BTreeMap<String, usize> = BTreeMap::new();
        for delegation in &swept {
            *grouped.entry(delegation.delegatee.clone()).or_default() += 1;
        }
        let report = SweepReport {
            by_delegatee: grouped.into_iter().collect(),
        };

        for (delegatee, case_count) in &report.by_delegatee {
            let delivered = self
                .dispatcher
                .publish(PushEvent::expired(delegatee, *case_count));
            if delivered == 0 {
                tracing::debug!(%delegatee, case_count, "no open connections, expiry event dropped");
            }
        }
        if report.affected_count() > 0 {
            tracing::info!(
                affected = report.affected_count(),
                delegatees = report.by_delegatee.len(),
                "expired overdue delegations"
            );
        }
        Ok(report)
    }

    /// Periodic background loop. Transient store errors are logged and the
    /// pass is retried on the next tick; a partial sweep is safe to resume.
    pub async fn run(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once(Utc::now()) {
                tracing::warn!(error = %e, "sweep tick failed, retrying next tick");
            }
        }
    }
}
