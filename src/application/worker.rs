use crate::domain::order::Order;
use crate::domain::ports::{AccrualServiceRef, LedgerStoreRef};
use crate::domain::transition::{Transition, transition};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Shortest pause `run` accepts between passes.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pause between reconciliation passes. Also the back-off after a rate limit.
    pub poll_interval: Duration,
    /// Upper bound on simultaneous accrual lookups within one pass.
    pub max_in_flight: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_in_flight: 8,
        }
    }
}

/// Summary of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub selected: usize,
    pub looked_up: usize,
    pub advanced: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub rate_limited: bool,
}

enum Disposition {
    Advanced,
    Unchanged,
    Failed,
    RateLimited,
}

/// Polls the accrual service for every order awaiting a verdict and writes
/// the resulting transitions back to the ledger.
///
/// Holds no state between passes; each tick re-reads the pending set from
/// the store, so a restarted worker picks up exactly where storage says.
pub struct ReconciliationWorker {
    store: LedgerStoreRef,
    accrual: AccrualServiceRef,
    config: WorkerConfig,
}

impl ReconciliationWorker {
    pub fn new(store: LedgerStoreRef, accrual: AccrualServiceRef, config: WorkerConfig) -> Self {
        Self {
            store,
            accrual,
            config,
        }
    }

    /// Runs passes every `poll_interval` until `shutdown` is cancelled.
    ///
    /// Cancellation is only observed between passes; a pass in progress
    /// always drains its in-flight lookups and writes.
    pub async fn run(self, shutdown: CancellationToken) {
        let period = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        if period != self.config.poll_interval {
            tracing::warn!(
                configured_ms = self.config.poll_interval.as_millis() as u64,
                "Poll interval too short, clamping"
            );
        }
        tracing::info!(
            interval_ms = period.as_millis() as u64,
            max_in_flight = self.config.max_in_flight,
            "Accrual worker started"
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(report) if report.selected > 0 => {
                    tracing::debug!(?report, "Reconciliation pass finished");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Could not load pending orders"),
            }
        }

        tracing::info!("Accrual worker stopped");
    }

    /// One reconciliation pass over all pending orders.
    ///
    /// Fails only when the pending set cannot be read; per-order failures are
    /// logged, counted and left for the next pass.
    pub async fn tick(&self) -> Result<TickReport> {
        let pending = self.store.select_pending().await?;
        let mut report = TickReport {
            selected: pending.len(),
            ..TickReport::default()
        };
        if pending.is_empty() {
            return Ok(report);
        }

        let slots = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let halt = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for order in pending {
            let permit = tokio::select! {
                biased;
                _ = halt.cancelled() => break,
                permit = slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            if halt.is_cancelled() {
                break;
            }

            let store = self.store.clone();
            let accrual = self.accrual.clone();
            let halt = halt.clone();
            report.looked_up += 1;
            tasks.spawn(async move {
                let _permit = permit;
                reconcile(store, accrual, order, halt).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Disposition::Advanced) => report.advanced += 1,
                Ok(Disposition::Unchanged) => report.unchanged += 1,
                Ok(Disposition::Failed) => report.failed += 1,
                Ok(Disposition::RateLimited) => report.rate_limited = true,
                Err(e) => {
                    tracing::error!(error = %e, "Reconciliation task aborted");
                    report.failed += 1;
                }
            }
        }

        if report.rate_limited {
            tracing::warn!(
                skipped = report.selected - report.looked_up,
                "Accrual service rate limited, deferring remaining orders"
            );
        }
        Ok(report)
    }
}

async fn reconcile(
    store: LedgerStoreRef,
    accrual: AccrualServiceRef,
    order: Order,
    halt: CancellationToken,
) -> Disposition {
    let outcome = match accrual.lookup(&order.number).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(order = %order.number, error = %e, "Accrual lookup failed");
            return Disposition::Failed;
        }
    };

    match transition(order.status, &outcome) {
        Transition::Keep => {
            tracing::debug!(order = %order.number, ?outcome, "Order unchanged");
            Disposition::Unchanged
        }
        Transition::AbortBatch => {
            halt.cancel();
            Disposition::RateLimited
        }
        Transition::Advance { status, accrual } => {
            match store.apply_outcome(&order.number, status, accrual).await {
                Ok(()) => {
                    tracing::info!(
                        order = %order.number,
                        owner = order.owner,
                        from = ?order.status,
                        to = ?status,
                        accrual = ?accrual.map(|a| a.to_string()),
                        "Order advanced"
                    );
                    Disposition::Advanced
                }
                Err(e) => {
                    tracing::error!(order = %order.number, error = %e, "Could not apply accrual outcome");
                    Disposition::Failed
                }
            }
        }
    }
}
