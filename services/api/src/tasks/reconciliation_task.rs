//! services/api/src/tasks/reconciliation_task.rs
//!
//! This module contains the background "worker" that keeps local orders and
//! balances in step with the accrual system.
//!
//! Every tick pulls the non-terminal orders and asks the accrual system about
//! each one in turn. Orders are polled strictly one after another to bound the
//! load on the remote side; a failure for one order never stops the others and
//! the order is simply asked about again on the next tick.

use gophermart_core::domain::AccrualOutcome;
use gophermart_core::ports::{AccrualService, DatabaseService, PortError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters describing what a single tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Orders the accrual system was asked about.
    pub checked: usize,
    /// Orders whose status moved forward.
    pub advanced: usize,
    /// Orders whose accrual was credited to a balance.
    pub credited: usize,
    /// Orders the accrual system does not know yet, or with nothing new.
    pub skipped: usize,
    /// Orders that failed in transport, parsing or storage.
    pub failed: usize,
    /// Set when the accrual system asked us to back off and the tick stopped early.
    pub rate_limited: bool,
}

impl TickReport {
    fn changed_anything(&self) -> bool {
        self.advanced > 0 || self.failed > 0 || self.rate_limited
    }
}

/// Runs one reconciliation pass over all pending orders.
///
/// Cancellation is checked between orders, never in the middle of one.
/// A rate-limit answer ends the pass early instead of moving on to the next
/// order; the remaining orders are picked up by the next tick.
pub async fn reconcile_once(
    db: &dyn DatabaseService,
    accrual: &dyn AccrualService,
    cancellation_token: &CancellationToken,
) -> TickReport {
    let mut report = TickReport::default();

    let orders = match db.get_orders_undone().await {
        Ok(orders) => orders,
        Err(e) => {
            error!("Failed to load pending orders: {}", e);
            return report;
        }
    };

    for order in orders {
        if cancellation_token.is_cancelled() {
            debug!("Reconciliation interrupted between orders.");
            break;
        }
        report.checked += 1;

        let remote = match accrual.fetch_order(&order.number).await {
            Ok(Some(remote)) => remote,
            Ok(None) => {
                debug!(order = %order.number, "Order not registered in accrual system yet.");
                report.skipped += 1;
                continue;
            }
            Err(PortError::RateLimited { retry_after }) => {
                warn!(
                    order = %order.number,
                    ?retry_after,
                    "Accrual system is rate limiting; deferring remaining orders to the next tick."
                );
                report.rate_limited = true;
                break;
            }
            Err(e) => {
                warn!(order = %order.number, "Accrual lookup failed: {}", e);
                report.failed += 1;
                continue;
            }
        };

        match db
            .apply_accrual(&order.number, remote.status, remote.accrual)
            .await
        {
            Ok(AccrualOutcome::Advanced { status, credited }) => {
                info!(
                    order = %order.number,
                    login = %order.login,
                    from = %order.status,
                    to = %status,
                    credited,
                    "Order advanced."
                );
                report.advanced += 1;
                if credited > 0.0 {
                    report.credited += 1;
                }
            }
            Ok(AccrualOutcome::Unchanged) => {
                report.skipped += 1;
            }
            Err(e) => {
                error!(order = %order.number, "Failed to apply accrual: {}", e);
                report.failed += 1;
            }
        }
    }

    report
}

/// The main asynchronous task for reconciliation.
///
/// Ticks every `poll_interval` until `cancellation_token` fires. A pass that is
/// already running finishes its current order before the task returns.
pub async fn reconciliation_process(
    db: Arc<dyn DatabaseService>,
    accrual: Arc<dyn AccrualService>,
    poll_interval: Duration,
    cancellation_token: CancellationToken,
) {
    info!(interval = ?poll_interval, "Reconciliation process started.");

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                info!("Reconciliation process stopped.");
                return;
            }
            _ = ticker.tick() => {}
        }

        let report = reconcile_once(db.as_ref(), accrual.as_ref(), &cancellation_token).await;
        if report.changed_anything() {
            info!(?report, "Reconciliation tick finished.");
        } else {
            debug!(?report, "Reconciliation tick finished.");
        }
    }
}
