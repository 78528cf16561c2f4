use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::histogram;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::AppConfig;
use crate::db::{tontine_repo, transaction_repo};
use crate::deposits::expiry::WorkflowTimeouts;
use crate::deposits::funding::{self, WithdrawalOutcome};
use crate::models::TransactionKind;

use super::tontine::{self, ContributionOutcome};

/// Counts of what one sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub deposits_expired: usize,
    pub withdrawals_reassigned: usize,
    pub withdrawals_refunded: usize,
    pub contributions_paid: usize,
    pub contributions_missed: usize,
    pub payouts: usize,
    /// Rows or whole sweeps that failed and were skipped.
    pub errors: usize,
}

impl SweepReport {
    pub fn changed(&self) -> usize {
        self.deposits_expired
            + self.withdrawals_reassigned
            + self.withdrawals_refunded
            + self.contributions_paid
            + self.contributions_missed
            + self.payouts
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LastSweep {
    pub finished_at: DateTime<Utc>,
    pub report: SweepReport,
}

/// Drives every time-based transition: deposit expiry, withdrawal
/// reassignment, tontine auto-pay and tontine payouts.
///
/// At most one sweep runs at a time per sweeper. Each row is re-locked and
/// re-checked in its own database transaction, so concurrent sweepers in
/// other processes never apply a transition twice.
pub struct TimeoutSweeper {
    db: PgPool,
    timeouts: WorkflowTimeouts,
    batch_size: i64,
    in_flight: Mutex<()>,
    last: RwLock<Option<LastSweep>>,
}

impl TimeoutSweeper {
    pub fn new(db: PgPool, timeouts: WorkflowTimeouts, batch_size: i64) -> Self {
        Self {
            db,
            timeouts,
            batch_size,
            in_flight: Mutex::new(()),
            last: RwLock::new(None),
        }
    }

    pub fn from_config(db: PgPool, config: &AppConfig) -> Self {
        Self::new(db, WorkflowTimeouts::from_config(config), config.sweep_batch_size)
    }

    pub fn timeouts(&self) -> &WorkflowTimeouts {
        &self.timeouts
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    pub async fn last_sweep(&self) -> Option<LastSweep> {
        *self.last.read().await
    }

    /// Run one sweep now. Returns `None` when a sweep is already in flight.
    pub async fn sweep_once(&self) -> Option<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Run one sweep as of `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Option<SweepReport> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("Sweep already in flight, skipping");
            return None;
        };

        let started = Instant::now();
        let mut report = SweepReport::default();

        if let Err(e) = self.expire_deposits(now, &mut report).await {
            report.errors += 1;
            tracing::error!(error = %e, "Sweeper: deposit expiry failed");
        }
        if let Err(e) = self.rotate_withdrawals(now, &mut report).await {
            report.errors += 1;
            tracing::error!(error = %e, "Sweeper: withdrawal reassignment failed");
        }
        if let Err(e) = self.settle_contributions(now, &mut report).await {
            report.errors += 1;
            tracing::error!(error = %e, "Sweeper: tontine auto-pay failed");
        }
        if let Err(e) = self.pay_out_cycles(&mut report).await {
            report.errors += 1;
            tracing::error!(error = %e, "Sweeper: tontine payouts failed");
        }

        let elapsed = started.elapsed().as_secs_f64();
        histogram!("sweep_duration_seconds").record(elapsed);

        if report.changed() > 0 || report.errors > 0 {
            tracing::info!(
                deposits_expired = report.deposits_expired,
                withdrawals_reassigned = report.withdrawals_reassigned,
                withdrawals_refunded = report.withdrawals_refunded,
                contributions_paid = report.contributions_paid,
                contributions_missed = report.contributions_missed,
                payouts = report.payouts,
                errors = report.errors,
                elapsed_secs = elapsed,
                "Sweep finished"
            );
        } else {
            tracing::debug!(elapsed_secs = elapsed, "Sweep finished, nothing to do");
        }

        *self.last.write().await = Some(LastSweep {
            finished_at: Utc::now(),
            report,
        });

        Some(report)
    }

    async fn expire_deposits(&self, now: DateTime<Utc>, report: &mut SweepReport) -> anyhow::Result<()> {
        let cutoff = now - self.timeouts.deposit;
        let ids = transaction_repo::pending_created_before(
            &self.db,
            TransactionKind::Deposit,
            cutoff,
            self.batch_size,
        )
        .await?;

        for id in ids {
            match funding::expire_stale_deposit(&self.db, id, &self.timeouts, now).await {
                Ok(true) => report.deposits_expired += 1,
                Ok(false) => {}
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(error = %e, transaction_id = %id, "Sweeper: failed to expire deposit");
                }
            }
        }
        Ok(())
    }

    async fn rotate_withdrawals(&self, now: DateTime<Utc>, report: &mut SweepReport) -> anyhow::Result<()> {
        let cutoff = now - self.timeouts.withdrawal_window;
        let ids = transaction_repo::stale_withdrawals(&self.db, cutoff, self.batch_size).await?;

        for id in ids {
            match funding::rotate_stale_withdrawal(&self.db, id, &self.timeouts, now).await {
                Ok(Some(WithdrawalOutcome::Reassigned { .. })) => report.withdrawals_reassigned += 1,
                Ok(Some(WithdrawalOutcome::Refunded)) => report.withdrawals_refunded += 1,
                Ok(None) => {}
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(error = %e, transaction_id = %id, "Sweeper: failed to rotate withdrawal");
                }
            }
        }
        Ok(())
    }

    async fn settle_contributions(&self, now: DateTime<Utc>, report: &mut SweepReport) -> anyhow::Result<()> {
        let ids = tontine_repo::due_contributions(&self.db, now, self.batch_size).await?;

        for id in ids {
            match tontine::settle_contribution(&self.db, id, now).await {
                Ok(Some(ContributionOutcome::Paid)) => report.contributions_paid += 1,
                Ok(Some(ContributionOutcome::Missed)) => report.contributions_missed += 1,
                Ok(None) => {}
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(error = %e, contribution_id = %id, "Sweeper: failed to settle contribution");
                }
            }
        }
        Ok(())
    }

    async fn pay_out_cycles(&self, report: &mut SweepReport) -> anyhow::Result<()> {
        let ids = tontine_repo::collecting_cycles(&self.db, self.batch_size).await?;

        for id in ids {
            match tontine::pay_out_cycle(&self.db, id).await {
                Ok(Some(_)) => report.payouts += 1,
                Ok(None) => {}
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(error = %e, cycle_id = %id, "Sweeper: failed to pay out cycle");
                }
            }
        }
        Ok(())
    }
}

/// Sweep on a fixed interval until `shutdown` flips to `true`. A sweep that
/// is running when shutdown is signalled is allowed to finish.
pub async fn run_timeout_sweeper(
    sweeper: std::sync::Arc<TimeoutSweeper>,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(interval_secs, "Timeout sweeper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweeper.sweep_once().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("Timeout sweeper stopped");
}
