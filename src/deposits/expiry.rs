use chrono::{DateTime, Duration, Utc};

use crate::config::AppConfig;
use crate::models::{Transaction, TransactionKind};

/// Hard deadlines of the funding workflow.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowTimeouts {
    /// From proof submission to agent decision.
    pub deposit: Duration,
    /// Per-agent payout window of a withdrawal.
    pub withdrawal_window: Duration,
}

impl WorkflowTimeouts {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            deposit: Duration::seconds(config.deposit_timeout_secs as i64),
            withdrawal_window: Duration::seconds(config.withdrawal_agent_window_secs as i64),
        }
    }

    /// When the current countdown of a pending funding transaction started,
    /// and how long it runs. `None` for kinds without a deadline.
    pub fn countdown(&self, tx: &Transaction) -> Option<(DateTime<Utc>, Duration)> {
        if tx.kind == TransactionKind::Deposit.as_str() {
            Some((tx.created_at, self.deposit))
        } else if tx.kind == TransactionKind::Withdrawal.as_str() {
            let started = tx.metadata.assigned_at.unwrap_or(tx.created_at);
            Some((started, self.withdrawal_window))
        } else {
            None
        }
    }
}

impl Default for WorkflowTimeouts {
    fn default() -> Self {
        Self {
            deposit: Duration::minutes(30),
            withdrawal_window: Duration::minutes(1),
        }
    }
}

/// Whether a countdown that began at `started_at` has run out. The boundary
/// instant counts as expired.
pub fn is_expired(now: DateTime<Utc>, started_at: DateTime<Utc>, threshold: Duration) -> bool {
    now - started_at >= threshold
}

/// Time left on a countdown, never negative.
pub fn remaining(now: DateTime<Utc>, started_at: DateTime<Utc>, threshold: Duration) -> Duration {
    (started_at + threshold - now).max(Duration::zero())
}
