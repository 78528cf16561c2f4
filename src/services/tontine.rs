use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{profile_repo, tontine_repo, transaction_repo};
use crate::models::tontine::contribution_status;
use crate::models::transaction::transaction_status;
use crate::models::{TontineContribution, TontineMember, TransactionKind, TransactionMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutopayDecision {
    Pay,
    Miss,
}

/// Auto-pay only draws on members who opted in and can cover the amount.
pub fn autopay_decision(auto_pay: bool, balance: Decimal, amount: Decimal) -> AutopayDecision {
    if auto_pay && balance >= amount {
        AutopayDecision::Pay
    } else {
        AutopayDecision::Miss
    }
}

/// Lowest rotation position that has not been paid out yet.
pub fn next_recipient(members: &[TontineMember]) -> Option<&TontineMember> {
    members
        .iter()
        .filter(|m| !m.has_received_payout)
        .min_by_key(|m| m.rotation_position)
}

pub fn cycle_fully_paid(contributions: &[TontineContribution]) -> bool {
    !contributions.is_empty()
        && contributions
            .iter()
            .all(|c| c.status == contribution_status::PAID)
}

pub fn pot_total(contributions: &[TontineContribution]) -> Decimal {
    contributions.iter().map(|c| c.amount).sum()
}

pub fn next_due_date(due_date: DateTime<Utc>, interval_days: i32) -> DateTime<Utc> {
    due_date + Duration::days(interval_days as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionOutcome {
    Paid,
    Missed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Payout {
    pub group_id: Uuid,
    pub member_id: Uuid,
    pub amount: Decimal,
    /// Whether this payout finished the rotation.
    pub group_completed: bool,
}

/// Settle one due contribution. `None` when another worker owns the row or
/// nothing changed (a missed contribution still unfunded).
pub async fn settle_contribution(
    db: &PgPool,
    contribution_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<ContributionOutcome>> {
    let mut tx = db.begin().await?;

    let Some(due) = tontine_repo::lock_due_contribution(&mut tx, contribution_id).await? else {
        return Ok(None);
    };
    let already_missed = due.status == contribution_status::MISSED;

    let balance = match profile_repo::get_profile_for_update(&mut tx, due.user_id).await? {
        Some(p) => p.balance,
        None => Decimal::ZERO,
    };

    let outcome = match autopay_decision(due.auto_pay, balance, due.amount) {
        AutopayDecision::Pay => {
            let Some(new_balance) =
                profile_repo::debit_if_sufficient(&mut tx, due.user_id, due.amount).await?
            else {
                anyhow::bail!("balance of user {} changed under lock", due.user_id);
            };
            tontine_repo::set_contribution_status(
                &mut tx,
                due.contribution_id,
                contribution_status::PAID,
                Some(now),
            )
            .await?;
            transaction_repo::insert_transaction(
                &mut *tx,
                due.user_id,
                TransactionKind::TontineContribution,
                due.amount,
                transaction_status::COMPLETED,
                "Tontine auto-pay contribution",
                &TransactionMetadata {
                    tontine_cycle_id: Some(due.cycle_id),
                    ..Default::default()
                },
            )
            .await?;

            counter!("tontine_autopay_total").increment(1);
            tracing::info!(
                contribution_id = %due.contribution_id,
                group_id = %due.group_id,
                user_id = %due.user_id,
                amount = %due.amount,
                balance = %new_balance,
                "Tontine contribution auto-paid"
            );
            Some(ContributionOutcome::Paid)
        }
        AutopayDecision::Miss if already_missed => None,
        AutopayDecision::Miss => {
            tontine_repo::set_contribution_status(
                &mut tx,
                due.contribution_id,
                contribution_status::MISSED,
                None,
            )
            .await?;
            tracing::info!(
                contribution_id = %due.contribution_id,
                member_id = %due.member_id,
                auto_pay = due.auto_pay,
                "Tontine contribution missed"
            );
            Some(ContributionOutcome::Missed)
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Pay out a fully funded cycle to the next member in rotation and open the
/// following cycle, or close the group once everyone has been paid.
pub async fn pay_out_cycle(db: &PgPool, cycle_id: Uuid) -> anyhow::Result<Option<Payout>> {
    let mut tx = db.begin().await?;

    let Some(cycle) = tontine_repo::lock_collecting_cycle(&mut tx, cycle_id).await? else {
        return Ok(None);
    };
    let contributions = tontine_repo::get_cycle_contributions(&mut tx, cycle.id).await?;
    if !cycle_fully_paid(&contributions) {
        return Ok(None);
    }

    let Some(group) = tontine_repo::get_group_for_update(&mut tx, cycle.group_id).await? else {
        return Ok(None);
    };
    let members = tontine_repo::get_members(&mut tx, group.id).await?;
    let Some(recipient) = next_recipient(&members) else {
        tontine_repo::complete_group(&mut tx, group.id).await?;
        tx.commit().await?;
        tracing::warn!(group_id = %group.id, "Collecting cycle with no unpaid member, group closed");
        return Ok(None);
    };

    let pot = pot_total(&contributions);
    profile_repo::credit(&mut tx, recipient.user_id, pot).await?;
    tontine_repo::mark_member_paid_out(&mut tx, recipient.id).await?;
    tontine_repo::close_cycle(&mut tx, cycle.id, recipient.id, pot).await?;
    transaction_repo::insert_transaction(
        &mut *tx,
        recipient.user_id,
        TransactionKind::TontinePayout,
        pot,
        transaction_status::COMPLETED,
        &format!("Tontine payout, {} cycle {}", group.name, cycle.cycle_number),
        &TransactionMetadata {
            tontine_cycle_id: Some(cycle.id),
            ..Default::default()
        },
    )
    .await?;

    let unpaid_left = members
        .iter()
        .any(|m| !m.has_received_payout && m.id != recipient.id);
    if unpaid_left {
        let due = next_due_date(cycle.due_date, group.cycle_interval_days);
        tontine_repo::open_cycle(&mut tx, &group, cycle.cycle_number + 1, due).await?;
    } else {
        tontine_repo::complete_group(&mut tx, group.id).await?;
    }

    tx.commit().await?;

    counter!("tontine_payouts_total").increment(1);
    tracing::info!(
        group_id = %group.id,
        cycle = cycle.cycle_number,
        member_id = %recipient.id,
        amount = %pot,
        group_completed = !unpaid_left,
        "Tontine cycle paid out"
    );

    Ok(Some(Payout {
        group_id: group.id,
        member_id: recipient.id,
        amount: pot,
        group_completed: !unpaid_left,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn member(position: i32, paid: bool) -> TontineMember {
        TontineMember {
            id: Uuid::new_v4(),
            group_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            rotation_position: position,
            auto_pay: true,
            has_received_payout: paid,
        }
    }

    fn contribution(status: &str) -> TontineContribution {
        TontineContribution {
            id: Uuid::new_v4(),
            cycle_id: Uuid::nil(),
            member_id: Uuid::new_v4(),
            amount: Decimal::from(50),
            status: status.into(),
            paid_at: None,
        }
    }

    #[test]
    fn test_autopay_needs_opt_in_and_funds() {
        let amount = Decimal::from(50);
        assert_eq!(autopay_decision(true, Decimal::from(50), amount), AutopayDecision::Pay);
        assert_eq!(autopay_decision(true, Decimal::from(49), amount), AutopayDecision::Miss);
        assert_eq!(autopay_decision(false, Decimal::from(500), amount), AutopayDecision::Miss);
    }

    #[test]
    fn test_next_recipient_is_lowest_unpaid_position() {
        let members = vec![member(3, false), member(1, true), member(2, false)];
        assert_eq!(next_recipient(&members).unwrap().rotation_position, 2);

        let done = vec![member(1, true), member(2, true)];
        assert!(next_recipient(&done).is_none());
    }

    #[test]
    fn test_cycle_fully_paid() {
        assert!(!cycle_fully_paid(&[]));
        assert!(cycle_fully_paid(&[contribution("paid"), contribution("paid")]));
        assert!(!cycle_fully_paid(&[contribution("paid"), contribution("missed")]));
        assert_eq!(
            pot_total(&[contribution("paid"), contribution("paid"), contribution("paid")]),
            Decimal::from(150)
        );
    }

    #[test]
    fn test_next_due_date() {
        let due = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            next_due_date(due, 30),
            Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
        );
    }
}
