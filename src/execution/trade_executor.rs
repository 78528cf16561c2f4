use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::amm::{MarketPrices, PoolShape, Quote};
use crate::db::market_repo::{self, ShareDeltas};
use crate::db::{pool_repo, position_repo, profile_repo, trade_repo, transaction_repo};
use crate::models::transaction::transaction_status;
use crate::models::{
    LiquidityPool, Market, MarketOutcome, MarketType, Outcome, Position, Side, Trade,
    TransactionKind, TransactionMetadata,
};

use super::planner::{self, Holdings, MarketSnapshot, TradePlan};
use super::position_book::{self, Holding};
use super::{TradeError, TradeRequest};

/// Trading fee rate. Fees are recorded on every ledger row.
const FEE: Decimal = Decimal::ZERO;

/// Outcome of an executed trade.
#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub trade: Trade,
    /// `None` when a sell closed the position.
    pub position: Option<Position>,
    pub new_balance: Decimal,
    pub quote: Quote,
    pub prices: MarketPrices,
    pub transaction_id: Uuid,
}

/// Where a market's reserves live.
enum PoolTarget {
    Market(LiquidityPool),
    Outcome(MarketOutcome),
}

impl PoolTarget {
    fn outcome_id(&self) -> Option<Uuid> {
        match self {
            PoolTarget::Market(_) => None,
            PoolTarget::Outcome(o) => Some(o.id),
        }
    }

    fn shape(&self) -> Result<PoolShape, TradeError> {
        let shape = match self {
            PoolTarget::Market(p) => PoolShape::from_reserves(p.yes_reserve, p.no_reserve, p.draw_reserve)?,
            PoolTarget::Outcome(o) => PoolShape::from_reserves(o.yes_reserve, o.no_reserve, Decimal::ZERO)?,
        };
        Ok(shape)
    }
}

/// Price a trade without executing it.
pub async fn quote_trade(
    db: &PgPool,
    market_id: Uuid,
    outcome_id: Option<Uuid>,
    outcome: Outcome,
    side: Side,
    amount: Decimal,
) -> Result<Quote, TradeError> {
    let market = market_repo::get_market(db, market_id)
        .await?
        .ok_or(TradeError::MarketNotFound(market_id))?;

    let target = match market_type(&market)? {
        MarketType::Multiple => {
            let outcome_id = require_outcome_id(outcome_id)?;
            let row = market_repo::get_outcome(db, market_id, outcome_id)
                .await?
                .ok_or_else(|| TradeError::InvalidOutcome(format!("unknown outcome {outcome_id}")))?;
            PoolTarget::Outcome(row)
        }
        _ => PoolTarget::Market(
            pool_repo::get_pool(db, market_id)
                .await?
                .ok_or(TradeError::MarketNotFound(market_id))?,
        ),
    };

    let snapshot = snapshot(&market, &target)?;
    planner::quote(&snapshot, outcome, side, amount)
}

/// Execute one trade. Validation, balance, reserves, market aggregates,
/// ledger and position all commit in one database transaction, or none do.
pub async fn execute_trade(db: &PgPool, req: &TradeRequest) -> Result<TradeReceipt, TradeError> {
    match run_trade(db, req).await {
        Ok(receipt) => {
            counter!("trades_executed").increment(1);
            tracing::info!(
                trade_id = %receipt.trade.id,
                user_id = %req.user_id,
                market_id = %req.market_id,
                outcome = %req.outcome,
                side = %req.side,
                shares = %receipt.quote.shares,
                amount = %receipt.quote.amount,
                price = %receipt.quote.effective_price,
                "Trade executed"
            );
            Ok(receipt)
        }
        Err(e) => {
            if e.is_rejection() {
                counter!("trades_rejected").increment(1);
                tracing::info!(
                    user_id = %req.user_id,
                    market_id = %req.market_id,
                    reason = %e,
                    "Trade rejected"
                );
            } else {
                tracing::error!(
                    error = %e,
                    user_id = %req.user_id,
                    market_id = %req.market_id,
                    "Trade failed, rolled back"
                );
            }
            Err(e)
        }
    }
}

async fn run_trade(db: &PgPool, req: &TradeRequest) -> Result<TradeReceipt, TradeError> {
    let mut tx = db.begin().await?;

    // 1. Lock market, then its reserves. Every trade takes locks in this
    // order, so concurrent trades on one market queue instead of racing.
    let market = market_repo::get_market_for_update(&mut tx, req.market_id)
        .await?
        .ok_or(TradeError::MarketNotFound(req.market_id))?;

    let target = match market_type(&market)? {
        MarketType::Multiple => {
            let outcome_id = require_outcome_id(req.outcome_id)?;
            let row = market_repo::get_outcome_for_update(&mut tx, market.id, outcome_id)
                .await?
                .ok_or_else(|| TradeError::InvalidOutcome(format!("unknown outcome {outcome_id}")))?;
            PoolTarget::Outcome(row)
        }
        _ => PoolTarget::Market(
            pool_repo::get_pool_for_update(&mut tx, market.id)
                .await?
                .ok_or(TradeError::MarketNotFound(market.id))?,
        ),
    };
    let snapshot = snapshot(&market, &target)?;
    let outcome_id = target.outcome_id();

    // 2. User state, read under lock.
    let profile = profile_repo::get_profile_for_update(&mut tx, req.user_id)
        .await?
        .ok_or(TradeError::UserNotFound(req.user_id))?;
    let held = match req.side {
        Side::Buy => Decimal::ZERO,
        Side::Sell => {
            trade_repo::net_shares(&mut *tx, req.user_id, market.id, outcome_id, req.outcome).await?
        }
    };

    // 3. Validate and price. Nothing has been written yet.
    let plan = planner::plan_trade(
        &snapshot,
        Holdings {
            balance: profile.balance,
            shares: held,
        },
        req.outcome,
        req.side,
        req.amount,
    )?;

    // 4. Apply.
    let receipt = apply_plan(&mut tx, req, &market, &target, plan).await?;
    tx.commit().await?;

    Ok(receipt)
}

async fn apply_plan(
    conn: &mut PgConnection,
    req: &TradeRequest,
    market: &Market,
    target: &PoolTarget,
    plan: TradePlan,
) -> Result<TradeReceipt, TradeError> {
    let quote = &plan.quote;
    let outcome_id = target.outcome_id();

    profile_repo::set_balance(conn, req.user_id, plan.new_balance).await?;

    let (signed_shares, liquidity_delta) = match req.side {
        Side::Buy => (quote.shares, quote.amount),
        Side::Sell => (-quote.shares, -quote.amount),
    };
    let mut deltas = ShareDeltas::default();
    match req.outcome {
        Outcome::Yes => deltas.yes = signed_shares,
        Outcome::No => deltas.no = signed_shares,
        Outcome::Draw => deltas.draw = signed_shares,
    }

    match target {
        PoolTarget::Market(pool) => {
            pool_repo::update_reserves(conn, pool.id, &quote.new_pool, liquidity_delta).await?;
            market_repo::record_market_trade(conn, market.id, &plan.prices, quote.amount, deltas)
                .await?;
        }
        PoolTarget::Outcome(row) => {
            market_repo::record_outcome_trade(
                conn,
                row.id,
                quote.new_pool.yes_reserve(),
                quote.new_pool.no_reserve(),
                liquidity_delta,
                &plan.prices,
                quote.amount,
                deltas,
            )
            .await?;
        }
    }

    let trade = trade_repo::insert_trade(
        conn,
        market.id,
        outcome_id,
        req.user_id,
        req.outcome,
        req.side,
        quote.shares,
        quote.effective_price,
        quote.amount,
        FEE,
    )
    .await?;

    let (kind, verb) = match req.side {
        Side::Buy => (TransactionKind::TradeBuy, "Bought"),
        Side::Sell => (TransactionKind::TradeSell, "Sold"),
    };
    let record = transaction_repo::insert_transaction(
        &mut *conn,
        req.user_id,
        kind,
        quote.amount,
        transaction_status::COMPLETED,
        &format!(
            "{verb} {} {} shares in \"{}\"",
            quote.shares, req.outcome, market.title
        ),
        &TransactionMetadata {
            trade_id: Some(trade.id),
            market_id: Some(market.id),
            ..Default::default()
        },
    )
    .await?;

    let existing =
        position_repo::get_position_for_update(conn, req.user_id, market.id, outcome_id, req.outcome)
            .await?;
    let holding = existing.as_ref().map(|p| Holding {
        shares: p.shares,
        average_price: p.average_price,
        total_invested: p.total_invested,
    });
    let updated = position_book::apply_fill(
        holding,
        req.side,
        quote.shares,
        quote.effective_price,
        quote.amount,
    );
    let position = match (existing, updated) {
        (Some(pos), Some(h)) => Some(position_repo::update_position(conn, pos.id, &h).await?),
        (None, Some(h)) => Some(
            position_repo::insert_position(conn, req.user_id, market.id, outcome_id, req.outcome, &h)
                .await?,
        ),
        (Some(pos), None) => {
            position_repo::delete_position(conn, pos.id).await?;
            None
        }
        (None, None) => None,
    };

    Ok(TradeReceipt {
        trade,
        position,
        new_balance: plan.new_balance,
        prices: plan.prices,
        transaction_id: record.id,
        quote: plan.quote,
    })
}

fn market_type(market: &Market) -> Result<MarketType, TradeError> {
    market.kind().ok_or_else(|| {
        TradeError::MarketShapeMismatch(format!("unknown market type '{}'", market.market_type))
    })
}

fn require_outcome_id(outcome_id: Option<Uuid>) -> Result<Uuid, TradeError> {
    outcome_id.ok_or_else(|| {
        TradeError::InvalidOutcome("multiple-choice markets require an outcome id".into())
    })
}

fn snapshot(market: &Market, target: &PoolTarget) -> Result<MarketSnapshot, TradeError> {
    Ok(MarketSnapshot {
        market_id: market.id,
        market_type: market_type(market)?,
        active: market.is_active(),
        pool: target.shape()?,
        min_bet_amount: market.min_bet_amount,
        max_bet_amount: market.max_bet_amount,
    })
}
