use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Market shape as stored in `markets.market_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Binary,
    Sports,
    Multiple,
}

impl MarketType {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "binary" => Some(MarketType::Binary),
            "sports" => Some(MarketType::Sports),
            "multiple" => Some(MarketType::Multiple),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Closed,
    Resolved,
    Cancelled,
}

impl MarketStatus {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MarketStatus::Active),
            "closed" => Some(MarketStatus::Closed),
            "resolved" => Some(MarketStatus::Resolved),
            "cancelled" => Some(MarketStatus::Cancelled),
            _ => None,
        }
    }
}

/// Database row for markets table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Market {
    pub id: Uuid,
    pub title: String,
    pub market_type: String,
    pub status: String,
    pub yes_price: Option<Decimal>,
    pub no_price: Option<Decimal>,
    pub draw_price: Option<Decimal>,
    pub min_bet_amount: Decimal,
    pub max_bet_amount: Decimal,
    pub total_volume: Decimal,
    pub total_yes_shares: Decimal,
    pub total_no_shares: Decimal,
    pub total_draw_shares: Decimal,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Market {
    pub fn kind(&self) -> Option<MarketType> {
        MarketType::from_db_str(&self.market_type)
    }

    pub fn is_active(&self) -> bool {
        MarketStatus::from_db_str(&self.status) == Some(MarketStatus::Active)
    }
}

/// Database row for liquidity_pools table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LiquidityPool {
    pub id: Uuid,
    pub market_id: Uuid,
    pub yes_reserve: Decimal,
    pub no_reserve: Decimal,
    pub draw_reserve: Decimal,
    pub constant_product: Decimal,
    pub total_liquidity: Decimal,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Database row for market_outcomes table: one choice of a `multiple`
/// market, carrying its own yes/no reserve pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketOutcome {
    pub id: Uuid,
    pub market_id: Uuid,
    pub label: String,
    pub yes_reserve: Decimal,
    pub no_reserve: Decimal,
    pub constant_product: Decimal,
    pub total_liquidity: Decimal,
    pub yes_price: Option<Decimal>,
    pub no_price: Option<Decimal>,
    pub total_volume: Decimal,
    pub total_yes_shares: Decimal,
    pub total_no_shares: Decimal,
    pub updated_at: Option<DateTime<Utc>>,
}
