use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use marketcore::amm::PoolShape;
use marketcore::db::pool_repo;
use marketcore::models::{Agent, LiquidityPool, Market, MarketOutcome, PaymentAccount, Profile};

/// Connect to the test database and run all migrations. Returns `None` when
/// `TEST_DATABASE_URL` is not set, so database tests are skipped.
///
/// Tables are not truncated: tests run in parallel, so every test seeds its
/// own rows under fresh ids and payment methods.
#[allow(dead_code)]
pub async fn setup_test_db() -> Option<PgPool> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// A payment method name no other test uses.
#[allow(dead_code)]
pub fn unique_method() -> String {
    format!("wave-{}", Uuid::new_v4().simple())
}

#[allow(dead_code)]
pub fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal literal")
}

/// Seed a user profile.
#[allow(dead_code)]
pub async fn seed_profile(pool: &PgPool, balance: Decimal, region: Option<&str>) -> Profile {
    sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (display_name, region, balance)
        VALUES ('test user', $1, $2)
        RETURNING *
        "#,
    )
    .bind(region)
    .bind(balance)
    .fetch_one(pool)
    .await
    .expect("Failed to seed profile")
}

/// Seed an active market with its pool. A non-zero `draw` makes it a sports
/// market.
#[allow(dead_code)]
pub async fn seed_market(
    pool: &PgPool,
    yes: Decimal,
    no: Decimal,
    draw: Decimal,
    max_bet: Decimal,
) -> (Market, LiquidityPool) {
    let shape = PoolShape::from_reserves(yes, no, draw).expect("valid reserves");
    let market_type = match shape {
        PoolShape::Binary { .. } => "binary",
        PoolShape::ThreeWay { .. } => "sports",
    };
    let prices = shape.prices();

    let market = sqlx::query_as::<_, Market>(
        r#"
        INSERT INTO markets (title, market_type, yes_price, no_price, draw_price, min_bet_amount, max_bet_amount)
        VALUES ('Test market', $1, $2, $3, $4, 1, $5)
        RETURNING *
        "#,
    )
    .bind(market_type)
    .bind(prices.yes)
    .bind(prices.no)
    .bind(prices.draw)
    .bind(max_bet)
    .fetch_one(pool)
    .await
    .expect("Failed to seed market");

    let lp = pool_repo::create_pool(pool, market.id, &shape, yes + no + draw)
        .await
        .expect("Failed to seed pool");

    (market, lp)
}

/// Seed a `multiple` market with one outcome.
#[allow(dead_code)]
pub async fn seed_multiple_market(pool: &PgPool, yes: Decimal, no: Decimal) -> (Market, MarketOutcome) {
    let market = sqlx::query_as::<_, Market>(
        r#"
        INSERT INTO markets (title, market_type, min_bet_amount, max_bet_amount)
        VALUES ('Who wins?', 'multiple', 1, 10000)
        RETURNING *
        "#,
    )
    .fetch_one(pool)
    .await
    .expect("Failed to seed market");

    let outcome = sqlx::query_as::<_, MarketOutcome>(
        r#"
        INSERT INTO market_outcomes (market_id, label, yes_reserve, no_reserve, constant_product, total_liquidity)
        VALUES ($1, 'Team A', $2, $3, $2 * $3, $2 + $3)
        RETURNING *
        "#,
    )
    .bind(market.id)
    .bind(yes)
    .bind(no)
    .fetch_one(pool)
    .await
    .expect("Failed to seed outcome");

    (market, outcome)
}

/// Seed an agent with one payment account.
#[allow(dead_code)]
pub async fn seed_agent(
    pool: &PgPool,
    method: &str,
    region: &str,
    float: Decimal,
    is_primary: bool,
    is_verified: bool,
) -> (Agent, PaymentAccount) {
    let owner = seed_profile(pool, Decimal::ZERO, Some(region)).await;

    let agent = sqlx::query_as::<_, Agent>(
        r#"
        INSERT INTO agents (user_id, name, region, available_balance)
        VALUES ($1, 'Test agent', $2, $3)
        RETURNING *
        "#,
    )
    .bind(owner.id)
    .bind(region)
    .bind(float)
    .fetch_one(pool)
    .await
    .expect("Failed to seed agent");

    let account = sqlx::query_as::<_, PaymentAccount>(
        r#"
        INSERT INTO payment_accounts (agent_id, method, account_name, account_number, is_primary, is_verified)
        VALUES ($1, $2, 'Test agent', '770000000', $3, $4)
        RETURNING *
        "#,
    )
    .bind(agent.id)
    .bind(method)
    .bind(is_primary)
    .bind(is_verified)
    .fetch_one(pool)
    .await
    .expect("Failed to seed payment account");

    (agent, account)
}

#[allow(dead_code)]
pub async fn balance_of(pool: &PgPool, user_id: Uuid) -> Decimal {
    let row: (Decimal,) = sqlx::query_as("SELECT balance FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("profile exists");
    row.0
}

/// Move a transaction's clock back, as if it had been created `secs` ago.
#[allow(dead_code)]
pub async fn backdate_transaction(pool: &PgPool, id: Uuid, secs: i64) {
    sqlx::query(
        "UPDATE transactions SET created_at = created_at - make_interval(secs => $2) WHERE id = $1",
    )
    .bind(id)
    .bind(secs as f64)
    .execute(pool)
    .await
    .expect("Failed to backdate transaction");
}
