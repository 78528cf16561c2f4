mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::dec;
use marketcore::api::auth::USER_ID_HEADER;
use marketcore::api::router::create_router;
use marketcore::config::AppConfig;
use marketcore::AppState;

async fn build_test_app() -> Option<(axum::Router, sqlx::PgPool)> {
    let pool = common::setup_test_db().await?;
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let metrics_handle = marketcore::metrics::init_metrics();

    let state = AppState::new(pool.clone(), AppConfig::for_database(url), metrics_handle);
    Some((create_router(state), pool))
}

async fn read_json(resp: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, user: Option<Uuid>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
    }
    builder
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn as_decimal(v: &Value) -> Decimal {
    v.as_str().expect("decimal serialized as string").parse().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let Some((app, _pool)) = build_test_app().await else { return };

    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = read_json(resp).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let Some((app, _pool)) = build_test_app().await else { return };

    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_quote_then_trade_over_http() {
    let Some((app, pool)) = build_test_app().await else { return };
    let (market, _) = common::seed_market(&pool, dec("100"), dec("100"), Decimal::ZERO, dec("10000")).await;
    let user = common::seed_profile(&pool, dec("50"), None).await;
    let body = json!({ "outcome": "yes", "side": "buy", "amount": "10" });

    let resp = app
        .clone()
        .oneshot(post_json(&format!("/api/markets/{}/quote", market.id), None, &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = read_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(as_decimal(&json["data"]["shares"]), dec("9.090909"));

    // Quoting writes nothing.
    assert_eq!(common::balance_of(&pool, user.id).await, dec("50"));

    let trades_uri = format!("/api/markets/{}/trades", market.id);
    let resp = app
        .clone()
        .oneshot(post_json(&trades_uri, None, &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(post_json(&trades_uri, Some(user.id), &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = read_json(resp).await;
    assert_eq!(as_decimal(&json["data"]["new_balance"]), dec("40"));

    let resp = app
        .oneshot(
            Request::builder()
                .uri(&trades_uri)
                .header(USER_ID_HEADER, user.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = read_json(resp).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_trade_errors_map_to_status_codes() {
    let Some((app, pool)) = build_test_app().await else { return };
    let (market, _) =
        common::seed_market(&pool, dec("1000"), dec("1000"), Decimal::ZERO, dec("100000")).await;
    let user = common::seed_profile(&pool, dec("100000"), None).await;
    let uri = format!("/api/markets/{}/trades", market.id);

    let resp = app
        .clone()
        .oneshot(post_json(
            &uri,
            Some(user.id),
            &json!({ "outcome": "yes", "side": "buy", "amount": "50000" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = read_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(as_decimal(&json["details"]["suggested_max"]), dec("19000"));

    let resp = app
        .clone()
        .oneshot(post_json(
            &uri,
            Some(user.id),
            &json!({ "outcome": "draw", "side": "buy", "amount": "5" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Amounts past what the pool arithmetic can hold are a client error too.
    let resp = app
        .clone()
        .oneshot(post_json(
            &format!("/api/markets/{}/quote", market.id),
            None,
            &json!({ "outcome": "yes", "side": "buy", "amount": Decimal::MAX.to_string() }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .oneshot(post_json(
            &format!("/api/markets/{}/trades", Uuid::new_v4()),
            Some(user.id),
            &json!({ "outcome": "yes", "side": "buy", "amount": "5" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_transaction_visible_only_to_owner_and_agent() {
    let Some((app, pool)) = build_test_app().await else { return };
    let method = common::unique_method();
    let (agent, account) = common::seed_agent(&pool, &method, "dakar", dec("500"), true, true).await;
    let user = common::seed_profile(&pool, dec("0"), Some("dakar")).await;

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/deposits/match",
            Some(user.id),
            &json!({ "method": method }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = read_json(resp).await;
    assert_eq!(json["data"]["agent_id"], agent.id.to_string());

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/deposits",
            Some(user.id),
            &json!({
                "amount": "75",
                "method": method,
                "agent_id": agent.id,
                "account_id": account.id,
                "proof_url": "https://proofs.example/p.png",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = read_json(resp).await;
    let id = json["data"]["id"].as_str().unwrap().to_string();

    let get = |caller: Uuid| {
        Request::builder()
            .uri(format!("/api/transactions/{id}"))
            .header(USER_ID_HEADER, caller.to_string())
            .body(Body::empty())
            .unwrap()
    };

    let resp = app.clone().oneshot(get(user.id)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = read_json(resp).await;
    assert_eq!(json["data"]["expired"], false);
    assert!(json["data"]["remaining_secs"].as_i64().unwrap() > 1700);

    let resp = app.clone().oneshot(get(agent.user_id)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(get(Uuid::new_v4())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Confirming as the depositor is forbidden; the agent may.
    let confirm = format!("/api/transactions/{id}/confirm");
    let resp = app
        .clone()
        .oneshot(post_json(&confirm, Some(user.id), &json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .oneshot(post_json(&confirm, Some(agent.user_id), &json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(common::balance_of(&pool, user.id).await, dec("75"));
}

#[tokio::test]
async fn test_control_status() {
    let Some((app, _pool)) = build_test_app().await else { return };

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/control/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = read_json(resp).await;
    assert_eq!(json["deposit_timeout_secs"], 1800);
    assert_eq!(json["withdrawal_agent_window_secs"], 60);
    assert_eq!(json["sweep_running"], false);
}
