//! HTTP status surface

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{address_str, Harness};
use mission_control_common::units::ONE_TOKEN;
use mission_control_faucet::api;
use serde_json::Value;
use tower::ServiceExt;

async fn get(harness: &Harness, uri: &str) -> (StatusCode, Vec<u8>) {
    let app = api::router(harness.dispatcher.clone());
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(harness: &Harness, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(harness, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new();
    let (status, json) = get_json(&harness, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_balance_route() {
    let harness = Harness::new();
    harness.chain.set_balance(common::address(4), 2 * ONE_TOKEN);

    let (status, json) = get_json(&harness, &format!("/api/balance/{}", address_str(4))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["address"], address_str(4));
    assert_eq!(json["data"]["balance"], "2000000000000000000");
}

#[tokio::test]
async fn test_balance_route_rejects_bad_address() {
    let harness = Harness::new();
    let (status, json) = get_json(&harness, "/api/balance/0x123").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "INVALID_ADDRESS");
}

#[tokio::test]
async fn test_balance_route_reports_chain_outage() {
    let harness = Harness::new();
    harness.chain.fail_balance_reads(true);

    let (status, json) = get_json(&harness, &format!("/api/balance/{}", address_str(4))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "RPC_ERROR");
}

#[tokio::test]
async fn test_status_route() {
    let harness = Harness::new();
    harness
        .dispatcher
        .request_funds("alice", &address_str(1))
        .await
        .unwrap();

    let (status, json) = get_json(&harness, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["operator"], harness.operator().to_string());
    assert_eq!(json["data"]["token_symbol"], "DEV");
    assert_eq!(json["data"]["requesters"], 1);
    assert_eq!(json["data"]["queue_depth"], 0);
}

#[tokio::test]
async fn test_metrics_route() {
    let harness = Harness::new();
    harness
        .dispatcher
        .request_funds("alice", &address_str(1))
        .await
        .unwrap();

    let (status, body) = get(&harness, "/metrics").await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("mission_control_faucet_requests_total{outcome=\"granted\"} 1"));
}
