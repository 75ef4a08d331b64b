//! Ticket ledger integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

// ============================================================================
// Provisioning
// ============================================================================

#[tokio::test]
async fn provision_creates_an_empty_ledger() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/tickets/provision")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 0);
    assert_eq!(body["reserved"], 0);
    assert_eq!(body["available"], 0);
}

#[tokio::test]
async fn provision_is_idempotent() {
    let harness = TestHarness::new().await;
    harness.fund(5).await;

    // A second provision must not reset the funded balance.
    let response = harness
        .server
        .post("/v1/tickets/provision")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 5);
}

#[tokio::test]
async fn provision_without_auth_fails() {
    let harness = TestHarness::new().await;

    let response = harness.server.post("/v1/tickets/provision").await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Balance
// ============================================================================

#[tokio::test]
async fn get_balance_reports_figures() {
    let harness = TestHarness::new().await;
    harness.fund(12).await;

    let response = harness
        .server
        .get("/v1/tickets/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 12);
    assert_eq!(body["reserved"], 0);
    assert_eq!(body["available"], 12);
}

#[tokio::test]
async fn get_balance_without_ledger_fails() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .get("/v1/tickets/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn get_balance_without_auth_fails() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/v1/tickets/balance").await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Admin Grants
// ============================================================================

#[tokio::test]
async fn admin_grant_tops_up_the_balance() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/tickets/grant")
        .add_header("x-admin-key", harness.admin_api_key.clone())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 25
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 25);
    assert_eq!(body["available"], 25);

    // Visible to the user afterwards
    let response = harness
        .server
        .get("/v1/tickets/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 25);
}

#[tokio::test]
async fn grant_without_admin_key_fails() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/tickets/grant")
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 25
        }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn grant_with_wrong_admin_key_fails() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/tickets/grant")
        .add_header("x-admin-key", "not-the-key")
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 25
        }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn grant_rejects_non_positive_amounts() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/tickets/grant")
        .add_header("x-admin-key", harness.admin_api_key.clone())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 0
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn grant_with_invalid_user_id_fails() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/tickets/grant")
        .add_header("x-admin-key", harness.admin_api_key.clone())
        .json(&json!({
            "user_id": "not-a-uuid",
            "amount": 25
        }))
        .await;

    response.assert_status_bad_request();
}
