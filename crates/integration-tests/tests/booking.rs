//! The booking wizard end to end: anonymous drafting, sign-in, submission
//! and settlement.

use std::time::Duration;

use brnno_integration_tests::TestServer;
use brnno_storefront::error::GENERIC_MESSAGE;
use chrono::{Days, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

fn tomorrow() -> String {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string()
}

/// Fill every step and advance to the confirm step.
async fn drive_to_confirm(server: &TestServer, client: &Client) -> Value {
    let steps = [
        json!({ "serviceId": "4" }),
        json!({ "date": tomorrow(), "time": "10:00 AM" }),
        json!({
            "vehicle": { "make": "Tesla", "model": "Model 3", "year": "2023" },
            "address": "123 Center St, Provo, UT"
        }),
        json!({}),
    ];
    let mut state = Value::Null;
    for edit in steps {
        let (status, _) = server.patch(client, "/api/booking/draft", edit).await;
        assert_eq!(status, StatusCode::OK);
        let (status, next) = server.post(client, "/api/booking/advance", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        state = next;
    }
    state
}

#[tokio::test]
async fn test_advance_is_gated_by_step() {
    let server = TestServer::start().await;
    let client = TestServer::client();

    let (status, state) = server.get(&client, "/api/booking").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["flow"], json!("booking"));
    assert_eq!(state["currentStep"], json!(1));
    assert_eq!(state["stepCount"], json!(5));
    assert_eq!(state["canAdvance"], json!(false));

    let (status, state) = server.post(&client, "/api/booking/advance", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["currentStep"], json!(1));

    let (_, state) = server
        .patch(&client, "/api/booking/draft", json!({ "serviceId": "2" }))
        .await;
    assert_eq!(state["canAdvance"], json!(true));
    assert_eq!(state["draft"]["service"]["price"], json!(120));

    let (_, state) = server.post(&client, "/api/booking/advance", json!({})).await;
    assert_eq!(state["currentStep"], json!(2));
    assert_eq!(state["stepName"], json!("date_time"));

    let (_, state) = server.post(&client, "/api/booking/retreat", json!({})).await;
    assert_eq!(state["currentStep"], json!(1));
    assert_eq!(state["draft"]["service"]["id"], json!("2"));

    let (_, state) = server.post(&client, "/api/booking/reset", json!({})).await;
    assert_eq!(state["currentStep"], json!(1));
    assert_eq!(state["draft"]["service"], Value::Null);
}

#[tokio::test]
async fn test_draft_rejects_invalid_values() {
    let server = TestServer::start().await;
    let client = TestServer::client();

    let (status, _) = server
        .patch(&client, "/api/booking/draft", json!({ "serviceId": "99" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .patch(
            &client,
            "/api/booking/draft",
            json!({ "date": tomorrow(), "time": "7:00 PM" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .patch(
            &client,
            "/api/booking/draft",
            json!({ "provider": { "id": "nope", "name": "Fake Co" } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_requires_confirm_step_and_sign_in() {
    let server = TestServer::start().await;
    let client = TestServer::client();

    let (status, _) = server.post(&client, "/api/booking/submit", json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    server.sign_up(&client, "gus@example.com").await;
    let (status, _) = server.post(&client, "/api/booking/submit", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_booking_is_settled_after_submit() {
    let server = TestServer::start().await;
    let client = TestServer::client();

    // The draft survives signing in mid-flow.
    let state = drive_to_confirm(&server, &client).await;
    assert_eq!(state["currentStep"], json!(5));
    assert_eq!(state["isTerminal"], json!(true));
    let uid = server.sign_up(&client, "hana@example.com").await;

    let (status, booking) = server.post(&client, "/api/booking/submit", json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{booking}");
    assert_eq!(booking["customerId"], json!(uid));
    assert_eq!(booking["customerName"], json!("Test"));
    assert_eq!(booking["status"], json!("pending"));
    assert_eq!(booking["paymentStatus"], json!("pending"));
    assert_eq!(booking["totalAmount"], json!(200));
    assert_eq!(booking["platformFee"], json!(30));
    assert_eq!(booking["providerAmount"], json!(170));

    let (_, state) = server.get(&client, "/api/booking").await;
    assert_eq!(state["currentStep"], json!(1));

    let id = booking["id"].as_str().unwrap().to_owned();
    let settled = server
        .wait_for_booking(&client, &id, Duration::from_secs(5), |b| {
            b["paymentStatus"] == json!("paid")
        })
        .await;
    assert_eq!(settled["status"], json!("confirmed"));
    assert!(settled["paidAt"].is_string());
    assert!(settled["paymentIntentId"].is_string());
    assert_eq!(server.payments.confirmations(), 1);

    let (_, mine) = server.get(&client, "/api/bookings").await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));

    let stranger = TestServer::client();
    server.sign_up(&stranger, "ivy@example.com").await;
    let (status, _) = server.get(&stranger, &format!("/api/bookings/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_settlement_marks_payment_failed() {
    let server = TestServer::start().await;
    let client = TestServer::client();
    drive_to_confirm(&server, &client).await;
    server.sign_up(&client, "jo@example.com").await;

    // More failures than the configured attempts.
    server.payments.fail_next(10);
    let (status, booking) = server.post(&client, "/api/booking/submit", json!({})).await;
    assert_eq!(status, StatusCode::CREATED);

    let id = booking["id"].as_str().unwrap().to_owned();
    let failed = server
        .wait_for_booking(&client, &id, Duration::from_secs(5), |b| {
            b["paymentStatus"] == json!("failed")
        })
        .await;
    assert_eq!(failed["status"], json!("pending"));
    assert!(failed.get("paidAt").is_none());
    assert_eq!(server.payments.confirmations(), 0);
}

#[tokio::test]
async fn test_store_outage_keeps_wizard_for_retry() {
    let server = TestServer::start().await;
    let client = TestServer::client();
    drive_to_confirm(&server, &client).await;
    server.sign_up(&client, "kai@example.com").await;

    server.store.set_bookings_down(true);
    let (status, body) = server.post(&client, "/api/booking/submit", json!({})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!(GENERIC_MESSAGE));

    let (_, state) = server.get(&client, "/api/booking").await;
    assert_eq!(state["currentStep"], json!(5));
    assert_eq!(state["draft"]["service"]["id"], json!("4"));
    assert_eq!(state["draft"]["address"], json!("123 Center St, Provo, UT"));

    let (_, mine) = server.get(&client, "/api/bookings").await;
    assert_eq!(mine.as_array().map(Vec::len), Some(0));

    server.store.set_bookings_down(false);
    let (status, booking) = server.post(&client, "/api/booking/submit", json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{booking}");
    let (_, mine) = server.get(&client, "/api/bookings").await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
}
