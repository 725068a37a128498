//! Provider onboarding end to end: application, admin review, directory
//! listing and the provider dashboard.

use brnno_integration_tests::TestServer;
use chrono::{Days, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

/// Sign up an applicant on `client` and submit a complete application.
async fn submit_application(server: &TestServer, client: &Client) -> Value {
    server.sign_up(client, "shine@example.com").await;

    let steps = [
        json!({
            "businessName": "Shine Co",
            "businessType": "llc",
            "ein": "12-3456789",
            "ownerName": "Sam Shine",
            "email": "shine@example.com",
            "serviceArea": "Provo, UT"
        }),
        json!({ "services": ["Full Detail", "Interior Detailing", "Ceramic Coating"] }),
        json!({ "backgroundCheck": true }),
        json!({ "bankAccount": "000123456789", "routingNumber": "124003116" }),
    ];
    for edit in steps {
        let (status, state) = server
            .patch(client, "/api/provider-application/draft", edit)
            .await;
        assert_eq!(status, StatusCode::OK, "{state}");
        let (_, state) = server
            .post(client, "/api/provider-application/advance", json!({}))
            .await;
        assert_eq!(state["flow"], json!("provider_application"));
    }

    let (status, application) = server
        .post(client, "/api/provider-application/submit", json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{application}");
    application
}

async fn admin(server: &TestServer) -> Client {
    let client = TestServer::client();
    let uid = server.sign_up(&client, "ops@example.com").await;
    server.promote_to_admin(&uid).await;
    client
}

#[tokio::test]
async fn test_application_masks_bank_details() {
    let server = TestServer::start().await;
    let client = TestServer::client();

    let (status, state) = server
        .patch(
            &client,
            "/api/provider-application/draft",
            json!({ "bankAccount": "000123456789", "ein": "123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{state}");

    let (_, state) = server
        .patch(
            &client,
            "/api/provider-application/draft",
            json!({ "bankAccount": "000123456789" }),
        )
        .await;
    assert_eq!(state["draft"]["bankAccount"], json!("********6789"));

    let (_, state) = server
        .patch(
            &client,
            "/api/provider-application/draft",
            json!({ "services": ["Full Detail", "Full Detail", "Paint Correction"] }),
        )
        .await;
    assert_eq!(
        state["draft"]["services"],
        json!(["Full Detail", "Paint Correction"])
    );
}

#[tokio::test]
async fn test_submit_turns_account_into_provider() {
    let server = TestServer::start().await;
    let client = TestServer::client();
    let application = submit_application(&server, &client).await;

    assert_eq!(application["status"], json!("pending"));
    assert_eq!(application["bankAccount"], json!("********6789"));
    assert_eq!(application["routingNumber"], json!("*****3116"));

    let (_, me) = server.get(&client, "/api/auth/me").await;
    assert_eq!(me["accountType"], json!("provider"));
    assert_eq!(me["businessName"], json!("Shine Co"));
    assert_eq!(me["providerApplicationId"], application["id"]);

    let (_, state) = server.get(&client, "/api/provider-application").await;
    assert_eq!(state["currentStep"], json!(1));
}

#[tokio::test]
async fn test_admin_review_and_listing() {
    let server = TestServer::start().await;
    let applicant = TestServer::client();
    let application = submit_application(&server, &applicant).await;
    let id = application["id"].as_str().unwrap().to_owned();

    let (status, _) = server
        .post(
            &applicant,
            &format!("/api/admin/providers/{id}/approve"),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = admin(&server).await;
    let (status, pending) = server.get(&admin, "/api/admin/providers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().map(Vec::len), Some(1));

    let (_, listings) = server.get(&admin, "/api/providers").await;
    assert_eq!(listings, json!([]));

    let (status, approved) = server
        .post(&admin, &format!("/api/admin/providers/{id}/approve"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    assert_eq!(approved["status"], json!("approved"));
    assert!(approved["payoutAccountId"].as_str().unwrap().starts_with("acct_"));

    let (_, listings) = server.get(&admin, "/api/providers").await;
    assert_eq!(listings[0]["name"], json!("Shine Co"));
    assert_eq!(listings[0]["id"], json!(id));

    // Places are not configured, so the service area was never geocoded.
    let (_, nearby) = server
        .get(&admin, "/api/providers?lat=40.23&lng=-111.66&radiusKm=25")
        .await;
    assert_eq!(nearby, json!([]));

    let (status, _) = server
        .post(&admin, "/api/admin/providers/missing/reject", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_provider_dashboard_lists_bookings() {
    let server = TestServer::start().await;
    let provider = TestServer::client();
    let application = submit_application(&server, &provider).await;
    let id = application["id"].as_str().unwrap().to_owned();

    let admin = admin(&server).await;
    server
        .post(&admin, &format!("/api/admin/providers/{id}/approve"), json!({}))
        .await;

    let customer = TestServer::client();
    let tomorrow = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string();
    let steps = [
        json!({ "serviceId": "3", "provider": { "id": id, "name": "Someone Else" } }),
        json!({ "date": tomorrow, "time": "2:00 PM" }),
        json!({
            "vehicle": { "make": "Ford", "model": "F-150", "year": "2020" },
            "address": "9 Main St, Orem, UT"
        }),
        json!({}),
    ];
    for edit in steps {
        let (status, state) = server.patch(&customer, "/api/booking/draft", edit).await;
        assert_eq!(status, StatusCode::OK, "{state}");
        server.post(&customer, "/api/booking/advance", json!({})).await;
    }
    server.sign_up(&customer, "kim@example.com").await;
    let (status, booking) = server
        .post(&customer, "/api/booking/submit", json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{booking}");
    assert_eq!(booking["providerName"], json!("Shine Co"));

    let (status, _) = server.get(&customer, "/api/provider/dashboard").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, dashboard) = server.get(&provider, "/api/provider/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["totalJobs"], json!(1));
    assert_eq!(dashboard["todayBookings"], json!(0));
    assert_eq!(dashboard["weekRevenue"], json!(128));
    assert_eq!(dashboard["upcoming"][0]["date"], json!("Tomorrow"));
    assert_eq!(dashboard["upcoming"][0]["vehicle"], json!("2020 Ford F-150"));
    assert_eq!(dashboard["upcoming"][0]["service"], json!("Exterior Detail"));

    let booking_id = booking["id"].as_str().unwrap();
    let (status, _) = server
        .get(&provider, &format!("/api/bookings/{booking_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
}
