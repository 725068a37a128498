//! Sign-up, sign-in, sign-out and profile editing over HTTP.

use brnno_integration_tests::TestServer;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_health_endpoints() {
    let server = TestServer::start().await;
    let client = TestServer::client();

    let (status, body) = server.get(&client, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));

    let (status, _) = server.get(&client, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_signup_me_logout() {
    let server = TestServer::start().await;
    let client = TestServer::client();

    let (status, _) = server.get(&client, "/api/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let uid = server.sign_up(&client, "casey@example.com").await;

    let (status, me) = server.get(&client, "/api/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["uid"], json!(uid));
    assert_eq!(me["email"], json!("casey@example.com"));
    assert_eq!(me["accountType"], json!("customer"));
    assert_eq!(me["role"], json!("user"));

    let (status, _) = server.post(&client, "/api/auth/logout", json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = server.get(&client, "/api/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let server = TestServer::start().await;
    let client = TestServer::client();
    server.sign_up(&client, "dana@example.com").await;

    let other = TestServer::client();
    let (status, _) = server
        .post(
            &other,
            "/api/auth/login",
            json!({ "email": "dana@example.com", "password": "wrong-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .post(
            &other,
            "/api/auth/login",
            json!({ "email": "Dana@Example.com", "password": "hunter22" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], json!("dana@example.com"));
}

#[tokio::test]
async fn test_signup_validation_and_duplicates() {
    let server = TestServer::start().await;
    let client = TestServer::client();

    let (status, _) = server
        .post(
            &client,
            "/api/auth/signup",
            json!({ "email": "eli@example.com", "password": "123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    server.sign_up(&client, "eli@example.com").await;
    let (status, _) = server
        .post(
            &TestServer::client(),
            "/api/auth/signup",
            json!({ "email": "eli@example.com", "password": "another1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_password_reset_does_not_reveal_accounts() {
    let server = TestServer::start().await;
    let client = TestServer::client();

    let (status, _) = server
        .post(
            &client,
            "/api/auth/password-reset",
            json!({ "email": "nobody@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = server
        .post(
            &client,
            "/api/auth/password-reset",
            json!({ "email": "not-an-email" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_update() {
    let server = TestServer::start().await;
    let client = TestServer::client();
    server.sign_up(&client, "fran@example.com").await;

    let (status, profile) = server
        .patch(
            &client,
            "/api/account/profile",
            json!({ "lastName": "Lee", "phone": "801-555-0100" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["firstName"], json!("Test"));
    assert_eq!(profile["lastName"], json!("Lee"));
    assert_eq!(profile["phone"], json!("801-555-0100"));

    let (status, _) = server
        .patch(&client, "/api/account/profile", json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
