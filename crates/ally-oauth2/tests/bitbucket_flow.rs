//! Bitbucket driver integration tests against a mock Bitbucket.
//!
//! Covers: full code exchange, token endpoint rejection, profile and email
//! endpoint failures, login with a pre-obtained token.

use std::collections::HashMap;

use ally_core::AllyError;
use ally_oauth2::{AllyDriver, BitbucketDriver, CallbackParams};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> serde_json::Value {
    json!({
        "services": { "ally": { "bitbucket": {
            "clientId": "client-1",
            "clientSecret": "secret-1",
            "redirectUri": "http://localhost/callback",
            "headers": { "X-Client": "ally-tests" }
        } } }
    })
}

fn driver(server: &MockServer) -> BitbucketDriver {
    BitbucketDriver::with_base_url(&config(), server.uri()).unwrap()
}

fn callback(pairs: &[(&str, &str)]) -> CallbackParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<HashMap<_, _>>()
}

async fn mount_token_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/site/oauth2/access_token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("client_secret=secret-1"))
        .and(header("X-Client", "ally-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "bb-access",
            "refresh_token": "bb-refresh",
            "token_type": "bearer",
            "expires_in": 7200,
            "scopes": "account email"
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_profile_ok(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/api/2.0/user"))
        .and(query_param("access_token", token))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "{0a1b2c3d}",
            "display_name": "Jane Doe",
            "username": "jdoe",
            "account_id": "557058:1234",
            "links": { "avatar": { "href": "https://avatar-management.example/jdoe.png" } }
        })))
        .mount(server)
        .await;
}

async fn mount_emails_ok(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/api/2.0/user/emails"))
        .and(query_param("access_token", token))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pagelen": 10,
            "page": 1,
            "size": 2,
            "values": [
                { "email": "jane@work.example", "is_primary": false, "is_confirmed": true, "type": "email" },
                { "email": "jane@home.example", "is_primary": true, "is_confirmed": false, "type": "email" }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_user_full_flow() {
    let server = MockServer::start().await;
    mount_token_ok(&server).await;
    mount_profile_ok(&server, "bb-access").await;
    mount_emails_ok(&server, "bb-access").await;

    let user = driver(&server)
        .get_user(&callback(&[("code", "the-code"), ("state", "s1")]), Some("s1"))
        .await
        .unwrap();

    assert_eq!(user.id(), "{0a1b2c3d}");
    assert_eq!(user.name(), Some("Jane Doe"));
    assert_eq!(user.nickname(), Some("jdoe"));
    assert_eq!(user.email(), Some("jane@work.example"));
    assert_eq!(
        user.avatar(),
        Some("https://avatar-management.example/jdoe.png")
    );
    assert_eq!(user.access_token(), "bb-access");
    assert_eq!(user.refresh_token(), Some("bb-refresh"));
    assert_eq!(user.expires_in(), Some(7200));
    assert!(user.token_secret().is_none());

    let emails = &user.original()["emails"];
    assert_eq!(
        emails[1],
        json!({ "value": "jane@home.example", "primary": true, "verified": false })
    );
    assert_eq!(user.original()["account_id"], "557058:1234");
}

#[tokio::test]
async fn test_get_user_without_state() {
    let server = MockServer::start().await;
    mount_token_ok(&server).await;
    mount_profile_ok(&server, "bb-access").await;
    mount_emails_ok(&server, "bb-access").await;

    let user = driver(&server)
        .get_user(&callback(&[("code", "the-code")]), None)
        .await
        .unwrap();
    assert_eq!(user.id(), "{0a1b2c3d}");
}

#[tokio::test]
async fn test_token_endpoint_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/site/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The specified code is not valid."
        })))
        .mount(&server)
        .await;

    let err = driver(&server)
        .get_user(&callback(&[("code", "stale")]), None)
        .await
        .unwrap_err();

    match err {
        AllyError::TokenExchange {
            message,
            status,
            response,
        } => {
            assert_eq!(message, "The specified code is not valid.");
            assert_eq!(status, Some(400));
            assert!(response.unwrap_or_default().contains("invalid_grant"));
        }
        other => panic!("expected TokenExchange, got {other:?}"),
    }
}

#[tokio::test]
async fn test_token_response_without_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/site/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token_type": "bearer" })))
        .mount(&server)
        .await;

    let err = driver(&server)
        .get_user(&callback(&[("code", "the-code")]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AllyError::TokenExchange { status: Some(200), .. }));
}

#[tokio::test]
async fn test_email_endpoint_failure_surfaces_profile_error() {
    let server = MockServer::start().await;
    mount_token_ok(&server).await;
    mount_profile_ok(&server, "bb-access").await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/user/emails"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = driver(&server)
        .get_user(&callback(&[("code", "the-code")]), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AllyError::ProfileFetch {
            status: Some(403),
            ..
        }
    ));
}

#[tokio::test]
async fn test_profile_endpoint_failure() {
    let server = MockServer::start().await;
    mount_emails_ok(&server, "revoked").await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": { "message": "Access token expired." }
        })))
        .mount(&server)
        .await;

    let err = driver(&server).get_user_by_token("revoked").await.unwrap_err();
    assert_eq!(err.code().as_str(), "E_OAUTH_PROFILE_FETCH");
}

#[tokio::test]
async fn test_get_user_by_token() {
    let server = MockServer::start().await;
    mount_profile_ok(&server, "existing-token").await;
    mount_emails_ok(&server, "existing-token").await;

    let user = driver(&server)
        .get_user_by_token("existing-token")
        .await
        .unwrap();

    assert_eq!(user.id(), "{0a1b2c3d}");
    assert_eq!(user.access_token(), "existing-token");
    assert!(user.refresh_token().is_none());
    assert!(user.expires_in().is_none());
}

#[tokio::test]
async fn test_state_mismatch_never_hits_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/site/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = driver(&server)
        .get_user(&callback(&[("code", "c"), ("state", "abc")]), Some("xyz"))
        .await
        .unwrap_err();
    assert_eq!(err, AllyError::InvalidState);
}

#[tokio::test]
async fn test_concurrent_logins_share_one_driver() {
    let server = MockServer::start().await;
    mount_profile_ok(&server, "t").await;
    mount_emails_ok(&server, "t").await;

    let driver = std::sync::Arc::new(driver(&server));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let driver = driver.clone();
            tokio::spawn(async move { driver.get_user_by_token("t").await })
        })
        .collect();

    for handle in handles {
        let user = handle.await.unwrap().unwrap();
        assert_eq!(user.email(), Some("jane@work.example"));
    }
}
