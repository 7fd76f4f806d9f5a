mod common;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
};
use client_portal_core::Role;
use common::{test_config, TestApp, PASSWORD};
use serde_json::json;
use std::net::SocketAddr;

fn json_request(method: Method, uri: &str, bearer: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn protected_routes_need_a_bearer_token() {
    let app = TestApp::new();

    let missing = app
        .send(Request::builder().uri("/api/profile").body(Body::empty()).unwrap())
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.json()["message"], "No token, authorization denied");

    let forged = app.get("/api/profile", "not-a-jwt").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
    assert_eq!(forged.json()["message"], "Token is not valid");
}

#[tokio::test]
async fn deactivated_users_lose_access_immediately() {
    let app = TestApp::new();
    let (user, token) = app.user_with_token("CLIEN2222B", Role::User).await;
    assert_eq!(app.get("/api/profile", &token).await.status, StatusCode::OK);

    app.state.profiles.set_active(user.id, false, None).await.unwrap();
    let reply = app.get("/api/profile", &token).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn mutations_need_an_anti_forgery_token() {
    let app = TestApp::new();
    let (_, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let bare = app
        .send(json_request(
            Method::PATCH,
            "/api/profile",
            Some(&token),
            json!({ "address": "12 MG Road" }),
        ))
        .await;
    assert_eq!(bare.status, StatusCode::FORBIDDEN);
    assert_eq!(bare.json()["code"], "EBADCSRFTOKEN");

    let mut forged = json_request(
        Method::PATCH,
        "/api/profile",
        Some(&token),
        json!({ "address": "12 MG Road" }),
    );
    forged
        .headers_mut()
        .insert("x-csrf-token", "deadbeef".parse().unwrap());
    assert_eq!(app.send(forged).await.status, StatusCode::FORBIDDEN);

    // A token fetched from the endpoint is accepted, and more than once.
    let issued = app
        .send(Request::builder().uri("/api/csrf-token").body(Body::empty()).unwrap())
        .await;
    assert_eq!(issued.status, StatusCode::OK);
    let csrf = issued.json()["csrfToken"].as_str().unwrap().to_string();
    assert_eq!(issued.headers["x-csrf-token"], csrf.as_str());

    for address in ["12 MG Road", "14 MG Road"] {
        let mut request = json_request(
            Method::PATCH,
            "/api/profile",
            Some(&token),
            json!({ "address": address }),
        );
        request
            .headers_mut()
            .insert("x-csrf-token", csrf.parse().unwrap());
        let reply = app.send(request).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json()["address"], address);
    }
}

#[tokio::test]
async fn auth_routes_skip_the_anti_forgery_check() {
    let app = TestApp::new();
    app.seed_user("CLIEN2222B", Role::User).await;

    let reply = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "pan": "CLIEN2222B", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn self_service_edits_are_restricted_to_profile_fields() {
    let app = TestApp::new();
    let (_, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let reply = app
        .call(
            Method::PATCH,
            "/api/profile",
            Some(&token),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["message"], "Invalid updates");

    let profile = app.get("/api/profile", &token).await.json();
    assert_eq!(profile["role"], "user");
}

#[tokio::test]
async fn login_attempts_are_rate_limited() {
    let mut config = test_config();
    config.auth_rate_limit_max = 2;
    let app = TestApp::with_config(config);
    app.seed_user("CLIEN2222B", Role::User).await;

    let login = || {
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "pan": "CLIEN2222B", "password": "wrong-password" }),
        )
    };
    assert_eq!(app.send(login()).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.send(login()).await.status, StatusCode::UNAUTHORIZED);

    let third = app.send(login()).await;
    assert_eq!(third.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        third.json()["message"],
        "Too many attempts, please try again after 15 minutes."
    );

    // A made-up forwarding header does not buy a fresh budget.
    for hop in 0..20 {
        let mut spoofed = login();
        spoofed
            .headers_mut()
            .insert("x-forwarded-for", format!("203.0.113.{hop}").parse().unwrap());
        assert_eq!(app.send(spoofed).await.status, StatusCode::TOO_MANY_REQUESTS);
    }

    // A different socket peer does.
    let mut elsewhere = login();
    elsewhere
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 7], 40_000))));
    assert_eq!(app.send(elsewhere).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forwarded_addresses_count_behind_a_trusted_proxy() {
    let mut config = test_config();
    config.auth_rate_limit_max = 1;
    config.trust_proxy = true;
    let app = TestApp::with_config(config);

    let from = |hop: &str| {
        let mut request = json_request(
            Method::POST,
            "/api/auth/forgot-password",
            None,
            json!({ "pan": "NOBOD0000Z" }),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", format!("{hop}, 10.0.0.1").parse().unwrap());
        request
    };
    assert_eq!(app.send(from("203.0.113.1")).await.status, StatusCode::OK);
    assert_eq!(
        app.send(from("203.0.113.1")).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.send(from("203.0.113.2")).await.status, StatusCode::OK);
}

#[tokio::test]
async fn login_lockout_when_enabled() {
    let mut config = test_config();
    config.login_lockout_enabled = true;
    config.max_failed_attempts = 2;
    let app = TestApp::with_config(config);
    app.seed_user("CLIEN2222B", Role::User).await;

    for _ in 0..2 {
        let reply = app
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "pan": "CLIEN2222B", "password": "wrong-password" })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    let locked = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "pan": "CLIEN2222B", "password": PASSWORD })),
        )
        .await;
    assert_eq!(locked.status, StatusCode::LOCKED);
}
