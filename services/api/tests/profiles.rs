mod common;

use axum::http::{Method, StatusCode};
use client_portal_core::Role;
use common::{TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn admins_create_company_accounts() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;

    let body = json!({
        "userType": "company",
        "email": "accounts@acme.example",
        "mobile": "9123456789",
        "pan": "AACCA1234B",
        "password": PASSWORD,
        "companyName": "Acme Traders Pvt Ltd",
        "dateOfIncorporation": "2015-04-01",
        "directorDetails": { "name": "R. Mehta", "din": "01234567" }
    });
    let created = app
        .call(Method::POST, "/api/profile", Some(&admin), Some(body.clone()))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let created = created.json();
    assert_eq!(created["message"], "User created successfully");
    assert_eq!(created["user"]["userType"], "company");
    assert_eq!(created["user"]["role"], "user");
    assert_eq!(created["user"]["name"], "Acme Traders Pvt Ltd");
    assert_eq!(created["user"]["directorDetails"]["din"], "01234567");

    let again = app
        .call(Method::POST, "/api/profile", Some(&admin), Some(body))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);

    let all = app.get("/api/profile/all", &admin).await.json();
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn clients_cannot_manage_other_accounts() {
    let app = TestApp::new();
    let (_, token) = app.user_with_token("CLIEN2222B", Role::User).await;
    let other = app.seed_user("OTHER3333C", Role::User).await;

    let list = app.get("/api/profile/all", &token).await;
    assert_eq!(list.status, StatusCode::FORBIDDEN);

    let deactivate = app
        .call(
            Method::PATCH,
            &format!("/api/profile/{}/deactivate", other.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(deactivate.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_edits_and_toggles_accounts() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;
    let client = app.seed_user("CLIEN2222B", Role::User).await;

    let updated = app
        .call(
            Method::PATCH,
            &format!("/api/profile/{}", client.id),
            Some(&admin),
            Some(json!({ "mobile": "9000000001", "gstNumber": "27AACCA1234B1Z5" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    let updated = updated.json();
    assert_eq!(updated["mobile"], "9000000001");
    assert_eq!(updated["gstNumber"], "27AACCA1234B1Z5");
    assert_eq!(updated["firstName"], "Test");

    let off = app
        .call(
            Method::PATCH,
            &format!("/api/profile/{}/deactivate", client.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(off.json()["message"], "User deactivated successfully");
    assert!(!app.state.profiles.get(client.id).await.unwrap().is_active);

    let on = app
        .call(
            Method::PATCH,
            &format!("/api/profile/{}/activate", client.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(on.json()["message"], "User activated successfully");
    assert!(app.state.profiles.get(client.id).await.unwrap().is_active);
}

#[tokio::test]
async fn own_profile_update_keeps_identity_fields() {
    let app = TestApp::new();
    let (user, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let reply = app
        .call(
            Method::PUT,
            "/api/profile",
            Some(&token),
            Some(json!({
                "mobile": "9000000002",
                "address": "7 Park Street",
                "email": "changed@example.com",
                "pan": "ZZZZZ9999Z"
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let profile = reply.json();
    assert_eq!(profile["mobile"], "9000000002");
    assert_eq!(profile["address"], "7 Park Street");
    assert_eq!(profile["email"], user.email);
    assert_eq!(profile["pan"], "CLIEN2222B");
}

fn failed_fields(reply: &common::Reply) -> Vec<String> {
    reply.json()["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["field"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn account_fields_are_validated_before_saving() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;
    let (client, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let created = app
        .call(
            Method::POST,
            "/api/profile",
            Some(&admin),
            Some(json!({
                "userType": "company",
                "email": "accounts-at-acme",
                "mobile": "9123456789",
                "pan": "AB12",
                "password": PASSWORD,
                "companyName": "Acme Traders Pvt Ltd"
            })),
        )
        .await;
    assert_eq!(created.status, StatusCode::BAD_REQUEST);
    assert_eq!(failed_fields(&created), ["email", "pan"]);

    let weak = app
        .call(
            Method::PATCH,
            &format!("/api/profile/{}", client.id),
            Some(&admin),
            Some(json!({ "password": "short" })),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        weak.json()["errors"][0]["message"],
        "Password must be at least 8 characters"
    );

    let own = app
        .call(
            Method::PUT,
            "/api/profile",
            Some(&token),
            Some(json!({ "mobile": "12" })),
        )
        .await;
    assert_eq!(own.status, StatusCode::BAD_REQUEST);
    assert_eq!(failed_fields(&own), ["mobile"]);

    let unchanged = app.state.profiles.get(client.id).await.unwrap();
    assert_eq!(unchanged.mobile, client.mobile);
}
