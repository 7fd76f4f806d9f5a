mod common;

use axum::http::{Method, StatusCode};
use client_portal_core::Role;
use common::{Multipart, TestApp};
use serde_json::json;
use uuid::Uuid;

async fn bill_for(app: &TestApp, admin: &str, owner: Uuid, number: &str, due: &str) -> String {
    let reply = app
        .multipart(
            Method::POST,
            "/api/billing",
            admin,
            Multipart::new()
                .text("userId", &owner.to_string())
                .text("particulars", "Retainer")
                .text("billNumber", number)
                .text("amount", "500")
                .text("dueDate", due),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    reply.json()["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn dashboard_is_admin_only() {
    let app = TestApp::new();
    let (_, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    for uri in ["/api/admin/stats", "/api/admin/users", "/api/admin/logs/documents"] {
        let reply = app.get(uri, &token).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn stats_count_users_documents_and_pending_bills() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;
    let (first, _) = app.user_with_token("FIRST2222B", Role::User).await;
    let (second, _) = app.user_with_token("SECON3333C", Role::User).await;

    bill_for(&app, &admin, first.id, "INV-1", "2099-12-31").await;
    app.state.profiles.set_active(second.id, false, None).await.unwrap();

    let stats = app.get("/api/admin/stats", &admin).await;
    assert_eq!(stats.status, StatusCode::OK);
    let stats = stats.json();
    assert_eq!(stats["totalUsers"], 3);
    assert_eq!(stats["activeUsers"], 2);
    assert_eq!(stats["totalDocuments"], 0);
    assert_eq!(stats["totalBills"], 1);
    assert_eq!(stats["pendingBills"], 1);
}

#[tokio::test]
async fn users_are_paged_searched_and_filtered() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;
    app.seed_user("FIRST2222B", Role::User).await;
    app.seed_user("SECON3333C", Role::User).await;
    let third = app.seed_user("THIRD4444D", Role::User).await;
    app.state.profiles.set_active(third.id, false, None).await.unwrap();

    let page = app.get("/api/admin/users?page=2&limit=3", &admin).await.json();
    assert_eq!(page["total"], 4);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["currentPage"], 2);
    assert_eq!(page["users"].as_array().unwrap().len(), 1);

    let found = app.get("/api/admin/users?search=secon", &admin).await.json();
    assert_eq!(found["total"], 1);
    assert_eq!(found["users"][0]["pan"], "SECON3333C");
    assert!(found["users"][0]["loginAttempts"].is_number());

    let inactive = app.get("/api/admin/users?status=inactive", &admin).await.json();
    assert_eq!(inactive["total"], 1);
    assert_eq!(inactive["users"][0]["pan"], "THIRD4444D");
}

#[tokio::test]
async fn status_changes_record_a_reason() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;
    let client = app.seed_user("CLIEN2222B", Role::User).await;
    let uri = format!("/api/admin/users/{}/status", client.id);

    let off = app
        .call(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "isActive": false, "reason": "Fees overdue" })),
        )
        .await;
    assert_eq!(off.status, StatusCode::OK);
    let off = off.json();
    assert_eq!(off["message"], "User deactivated successfully");
    assert_eq!(off["user"]["isActive"], false);
    assert_eq!(off["user"]["deactivationReason"], "Fees overdue");

    let on = app
        .call(Method::PATCH, &uri, Some(&admin), Some(json!({ "isActive": true })))
        .await
        .json();
    assert_eq!(on["message"], "User activated successfully");
    assert_eq!(on["user"]["isActive"], true);
    assert!(on["user"]["deactivationReason"].is_null());
}

#[tokio::test]
async fn overdue_owners_are_deactivated_in_bulk() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;
    let late = app.seed_user("LATEP2222B", Role::User).await;
    let punctual = app.seed_user("PUNCT3333C", Role::User).await;

    bill_for(&app, &admin, late.id, "INV-1", "2020-01-31").await;
    bill_for(&app, &admin, late.id, "INV-2", "2020-02-29").await;
    bill_for(&app, &admin, punctual.id, "INV-3", "2099-12-31").await;

    let overdue = app.get("/api/admin/bills/overdue", &admin).await.json();
    assert_eq!(overdue.as_array().unwrap().len(), 2);

    let reply = app
        .call(
            Method::POST,
            "/api/admin/users/deactivate-overdue",
            Some(&admin),
            Some(json!({ "daysOverdue": 30 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["message"], "Users deactivated successfully");
    assert_eq!(body["count"], 1);

    let late = app.state.profiles.get(late.id).await.unwrap();
    let punctual = app.state.profiles.get(punctual.id).await.unwrap();
    assert!(!late.is_active);
    assert!(punctual.is_active);
}

#[tokio::test]
async fn detail_activity_and_access_log() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;
    let (client, token) = app.user_with_token("CLIEN2222B", Role::User).await;

    let uploaded = app
        .multipart(
            Method::POST,
            &format!("/api/admin/users/{}/documents", client.id),
            &admin,
            Multipart::new()
                .text("category", "gst")
                .text("documentType", "GSTR3B")
                .text("financialYear", "2024-25")
                .file("document", "gstr3b.pdf", "application/pdf", b"%PDF gst"),
        )
        .await;
    assert_eq!(uploaded.status, StatusCode::CREATED);
    let document_id = uploaded.json()["document"]["id"].as_str().unwrap().to_string();
    bill_for(&app, &admin, client.id, "INV-1", "2099-12-31").await;

    app.get(&format!("/api/documents/{document_id}/view"), &token).await;
    app.get(&format!("/api/documents/{document_id}/download"), &token).await;

    let detail = app
        .get(&format!("/api/admin/users/{}", client.id), &admin)
        .await
        .json();
    assert_eq!(detail["user"]["pan"], "CLIEN2222B");
    assert_eq!(detail["documents"].as_array().unwrap().len(), 1);
    assert_eq!(detail["billing"].as_array().unwrap().len(), 1);

    let activity = app
        .get(&format!("/api/admin/users/{}/activity", client.id), &admin)
        .await
        .json();
    assert_eq!(activity["documentAccess"]["totalViews"], 1);
    assert_eq!(activity["documentAccess"]["totalDownloads"], 1);
    assert_eq!(activity["billingSummary"]["totalBills"], 1);
    assert_eq!(activity["billingSummary"]["totalAmount"].as_f64(), Some(500.0));

    let logs = app.get("/api/admin/logs/documents", &admin).await.json();
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l["userPan"] == "CLIEN2222B"));
    assert!(logs.iter().all(|l| l["documentType"] == "GSTR3B"));

    let outstanding = app.get("/api/admin/outstanding", &admin).await.json();
    assert_eq!(outstanding[0]["userId"], client.id.to_string());
    assert_eq!(outstanding[0]["outstanding"].as_f64(), Some(500.0));
}

#[tokio::test]
async fn unknown_users_are_not_found() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;

    let reply = app
        .get(&format!("/api/admin/users/{}", Uuid::new_v4()), &admin)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json()["message"], "User not found");
}

#[tokio::test]
async fn far_away_pages_are_simply_empty() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;

    let reply = app
        .get(
            &format!("/api/admin/users?page={}&limit=100", i64::MAX),
            &admin,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let page = reply.json();
    assert_eq!(page["total"], 1);
    assert!(page["users"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn overdue_windows_must_be_in_range() {
    let app = TestApp::new();
    let (_, admin) = app.user_with_token("ADMIN1111A", Role::Admin).await;

    for days in [json!(9_000_000_000_000i64), json!(-1)] {
        let reply = app
            .call(
                Method::POST,
                "/api/admin/users/deactivate-overdue",
                Some(&admin),
                Some(json!({ "daysOverdue": days })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{days}");
        assert_eq!(reply.json()["errors"][0]["field"], "daysOverdue");
    }
}
